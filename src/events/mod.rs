//! Runtime events: types published by the supervision engine.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//!
//! ## Quick reference
//! - **Publisher**: the supervisor (loop, notification handling, shutdown sweeps).
//! - **Consumers**: [`SubscriberSet`](crate::SubscriberSet) workers, the built-in
//!   [`LogWriter`](crate::LogWriter) among them.

mod event;

pub use event::{Event, EventKind};
