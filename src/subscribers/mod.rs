//! # Event subscribers for the pidvisor runtime.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out and
//! the built-in [`LogWriter`].
//!
//! ## Architecture
//! ```text
//! Supervisor ── emit(Event) ──► SubscriberSet
//!                                  │
//!                        ┌─────────┼─────────┐
//!                        ▼         ▼         ▼
//!                    LogWriter   Custom     ...
//! ```

mod embedded;
mod set;
mod subscribe;

pub use embedded::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
