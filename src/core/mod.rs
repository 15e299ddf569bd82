//! Runtime core: supervision loop and shutdown.
//!
//! The public API from this module is [`Supervisor`] (built through
//! [`SupervisorBuilder`]) and its [`Config`].
//!
//! Internal modules:
//! - [`supervisor`]: settle/start/poll loop, applies notifications, drives shutdown;
//! - [`shutdown`]: escalation phases and signal sweeps;
//! - [`config`]: timing parameters and phase computation;
//! - [`builder`]: assembles registry, process layer and subscribers.

mod builder;
mod config;
mod shutdown;
mod supervisor;

pub use builder::SupervisorBuilder;
pub use config::{Config, Phase};
pub use supervisor::Supervisor;
