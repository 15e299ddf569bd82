//! # Built-in subscribers
//!
//! - [`LogWriter`]: renders every event as one tagged log line.

mod log;

pub use log::LogWriter;
