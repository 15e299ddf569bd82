//! # pidvisor
//!
//! **Pidvisor** is a minimal process supervisor meant to run as the first process
//! of a container (or any small system). It launches a fixed list of services,
//! restarts each one whenever it exits, and on SIGINT/SIGTERM stops them all in a
//! bounded time: SIGTERM first, SIGKILL after the graceful timeout, and an abort
//! with a distinct exit status if anything is still alive after that.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   SIGCHLD   SIGINT   SIGTERM
//!      │         │         │
//!      ▼         ▼         ▼
//! ┌───────────────────────────────────┐
//! │  Watcher (tokio task)             │
//! │  - drains every collectable child │
//! │  - never touches supervisor state │
//! └─────────────────┬─────────────────┘
//!                   │ mpsc<Notification>
//!                   ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Supervisor (foreground loop, single writer)                      │
//! │  - Registry (services by position, reverse index by pid)          │
//! │  - shutdown flag                                                  │
//! │  - ProcessControl (spawn / signal / reap)                         │
//! └─────────────────┬─────────────────────────────────────────────────┘
//!                   │ emit(Event)
//!                   ▼
//!            SubscriberSet (per-sub queues)
//!          ┌─────────┼─────────┐
//!          ▼         ▼         ▼
//!      LogWriter   custom     ...
//! ```
//!
//! ### Lifecycle
//! ```text
//! Supervisor::builder(cfg).build(commands)   (every service stopped)
//!
//! while !shutdown {
//!   ├─► settle(settle_interval)             notifications applied, wait continues
//!   ├─► shutdown requested? ─► break
//!   ├─► launch every stopped service        no process ─► exit 4
//!   │                                       program not loadable ─► retry next round
//!   └─► poll(poll_interval)                 first notification wakes the loop
//! }
//!
//! shutdown:
//!   ├─► SIGTERM sweeps every kill_interval  while elapsed <= shutdown_timeout
//!   ├─► SIGKILL sweeps                      while elapsed <= forceful deadline
//!   ├─► all stopped ─► exit 0
//!   └─► deadline passed ─► exit 5
//! ```
//!
//! ## Features
//! | Area              | Description                                               | Key types / traits                 |
//! |-------------------|-----------------------------------------------------------|------------------------------------|
//! | **Supervision**   | Restart loop and bounded shutdown.                        | [`Supervisor`], [`Config`]         |
//! | **Notifications** | OS signals turned into ordered messages.                  | [`Watcher`], [`Notification`]      |
//! | **Processes**     | Spawn/signal/reap behind a trait (fakes in tests).        | [`ProcessControl`], [`UnixProcesses`] |
//! | **Subscriber API**| Hook into lifecycle events (logging, custom subscribers). | [`Subscribe`], [`LogWriter`]       |
//! | **Errors**        | Typed fatal errors with distinct exit statuses.           | [`RuntimeError`], [`exit`]         |
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use pidvisor::{Config, LogWriter, Subscribe, Supervisor};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
//!
//!     let sup = Supervisor::builder(Config::default())
//!         .with_subscribers(subs)
//!         .build(["/usr/sbin/nginx", "/usr/sbin/crond"])?;
//!
//!     sup.run().await?;
//!     Ok(())
//! }
//! ```

mod core;
mod error;
mod events;
mod notify;
mod process;
mod registry;
mod subscribers;

pub mod cli;
pub mod logging;

// ---- Public re-exports ----

pub use core::{Config, Phase, Supervisor, SupervisorBuilder};
pub use error::{RuntimeError, exit};
pub use events::{Event, EventKind};
pub use notify::{Notification, Watcher, WatcherGuard, drain_children};
pub use process::{ExitStatus, ProcessControl, Reaped, SpawnError, UnixProcesses};
pub use registry::{Registry, Service, ServiceId};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
