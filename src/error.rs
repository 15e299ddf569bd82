//! Error types used by the pidvisor runtime.
//!
//! [`RuntimeError`] covers every condition that ends supervision. Each variant maps
//! to a distinct process exit status through [`RuntimeError::exit_code`], and to a
//! short stable label through [`RuntimeError::as_label`] for logs.
//!
//! Recoverable anomalies (unknown child, transient signal failure, a service that
//! already vanished) are **not** errors: they are published as events and logged.

use std::time::Duration;

use nix::sys::signal::Signal;
use thiserror::Error;

use crate::process::SpawnError;

/// Process exit statuses, one per fatal outcome.
pub mod exit {
    /// All services terminated during shutdown.
    pub const CLEAN: u8 = 0;
    /// No service was given on the command line (or invalid arguments).
    pub const USAGE: u8 = 1;
    /// The service table could not be allocated.
    pub const ALLOCATION: u8 = 2;
    /// OS notifications (SIGCHLD/SIGINT/SIGTERM) could not be installed.
    pub const NOTIFY_INSTALL: u8 = 3;
    /// A service process could not be created during steady state.
    pub const LAUNCH: u8 = 4;
    /// Services were still running after the hard shutdown deadline.
    pub const SHUTDOWN_ABORTED: u8 = 5;
    /// A notification source stopped delivering after installation.
    ///
    /// Also used when the notification channel closes.
    pub const NOTIFY_REARM: u8 = 126;
}

/// # Errors produced by the pidvisor runtime.
///
/// All of them are fatal: supervision stops and the process exits with
/// [`RuntimeError::exit_code`].
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// No service command was supplied.
    #[error("no service to supervise")]
    NoServices,

    /// The service table could not be reserved.
    #[error("not enough memory for {services} services")]
    AllocationFailed {
        /// Number of services requested.
        services: usize,
    },

    /// A signal stream could not be registered.
    #[error("failed to install {signal} handler: {source}")]
    NotifyInstall {
        /// Signal whose registration failed.
        signal: Signal,
        #[source]
        source: std::io::Error,
    },

    /// A signal stream ended and can no longer deliver notifications.
    #[error("failed to rearm {signal} handler")]
    NotifyRearm {
        /// Signal whose stream ended.
        signal: Signal,
    },

    /// The notification channel closed; exits and termination requests are lost.
    #[error("notification channel closed")]
    NotifyClosed,

    /// A process could not be created for a stopped service.
    #[error("failed to launch service {command}: {source}")]
    Launch {
        /// Command of the service.
        command: String,
        #[source]
        source: SpawnError,
    },

    /// Services survived the forceful phase of the shutdown sequence.
    #[error("shutdown deadline {deadline:?} exceeded; stuck: {stuck:?}")]
    ShutdownAborted {
        /// Hard deadline (graceful timeout plus forceful window).
        deadline: Duration,
        /// Commands of services still believed running.
        stuck: Vec<String>,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use pidvisor::RuntimeError;
    ///
    /// assert_eq!(RuntimeError::NoServices.as_label(), "runtime_no_services");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::NoServices => "runtime_no_services",
            RuntimeError::AllocationFailed { .. } => "runtime_allocation_failed",
            RuntimeError::NotifyInstall { .. } => "runtime_notify_install",
            RuntimeError::NotifyRearm { .. } => "runtime_notify_rearm",
            RuntimeError::NotifyClosed => "runtime_notify_closed",
            RuntimeError::Launch { .. } => "runtime_launch_failed",
            RuntimeError::ShutdownAborted { .. } => "runtime_shutdown_aborted",
        }
    }

    /// Returns the process exit status for this error.
    ///
    /// # Example
    /// ```
    /// use std::time::Duration;
    /// use pidvisor::RuntimeError;
    ///
    /// let err = RuntimeError::ShutdownAborted { deadline: Duration::from_secs(80), stuck: vec![] };
    /// assert_eq!(err.exit_code(), 5);
    /// ```
    pub fn exit_code(&self) -> u8 {
        match self {
            RuntimeError::NoServices => exit::USAGE,
            RuntimeError::AllocationFailed { .. } => exit::ALLOCATION,
            RuntimeError::NotifyInstall { .. } => exit::NOTIFY_INSTALL,
            RuntimeError::NotifyRearm { .. } | RuntimeError::NotifyClosed => exit::NOTIFY_REARM,
            RuntimeError::Launch { .. } => exit::LAUNCH,
            RuntimeError::ShutdownAborted { .. } => exit::SHUTDOWN_ABORTED,
        }
    }
}
