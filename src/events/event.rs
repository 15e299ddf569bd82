//! # Runtime events emitted by the supervision engine.
//!
//! The [`EventKind`] enum classifies events across three categories:
//! - **Service events**: start, exit, kill, launch failure
//! - **Notification events**: unknown child, collection failure
//! - **Shutdown events**: request, sweeps, escalation, completion or abort
//!
//! The [`Event`] struct carries the metadata each kind needs (service command,
//! pid, exit code, signal, reason).
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use nix::sys::signal::Signal;
//! use nix::unistd::Pid;
//! use pidvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::SignalSent)
//!     .with_service("nginx")
//!     .with_pid(Pid::from_raw(42))
//!     .with_signal(Signal::SIGTERM);
//!
//! assert_eq!(ev.kind, EventKind::SignalSent);
//! assert_eq!(ev.service.as_deref(), Some("nginx"));
//! assert_eq!(ev.pid, Some(42));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use nix::sys::signal::Signal;
use nix::unistd::Pid;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Service events ===
    /// A service process was launched.
    ///
    /// Sets:
    /// - `service`: command
    /// - `pid`: new process id
    ServiceStarted,

    /// A service could not be launched (fatal).
    ///
    /// Sets:
    /// - `service`: command
    /// - `reason`: launch error
    LaunchFailed,

    /// A service's program could not be loaded; it stays stopped and is retried.
    ///
    /// Sets:
    /// - `service`: command
    /// - `reason`: load error
    LoadFailed,

    /// A service exited normally.
    ///
    /// Sets:
    /// - `service`: command
    /// - `pid`: collected process id
    /// - `code`: exit status
    ServiceExited,

    /// A service was terminated by a signal.
    ///
    /// Sets:
    /// - `service`: command
    /// - `pid`: collected process id
    /// - `signal`: terminating signal
    ServiceKilled,

    // === Notification events ===
    /// A child that is not a service terminated (reparented orphan, stale pid).
    ///
    /// Sets:
    /// - `pid`: collected process id
    UnknownChildExited,

    /// A child-exit notification arrived but collection failed.
    ///
    /// Sets:
    /// - `reason`: OS error
    ReapFailed,

    // === Shutdown events ===
    /// Termination requested (OS signal observed). Published once.
    ///
    /// Sets:
    /// - `signal`: received signal
    ShutdownRequested,

    /// Shutdown sequence entered.
    ///
    /// Sets:
    /// - `signal`: graceful signal
    /// - `timeout_ms`: graceful phase length
    ShutdownInitiated,

    /// Graceful phase exceeded; sweeps now kill. Published once.
    ///
    /// Sets:
    /// - `signal`: forceful signal
    ShutdownEscalated,

    /// A shutdown signal was delivered to a service.
    ///
    /// Sets:
    /// - `service`, `pid`, `signal`
    SignalSent,

    /// A service was already gone when signalled; marked stopped.
    ///
    /// Sets:
    /// - `service`, `pid`
    ServiceAlreadyDown,

    /// A shutdown signal could not be delivered; retried next sweep.
    ///
    /// Sets:
    /// - `service`, `pid`, `signal`
    /// - `reason`: OS error
    SignalFailed,

    /// Every service stopped: shutdown complete.
    AllStopped,

    /// Hard deadline exceeded with services still running.
    ///
    /// Sets:
    /// - `timeout_ms`: hard deadline
    /// - `reason`: stuck services
    ShutdownAborted,

    /// A signal stream could not be registered (fatal).
    ///
    /// Sets:
    /// - `signal`: signal whose registration failed
    /// - `reason`: OS error
    NotifyInstallFailed,

    /// A notification source stopped delivering (fatal).
    ///
    /// Sets:
    /// - `signal`: signal whose stream ended
    NotifyRearmFailed,

    /// The notification channel closed; exits and termination requests are lost (fatal).
    NotifyClosed,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Command of the service, if applicable.
    pub service: Option<Arc<str>>,
    /// Process id, if applicable.
    pub pid: Option<i32>,
    /// Exit status code, if applicable.
    pub code: Option<i32>,
    /// Signal received, sent, or terminating the process.
    pub signal: Option<Signal>,
    /// Timeout in milliseconds (compact).
    pub timeout_ms: Option<u64>,
    /// Human-readable reason (errors, stuck services, etc.).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            service: None,
            pid: None,
            code: None,
            signal: None,
            timeout_ms: None,
            reason: None,
        }
    }

    /// Attaches a service command.
    #[inline]
    pub fn with_service(mut self, service: impl Into<Arc<str>>) -> Self {
        self.service = Some(service.into());
        self
    }

    /// Attaches a process id.
    #[inline]
    pub fn with_pid(mut self, pid: Pid) -> Self {
        self.pid = Some(pid.as_raw());
        self
    }

    /// Attaches an exit status code.
    #[inline]
    pub fn with_code(mut self, code: i32) -> Self {
        self.code = Some(code);
        self
    }

    /// Attaches a signal.
    #[inline]
    pub fn with_signal(mut self, signal: Signal) -> Self {
        self.signal = Some(signal);
        self
    }

    /// Attaches a timeout duration (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(d.as_millis().min(u128::from(u64::MAX)) as u64);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// True for anomalies and fatal conditions.
    pub fn is_failure(&self) -> bool {
        matches!(
            self.kind,
            EventKind::LaunchFailed
                | EventKind::LoadFailed
                | EventKind::ReapFailed
                | EventKind::SignalFailed
                | EventKind::ShutdownAborted
                | EventKind::NotifyInstallFailed
                | EventKind::NotifyRearmFailed
                | EventKind::NotifyClosed
        )
    }
}
