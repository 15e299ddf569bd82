//! # Global runtime configuration.
//!
//! Provides [`Config`] centralized tunables for the supervision engine.
//!
//! ## Timeline of a shutdown
//! ```text
//! 0 ─────────── shutdown_timeout ───────────── forceful_deadline ──►
//! │  graceful: SIGTERM   │  forceful: SIGKILL  │  abort (exit 5)
//!                        └─ escalation_windows × kill_interval ─┘
//! ```

use std::time::Duration;

use nix::sys::signal::Signal;

/// Global configuration for the supervisor runtime.
///
/// ## Field semantics
/// - `shutdown_timeout`: graceful phase length (SIGTERM sweeps)
/// - `kill_interval`: delay between two shutdown sweeps
/// - `escalation_windows`: number of `kill_interval`s in the forceful phase
/// - `poll_interval`: steady-state refresh when no notification arrives
/// - `settle_interval`: pause before (re)starting services, absorbs event bursts
/// - `notify_capacity`: notification channel buffer (min 1)
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum time SIGTERM is sent before escalating to SIGKILL.
    pub shutdown_timeout: Duration,

    /// Interval between two shutdown sweeps.
    pub kill_interval: Duration,

    /// Forceful phase length, counted in `kill_interval`s.
    pub escalation_windows: u32,

    /// Steady-state poll interval.
    ///
    /// Not the primary restart trigger: an exit notification ends the wait early.
    pub poll_interval: Duration,

    /// Pause at the top of each loop iteration before starting stopped services.
    pub settle_interval: Duration,

    /// Capacity of the notification channel between watcher and loop.
    pub notify_capacity: usize,
}

impl Config {
    /// Elapsed shutdown time after which supervision is aborted.
    ///
    /// Saturates at [`Duration::MAX`].
    #[inline]
    pub fn forceful_deadline(&self) -> Duration {
        self.kill_interval
            .checked_mul(self.escalation_windows)
            .and_then(|window| self.shutdown_timeout.checked_add(window))
            .unwrap_or(Duration::MAX)
    }

    /// Notification channel capacity clamped to a minimum of 1.
    #[inline]
    pub fn notify_capacity_clamped(&self) -> usize {
        self.notify_capacity.max(1)
    }

    /// Shutdown phase for a sweep happening `elapsed` after shutdown began.
    pub fn phase_at(&self, elapsed: Duration) -> Phase {
        if elapsed <= self.shutdown_timeout {
            Phase::Graceful
        } else if elapsed <= self.forceful_deadline() {
            Phase::Forceful
        } else {
            Phase::Abort
        }
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `shutdown_timeout = 60s`
    /// - `kill_interval = 10s`
    /// - `escalation_windows = 2` (forceful phase lasts 20s)
    /// - `poll_interval = 300s`
    /// - `settle_interval = 1s`
    /// - `notify_capacity = 64`
    fn default() -> Self {
        Self {
            shutdown_timeout: Duration::from_secs(60),
            kill_interval: Duration::from_secs(10),
            escalation_windows: 2,
            poll_interval: Duration::from_secs(300),
            settle_interval: Duration::from_secs(1),
            notify_capacity: 64,
        }
    }
}

/// Escalation phase of the shutdown sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Services are asked to stop.
    Graceful,
    /// Services are killed.
    Forceful,
    /// Deadline exceeded, supervision gives up.
    Abort,
}

impl Phase {
    /// Signal sent to running services in this phase.
    pub fn signal(self) -> Option<Signal> {
        match self {
            Phase::Graceful => Some(Signal::SIGTERM),
            Phase::Forceful => Some(Signal::SIGKILL),
            Phase::Abort => None,
        }
    }
}
