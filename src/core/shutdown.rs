//! # Shutdown sequencer: bounded-time escalation.
//!
//! Entered once termination is requested. Each sweep signals every service still
//! believed running; the signal depends on how long shutdown has lasted:
//!
//! ```text
//! elapsed <= shutdown_timeout        → SIGTERM            (graceful)
//! elapsed <= forceful_deadline()     → SIGKILL            (forceful, announced once)
//! beyond                             → give up            (ShutdownAborted, exit 5)
//! ```
//!
//! Per-service outcome of a sweep:
//! - delivered      → `SignalSent`
//! - `ESRCH`        → service marked stopped, `ServiceAlreadyDown`
//! - other error    → `SignalFailed`, retried on the next sweep
//!
//! Sweeps repeat every `kill_interval` until every service is stopped.

use nix::errno::Errno;
use nix::sys::signal::Signal;
use tokio::time::Instant;

use crate::core::config::{Config, Phase};
use crate::events::{Event, EventKind};
use crate::process::ProcessControl;
use crate::registry::Registry;
use crate::subscribers::SubscriberSet;

/// Phase tracker measured from the moment shutdown began.
pub(crate) struct Sequencer {
    started: Instant,
    escalated: bool,
}

impl Sequencer {
    /// Starts the clock and announces the graceful phase.
    pub(crate) fn begin(cfg: &Config, subs: &SubscriberSet) -> Self {
        subs.emit(
            Event::new(EventKind::ShutdownInitiated)
                .with_signal(Signal::SIGTERM)
                .with_timeout(cfg.shutdown_timeout),
        );
        Self {
            started: Instant::now(),
            escalated: false,
        }
    }

    /// Phase for a sweep happening now; announces escalation the first time.
    pub(crate) fn phase(&mut self, cfg: &Config, subs: &SubscriberSet) -> Phase {
        let phase = cfg.phase_at(self.started.elapsed());
        if phase == Phase::Forceful && !self.escalated {
            self.escalated = true;
            subs.emit(Event::new(EventKind::ShutdownEscalated).with_signal(Signal::SIGKILL));
        }
        phase
    }
}

/// Sends `sig` to every running service once.
pub(crate) fn sweep(
    registry: &mut Registry,
    processes: &dyn ProcessControl,
    sig: Signal,
    subs: &SubscriberSet,
) {
    for (id, pid) in registry.running() {
        let service = registry.get(id).command().to_owned();
        let event = match processes.signal(pid, sig) {
            Ok(()) => Event::new(EventKind::SignalSent).with_signal(sig),
            Err(Errno::ESRCH) => {
                registry.mark_stopped(id);
                Event::new(EventKind::ServiceAlreadyDown)
            }
            Err(e) => Event::new(EventKind::SignalFailed)
                .with_signal(sig)
                .with_reason(e.desc()),
        };
        subs.emit(event.with_service(service).with_pid(pid));
    }
}
