//! # LogWriter: one log line per event
//!
//! Renders each [`Event`] as a single human-readable line and hands it to
//! `tracing`. The binary installs a formatter that prefixes every line with a fixed
//! tag (see [`crate::logging`]), giving the classic init-style output on stderr.
//!
//! ## Example output
//! ```text
//! INIT: Started service nginx: 12
//! INIT: Service nginx (12) exited status 1
//! INIT: Service cron (13) interrupted by signal SIGKILL
//! INIT: Child process 57 died
//! INIT: Signal SIGTERM received: shutting down ...
//! INIT: Initiating shutdown with SIGTERM signal for 60 seconds ...
//! INIT: Sent SIGTERM signal to service nginx (14)
//! INIT: Now killing processes ...
//! INIT: All services terminated: shutdown complete.
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Renders `e` as one log line.
    pub fn render(e: &Event) -> String {
        let service = e.service.as_deref().unwrap_or("?");
        let pid = e.pid.unwrap_or(-1);
        let signal = e.signal.map_or("?", |s| s.as_str());
        let reason = e.reason.as_deref().unwrap_or("unknown");

        match e.kind {
            EventKind::ServiceStarted => format!("Started service {service}: {pid}"),
            EventKind::LaunchFailed => format!("Failed to launch service {service}: {reason}"),
            EventKind::LoadFailed => format!("Failed to load program {service}: {reason}"),
            EventKind::ServiceExited => format!(
                "Service {service} ({pid}) exited status {}",
                e.code.unwrap_or_default()
            ),
            EventKind::ServiceKilled => {
                format!("Service {service} ({pid}) interrupted by signal {signal}")
            }
            EventKind::UnknownChildExited => format!("Child process {pid} died"),
            EventKind::ReapFailed => {
                format!("Child signal received but wait failed: {reason}")
            }
            EventKind::ShutdownRequested => {
                format!("Signal {signal} received: shutting down ...")
            }
            EventKind::ShutdownInitiated => format!(
                "Initiating shutdown with {signal} signal for {} seconds ...",
                e.timeout_ms.unwrap_or_default() / 1000
            ),
            EventKind::ShutdownEscalated => "Now killing processes ...".to_string(),
            EventKind::SignalSent => {
                format!("Sent {signal} signal to service {service} ({pid})")
            }
            EventKind::ServiceAlreadyDown => {
                format!("Service {service} ({pid}) seems to be down")
            }
            EventKind::SignalFailed => {
                format!("Failed to send {signal} signal to {service} ({pid}): {reason}")
            }
            EventKind::AllStopped => "All services terminated: shutdown complete.".to_string(),
            EventKind::ShutdownAborted => format!("Too many errors ! Aborting ... ({reason})"),
            EventKind::NotifyInstallFailed => {
                format!("Failed to install {signal} signal handler: {reason}")
            }
            EventKind::NotifyRearmFailed => format!("Failed to rearm {signal} handler: {reason}"),
            EventKind::NotifyClosed => "Notification channel closed: aborting ...".to_string(),
        }
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let line = Self::render(e);
        if e.is_failure() {
            tracing::error!("{line}");
        } else if matches!(
            e.kind,
            EventKind::UnknownChildExited | EventKind::ServiceAlreadyDown
        ) {
            tracing::warn!("{line}");
        } else {
            tracing::info!("{line}");
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }

    fn queue_capacity(&self) -> usize {
        4096
    }
}

#[cfg(test)]
mod tests {
    use nix::sys::signal::Signal;
    use nix::unistd::Pid;

    use super::*;

    #[test]
    fn test_render_exit_and_kill() {
        let ev = Event::new(EventKind::ServiceExited)
            .with_service("nginx")
            .with_pid(Pid::from_raw(12))
            .with_code(3);
        assert_eq!(LogWriter::render(&ev), "Service nginx (12) exited status 3");

        let ev = Event::new(EventKind::ServiceKilled)
            .with_service("cron")
            .with_pid(Pid::from_raw(13))
            .with_signal(Signal::SIGKILL);
        assert_eq!(
            LogWriter::render(&ev),
            "Service cron (13) interrupted by signal SIGKILL"
        );
    }

    #[test]
    fn test_render_load_failure() {
        let ev = Event::new(EventKind::LoadFailed)
            .with_service("/srv/missing")
            .with_reason("No such file or directory");
        assert_eq!(
            LogWriter::render(&ev),
            "Failed to load program /srv/missing: No such file or directory"
        );
    }

    #[test]
    fn test_render_unknown_child() {
        let ev = Event::new(EventKind::UnknownChildExited).with_pid(Pid::from_raw(57));
        assert_eq!(LogWriter::render(&ev), "Child process 57 died");
    }

    #[test]
    fn test_render_is_single_line() {
        let ev = Event::new(EventKind::ShutdownInitiated)
            .with_signal(Signal::SIGTERM)
            .with_timeout(std::time::Duration::from_secs(60));
        let line = LogWriter::render(&ev);
        assert_eq!(line, "Initiating shutdown with SIGTERM signal for 60 seconds ...");
        assert!(!line.contains('\n'));
    }
}
