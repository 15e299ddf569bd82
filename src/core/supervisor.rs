//! # Supervisor: steady-state loop and shutdown driver.
//!
//! The [`Supervisor`] owns the service [`Registry`], the shutdown flag and the
//! [`SubscriberSet`]. It is the single writer of all of them; the notification
//! watcher only sends messages (see [`crate::notify`]).
//!
//! ## High-level architecture
//! ```text
//! run():
//!   Watcher::install() ──► mpsc::Receiver<Notification>
//!
//! RUNNING (until the shutdown flag is set):
//!   ├─► settle(settle_interval)        apply notifications, keep waiting
//!   ├─► shutdown requested?            → STOPPED
//!   ├─► start every stopped service    process creation failure → Err(Launch), exit 4
//!   │                                  program not loadable → LoadFailed, skip poll
//!   └─► poll(poll_interval)            first notification ends the wait
//!
//! STOPPED:
//!   Sequencer::begin()
//!   loop {
//!     ├─► all stopped?        → AllStopped, Ok(())
//!     ├─► phase = Abort?      → ShutdownAborted, Err(ShutdownAborted)
//!     ├─► sweep(phase signal)
//!     └─► wait(kill_interval) ends early once every service is stopped
//!   }
//! ```
//!
//! ## Suspension points
//! Notifications are applied only while waiting (settle, poll, sweep wait). Between
//! two waits the registry cannot change under the loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time;

use crate::core::builder::SupervisorBuilder;
use crate::core::config::Config;
use crate::core::shutdown::{self, Sequencer};
use crate::error::RuntimeError;
use crate::events::{Event, EventKind};
use crate::notify::{Notification, Watcher};
use crate::process::{ExitStatus, ProcessControl, SpawnError};
use crate::registry::Registry;
use crate::subscribers::SubscriberSet;

/// Condition ending a wait before its period elapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wake {
    /// Wait the full period.
    Never,
    /// Return after the first applied notification.
    AnyNotification,
    /// Return once no service is running.
    AllStopped,
}

/// Supervises a fixed set of services until shutdown completes.
pub struct Supervisor {
    cfg: Config,
    processes: Arc<dyn ProcessControl>,
    subs: SubscriberSet,
    registry: Registry,
    shutdown: bool,
}

impl Supervisor {
    /// Returns a builder for configuring the supervisor.
    pub fn builder(cfg: Config) -> SupervisorBuilder {
        SupervisorBuilder::new(cfg)
    }

    pub(crate) fn new_internal(
        cfg: Config,
        processes: Arc<dyn ProcessControl>,
        subs: SubscriberSet,
        registry: Registry,
    ) -> Self {
        Self {
            cfg,
            processes,
            subs,
            registry,
            shutdown: false,
        }
    }

    /// Read-only view of the services.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Installs the OS notification watcher and supervises until shutdown completes.
    ///
    /// Returns `Ok(())` only when every service stopped during shutdown.
    pub async fn run(self) -> Result<(), RuntimeError> {
        let watcher = match Watcher::install(
            Arc::clone(&self.processes),
            self.cfg.notify_capacity_clamped(),
        ) {
            Ok(w) => w,
            Err(e) => {
                if let RuntimeError::NotifyInstall { signal, source } = &e {
                    self.subs.emit(
                        Event::new(EventKind::NotifyInstallFailed)
                            .with_signal(*signal)
                            .with_reason(source.to_string()),
                    );
                }
                self.subs.shutdown().await;
                return Err(e);
            }
        };
        let (rx, _guard) = watcher.into_parts();
        self.run_with(rx).await
    }

    /// Supervises using an externally provided notification channel.
    ///
    /// Every queued event is delivered to subscribers before this returns.
    pub async fn run_with(
        mut self,
        mut rx: mpsc::Receiver<Notification>,
    ) -> Result<(), RuntimeError> {
        let res = self.drive(&mut rx).await;
        self.subs.shutdown().await;
        res
    }

    async fn drive(&mut self, rx: &mut mpsc::Receiver<Notification>) -> Result<(), RuntimeError> {
        self.supervise(rx).await?;
        self.shut_down(rx).await
    }

    /// RUNNING state: restart loop until the shutdown flag is set.
    async fn supervise(
        &mut self,
        rx: &mut mpsc::Receiver<Notification>,
    ) -> Result<(), RuntimeError> {
        while !self.shutdown {
            self.wait(rx, self.cfg.settle_interval, Wake::Never).await?;
            if self.shutdown {
                break;
            }
            // An unloadable program is a child that exited at once: retry after settling.
            if self.start_stopped()? {
                continue;
            }
            self.wait(rx, self.cfg.poll_interval, Wake::AnyNotification)
                .await?;
        }
        Ok(())
    }

    /// Launches every service not running, in command-line order.
    ///
    /// Returns true when a program could not be loaded and its service is still stopped.
    fn start_stopped(&mut self) -> Result<bool, RuntimeError> {
        let mut load_failed = false;
        for id in self.registry.stopped() {
            let command = self.registry.get(id).command().to_owned();
            match self.processes.spawn(&command) {
                Ok(pid) => {
                    self.registry.mark_running(id, pid);
                    self.subs.emit(
                        Event::new(EventKind::ServiceStarted)
                            .with_service(command)
                            .with_pid(pid),
                    );
                }
                Err(SpawnError::Exec(err)) => {
                    load_failed = true;
                    self.subs.emit(
                        Event::new(EventKind::LoadFailed)
                            .with_service(command)
                            .with_reason(err.to_string()),
                    );
                }
                Err(source) => {
                    self.subs.emit(
                        Event::new(EventKind::LaunchFailed)
                            .with_service(command.as_str())
                            .with_reason(source.to_string()),
                    );
                    return Err(RuntimeError::Launch { command, source });
                }
            }
        }
        Ok(load_failed)
    }

    /// STOPPED state: escalating sweeps until every service stopped or the deadline passed.
    async fn shut_down(
        &mut self,
        rx: &mut mpsc::Receiver<Notification>,
    ) -> Result<(), RuntimeError> {
        let mut seq = Sequencer::begin(&self.cfg, &self.subs);
        loop {
            if self.registry.all_stopped() {
                self.subs.emit(Event::new(EventKind::AllStopped));
                return Ok(());
            }

            let sig = match seq.phase(&self.cfg, &self.subs).signal() {
                Some(sig) => sig,
                None => return Err(self.abort()),
            };
            shutdown::sweep(
                &mut self.registry,
                self.processes.as_ref(),
                sig,
                &self.subs,
            );

            if !self.registry.all_stopped() {
                self.wait(rx, self.cfg.kill_interval, Wake::AllStopped)
                    .await?;
            }
        }
    }

    fn abort(&self) -> RuntimeError {
        let deadline = self.cfg.forceful_deadline();
        let stuck = self.registry.running_commands();
        self.subs.emit(
            Event::new(EventKind::ShutdownAborted)
                .with_timeout(deadline)
                .with_reason(stuck.join(", ")),
        );
        RuntimeError::ShutdownAborted { deadline, stuck }
    }

    /// Suspension point: applies notifications for up to `period`.
    async fn wait(
        &mut self,
        rx: &mut mpsc::Receiver<Notification>,
        period: Duration,
        wake: Wake,
    ) -> Result<(), RuntimeError> {
        let sleep = time::sleep(period);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                biased;
                msg = rx.recv() => {
                    let Some(n) = msg else {
                        self.subs.emit(Event::new(EventKind::NotifyClosed));
                        return Err(RuntimeError::NotifyClosed);
                    };
                    self.apply(n)?;
                    match wake {
                        Wake::AnyNotification => return Ok(()),
                        Wake::AllStopped if self.registry.all_stopped() => return Ok(()),
                        _ => {}
                    }
                }
                _ = &mut sleep => return Ok(()),
            }
        }
    }

    /// Applies one notification to the registry / shutdown flag.
    fn apply(&mut self, n: Notification) -> Result<(), RuntimeError> {
        match n {
            Notification::ChildExited { pid, status } => match self.registry.find_by_pid(pid) {
                Some(id) => {
                    let command = self.registry.get(id).command().to_owned();
                    let ev = match status {
                        ExitStatus::Exited(code) => {
                            Event::new(EventKind::ServiceExited).with_code(code)
                        }
                        ExitStatus::Signaled(sig) => {
                            Event::new(EventKind::ServiceKilled).with_signal(sig)
                        }
                    };
                    self.subs.emit(ev.with_service(command).with_pid(pid));
                    self.registry.mark_stopped(id);
                }
                None => {
                    self.subs
                        .emit(Event::new(EventKind::UnknownChildExited).with_pid(pid));
                }
            },
            Notification::TerminationRequested { signal } => {
                if !self.shutdown {
                    self.shutdown = true;
                    self.subs
                        .emit(Event::new(EventKind::ShutdownRequested).with_signal(signal));
                }
            }
            Notification::ReapFailed { error } => {
                self.subs
                    .emit(Event::new(EventKind::ReapFailed).with_reason(error.desc()));
            }
            Notification::RearmFailed { signal } => {
                self.subs.emit(
                    Event::new(EventKind::NotifyRearmFailed)
                        .with_signal(signal)
                        .with_reason("signal stream closed"),
                );
                return Err(RuntimeError::NotifyRearm { signal });
            }
        }
        Ok(())
    }
}
