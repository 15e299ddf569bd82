//! # Notification channel: OS signals turned into typed messages.
//!
//! The [`Watcher`] owns the signal streams (SIGCHLD, SIGINT, SIGTERM) and runs as a
//! dedicated task. It never touches supervisor state: everything it learns is sent
//! as a [`Notification`] on a single ordered channel that the foreground loop
//! drains at its suspension points.
//!
//! ## Flow
//! ```text
//! SIGINT / SIGTERM ──► TerminationRequested { signal }
//! SIGCHLD ──► reap() until Nothing ──► ChildExited { pid, status } (one per child)
//!                                 └──► ReapFailed { error }        (collection error)
//! stream ended ──► RearmFailed { signal } ──► watcher exits
//! ```
//!
//! ## Rules
//! - All collectable children are drained per SIGCHLD wake-up; coalesced signals
//!   never leave an exit uncollected.
//! - The watcher stops when its cancellation token fires or the receiver is dropped.

use std::sync::Arc;

use nix::errno::Errno;
use nix::sys::signal::Signal;
use nix::unistd::Pid;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::RuntimeError;
use crate::process::{ExitStatus, ProcessControl, Reaped};

/// Asynchronous OS event, delivered to the supervision loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    /// A child process terminated and was collected.
    ChildExited { pid: Pid, status: ExitStatus },
    /// The supervisor was asked to terminate.
    TerminationRequested { signal: Signal },
    /// A child-exit wake-up could not collect its child.
    ReapFailed { error: Errno },
    /// A signal stream ended; notifications can no longer be delivered.
    RearmFailed { signal: Signal },
}

/// Installed notification source and its receiving end.
pub struct Watcher {
    rx: mpsc::Receiver<Notification>,
    handle: JoinHandle<()>,
    token: CancellationToken,
}

impl Watcher {
    /// Registers the signal streams and spawns the watcher task.
    ///
    /// Must be called from within a tokio runtime. Registration failure is the
    /// fatal [`RuntimeError::NotifyInstall`].
    pub fn install(
        processes: Arc<dyn ProcessControl>,
        capacity: usize,
    ) -> Result<Self, RuntimeError> {
        let install = |kind: SignalKind, sig: Signal| {
            signal(kind).map_err(|source| RuntimeError::NotifyInstall {
                signal: sig,
                source,
            })
        };
        let mut sigchld = install(SignalKind::child(), Signal::SIGCHLD)?;
        let mut sigint = install(SignalKind::interrupt(), Signal::SIGINT)?;
        let mut sigterm = install(SignalKind::terminate(), Signal::SIGTERM)?;

        let (tx, rx) = mpsc::channel(capacity.max(1));
        let token = CancellationToken::new();
        let stop = token.clone();

        let handle = tokio::spawn(async move {
            loop {
                let sent = tokio::select! {
                    _ = stop.cancelled() => break,
                    got = sigchld.recv() => match got {
                        Some(()) => drain_children(processes.as_ref(), &tx).await,
                        None => rearm_failed(&tx, Signal::SIGCHLD).await,
                    },
                    got = sigint.recv() => match got {
                        Some(()) => terminate(&tx, Signal::SIGINT).await,
                        None => rearm_failed(&tx, Signal::SIGINT).await,
                    },
                    got = sigterm.recv() => match got {
                        Some(()) => terminate(&tx, Signal::SIGTERM).await,
                        None => rearm_failed(&tx, Signal::SIGTERM).await,
                    },
                };
                if !sent {
                    break;
                }
            }
        });

        Ok(Self { rx, handle, token })
    }

    /// Splits the watcher into its receiver and a guard stopping the task on drop.
    pub fn into_parts(self) -> (mpsc::Receiver<Notification>, WatcherGuard) {
        (
            self.rx,
            WatcherGuard {
                handle: self.handle,
                token: self.token,
            },
        )
    }
}

/// Stops the watcher task when dropped.
pub struct WatcherGuard {
    handle: JoinHandle<()>,
    token: CancellationToken,
}

impl Drop for WatcherGuard {
    fn drop(&mut self) {
        self.token.cancel();
        self.handle.abort();
    }
}

/// Collects every terminated child; returns false once the receiver is gone.
pub async fn drain_children(
    processes: &dyn ProcessControl,
    tx: &mpsc::Sender<Notification>,
) -> bool {
    loop {
        let msg = match processes.reap() {
            Reaped::Child { pid, status } => Notification::ChildExited { pid, status },
            Reaped::Nothing => return true,
            Reaped::Failed(error) => {
                return tx.send(Notification::ReapFailed { error }).await.is_ok();
            }
        };
        if tx.send(msg).await.is_err() {
            return false;
        }
    }
}

async fn terminate(tx: &mpsc::Sender<Notification>, signal: Signal) -> bool {
    tx.send(Notification::TerminationRequested { signal })
        .await
        .is_ok()
}

async fn rearm_failed(tx: &mpsc::Sender<Notification>, signal: Signal) -> bool {
    let _ = tx.send(Notification::RearmFailed { signal }).await;
    false
}
