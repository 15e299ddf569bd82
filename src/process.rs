//! # Process control: the seam between the engine and the operating system.
//!
//! [`ProcessControl`] exposes the three primitives supervision needs:
//! - [`spawn`](ProcessControl::spawn) launches a command with no arguments,
//! - [`signal`](ProcessControl::signal) delivers a signal to a pid,
//! - [`reap`](ProcessControl::reap) collects one exited child without blocking.
//!
//! [`UnixProcesses`] is the real implementation (std `Command` for fork/exec, `nix`
//! for `kill(2)` and `waitpid(2)`). Tests substitute their own implementation.

use std::io;
use std::process::{Command, Stdio};

use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::Pid;
use thiserror::Error;

/// How a collected child terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Normal exit with the given status code.
    Exited(i32),
    /// Terminated by a signal.
    Signaled(Signal),
}

/// Outcome of one non-blocking collection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaped {
    /// A child terminated and was collected.
    Child { pid: Pid, status: ExitStatus },
    /// Nothing to collect right now (children still alive, or no children at all).
    Nothing,
    /// Collection failed for another reason.
    Failed(Errno),
}

/// Launch failure for a service command.
#[derive(Error, Debug)]
pub enum SpawnError {
    /// The program could not be loaded (missing, not executable, ...). Retried.
    #[error("failed to load program: {0}")]
    Exec(#[source] io::Error),
    /// The process could not be created. Fatal.
    #[error("unable to spawn a new process: {0}")]
    Resources(#[source] io::Error),
}

impl SpawnError {
    /// Classifies an error returned by `Command::spawn`.
    pub fn classify(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => SpawnError::Exec(err),
            _ if err.raw_os_error() == Some(Errno::ENOEXEC as i32) => SpawnError::Exec(err),
            _ => SpawnError::Resources(err),
        }
    }
}

/// Operating-system primitives used by the supervisor.
///
/// Implementations must be callable from the foreground loop (`spawn`, `signal`)
/// and from the notification watcher task (`reap`) concurrently.
pub trait ProcessControl: Send + Sync + 'static {
    /// Launches `command` with no arguments; returns the new process id.
    ///
    /// [`SpawnError::Exec`] means the process existed but its program could not be
    /// loaded; the supervisor treats it as an immediate exit. Only
    /// [`SpawnError::Resources`] is fatal.
    fn spawn(&self, command: &str) -> Result<Pid, SpawnError>;

    /// Sends `sig` to `pid`.
    fn signal(&self, pid: Pid, sig: Signal) -> Result<(), Errno>;

    /// Collects at most one terminated child without blocking.
    fn reap(&self) -> Reaped;
}

/// [`ProcessControl`] backed by the real operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnixProcesses;

impl UnixProcesses {
    /// Construct a new [`UnixProcesses`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ProcessControl for UnixProcesses {
    fn spawn(&self, command: &str) -> Result<Pid, SpawnError> {
        // The `Child` handle is dropped on purpose: exits are collected by `reap`.
        let child = Command::new(command)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(SpawnError::classify)?;

        let raw = i32::try_from(child.id())
            .map_err(|_| SpawnError::Resources(io::Error::other("pid out of range")))?;
        Ok(Pid::from_raw(raw))
    }

    fn signal(&self, pid: Pid, sig: Signal) -> Result<(), Errno> {
        signal::kill(pid, sig)
    }

    fn reap(&self) -> Reaped {
        loop {
            return match waitpid(None, Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::Exited(pid, code)) => Reaped::Child {
                    pid,
                    status: ExitStatus::Exited(code),
                },
                Ok(WaitStatus::Signaled(pid, sig, _core)) => Reaped::Child {
                    pid,
                    status: ExitStatus::Signaled(sig),
                },
                Ok(WaitStatus::StillAlive) => Reaped::Nothing,
                // Stop/continue reports are not terminations.
                Ok(_) => continue,
                Err(Errno::ECHILD) => Reaped::Nothing,
                Err(Errno::EINTR) => continue,
                Err(e) => Reaped::Failed(e),
            };
        }
    }
}
