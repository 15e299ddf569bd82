//! # Service registry: fixed arena of supervised services.
//!
//! Services are created once, in command-line order, and addressed by
//! [`ServiceId`] (their index) for the lifetime of the supervisor. The table is
//! never resized; only each service's `pid` changes.
//!
//! A reverse map `pid -> index` is kept in sync with every `pid` mutation so exit
//! notifications resolve their service in O(1).
//!
//! ## Rules
//! - `pid == None` means "not running".
//! - A pid is recorded only from a successful spawn of that very service.
//! - The registry has a single owner (the foreground loop); it carries no locks.

use std::collections::HashMap;

use nix::unistd::Pid;

use crate::error::RuntimeError;

/// Index of a service in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceId(usize);

impl ServiceId {
    /// Position of the service in command-line order.
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// One monitored process.
#[derive(Debug, Clone)]
pub struct Service {
    command: String,
    pid: Option<Pid>,
}

impl Service {
    /// Executable name or path used to launch the service.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Current process id, `None` when not running.
    pub fn pid(&self) -> Option<Pid> {
        self.pid
    }

    /// True when the supervisor believes the process is alive.
    pub fn is_running(&self) -> bool {
        self.pid.is_some()
    }
}

/// Fixed-length table of services with pid lookup.
#[derive(Debug)]
pub struct Registry {
    services: Vec<Service>,
    by_pid: HashMap<Pid, ServiceId>,
}

impl Registry {
    /// Builds one stopped service per command.
    ///
    /// Fails with [`RuntimeError::NoServices`] on an empty list, and with
    /// [`RuntimeError::AllocationFailed`] when the table cannot be reserved.
    pub fn create<I, S>(commands: I) -> Result<Self, RuntimeError>
    where
        I: IntoIterator<Item = S>,
        I::IntoIter: ExactSizeIterator,
        S: Into<String>,
    {
        let commands = commands.into_iter();
        let n = commands.len();
        if n == 0 {
            return Err(RuntimeError::NoServices);
        }

        let mut services = Vec::new();
        services
            .try_reserve_exact(n)
            .map_err(|_| RuntimeError::AllocationFailed { services: n })?;
        let mut by_pid = HashMap::new();
        by_pid
            .try_reserve(n)
            .map_err(|_| RuntimeError::AllocationFailed { services: n })?;

        services.extend(commands.map(|c| Service {
            command: c.into(),
            pid: None,
        }));
        Ok(Self { services, by_pid })
    }

    /// Number of services (fixed at creation).
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Always false: an empty registry cannot be created.
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Service at `id`.
    pub fn get(&self, id: ServiceId) -> &Service {
        &self.services[id.0]
    }

    /// Service owning `pid`, if any.
    pub fn find_by_pid(&self, pid: Pid) -> Option<ServiceId> {
        self.by_pid.get(&pid).copied()
    }

    /// Records a freshly spawned process for `id`.
    ///
    /// A pid is owned by one service at most: if the kernel reused `pid` before the
    /// previous owner's exit was applied, that owner is marked stopped.
    pub fn mark_running(&mut self, id: ServiceId, pid: Pid) {
        if let Some(old) = self.services[id.0].pid.replace(pid) {
            self.by_pid.remove(&old);
        }
        if let Some(stale) = self.by_pid.insert(pid, id).filter(|owner| *owner != id) {
            self.services[stale.0].pid = None;
        }
    }

    /// Marks `id` as not running; returns the pid it had.
    pub fn mark_stopped(&mut self, id: ServiceId) -> Option<Pid> {
        let old = self.services[id.0].pid.take()?;
        self.by_pid.remove(&old);
        Some(old)
    }

    /// Ids of services not running, in command-line order.
    pub fn stopped(&self) -> Vec<ServiceId> {
        self.ids().filter(|id| !self.get(*id).is_running()).collect()
    }

    /// `(id, pid)` of services believed running, in command-line order.
    pub fn running(&self) -> Vec<(ServiceId, Pid)> {
        self.services
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.pid.map(|pid| (ServiceId(i), pid)))
            .collect()
    }

    /// True when no service is running.
    pub fn all_stopped(&self) -> bool {
        self.services.iter().all(|s| !s.is_running())
    }

    /// Commands of services still running, in command-line order.
    pub fn running_commands(&self) -> Vec<String> {
        self.services
            .iter()
            .filter(|s| s.is_running())
            .map(|s| s.command.clone())
            .collect()
    }

    /// All service ids, in command-line order.
    pub fn ids(&self) -> impl Iterator<Item = ServiceId> + use<> {
        (0..self.services.len()).map(ServiceId)
    }
}
