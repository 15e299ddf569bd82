use std::sync::Arc;

use crate::{
    core::Config,
    error::RuntimeError,
    process::{ProcessControl, UnixProcesses},
    registry::Registry,
    subscribers::{Subscribe, SubscriberSet},
};
use super::supervisor::Supervisor;

/// Builder for constructing a Supervisor.
pub struct SupervisorBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
    processes: Option<Arc<dyn ProcessControl>>,
}

impl SupervisorBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            processes: None,
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events (service lifecycle, shutdown progress)
    /// through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Replaces the OS process layer (defaults to [`UnixProcesses`]).
    pub fn with_processes(mut self, processes: Arc<dyn ProcessControl>) -> Self {
        self.processes = Some(processes);
        self
    }

    /// Builds the Supervisor for the given service commands.
    ///
    /// Every service starts stopped; nothing is launched before [`Supervisor::run`].
    ///
    /// # Errors
    /// - [`RuntimeError::NoServices`] when `commands` is empty;
    /// - [`RuntimeError::AllocationFailed`] when the service table cannot be reserved.
    ///
    /// Must be called inside a Tokio runtime (subscriber workers are spawned here).
    pub fn build<I, S>(self, commands: I) -> Result<Supervisor, RuntimeError>
    where
        I: IntoIterator<Item = S>,
        I::IntoIter: ExactSizeIterator,
        S: Into<String>,
    {
        let registry = Registry::create(commands)?;
        let processes = self
            .processes
            .unwrap_or_else(|| Arc::new(UnixProcesses::new()));
        let subs = SubscriberSet::new(self.subscribers);

        Ok(Supervisor::new_internal(self.cfg, processes, subs, registry))
    }
}
