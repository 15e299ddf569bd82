//! Command-line interface of the `pidvisor` binary.
//!
//! Every tunable can be given as a flag or through a `PIDVISOR_*` environment
//! variable; durations are whole seconds.

use std::time::Duration;

use clap::Parser;

use crate::core::Config;
use crate::logging::DEFAULT_TAG;

/// Minimal PID 1 supervisor: keeps services running, stops them in bounded time.
#[derive(Parser, Debug, Clone)]
#[command(name = "pidvisor", version, about)]
pub struct Cli {
    /// Graceful phase length in seconds (SIGTERM sweeps).
    #[arg(long, env = "PIDVISOR_SHUTDOWN_TIMEOUT", default_value_t = 60, value_name = "SECS")]
    pub shutdown_timeout: u64,

    /// Seconds between two shutdown sweeps.
    #[arg(long, env = "PIDVISOR_KILL_INTERVAL", default_value_t = 10, value_name = "SECS")]
    pub kill_interval: u64,

    /// Forceful phase length, counted in kill intervals.
    #[arg(long, env = "PIDVISOR_ESCALATION_WINDOWS", default_value_t = 2, value_name = "N")]
    pub escalation_windows: u32,

    /// Steady-state poll interval in seconds.
    #[arg(long, env = "PIDVISOR_POLL_INTERVAL", default_value_t = 300, value_name = "SECS")]
    pub poll_interval: u64,

    /// Pause in seconds before (re)starting services.
    #[arg(long, env = "PIDVISOR_SETTLE_INTERVAL", default_value_t = 1, value_name = "SECS")]
    pub settle_interval: u64,

    /// Prefix of every log line.
    #[arg(long, env = "PIDVISOR_LOG_TAG", default_value = DEFAULT_TAG)]
    pub log_tag: String,

    /// Executables to supervise, launched without arguments.
    #[arg(required = true, num_args = 1.., value_name = "COMMAND")]
    pub commands: Vec<String>,
}

impl Cli {
    /// Runtime configuration described by the flags.
    pub fn to_config(&self) -> Config {
        Config {
            shutdown_timeout: Duration::from_secs(self.shutdown_timeout),
            kill_interval: Duration::from_secs(self.kill_interval),
            escalation_windows: self.escalation_windows,
            poll_interval: Duration::from_secs(self.poll_interval),
            settle_interval: Duration::from_secs(self.settle_interval),
            ..Config::default()
        }
    }
}
