use std::time::Duration;

use vproc_kernel::process::DEFAULT_ACTION_LOG_CAPACITY;

pub const LOAD_TIMEOUT_ENV: &str = "VPROC_LOAD_TIMEOUT_MS";
pub const TERMINAL_TIMEOUT_ENV: &str = "VPROC_TERMINAL_TIMEOUT_MS";
pub const TERMINAL_PROGRAM_ENV: &str = "VPROC_TERMINAL_PROGRAM";

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// How long to wait for a loaded script to register its entry point.
    pub load_timeout: Duration,
    /// How long a CLI start waits for its auto-launched terminal to signal readiness.
    pub terminal_ready_timeout: Duration,
    /// Audit entries kept per process.
    pub action_log_capacity: usize,
    /// Program launched as the terminal host for CLI programs.
    pub terminal_program: String,
    /// Name given to the privileged bootstrap record.
    pub privileged_name: String,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            load_timeout: Duration::from_secs(5),
            terminal_ready_timeout: Duration::from_secs(3),
            action_log_capacity: DEFAULT_ACTION_LOG_CAPACITY,
            terminal_program: "terminal".into(),
            privileged_name: "bootstrap".into(),
        }
    }
}

impl SupervisorConfig {
    /// Defaults overridden by `VPROC_*` environment variables; malformed values are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(ms) = env_millis(LOAD_TIMEOUT_ENV) {
            config.load_timeout = ms;
        }
        if let Some(ms) = env_millis(TERMINAL_TIMEOUT_ENV) {
            config.terminal_ready_timeout = ms;
        }
        if let Ok(program) = std::env::var(TERMINAL_PROGRAM_ENV) {
            if !program.trim().is_empty() {
                config.terminal_program = program;
            }
        }
        config
    }

    pub fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = timeout;
        self
    }

    pub fn with_terminal_ready_timeout(mut self, timeout: Duration) -> Self {
        self.terminal_ready_timeout = timeout;
        self
    }

    pub fn with_terminal_program(mut self, name: impl Into<String>) -> Self {
        self.terminal_program = name.into();
        self
    }
}

fn env_millis(key: &str) -> Option<Duration> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<u64>() {
        Ok(ms) => Some(Duration::from_millis(ms)),
        Err(_) => {
            tracing::warn!("ignoring {key}={raw}: expected milliseconds");
            None
        }
    }
}
