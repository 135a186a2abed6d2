use std::time::Duration;

use thiserror::Error;
use vproc_kernel::{KernelError, Pid, ProcessStatus};

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("no manifest for program '{0}'")]
    ManifestNotFound(String),
    #[error("program '{0}' is already running")]
    AlreadyRunning(String),
    #[error("failed to load program '{name}': {reason}")]
    LoadFailed { name: String, reason: String },
    #[error("program '{name}' did not register within {timeout:?}")]
    LoadTimeout { name: String, timeout: Duration },
    #[error("initializer of '{name}' (pid {pid}) failed: {source}")]
    InitFailed {
        name: String,
        pid: Pid,
        #[source]
        source: anyhow::Error,
    },
    #[error("no process with pid {0}")]
    NoSuchProcess(Pid),
    #[error("process {pid} is {status}, not running")]
    NotRunning { pid: Pid, status: ProcessStatus },
    #[error("process {pid} lacks capability '{capability}' required by '{api}'")]
    PermissionDenied {
        pid: Pid,
        api: String,
        capability: String,
    },
    #[error("unknown kernel api '{0}'")]
    UnknownApi(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("exit hook of pid {pid} failed: {source}")]
    ExitHookFailed {
        pid: Pid,
        #[source]
        source: anyhow::Error,
    },
    #[error("terminal host {pid} was not ready within {timeout:?}")]
    TerminalTimeout { pid: Pid, timeout: Duration },
    #[error("kernel api '{api}' failed: {source}")]
    Api {
        api: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("memory error: {0}")]
    Memory(String),
    #[error("supervisor has shut down")]
    Shutdown,
    #[error("kernel error: {0}")]
    Kernel(#[from] KernelError),
}
