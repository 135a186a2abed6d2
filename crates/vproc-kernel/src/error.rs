use thiserror::Error;

use crate::pid::Pid;

#[derive(Debug, Error)]
pub enum KernelError {
    #[error("store error: {0}")]
    Store(#[from] vproc_store::StoreError),
    #[error("pid {0} is already present in the process table")]
    DuplicatePid(Pid),
    #[error("pid {0} is reserved for the privileged bootstrap process")]
    ReservedPid(Pid),
    #[error("privileged record must use pid {expected}, got {found}")]
    PrivilegedPidMismatch { expected: Pid, found: Pid },
    #[error("no process record for pid {0}")]
    UnknownPid(Pid),
}
