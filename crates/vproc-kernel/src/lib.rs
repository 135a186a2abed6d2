//! Synchronous supervisor core: process records, PID allocation, the persisted
//! process table, and the kernel API capability table.

pub mod api;
pub mod error;
pub mod manifest;
pub mod pid;
pub mod process;
pub mod table;

pub use api::{ApiSpec, Capability, KERNEL_APIS, caps};
pub use error::KernelError;
pub use manifest::{ManifestMetadata, ProgramManifest, canonical_name};
pub use pid::{NEXT_PID_KEY, PRIVILEGED_PID, Pid, PidAllocator};
pub use process::{
    ActionEntry, ActionLog, MemoryRef, ProcessRecord, ProcessStatus, ResourceHandle, ResourceKind,
    now_ms,
};
pub use table::{KillStart, PROCESS_TABLE_KEY, ProcessRepository, ProcessTable};
