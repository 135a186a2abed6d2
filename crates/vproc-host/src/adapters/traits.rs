//! Seams to the collaborators the supervisor drives but does not own.

use std::sync::Arc;

use async_trait::async_trait;
use vproc_kernel::{Capability, Pid, ProcessStatus, ProgramManifest, ResourceHandle, ResourceKind};

use crate::program::ProgramRegistry;

/// Resolves program names to manifests.
#[async_trait]
pub trait AssetRegistry: Send + Sync {
    async fn resolve(&self, name: &str) -> anyhow::Result<Option<ProgramManifest>>;

    /// Every known program, in discovery order.
    async fn list(&self) -> anyhow::Result<Vec<(String, ProgramManifest)>>;
}

/// Executes program code. A loaded script registers its entry point in the
/// given registry under its canonical name, possibly after `load_script` returns.
#[async_trait]
pub trait ProgramLoader: Send + Sync {
    async fn load_script(&self, script: &str, programs: Arc<ProgramRegistry>) -> anyhow::Result<()>;
    async fn load_style(&self, style: &str) -> anyhow::Result<()>;
    async fn load_asset(&self, asset: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityDecision {
    Granted,
    Denied,
}

impl CapabilityDecision {
    pub fn is_granted(self) -> bool {
        self == CapabilityDecision::Granted
    }
}

#[async_trait]
pub trait CapabilityChecker: Send + Sync {
    async fn check(&self, pid: Pid, capability: &Capability) -> anyhow::Result<CapabilityDecision>;

    /// Ask for a grant on behalf of `pid`; the checker may refuse.
    async fn request(&self, pid: Pid, capability: &Capability) -> anyhow::Result<CapabilityDecision> {
        self.check(pid, capability).await
    }

    async fn revoke_all(&self, pid: Pid) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub heap_id: String,
    pub shed_id: String,
}

#[async_trait]
pub trait MemoryAllocator: Send + Sync {
    /// `None` sizes fall back to the allocator's defaults.
    async fn allocate(
        &self,
        pid: Pid,
        heap_size: Option<u64>,
        shed_size: Option<u64>,
    ) -> anyhow::Result<Allocation>;

    /// Release every allocation held by `pid`.
    async fn free(&self, pid: Pid) -> anyhow::Result<()>;
}

/// Host for one class of process-owned resources (windows, menus, handlers, ...).
#[async_trait]
pub trait ResourceHost: Send + Sync {
    fn kind(&self) -> ResourceKind;

    /// Tear down the process-dependent resources `pid` owns in this host.
    /// `handles` are the dependent ones the supervisor tracked; hosts may own
    /// more. Persistent resources, such as snapshot notifications, must survive.
    async fn release(&self, pid: Pid, handles: &[ResourceHandle]) -> anyhow::Result<()>;

    /// Resources still live for `pid` according to the host.
    fn live_count(&self, _pid: Pid) -> usize {
        0
    }
}

/// Best-effort status change listener.
pub trait ProcessObserver: Send + Sync {
    fn process_changed(&self, pid: Pid, status: ProcessStatus);
}
