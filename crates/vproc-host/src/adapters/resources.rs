use std::collections::HashMap;
use std::sync::Arc;

use vproc_kernel::{Pid, ResourceKind};

use super::traits::ResourceHost;

/// Resource hosts by kind; several hosts may share a kind.
#[derive(Default, Clone)]
pub struct ResourceHosts {
    hosts: HashMap<ResourceKind, Vec<Arc<dyn ResourceHost>>>,
}

impl ResourceHosts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, host: Arc<dyn ResourceHost>) {
        self.hosts.entry(host.kind()).or_default().push(host);
    }

    pub fn for_kind(&self, kind: ResourceKind) -> &[Arc<dyn ResourceHost>] {
        self.hosts.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether any visual host still reports live resources for `pid`.
    pub fn has_live_visuals(&self, pid: Pid) -> bool {
        self.hosts
            .iter()
            .filter(|(kind, _)| kind.is_visual())
            .flat_map(|(_, hosts)| hosts)
            .any(|host| host.live_count(pid) > 0)
    }
}
