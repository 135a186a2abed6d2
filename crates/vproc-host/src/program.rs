//! Program entry points and the registry scripts publish them into.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::watch;
use vproc_kernel::{Capability, ManifestMetadata, Pid};

use crate::error::SupervisorError;
use crate::supervisor::SupervisorHandle;

/// What a program declares about itself when it registers.
#[derive(Debug, Clone, Default)]
pub struct ProgramInfo {
    /// Capabilities requested on the program's behalf before it initializes.
    pub capabilities: Vec<Capability>,
}

impl ProgramInfo {
    pub fn with_capabilities<I, C>(capabilities: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Capability>,
    {
        Self {
            capabilities: capabilities.into_iter().map(Into::into).collect(),
        }
    }
}

/// Entry point a loaded script registers.
#[async_trait]
pub trait Program: Send + Sync {
    fn info(&self) -> ProgramInfo {
        ProgramInfo::default()
    }

    async fn init(&self, _ctx: ProgramContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// Exit hook. Runs once per kill sequence, before any resource cleanup.
    async fn exit(&self, _ctx: ExitContext) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Everything a program receives at initialization.
#[derive(Clone)]
pub struct ProgramContext {
    pub pid: Pid,
    pub args: Value,
    pub env: BTreeMap<String, String>,
    pub cwd: String,
    pub metadata: ManifestMetadata,
    pub extras: Map<String, Value>,
    pub terminal_pid: Option<Pid>,
    pub host: SupervisorHandle,
}

impl ProgramContext {
    /// Call a kernel API as this process.
    pub async fn call(&self, api: &str, args: Vec<Value>) -> Result<Value, SupervisorError> {
        let supervisor = self.host.upgrade().ok_or(SupervisorError::Shutdown)?;
        supervisor.call_kernel_api(self.pid, api, args).await
    }

    /// Mark this process ready; terminal hosts call this once they can accept a CLI program.
    pub fn signal_ready(&self) {
        if let Some(supervisor) = self.host.upgrade() {
            supervisor.signal_ready(self.pid);
        }
    }
}

#[derive(Clone)]
pub struct ExitContext {
    pub pid: Pid,
    pub force: bool,
    pub host: SupervisorHandle,
}

/// Keyed values with async waiters. Publishing bumps a generation counter so a
/// waiter that subscribed before checking never misses an insert.
pub(crate) struct Rendezvous<K, V> {
    entries: Mutex<HashMap<K, V>>,
    generation: watch::Sender<u64>,
}

impl<K, V> Rendezvous<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub(crate) fn new() -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            entries: Mutex::new(HashMap::new()),
            generation,
        }
    }

    pub(crate) fn publish(&self, key: K, value: V) {
        self.entries.lock().unwrap().insert(key, value);
        self.generation.send_modify(|g| *g += 1);
    }

    pub(crate) fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: std::borrow::Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.entries.lock().unwrap().get(key).cloned()
    }

    pub(crate) fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: std::borrow::Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.entries.lock().unwrap().remove(key)
    }

    pub(crate) fn keys(&self) -> Vec<K>
    where
        K: Clone,
    {
        self.entries.lock().unwrap().keys().cloned().collect()
    }

    /// Wait until `key` is present, or give up after `timeout`.
    pub(crate) async fn wait<Q>(&self, key: &Q, timeout: Duration) -> Option<V>
    where
        K: std::borrow::Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let mut changes = self.generation.subscribe();
        let wait = async {
            loop {
                if let Some(value) = self.get(key) {
                    return value;
                }
                // The sender lives as long as `self`, so this only fails if we are torn down.
                if changes.changed().await.is_err() {
                    std::future::pending::<()>().await;
                }
            }
        };
        tokio::time::timeout(timeout, wait).await.ok()
    }
}

/// Global namespace of program entry points, keyed by canonical name.
pub struct ProgramRegistry {
    programs: Rendezvous<String, Arc<dyn Program>>,
}

impl Default for ProgramRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgramRegistry {
    pub fn new() -> Self {
        Self {
            programs: Rendezvous::new(),
        }
    }

    pub fn register(&self, canonical: impl Into<String>, program: Arc<dyn Program>) {
        let canonical = canonical.into();
        tracing::debug!("program '{canonical}' registered");
        self.programs.publish(canonical, program);
    }

    pub fn get(&self, canonical: &str) -> Option<Arc<dyn Program>> {
        self.programs.get(canonical)
    }

    pub fn unregister(&self, canonical: &str) -> bool {
        self.programs.remove(canonical).is_some()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names = self.programs.keys();
        names.sort();
        names
    }

    pub async fn wait_for(&self, canonical: &str, timeout: Duration) -> Option<Arc<dyn Program>> {
        self.programs.wait(canonical, timeout).await
    }
}
