//! In-process stand-ins for the desktop collaborators: resource boards,
//! the kernel APIs that populate them, and a store-backed capability checker.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;
use uuid::Uuid;
use vproc_host::{
    ApiOutput, CapabilityChecker, CapabilityDecision, ResourceHost, SupervisorBuilder, api_fn,
};
use vproc_kernel::{Capability, Pid, ResourceHandle, ResourceKind, now_ms};
use vproc_store::{DynKvStore, KvStoreExt};

const GRANTS_KEY: &str = "CAPABILITY_GRANTS";

struct Entry {
    owner: Pid,
    persistent: bool,
}

/// Live resources of one kind, by id.
pub struct ResourceBoard {
    kind: ResourceKind,
    live: Mutex<BTreeMap<String, Entry>>,
}

impl ResourceBoard {
    pub fn new(kind: ResourceKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            live: Mutex::new(BTreeMap::new()),
        })
    }

    fn open(&self, owner: Pid, persistent: bool) -> ResourceHandle {
        let id = format!("{}-{}", self.kind, Uuid::new_v4().simple());
        self.live
            .lock()
            .unwrap()
            .insert(id.clone(), Entry { owner, persistent });
        let handle = ResourceHandle::new(self.kind, id);
        if persistent {
            handle.into_persistent()
        } else {
            handle
        }
    }

    fn close(&self, id: &str) -> bool {
        self.live.lock().unwrap().remove(id).is_some()
    }
}

#[async_trait]
impl ResourceHost for ResourceBoard {
    fn kind(&self) -> ResourceKind {
        self.kind
    }

    async fn release(&self, pid: Pid, _handles: &[ResourceHandle]) -> Result<()> {
        let mut live = self.live.lock().unwrap();
        let before = live.len();
        live.retain(|_, entry| entry.owner != pid || entry.persistent);
        debug!("released {} {} resource(s) of pid {pid}", before - live.len(), self.kind);
        Ok(())
    }

    fn live_count(&self, pid: Pid) -> usize {
        self.live
            .lock()
            .unwrap()
            .values()
            .filter(|entry| entry.owner == pid)
            .count()
    }
}

fn caller(pid: Option<Pid>) -> Result<Pid> {
    pid.ok_or_else(|| anyhow!("caller pid required"))
}

/// `{"persistent": true}` as the first argument keeps the resource alive
/// after its owner exits.
fn wants_persistent(args: &[Value]) -> bool {
    args.first()
        .and_then(|arg| arg.get("persistent"))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

fn opener(board: Arc<ResourceBoard>) -> Arc<dyn vproc_host::KernelApi> {
    Arc::new(api_fn(move |pid: Option<Pid>, args: Vec<Value>| {
        let board = board.clone();
        async move {
            let persistent = board.kind == ResourceKind::Notification && wants_persistent(&args);
            let handle = board.open(caller(pid)?, persistent);
            Ok(ApiOutput::value(json!(handle.id)).with_resource(handle))
        }
    }))
}

fn closer(board: Arc<ResourceBoard>) -> Arc<dyn vproc_host::KernelApi> {
    Arc::new(api_fn(move |_pid: Option<Pid>, args: Vec<Value>| {
        let board = board.clone();
        async move {
            let id = args
                .first()
                .and_then(Value::as_str)
                .context("expected a resource id")?;
            Ok(ApiOutput::value(json!(board.close(id))))
        }
    }))
}

/// Register the desktop boards and their APIs on `builder`.
pub fn install(builder: SupervisorBuilder) -> SupervisorBuilder {
    let windows = ResourceBoard::new(ResourceKind::Window);
    let notifications = ResourceBoard::new(ResourceKind::Notification);
    let handlers = ResourceBoard::new(ResourceKind::EventHandler);

    builder
        .resource_host(windows.clone())
        .resource_host(notifications.clone())
        .resource_host(handlers.clone())
        .api("window.create", opener(windows.clone()))
        .api("window.close", closer(windows))
        .api("notification.show", opener(notifications.clone()))
        .api("notification.dismiss", closer(notifications))
        .api("event.subscribe", opener(handlers))
        .api(
            "system.info",
            Arc::new(api_fn(|_pid: Option<Pid>, _args: Vec<Value>| async {
                Ok(ApiOutput::value(json!({
                    "name": "vproc",
                    "version": env!("CARGO_PKG_VERSION"),
                })))
            })),
        )
        .api(
            "system.time",
            Arc::new(api_fn(|_pid: Option<Pid>, _args: Vec<Value>| async {
                Ok(ApiOutput::value(json!(now_ms())))
            })),
        )
}

/// Grants every requested capability and remembers it in the store.
pub struct StoreGrants {
    store: DynKvStore,
    lock: Mutex<()>,
}

type GrantTable = BTreeMap<String, BTreeSet<Capability>>;

impl StoreGrants {
    pub fn new(store: DynKvStore) -> Self {
        Self {
            store,
            lock: Mutex::new(()),
        }
    }

    fn with_table<R>(&self, f: impl FnOnce(&mut GrantTable) -> (R, bool)) -> Result<R> {
        let _guard = self.lock.lock().unwrap();
        let mut table: GrantTable = self.store.get_json(GRANTS_KEY)?.unwrap_or_default();
        let (out, dirty) = f(&mut table);
        if dirty {
            self.store.put_json(GRANTS_KEY, &table)?;
        }
        Ok(out)
    }
}

#[async_trait]
impl CapabilityChecker for StoreGrants {
    async fn check(&self, pid: Pid, capability: &Capability) -> Result<CapabilityDecision> {
        let held = self.with_table(|table| {
            let held = table
                .get(&pid.to_string())
                .is_some_and(|caps| caps.contains(capability));
            (held, false)
        })?;
        Ok(if held {
            CapabilityDecision::Granted
        } else {
            CapabilityDecision::Denied
        })
    }

    async fn request(&self, pid: Pid, capability: &Capability) -> Result<CapabilityDecision> {
        self.with_table(|table| {
            table
                .entry(pid.to_string())
                .or_default()
                .insert(capability.clone());
            ((), true)
        })?;
        Ok(CapabilityDecision::Granted)
    }

    async fn revoke_all(&self, pid: Pid) -> Result<()> {
        self.with_table(|table| {
            let removed = table.remove(&pid.to_string()).is_some();
            ((), removed)
        })
    }
}
