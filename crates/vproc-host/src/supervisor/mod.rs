//! The supervisor: owns the process table and drives every lifecycle transition.

mod autostart;
mod call;
mod kill;
mod start;

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, Weak};

use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use vproc_kernel::{
    ActionEntry, PRIVILEGED_PID, Pid, PidAllocator, ProcessRecord, ProcessRepository,
    ProcessStatus, ProcessTable, ResourceHandle,
};
use vproc_store::DynKvStore;

use crate::adapters::resources::ResourceHosts;
use crate::adapters::traits::{
    AssetRegistry, CapabilityChecker, MemoryAllocator, ProcessObserver, ProgramLoader,
    ResourceHost,
};
use crate::api::{ApiRegistry, KernelApi};
use crate::config::SupervisorConfig;
use crate::error::SupervisorError;
use crate::program::{ProgramRegistry, Rendezvous};

pub use autostart::AutoStartReport;

/// Caller-supplied parameters for [`Supervisor::start_program`].
#[derive(Debug, Clone)]
pub struct StartOptions {
    pub args: Value,
    pub env: BTreeMap<String, String>,
    pub cwd: String,
    /// Terminal host the program is launched from; CLI programs with one set
    /// do not get a private terminal.
    pub terminal_pid: Option<Pid>,
    pub extras: Map<String, Value>,
}

impl Default for StartOptions {
    fn default() -> Self {
        Self {
            args: Value::Null,
            env: BTreeMap::new(),
            cwd: "/".into(),
            terminal_pid: None,
            extras: Map::new(),
        }
    }
}

impl StartOptions {
    pub fn with_args(mut self, args: Value) -> Self {
        self.args = args;
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<String>) -> Self {
        self.cwd = cwd.into();
        self
    }

    pub fn from_terminal(mut self, terminal: Pid) -> Self {
        self.terminal_pid = Some(terminal);
        self
    }
}

/// Answer to [`Supervisor::get_process_info`].
#[derive(Debug, Clone)]
pub enum ProcessInfo {
    One(ProcessRecord),
    All(Vec<ProcessRecord>),
}

/// Weak reference handed to programs so they can call back without keeping
/// the supervisor alive.
#[derive(Clone)]
pub struct SupervisorHandle(Weak<Supervisor>);

impl SupervisorHandle {
    pub fn upgrade(&self) -> Option<Arc<Supervisor>> {
        self.0.upgrade()
    }
}

pub struct SupervisorBuilder {
    store: DynKvStore,
    assets: Arc<dyn AssetRegistry>,
    loader: Arc<dyn ProgramLoader>,
    config: SupervisorConfig,
    programs: Arc<ProgramRegistry>,
    checker: Option<Arc<dyn CapabilityChecker>>,
    memory: Option<Arc<dyn MemoryAllocator>>,
    resources: ResourceHosts,
    apis: ApiRegistry,
    observers: Vec<Arc<dyn ProcessObserver>>,
}

impl SupervisorBuilder {
    pub fn new(
        store: DynKvStore,
        assets: Arc<dyn AssetRegistry>,
        loader: Arc<dyn ProgramLoader>,
    ) -> Self {
        Self {
            store,
            assets,
            loader,
            config: SupervisorConfig::default(),
            programs: Arc::new(ProgramRegistry::new()),
            checker: None,
            memory: None,
            resources: ResourceHosts::new(),
            apis: ApiRegistry::new(),
            observers: Vec::new(),
        }
    }

    pub fn config(mut self, config: SupervisorConfig) -> Self {
        self.config = config;
        self
    }

    /// Share an existing program namespace instead of starting with an empty one.
    pub fn programs(mut self, programs: Arc<ProgramRegistry>) -> Self {
        self.programs = programs;
        self
    }

    pub fn capability_checker(mut self, checker: Arc<dyn CapabilityChecker>) -> Self {
        self.checker = Some(checker);
        self
    }

    pub fn memory_allocator(mut self, memory: Arc<dyn MemoryAllocator>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn resource_host(mut self, host: Arc<dyn ResourceHost>) -> Self {
        self.resources.register(host);
        self
    }

    pub fn api(mut self, name: impl Into<String>, handler: Arc<dyn KernelApi>) -> Self {
        self.apis.register(name, handler);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn ProcessObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Load the persisted table and align the PID counter with it.
    pub fn build(self) -> Result<Arc<Supervisor>, SupervisorError> {
        if self.checker.is_none() {
            warn!("no capability checker configured; kernel api calls will not be checked");
        }
        let table = ProcessTable::new(self.store.clone());
        let pids = PidAllocator::new(self.store);
        let count = table.reload()?;
        if let Some(max) = table.max_pid()? {
            pids.ensure_above(max)?;
        }
        debug!("supervisor loaded {count} process record(s)");

        Ok(Arc::new_cyclic(|me| Supervisor {
            me: me.clone(),
            config: self.config,
            table,
            pids,
            programs: self.programs,
            ready: Rendezvous::new(),
            assets: self.assets,
            loader: self.loader,
            checker: self.checker,
            memory: self.memory,
            resources: self.resources,
            apis: self.apis,
            observers: self.observers,
            start_locks: Mutex::new(HashMap::new()),
        }))
    }
}

pub struct Supervisor {
    me: Weak<Supervisor>,
    config: SupervisorConfig,
    table: ProcessTable,
    pids: PidAllocator,
    programs: Arc<ProgramRegistry>,
    ready: Rendezvous<Pid, ()>,
    assets: Arc<dyn AssetRegistry>,
    loader: Arc<dyn ProgramLoader>,
    checker: Option<Arc<dyn CapabilityChecker>>,
    memory: Option<Arc<dyn MemoryAllocator>>,
    resources: ResourceHosts,
    apis: ApiRegistry,
    observers: Vec<Arc<dyn ProcessObserver>>,
    start_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl Supervisor {
    pub fn handle(&self) -> SupervisorHandle {
        SupervisorHandle(self.me.clone())
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    pub fn programs(&self) -> &Arc<ProgramRegistry> {
        &self.programs
    }

    /// Ensure the privileged record exists and is running.
    pub fn bootstrap(&self) -> Result<Pid, SupervisorError> {
        if self.table.ensure_privileged(&self.config.privileged_name)? {
            info!(
                "privileged process '{}' registered as pid {}",
                self.config.privileged_name, PRIVILEGED_PID
            );
            self.notify(PRIVILEGED_PID, ProcessStatus::Running);
        }
        Ok(PRIVILEGED_PID)
    }

    /// Drop cached state and rebuild it from the store.
    ///
    /// Live resource handles do not survive; records keep their persisted status.
    pub fn reload(&self) -> Result<usize, SupervisorError> {
        let count = self.table.reload()?;
        if let Some(max) = self.table.max_pid()? {
            self.pids.ensure_above(max)?;
        }
        info!("reloaded {count} process record(s)");
        Ok(count)
    }

    pub fn get_process_info(&self, pid: Option<Pid>) -> Result<ProcessInfo, SupervisorError> {
        match pid {
            Some(pid) => self
                .table
                .get(pid)?
                .map(ProcessInfo::One)
                .ok_or(SupervisorError::NoSuchProcess(pid)),
            None => Ok(ProcessInfo::All(self.table.list()?)),
        }
    }

    pub fn process(&self, pid: Pid) -> Result<Option<ProcessRecord>, SupervisorError> {
        Ok(self.table.get(pid)?)
    }

    pub fn has_process(&self, pid: Pid) -> bool {
        self.table.contains(pid).unwrap_or_else(|err| {
            warn!("process table unavailable while probing pid {pid}: {err}");
            false
        })
    }

    pub fn get_running_processes(&self) -> Result<Vec<ProcessRecord>, SupervisorError> {
        Ok(self.table.filter(ProcessRecord::is_running)?)
    }

    /// Running processes a user would see: auto-launched terminal hosts are hidden.
    pub fn visible_processes(&self) -> Result<Vec<ProcessRecord>, SupervisorError> {
        Ok(self
            .table
            .filter(|r| r.is_running() && !r.is_cli_terminal)?)
    }

    pub fn action_log(&self, pid: Pid) -> Result<Vec<ActionEntry>, SupervisorError> {
        let record = self
            .table
            .get(pid)?
            .ok_or(SupervisorError::NoSuchProcess(pid))?;
        Ok(record.action_log.iter().cloned().collect())
    }

    pub fn signal_ready(&self, pid: Pid) {
        debug!("pid {pid} signalled ready");
        self.ready.publish(pid, ());
    }

    /// Attribute a host resource created outside the kernel API path to `pid`.
    pub fn track_resource(&self, pid: Pid, handle: ResourceHandle) -> Result<(), SupervisorError> {
        self.table
            .update(pid, |record| {
                record.owned_resource_handles.insert(handle);
            })?
            .ok_or(SupervisorError::NoSuchProcess(pid))
    }

    fn notify(&self, pid: Pid, status: ProcessStatus) {
        for observer in &self.observers {
            observer.process_changed(pid, status);
        }
    }

    fn start_lock(&self, name: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.start_locks
            .lock()
            .unwrap()
            .entry(name.to_string())
            .or_default()
            .clone()
    }
}
