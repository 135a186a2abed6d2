//! In-memory collaborators and a test harness. Enable with the `test-fixtures` feature.
//!
//! - [`CallLog`]: shared, ordered record of every collaborator call
//! - [`ScriptedLoader`]: decides per script whether it registers, hangs, or fails
//! - [`MockPermissions`], [`MockMemory`], [`RecordingResourceHost`]: spies for the cascade
//! - [`FaultyStore`]: in-memory store that fails a chosen upcoming write
//! - [`Harness`]: a bootstrapped supervisor wired to all of the above

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::{Value, json};
use vproc_kernel::{
    Capability, KERNEL_APIS, Pid, ProcessStatus, ProgramManifest, ResourceHandle, ResourceKind,
    canonical_name,
};
use vproc_store::{KvStore, MemKvStore, StoreError, StoreResult};

use crate::adapters::traits::{
    Allocation, AssetRegistry, CapabilityChecker, CapabilityDecision, MemoryAllocator,
    ProcessObserver, ProgramLoader, ResourceHost,
};
use crate::api::{ApiOutput, KernelApi};
use crate::config::SupervisorConfig;
use crate::program::{ExitContext, Program, ProgramContext, ProgramInfo, ProgramRegistry};
use crate::supervisor::{Supervisor, SupervisorBuilder};

// ---------------------------------------------------------------------------
// CallLog
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Index of the first entry equal to `entry`.
    pub fn position(&self, entry: &str) -> Option<usize> {
        self.0.lock().unwrap().iter().position(|e| e == entry)
    }

    pub fn count(&self, entry: &str) -> usize {
        self.0.lock().unwrap().iter().filter(|e| *e == entry).count()
    }

    /// Entries starting with `prefix`, in order.
    pub fn matching(&self, prefix: &str) -> Vec<String> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

// ---------------------------------------------------------------------------
// Assets and loader
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemAssets {
    manifests: Mutex<IndexMap<String, ProgramManifest>>,
}

impl MemAssets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, name: impl Into<String>, manifest: ProgramManifest) {
        self.manifests.lock().unwrap().insert(name.into(), manifest);
    }
}

#[async_trait]
impl AssetRegistry for MemAssets {
    async fn resolve(&self, name: &str) -> Result<Option<ProgramManifest>> {
        Ok(self.manifests.lock().unwrap().get(name).cloned())
    }

    async fn list(&self) -> Result<Vec<(String, ProgramManifest)>> {
        Ok(self
            .manifests
            .lock()
            .unwrap()
            .iter()
            .map(|(name, manifest)| (name.clone(), manifest.clone()))
            .collect())
    }
}

/// What loading a script does.
#[derive(Clone)]
pub enum ScriptBehavior {
    /// Register the entry point before `load_script` returns.
    Register(String, Arc<dyn Program>),
    /// Register the entry point from a background task after a delay.
    RegisterAfter(Duration, String, Arc<dyn Program>),
    /// Load fine but never register anything.
    Never,
    /// Fail to load.
    Fail(String),
}

pub struct ScriptedLoader {
    scripts: Mutex<HashMap<String, ScriptBehavior>>,
    failing_styles: Mutex<HashSet<String>>,
    log: CallLog,
}

impl ScriptedLoader {
    pub fn new(log: CallLog) -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            failing_styles: Mutex::new(HashSet::new()),
            log,
        }
    }

    pub fn script(&self, path: impl Into<String>, behavior: ScriptBehavior) {
        self.scripts.lock().unwrap().insert(path.into(), behavior);
    }

    pub fn fail_style(&self, path: impl Into<String>) {
        self.failing_styles.lock().unwrap().insert(path.into());
    }
}

#[async_trait]
impl ProgramLoader for ScriptedLoader {
    async fn load_script(&self, script: &str, programs: Arc<ProgramRegistry>) -> Result<()> {
        self.log.record(format!("load:{script}"));
        let behavior = self.scripts.lock().unwrap().get(script).cloned();
        match behavior {
            Some(ScriptBehavior::Register(canonical, program)) => {
                programs.register(canonical, program);
                Ok(())
            }
            Some(ScriptBehavior::RegisterAfter(delay, canonical, program)) => {
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    programs.register(canonical, program);
                });
                Ok(())
            }
            Some(ScriptBehavior::Never) => Ok(()),
            Some(ScriptBehavior::Fail(reason)) => Err(anyhow!(reason)),
            None => bail!("script not found: {script}"),
        }
    }

    async fn load_style(&self, style: &str) -> Result<()> {
        self.log.record(format!("style:{style}"));
        if self.failing_styles.lock().unwrap().contains(style) {
            bail!("stylesheet {style} is broken");
        }
        Ok(())
    }

    async fn load_asset(&self, asset: &str) -> Result<()> {
        self.log.record(format!("asset:{asset}"));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Capabilities, memory, resource hosts, observers
// ---------------------------------------------------------------------------

pub struct MockPermissions {
    grants: Mutex<HashSet<(Pid, Capability)>>,
    refused: Mutex<HashSet<Capability>>,
    failing: AtomicBool,
    checks: AtomicUsize,
    log: CallLog,
}

impl MockPermissions {
    pub fn new(log: CallLog) -> Self {
        Self {
            grants: Mutex::new(HashSet::new()),
            refused: Mutex::new(HashSet::new()),
            failing: AtomicBool::new(false),
            checks: AtomicUsize::new(0),
            log,
        }
    }

    pub fn grant(&self, pid: Pid, capability: impl Into<Capability>) {
        self.grants.lock().unwrap().insert((pid, capability.into()));
    }

    /// Refuse every future request for `capability`.
    pub fn refuse(&self, capability: impl Into<Capability>) {
        self.refused.lock().unwrap().insert(capability.into());
    }

    /// Make `check` return an error instead of a decision.
    pub fn fail_checks(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn holds(&self, pid: Pid, capability: &str) -> bool {
        self.grants
            .lock()
            .unwrap()
            .contains(&(pid, Capability::new(capability)))
    }

    pub fn check_count(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CapabilityChecker for MockPermissions {
    async fn check(&self, pid: Pid, capability: &Capability) -> Result<CapabilityDecision> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            bail!("permission store unavailable");
        }
        let held = self
            .grants
            .lock()
            .unwrap()
            .contains(&(pid, capability.clone()));
        Ok(if held {
            CapabilityDecision::Granted
        } else {
            CapabilityDecision::Denied
        })
    }

    async fn request(&self, pid: Pid, capability: &Capability) -> Result<CapabilityDecision> {
        self.log.record(format!("grant:{capability}:{pid}"));
        if self.refused.lock().unwrap().contains(capability) {
            return Ok(CapabilityDecision::Denied);
        }
        self.grant(pid, capability.clone());
        Ok(CapabilityDecision::Granted)
    }

    async fn revoke_all(&self, pid: Pid) -> Result<()> {
        self.log.record(format!("revoke:{pid}"));
        self.grants.lock().unwrap().retain(|(owner, _)| *owner != pid);
        Ok(())
    }
}

#[derive(Default)]
pub struct MockMemory {
    next: AtomicU64,
    live: Mutex<HashMap<Pid, usize>>,
    fail_free: AtomicBool,
    log: CallLog,
}

impl MockMemory {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            ..Default::default()
        }
    }

    pub fn allocations(&self, pid: Pid) -> usize {
        self.live.lock().unwrap().get(&pid).copied().unwrap_or(0)
    }

    pub fn fail_free(&self, failing: bool) {
        self.fail_free.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl MemoryAllocator for MockMemory {
    async fn allocate(
        &self,
        pid: Pid,
        _heap_size: Option<u64>,
        _shed_size: Option<u64>,
    ) -> Result<Allocation> {
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        self.log.record(format!("memory.allocate:{pid}"));
        *self.live.lock().unwrap().entry(pid).or_default() += 1;
        Ok(Allocation {
            heap_id: format!("heap-{n}"),
            shed_id: format!("shed-{n}"),
        })
    }

    async fn free(&self, pid: Pid) -> Result<()> {
        self.log.record(format!("memory.free:{pid}"));
        if self.fail_free.load(Ordering::SeqCst) {
            bail!("allocator refused to free pid {pid}");
        }
        self.live.lock().unwrap().remove(&pid);
        Ok(())
    }
}

pub struct RecordingResourceHost {
    kind: ResourceKind,
    live: Mutex<HashMap<Pid, usize>>,
    log: CallLog,
}

impl RecordingResourceHost {
    pub fn new(kind: ResourceKind, log: CallLog) -> Arc<Self> {
        Arc::new(Self {
            kind,
            live: Mutex::new(HashMap::new()),
            log,
        })
    }

    /// Pretend the host holds `count` resources for `pid` that the supervisor never saw.
    pub fn set_live(&self, pid: Pid, count: usize) {
        self.live.lock().unwrap().insert(pid, count);
    }
}

#[async_trait]
impl ResourceHost for RecordingResourceHost {
    fn kind(&self) -> ResourceKind {
        self.kind
    }

    async fn release(&self, pid: Pid, handles: &[ResourceHandle]) -> Result<()> {
        self.log
            .record(format!("release:{}:{pid}:{}", self.kind, handles.len()));
        self.live.lock().unwrap().remove(&pid);
        Ok(())
    }

    fn live_count(&self, pid: Pid) -> usize {
        self.live.lock().unwrap().get(&pid).copied().unwrap_or(0)
    }
}

#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<(Pid, ProcessStatus)>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<(Pid, ProcessStatus)> {
        self.events.lock().unwrap().clone()
    }
}

impl ProcessObserver for RecordingObserver {
    fn process_changed(&self, pid: Pid, status: ProcessStatus) {
        self.events.lock().unwrap().push((pid, status));
    }
}

// ---------------------------------------------------------------------------
// Kernel API spy
// ---------------------------------------------------------------------------

/// Records invocations. APIs built with [`RecordingApi::producing`] hand back
/// a fresh resource handle on each call.
pub struct RecordingApi {
    name: String,
    produces: Option<ResourceKind>,
    failure: Option<String>,
    calls: Mutex<Vec<(Option<Pid>, Vec<Value>)>>,
}

impl RecordingApi {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            produces: None,
            failure: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn producing(name: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            produces: Some(kind),
            ..Self::new(name)
        }
    }

    pub fn failing(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            failure: Some(reason.into()),
            ..Self::new(name)
        }
    }

    pub fn calls(&self) -> Vec<(Option<Pid>, Vec<Value>)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl KernelApi for RecordingApi {
    async fn invoke(&self, pid: Option<Pid>, args: Vec<Value>) -> Result<ApiOutput> {
        let persistent = args_persistent(&args);
        let n = {
            let mut calls = self.calls.lock().unwrap();
            calls.push((pid, args));
            calls.len()
        };
        if let Some(reason) = &self.failure {
            bail!("{reason}");
        }
        let mut output = ApiOutput::value(json!({ "api": self.name, "call": n }));
        if let Some(kind) = self.produces {
            let id = format!("{kind}-{n}");
            output.value = json!(id);
            let handle = ResourceHandle::new(kind, id);
            output = output.with_resource(if persistent {
                handle.into_persistent()
            } else {
                handle
            });
        }
        if self.name == "module.request" {
            output = output.with_module(format!("module-{n}"));
        }
        Ok(output)
    }
}

/// `{"persistent": true}` as the first argument asks for a resource that
/// outlives its owner.
fn args_persistent(args: &[Value]) -> bool {
    args.first()
        .and_then(|arg| arg.get("persistent"))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Programs
// ---------------------------------------------------------------------------

#[derive(Clone)]
enum ExitBehavior {
    Clean,
    Fail(String),
    /// Try to kill itself from inside the hook.
    KillSelf,
}

/// Scriptable program entry point that reports its hooks to a [`CallLog`].
pub struct TestProgram {
    name: String,
    capabilities: Vec<Capability>,
    init_failure: Option<String>,
    exit: ExitBehavior,
    ready_on_init: bool,
    init_api: Option<String>,
    exits: AtomicUsize,
    log: CallLog,
}

impl TestProgram {
    pub fn new(name: impl Into<String>, log: CallLog) -> Self {
        Self {
            name: name.into(),
            capabilities: Vec::new(),
            init_failure: None,
            exit: ExitBehavior::Clean,
            ready_on_init: false,
            init_api: None,
            exits: AtomicUsize::new(0),
            log,
        }
    }

    pub fn requesting<I, C>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Capability>,
    {
        self.capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    pub fn failing_init(mut self, reason: impl Into<String>) -> Self {
        self.init_failure = Some(reason.into());
        self
    }

    pub fn failing_exit(mut self, reason: impl Into<String>) -> Self {
        self.exit = ExitBehavior::Fail(reason.into());
        self
    }

    pub fn killing_self_on_exit(mut self) -> Self {
        self.exit = ExitBehavior::KillSelf;
        self
    }

    /// Signal readiness during init, the way a terminal host does.
    pub fn ready_on_init(mut self) -> Self {
        self.ready_on_init = true;
        self
    }

    /// Call `api` from inside init, before it returns.
    pub fn calling_on_init(mut self, api: impl Into<String>) -> Self {
        self.init_api = Some(api.into());
        self
    }

    pub fn exit_count(&self) -> usize {
        self.exits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Program for TestProgram {
    fn info(&self) -> ProgramInfo {
        ProgramInfo {
            capabilities: self.capabilities.clone(),
        }
    }

    async fn init(&self, ctx: ProgramContext) -> Result<()> {
        self.log.record(format!("init:{}:{}", self.name, ctx.pid));
        if let Some(api) = &self.init_api {
            let outcome = ctx.call(api, Vec::new()).await;
            self.log.record(format!(
                "init-call:{api}:{}",
                if outcome.is_ok() { "ok" } else { "err" }
            ));
        }
        if self.ready_on_init {
            ctx.signal_ready();
        }
        match &self.init_failure {
            Some(reason) => bail!("{reason}"),
            None => Ok(()),
        }
    }

    async fn exit(&self, ctx: ExitContext) -> Result<()> {
        self.exits.fetch_add(1, Ordering::SeqCst);
        self.log.record(format!("exit:{}:{}", self.name, ctx.pid));
        match &self.exit {
            ExitBehavior::Clean => Ok(()),
            ExitBehavior::Fail(reason) => bail!("{reason}"),
            ExitBehavior::KillSelf => {
                let supervisor = ctx
                    .host
                    .upgrade()
                    .ok_or_else(|| anyhow!("supervisor gone"))?;
                let killed = supervisor.kill_program(ctx.pid, false).await?;
                self.log.record(format!("reentrant-kill:{killed}"));
                Ok(())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Store fault injection
// ---------------------------------------------------------------------------

/// [`MemKvStore`] wrapper that fails one write on request.
pub struct FaultyStore {
    inner: MemKvStore,
    countdown: Mutex<Option<usize>>,
}

impl FaultyStore {
    pub fn new(inner: MemKvStore) -> Self {
        Self {
            inner,
            countdown: Mutex::new(None),
        }
    }

    /// Let `skip` writes through, then fail the next one.
    pub fn fail_write_after(&self, skip: usize) {
        *self.countdown.lock().unwrap() = Some(skip);
    }

    pub fn inner(&self) -> &MemKvStore {
        &self.inner
    }
}

impl KvStore for FaultyStore {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.inner.get(key)
    }

    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        {
            let mut countdown = self.countdown.lock().unwrap();
            match *countdown {
                Some(0) => {
                    *countdown = None;
                    return Err(StoreError::Io {
                        path: key.into(),
                        source: std::io::Error::other("injected write failure"),
                    });
                }
                Some(n) => *countdown = Some(n - 1),
                None => {}
            }
        }
        self.inner.put(key, value)
    }

    fn delete(&self, key: &str) -> StoreResult<bool> {
        self.inner.delete(key)
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        self.inner.keys()
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// Bootstrapped supervisor over an in-memory store with every collaborator mocked.
pub struct Harness {
    pub supervisor: Arc<Supervisor>,
    pub store: Arc<MemKvStore>,
    pub faults: Arc<FaultyStore>,
    pub assets: Arc<MemAssets>,
    pub loader: Arc<ScriptedLoader>,
    pub permissions: Arc<MockPermissions>,
    pub memory: Arc<MockMemory>,
    pub observer: Arc<RecordingObserver>,
    pub log: CallLog,
    wiring: Wiring,
}

/// Everything needed to build a supervisor; kept so tests can "restart".
struct Wiring {
    store: Arc<FaultyStore>,
    assets: Arc<MemAssets>,
    loader: Arc<ScriptedLoader>,
    permissions: Arc<MockPermissions>,
    memory: Arc<MockMemory>,
    observer: Arc<RecordingObserver>,
    hosts: HashMap<ResourceKind, Arc<RecordingResourceHost>>,
    apis: HashMap<String, Arc<RecordingApi>>,
    config: SupervisorConfig,
    checked: bool,
}

impl Wiring {
    fn connect(&self) -> Arc<Supervisor> {
        let mut builder = SupervisorBuilder::new(
            self.store.clone(),
            self.assets.clone(),
            self.loader.clone(),
        )
        .config(self.config.clone())
        .memory_allocator(self.memory.clone())
        .observer(self.observer.clone());
        if self.checked {
            builder = builder.capability_checker(self.permissions.clone());
        }
        for host in self.hosts.values() {
            builder = builder.resource_host(host.clone());
        }
        for (name, api) in &self.apis {
            builder = builder.api(name.clone(), api.clone());
        }
        let supervisor = builder.build().expect("build supervisor");
        supervisor.bootstrap().expect("bootstrap");
        supervisor
    }
}

impl Harness {
    pub fn new() -> Self {
        Self::build(Self::fast_config(), true)
    }

    pub fn with_config(config: SupervisorConfig) -> Self {
        Self::build(config, true)
    }

    /// No capability checker: API calls are allowed unchecked.
    pub fn without_checker() -> Self {
        Self::build(Self::fast_config(), false)
    }

    /// Short timeouts so timeout paths finish quickly.
    pub fn fast_config() -> SupervisorConfig {
        SupervisorConfig::default()
            .with_load_timeout(Duration::from_millis(200))
            .with_terminal_ready_timeout(Duration::from_millis(200))
    }

    fn build(config: SupervisorConfig, checked: bool) -> Self {
        let log = CallLog::new();
        let hosts = ResourceKind::CASCADE_ORDER
            .into_iter()
            .filter(|kind| *kind != ResourceKind::CapabilityGrant)
            .map(|kind| (kind, RecordingResourceHost::new(kind, log.clone())))
            .collect();
        let apis = KERNEL_APIS
            .iter()
            .map(|spec| {
                let api = match spec.name {
                    "window.create" => RecordingApi::producing(spec.name, ResourceKind::Window),
                    "widget.embed" => {
                        RecordingApi::producing(spec.name, ResourceKind::DesktopWidget)
                    }
                    "notification.show" => {
                        RecordingApi::producing(spec.name, ResourceKind::Notification)
                    }
                    "event.subscribe" => {
                        RecordingApi::producing(spec.name, ResourceKind::EventHandler)
                    }
                    "task.spawn" => {
                        RecordingApi::producing(spec.name, ResourceKind::BackgroundTask)
                    }
                    _ => RecordingApi::new(spec.name),
                };
                (spec.name.to_string(), Arc::new(api))
            })
            .collect();

        let wiring = Wiring {
            store: Arc::new(FaultyStore::new(MemKvStore::new())),
            assets: Arc::new(MemAssets::new()),
            loader: Arc::new(ScriptedLoader::new(log.clone())),
            permissions: Arc::new(MockPermissions::new(log.clone())),
            memory: Arc::new(MockMemory::new(log.clone())),
            observer: Arc::new(RecordingObserver::default()),
            hosts,
            apis,
            config,
            checked,
        };
        Self {
            supervisor: wiring.connect(),
            store: Arc::new(wiring.store.inner().clone()),
            faults: wiring.store.clone(),
            assets: wiring.assets.clone(),
            loader: wiring.loader.clone(),
            permissions: wiring.permissions.clone(),
            memory: wiring.memory.clone(),
            observer: wiring.observer.clone(),
            log,
            wiring,
        }
    }

    /// Swap in a different handler for `name` and rewire the supervisor.
    pub fn with_api(mut self, name: &str, api: RecordingApi) -> Self {
        self.wiring.apis.insert(name.to_string(), Arc::new(api));
        self.supervisor = self.wiring.connect();
        self
    }

    /// A fresh supervisor over the same store and collaborators, as after a restart.
    pub fn rebuild(&self) -> Arc<Supervisor> {
        self.wiring.connect()
    }

    /// Publish `program` under `name` with a default manifest.
    pub fn install(&self, name: &str, program: Arc<dyn Program>) -> ProgramManifest {
        self.install_with(name, ProgramManifest::new(format!("apps/{name}.js")), program)
    }

    pub fn install_with(
        &self,
        name: &str,
        manifest: ProgramManifest,
        program: Arc<dyn Program>,
    ) -> ProgramManifest {
        self.loader.script(
            manifest.script.clone(),
            ScriptBehavior::Register(canonical_name(name), program),
        );
        self.assets.insert(name, manifest.clone());
        manifest
    }

    /// Install a plain [`TestProgram`] and return it.
    pub fn install_simple(&self, name: &str) -> Arc<TestProgram> {
        let program = Arc::new(TestProgram::new(name, self.log.clone()));
        self.install(name, program.clone());
        program
    }

    /// Install a terminal host that signals readiness during init.
    pub fn install_terminal(&self) -> Arc<TestProgram> {
        let name = self.wiring.config.terminal_program.clone();
        let program = Arc::new(TestProgram::new(name.clone(), self.log.clone()).ready_on_init());
        self.install(&name, program.clone());
        program
    }

    pub fn host(&self, kind: ResourceKind) -> Arc<RecordingResourceHost> {
        self.wiring
            .hosts
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| panic!("no recording host for {kind}"))
    }

    pub fn api(&self, name: &str) -> Arc<RecordingApi> {
        self.wiring
            .apis
            .get(name)
            .cloned()
            .unwrap_or_else(|| panic!("no recording api {name}"))
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
