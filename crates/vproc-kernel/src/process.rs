use std::collections::{BTreeSet, VecDeque};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::manifest::{ManifestMetadata, ProgramManifest, canonical_name};
use crate::pid::Pid;

pub const DEFAULT_ACTION_LOG_CAPACITY: usize = 1000;

/// Wallclock milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessStatus {
    Loading,
    Starting,
    Running,
    Exiting,
    Exited,
}

impl ProcessStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ProcessStatus::Loading => "loading",
            ProcessStatus::Starting => "starting",
            ProcessStatus::Running => "running",
            ProcessStatus::Exiting => "exiting",
            ProcessStatus::Exited => "exited",
        }
    }

    pub fn is_terminal(self) -> bool {
        self == ProcessStatus::Exited
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle returned by the external memory allocator, owned by exactly one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryRef {
    pub pid: Pid,
    pub heap_id: String,
    pub shed_id: String,
    pub ref_id: String,
    pub allocated_at: u64,
}

/// Class of host resource a process can own; the declaration order is the
/// teardown order used by the termination cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Window,
    ContextMenu,
    DesktopWidget,
    DragDrop,
    Notification,
    EventHandler,
    CapabilityGrant,
    BackgroundTask,
}

impl ResourceKind {
    pub const CASCADE_ORDER: [ResourceKind; 8] = [
        ResourceKind::Window,
        ResourceKind::ContextMenu,
        ResourceKind::DesktopWidget,
        ResourceKind::DragDrop,
        ResourceKind::Notification,
        ResourceKind::EventHandler,
        ResourceKind::CapabilityGrant,
        ResourceKind::BackgroundTask,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Window => "window",
            ResourceKind::ContextMenu => "context_menu",
            ResourceKind::DesktopWidget => "desktop_widget",
            ResourceKind::DragDrop => "drag_drop",
            ResourceKind::Notification => "notification",
            ResourceKind::EventHandler => "event_handler",
            ResourceKind::CapabilityGrant => "capability_grant",
            ResourceKind::BackgroundTask => "background_task",
        }
    }

    /// Visual resources are the ones checked when re-killing an exited record.
    pub fn is_visual(self) -> bool {
        matches!(self, ResourceKind::Window | ResourceKind::DesktopWidget)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque handle to a host resource created on behalf of a process.
///
/// Persistent resources (snapshot notifications, for one) outlive their owner:
/// the termination cascade never hands them to a host for release.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceHandle {
    pub kind: ResourceKind,
    pub id: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub persistent: bool,
}

impl ResourceHandle {
    pub fn new(kind: ResourceKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            persistent: false,
        }
    }

    pub fn into_persistent(mut self) -> Self {
        self.persistent = true;
        self
    }

    /// Released together with the owning process.
    pub fn is_dependent(&self) -> bool {
        !self.persistent
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionEntry {
    pub action: String,
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub details: Value,
}

/// Bounded audit trail; the oldest entry is evicted once capacity is reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionLog {
    #[serde(default = "default_capacity")]
    capacity: usize,
    entries: VecDeque<ActionEntry>,
}

fn default_capacity() -> usize {
    DEFAULT_ACTION_LOG_CAPACITY
}

impl Default for ActionLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_ACTION_LOG_CAPACITY)
    }
}

impl ActionLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::new(),
        }
    }

    pub fn push(&mut self, action: impl Into<String>, details: Value) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(ActionEntry {
            action: action.into(),
            timestamp: now_ms(),
            details,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActionEntry> {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&ActionEntry> {
        self.entries.back()
    }
}

/// Full state associated with one PID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRecord {
    pub pid: Pid,
    pub name: String,
    pub name_canonical: String,
    pub script_path: String,
    #[serde(default)]
    pub style_manifest: Vec<String>,
    #[serde(default)]
    pub asset_manifest: Vec<String>,
    #[serde(default)]
    pub metadata: ManifestMetadata,
    pub status: ProcessStatus,
    pub start_time: u64,
    #[serde(default)]
    pub exit_time: Option<u64>,
    #[serde(default, with = "pairs")]
    pub memory_refs: IndexMap<String, MemoryRef>,
    /// Live host handles; never persisted.
    #[serde(skip)]
    pub owned_resource_handles: BTreeSet<ResourceHandle>,
    #[serde(default)]
    pub is_privileged: bool,
    #[serde(default)]
    pub action_log: ActionLog,
    #[serde(default)]
    pub requested_modules: BTreeSet<String>,
    #[serde(default, rename = "isCLI")]
    pub is_cli: bool,
    #[serde(default)]
    pub terminal_pid: Option<Pid>,
    #[serde(default)]
    pub launched_from_terminal: bool,
    #[serde(default, rename = "isCLITerminal")]
    pub is_cli_terminal: bool,
}

impl ProcessRecord {
    /// Fresh `loading` record for a program about to start.
    pub fn loading(pid: Pid, name: &str, manifest: &ProgramManifest) -> Self {
        Self {
            pid,
            name: name.to_string(),
            name_canonical: canonical_name(name),
            script_path: manifest.script.clone(),
            style_manifest: manifest.styles.clone(),
            asset_manifest: manifest.assets.clone(),
            metadata: manifest.metadata.clone(),
            status: ProcessStatus::Loading,
            start_time: now_ms(),
            exit_time: None,
            memory_refs: IndexMap::new(),
            owned_resource_handles: BTreeSet::new(),
            is_privileged: false,
            action_log: ActionLog::default(),
            requested_modules: BTreeSet::new(),
            is_cli: manifest.metadata.cli,
            terminal_pid: None,
            launched_from_terminal: false,
            is_cli_terminal: false,
        }
    }

    /// The bootstrap identity: always running, exempt from capability checks.
    pub fn privileged(pid: Pid, name: &str) -> Self {
        let mut record = Self::loading(pid, name, &ProgramManifest::default());
        record.status = ProcessStatus::Running;
        record.is_privileged = true;
        record
    }

    /// Moves to `status`, keeping `exit_time` set exactly when exited.
    pub fn set_status(&mut self, status: ProcessStatus) {
        self.status = status;
        self.exit_time = if status == ProcessStatus::Exited {
            Some(self.exit_time.unwrap_or_else(now_ms))
        } else {
            None
        };
    }

    pub fn is_running(&self) -> bool {
        self.status == ProcessStatus::Running
    }

    pub fn log_action(&mut self, action: impl Into<String>, details: Value) {
        self.action_log.push(action, details);
    }

    /// Whether this record launched a private terminal host it must tear down.
    pub fn owns_private_terminal(&self) -> Option<Pid> {
        if self.is_cli && !self.launched_from_terminal {
            self.terminal_pid
        } else {
            None
        }
    }

    /// Drop collections that only make sense while the process is alive.
    pub fn clear_owned(&mut self) {
        self.memory_refs.clear();
        self.owned_resource_handles.clear();
    }
}

/// Serialize a map as an ordered sequence of `(key, value)` pairs.
mod pairs {
    use indexmap::IndexMap;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::hash::Hash;

    pub fn serialize<K, V, S>(map: &IndexMap<K, V>, serializer: S) -> Result<S::Ok, S::Error>
    where
        K: Serialize,
        V: Serialize,
        S: Serializer,
    {
        serializer.collect_seq(map.iter())
    }

    pub fn deserialize<'de, K, V, D>(deserializer: D) -> Result<IndexMap<K, V>, D::Error>
    where
        K: Deserialize<'de> + Eq + Hash,
        V: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        let pairs = Vec::<(K, V)>::deserialize(deserializer)?;
        Ok(pairs.into_iter().collect())
    }
}
