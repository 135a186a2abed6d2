//! Authoritative PID → record mapping with a write-through cache.
//!
//! The persisted form lives under [`PROCESS_TABLE_KEY`] as an ordered sequence of
//! `(pid, record)` pairs. The in-memory map only shadows that snapshot: it is
//! filled lazily, written through on every persisted mutation, and dropped by
//! [`ProcessTable::invalidate`] whenever the stored state may have changed
//! underneath it.

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use serde_json::Value;
use vproc_store::{DynKvStore, KvStoreExt};

use crate::error::KernelError;
use crate::pid::{PRIVILEGED_PID, Pid};
use crate::process::{ProcessRecord, ProcessStatus};

pub const PROCESS_TABLE_KEY: &str = "PROCESS_TABLE";

/// Repository seam over process records.
pub trait ProcessRepository: Send + Sync {
    fn get(&self, pid: Pid) -> Result<Option<ProcessRecord>, KernelError>;
    fn set(&self, record: ProcessRecord) -> Result<(), KernelError>;
    fn delete(&self, pid: Pid) -> Result<bool, KernelError>;
    fn list(&self) -> Result<Vec<ProcessRecord>, KernelError>;
}

/// Outcome of trying to open a kill sequence on a PID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillStart {
    /// No record under that PID.
    Missing,
    /// Another kill sequence for the PID has not finished yet.
    InProgress,
    /// Guard acquired; carries the status the record had before the kill.
    /// Non-exited records have already been moved to `exiting`.
    Begun { previous: ProcessStatus },
}

#[derive(Default)]
struct TableState {
    cache: Option<BTreeMap<Pid, ProcessRecord>>,
    killing: HashSet<Pid>,
}

pub struct ProcessTable {
    store: DynKvStore,
    state: Mutex<TableState>,
}

impl ProcessTable {
    pub fn new(store: DynKvStore) -> Self {
        Self {
            store,
            state: Mutex::new(TableState::default()),
        }
    }

    pub fn store(&self) -> &DynKvStore {
        &self.store
    }

    /// Drop the cached view; the next access rebuilds it from the store.
    pub fn invalidate(&self) {
        self.state.lock().unwrap().cache = None;
    }

    /// Rebuild the cache from the store immediately. Returns the record count.
    pub fn reload(&self) -> Result<usize, KernelError> {
        let mut state = self.state.lock().unwrap();
        state.cache = None;
        let records = self.records(&mut state)?;
        Ok(records.len())
    }

    /// Insert a record under a PID that has never been used by this table.
    pub fn insert(&self, record: ProcessRecord) -> Result<(), KernelError> {
        if record.is_privileged && record.pid != PRIVILEGED_PID {
            return Err(KernelError::PrivilegedPidMismatch {
                expected: PRIVILEGED_PID,
                found: record.pid,
            });
        }
        if !record.is_privileged && record.pid == PRIVILEGED_PID {
            return Err(KernelError::ReservedPid(record.pid));
        }
        let mut state = self.state.lock().unwrap();
        let records = self.records(&mut state)?;
        if records.contains_key(&record.pid) {
            return Err(KernelError::DuplicatePid(record.pid));
        }
        records.insert(record.pid, record);
        self.persist_locked(&mut state)
    }

    /// Insert the privileged bootstrap record unless one is already present.
    ///
    /// Returns `true` when a new record was written.
    pub fn ensure_privileged(&self, name: &str) -> Result<bool, KernelError> {
        let mut state = self.state.lock().unwrap();
        let records = self.records(&mut state)?;
        match records.get_mut(&PRIVILEGED_PID) {
            Some(existing) if existing.is_privileged => {
                if existing.status == ProcessStatus::Running {
                    return Ok(false);
                }
                existing.set_status(ProcessStatus::Running);
            }
            Some(_) => return Err(KernelError::ReservedPid(PRIVILEGED_PID)),
            None => {
                records.insert(PRIVILEGED_PID, ProcessRecord::privileged(PRIVILEGED_PID, name));
            }
        }
        self.persist_locked(&mut state)?;
        Ok(true)
    }

    /// Mutate one record and persist the table.
    ///
    /// The closure runs under the table lock and must not call back into the table.
    pub fn update<R>(
        &self,
        pid: Pid,
        f: impl FnOnce(&mut ProcessRecord) -> R,
    ) -> Result<Option<R>, KernelError> {
        let mut state = self.state.lock().unwrap();
        let records = self.records(&mut state)?;
        let Some(record) = records.get_mut(&pid) else {
            return Ok(None);
        };
        let out = f(record);
        self.persist_locked(&mut state)?;
        Ok(Some(out))
    }

    /// Append an audit entry without forcing a store write; it is persisted
    /// with the next table mutation.
    pub fn record_action(
        &self,
        pid: Pid,
        action: &str,
        details: Value,
    ) -> Result<bool, KernelError> {
        let mut state = self.state.lock().unwrap();
        let records = self.records(&mut state)?;
        match records.get_mut(&pid) {
            Some(record) => {
                record.log_action(action, details);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn contains(&self, pid: Pid) -> Result<bool, KernelError> {
        let mut state = self.state.lock().unwrap();
        Ok(self.records(&mut state)?.contains_key(&pid))
    }

    /// Records matching `pred`, in PID order.
    pub fn filter(
        &self,
        pred: impl Fn(&ProcessRecord) -> bool,
    ) -> Result<Vec<ProcessRecord>, KernelError> {
        let mut state = self.state.lock().unwrap();
        Ok(self
            .records(&mut state)?
            .values()
            .filter(|r| pred(r))
            .cloned()
            .collect())
    }

    pub fn max_pid(&self) -> Result<Option<Pid>, KernelError> {
        let mut state = self.state.lock().unwrap();
        Ok(self.records(&mut state)?.keys().next_back().copied())
    }

    /// Open a kill sequence for `pid`. See [`KillStart`].
    pub fn begin_kill(&self, pid: Pid) -> Result<KillStart, KernelError> {
        let mut state = self.state.lock().unwrap();
        if state.killing.contains(&pid) {
            return Ok(KillStart::InProgress);
        }
        let records = self.records(&mut state)?;
        let Some(record) = records.get_mut(&pid) else {
            return Ok(KillStart::Missing);
        };
        let previous = record.status;
        let moved = previous != ProcessStatus::Exited;
        if moved {
            record.set_status(ProcessStatus::Exiting);
        }
        state.killing.insert(pid);
        if moved {
            if let Err(err) = self.persist_locked(&mut state) {
                state.killing.remove(&pid);
                return Err(err);
            }
        }
        Ok(KillStart::Begun { previous })
    }

    /// Close the kill sequence opened by [`begin_kill`](Self::begin_kill).
    pub fn finish_kill(&self, pid: Pid) {
        self.state.lock().unwrap().killing.remove(&pid);
    }

    pub fn is_killing(&self, pid: Pid) -> bool {
        self.state.lock().unwrap().killing.contains(&pid)
    }

    /// Write the current cache to the store.
    pub fn persist(&self) -> Result<(), KernelError> {
        let mut state = self.state.lock().unwrap();
        self.persist_locked(&mut state)
    }

    fn records<'a>(
        &self,
        state: &'a mut TableState,
    ) -> Result<&'a mut BTreeMap<Pid, ProcessRecord>, KernelError> {
        if state.cache.is_none() {
            let loaded = self.load()?;
            state.cache = Some(loaded);
        }
        Ok(state.cache.get_or_insert_with(BTreeMap::new))
    }

    fn load(&self) -> Result<BTreeMap<Pid, ProcessRecord>, KernelError> {
        let pairs: Vec<(Pid, ProcessRecord)> = self
            .store
            .get_json(PROCESS_TABLE_KEY)?
            .unwrap_or_default();
        let mut records = BTreeMap::new();
        for (pid, mut record) in pairs {
            if record.pid != pid {
                log::warn!(
                    "process table entry {pid} carries pid {}; using the entry key",
                    record.pid
                );
                record.pid = pid;
            }
            if records.insert(pid, record).is_some() {
                log::warn!("process table snapshot repeats pid {pid}; keeping the last entry");
            }
        }
        log::debug!("loaded {} process record(s)", records.len());
        Ok(records)
    }

    fn persist_locked(&self, state: &mut TableState) -> Result<(), KernelError> {
        let Some(records) = state.cache.as_ref() else {
            return Ok(());
        };
        let pairs: Vec<(&Pid, &ProcessRecord)> = records.iter().collect();
        self.store.put_json(PROCESS_TABLE_KEY, &pairs)?;
        Ok(())
    }
}

impl ProcessRepository for ProcessTable {
    fn get(&self, pid: Pid) -> Result<Option<ProcessRecord>, KernelError> {
        let mut state = self.state.lock().unwrap();
        Ok(self.records(&mut state)?.get(&pid).cloned())
    }

    /// Upsert; unlike [`ProcessTable::insert`] this does not reject known PIDs.
    fn set(&self, record: ProcessRecord) -> Result<(), KernelError> {
        let mut state = self.state.lock().unwrap();
        self.records(&mut state)?.insert(record.pid, record);
        self.persist_locked(&mut state)
    }

    fn delete(&self, pid: Pid) -> Result<bool, KernelError> {
        let mut state = self.state.lock().unwrap();
        let removed = self.records(&mut state)?.remove(&pid).is_some();
        state.killing.remove(&pid);
        if removed {
            self.persist_locked(&mut state)?;
        }
        Ok(removed)
    }

    fn list(&self) -> Result<Vec<ProcessRecord>, KernelError> {
        let mut state = self.state.lock().unwrap();
        Ok(self.records(&mut state)?.values().cloned().collect())
    }
}
