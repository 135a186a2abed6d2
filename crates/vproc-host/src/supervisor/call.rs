use serde_json::{Value, json};
use tracing::warn;
use uuid::Uuid;
use vproc_kernel::api::{forwards_pid, required_capability};
use vproc_kernel::{Capability, MemoryRef, Pid, ProcessRepository, now_ms};

use super::Supervisor;
use crate::adapters::traits::CapabilityDecision;
use crate::api::ApiOutput;
use crate::error::SupervisorError;

impl Supervisor {
    /// Invoke a kernel API on behalf of `pid`.
    ///
    /// The privileged process skips every check. Anyone else must be running
    /// and hold the capability the API requires; the handler is not touched
    /// unless both hold.
    pub async fn call_kernel_api(
        &self,
        pid: Pid,
        api: &str,
        args: Vec<Value>,
    ) -> Result<Value, SupervisorError> {
        let record = self
            .table
            .get(pid)?
            .ok_or(SupervisorError::NoSuchProcess(pid))?;
        let handler = self
            .apis
            .get(api)
            .ok_or_else(|| SupervisorError::UnknownApi(api.to_string()))?;

        if !record.is_privileged {
            if !record.is_running() {
                return Err(SupervisorError::NotRunning {
                    pid,
                    status: record.status,
                });
            }
            if let Some(capability) = required_capability(api) {
                self.authorize(pid, api, &capability).await?;
            }
        }

        self.table
            .record_action(pid, &format!("api:{api}"), json!({ "argc": args.len() }))?;
        let caller = forwards_pid(api).then_some(pid);
        let ApiOutput {
            value,
            resources,
            modules,
        } = handler
            .invoke(caller, args)
            .await
            .map_err(|source| SupervisorError::Api {
                api: api.to_string(),
                source,
            })?;

        if !resources.is_empty() || !modules.is_empty() {
            self.table.update(pid, |r| {
                r.owned_resource_handles.extend(resources);
                r.requested_modules.extend(modules);
            })?;
        }
        Ok(value)
    }

    async fn authorize(
        &self,
        pid: Pid,
        api: &str,
        capability: &Capability,
    ) -> Result<(), SupervisorError> {
        let Some(checker) = &self.checker else {
            warn!("no capability checker; allowing '{api}' for pid {pid} unchecked");
            return Ok(());
        };
        let denied = || SupervisorError::PermissionDenied {
            pid,
            api: api.to_string(),
            capability: capability.to_string(),
        };
        match checker.check(pid, capability).await {
            Ok(CapabilityDecision::Granted) => Ok(()),
            Ok(CapabilityDecision::Denied) => {
                self.table.record_action(
                    pid,
                    "api.denied",
                    json!({ "api": api, "capability": capability }),
                )?;
                Err(denied())
            }
            Err(err) => {
                warn!("capability check for pid {pid} on '{api}' failed: {err:#}");
                Err(denied())
            }
        }
    }

    /// Allocate memory for a running process and record the reference.
    ///
    /// `ref_id` defaults to a fresh random identifier.
    pub async fn allocate_memory(
        &self,
        pid: Pid,
        heap_size: Option<u64>,
        shed_size: Option<u64>,
        ref_id: Option<String>,
    ) -> Result<MemoryRef, SupervisorError> {
        let record = self
            .table
            .get(pid)?
            .ok_or(SupervisorError::NoSuchProcess(pid))?;
        if !record.is_running() {
            return Err(SupervisorError::NotRunning {
                pid,
                status: record.status,
            });
        }
        let Some(memory) = &self.memory else {
            return Err(SupervisorError::Memory(
                "no memory allocator configured".into(),
            ));
        };
        let ref_id = ref_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        if record.memory_refs.contains_key(&ref_id) {
            return Err(SupervisorError::InvalidArgument(format!(
                "pid {pid} already holds memory ref '{ref_id}'"
            )));
        }

        let allocation = memory
            .allocate(pid, heap_size, shed_size)
            .await
            .map_err(|err| SupervisorError::Memory(format!("{err:#}")))?;
        let memory_ref = MemoryRef {
            pid,
            heap_id: allocation.heap_id,
            shed_id: allocation.shed_id,
            ref_id: ref_id.clone(),
            allocated_at: now_ms(),
        };
        let stored = memory_ref.clone();
        self.table
            .update(pid, move |r| {
                r.log_action("memory.allocate", json!({ "refId": ref_id }));
                r.memory_refs.insert(ref_id, stored);
            })?
            .ok_or(SupervisorError::NoSuchProcess(pid))?;
        Ok(memory_ref)
    }

    /// Forget one memory reference. The allocation itself is released when
    /// the process is killed.
    pub fn free_memory_ref(&self, pid: Pid, ref_id: &str) -> Result<bool, SupervisorError> {
        let removed = self
            .table
            .update(pid, |r| r.memory_refs.shift_remove(ref_id).is_some())?;
        Ok(removed.unwrap_or(false))
    }
}
