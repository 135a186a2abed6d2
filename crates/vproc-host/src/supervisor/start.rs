use futures::future::{BoxFuture, FutureExt};
use serde_json::json;
use tracing::{debug, info, warn};
use vproc_kernel::{
    ActionLog, Capability, Pid, ProcessRecord, ProcessRepository, ProcessStatus, ResourceHandle,
    ResourceKind, canonical_name,
};

use super::{StartOptions, Supervisor};
use crate::adapters::traits::CapabilityDecision;
use crate::error::SupervisorError;
use crate::program::ProgramContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StartMode {
    Program,
    /// Terminal auto-launched for a CLI program; skips the single-instance gate.
    TerminalHost,
}

impl Supervisor {
    /// Start `name` and return its PID once the program is running.
    ///
    /// A failed start leaves no running record behind: load failures remove the
    /// record, initializer failures leave it `exited` with its resources released.
    pub async fn start_program(
        &self,
        name: &str,
        options: StartOptions,
    ) -> Result<Pid, SupervisorError> {
        self.start_boxed(name.to_string(), options, StartMode::Program)
            .await
    }

    fn start_boxed(
        &self,
        name: String,
        options: StartOptions,
        mode: StartMode,
    ) -> BoxFuture<'_, Result<Pid, SupervisorError>> {
        self.start_inner(name, options, mode).boxed()
    }

    async fn start_inner(
        &self,
        name: String,
        options: StartOptions,
        mode: StartMode,
    ) -> Result<Pid, SupervisorError> {
        let manifest = match self.assets.resolve(&name).await {
            Ok(Some(manifest)) if !manifest.script.trim().is_empty() => manifest,
            Ok(_) => return Err(SupervisorError::ManifestNotFound(name)),
            Err(err) => {
                return Err(SupervisorError::LoadFailed {
                    reason: format!("manifest lookup failed: {err:#}"),
                    name,
                });
            }
        };
        let canonical = canonical_name(&name);

        let single = mode == StartMode::Program && !manifest.metadata.allow_multiple_instances;
        let lock = single.then(|| self.start_lock(&canonical));
        let _guard = match &lock {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };
        if single {
            let live = self.table.filter(|r| {
                r.name_canonical == canonical && !r.is_cli_terminal && r.is_running()
            })?;
            if !live.is_empty() {
                return Err(SupervisorError::AlreadyRunning(name));
            }
        }

        let pid = self.pids.allocate()?;
        let mut record = ProcessRecord::loading(pid, &name, &manifest);
        record.action_log = ActionLog::with_capacity(self.config.action_log_capacity);
        record.is_cli_terminal = mode == StartMode::TerminalHost;
        self.table.insert(record)?;
        info!("loading '{name}' as pid {pid}");

        for style in &manifest.styles {
            if let Err(err) = self.loader.load_style(style).await {
                warn!("pid {pid}: style '{style}' failed to load: {err:#}");
            }
        }
        for asset in &manifest.assets {
            if let Err(err) = self.loader.load_asset(asset).await {
                warn!("pid {pid}: asset '{asset}' failed to load: {err:#}");
            }
        }

        if let Err(err) = self
            .loader
            .load_script(&manifest.script, self.programs.clone())
            .await
        {
            self.discard(pid).await;
            return Err(SupervisorError::LoadFailed {
                name,
                reason: format!("{err:#}"),
            });
        }
        let Some(program) = self
            .programs
            .wait_for(&canonical, self.config.load_timeout)
            .await
        else {
            self.discard(pid).await;
            return Err(SupervisorError::LoadTimeout {
                name,
                timeout: self.config.load_timeout,
            });
        };
        if let Err(err) = self
            .table
            .update(pid, |r| r.set_status(ProcessStatus::Starting))
        {
            self.discard(pid).await;
            return Err(err.into());
        }
        if let Err(err) = self
            .request_capabilities(pid, &program.info().capabilities)
            .await
        {
            self.revoke_grants(pid).await;
            self.discard(pid).await;
            return Err(err);
        }

        let mut terminal_pid = options.terminal_pid;
        if manifest.metadata.cli && mode == StartMode::Program {
            match options.terminal_pid {
                Some(terminal) => {
                    let paired = self.table.update(pid, |r| {
                        r.terminal_pid = Some(terminal);
                        r.launched_from_terminal = true;
                    });
                    if let Err(err) = paired {
                        self.abort_start(pid).await;
                        return Err(err.into());
                    }
                }
                None => match self.launch_terminal(pid).await {
                    Ok(terminal) => terminal_pid = Some(terminal),
                    Err(err) => {
                        self.abort_start(pid).await;
                        return Err(err);
                    }
                },
            }
        }

        let ctx = ProgramContext {
            pid,
            args: options.args,
            env: options.env,
            cwd: options.cwd,
            metadata: manifest.metadata.clone(),
            extras: options.extras,
            terminal_pid,
            host: self.handle(),
        };
        if let Err(source) = program.init(ctx).await {
            warn!("pid {pid} ('{name}') failed to initialize: {source:#}");
            self.abort_start(pid).await;
            return Err(SupervisorError::InitFailed { name, pid, source });
        }

        let started = self.table.update(pid, |r| {
            if r.status != ProcessStatus::Starting {
                return false;
            }
            let script = r.script_path.clone();
            r.set_status(ProcessStatus::Running);
            r.log_action("start", json!({ "script": script }));
            true
        })?;
        if started == Some(true) {
            info!("pid {pid} ('{name}') running");
            self.notify(pid, ProcessStatus::Running);
        } else {
            debug!("pid {pid} ('{name}') left the starting state during init");
        }
        Ok(pid)
    }

    /// Ask the checker for each capability the program declared. Denials are
    /// recorded but do not stop the start.
    async fn request_capabilities(
        &self,
        pid: Pid,
        capabilities: &[Capability],
    ) -> Result<(), SupervisorError> {
        if capabilities.is_empty() {
            return Ok(());
        }
        let Some(checker) = &self.checker else {
            warn!(
                "pid {pid}: no capability checker; skipping {} requested grant(s)",
                capabilities.len()
            );
            return Ok(());
        };
        for capability in capabilities {
            let decision = match checker.request(pid, capability).await {
                Ok(decision) => decision,
                Err(err) => {
                    warn!("pid {pid}: grant request for '{capability}' failed: {err:#}");
                    CapabilityDecision::Denied
                }
            };
            let granted = decision.is_granted();
            self.table.update(pid, |r| {
                if granted {
                    r.owned_resource_handles.insert(ResourceHandle::new(
                        ResourceKind::CapabilityGrant,
                        capability.as_str(),
                    ));
                }
                r.log_action(
                    "capability.request",
                    json!({ "capability": capability, "granted": granted }),
                );
            })?;
        }
        Ok(())
    }

    /// Start a private terminal host for the CLI program `owner` and wait for
    /// it to signal readiness.
    async fn launch_terminal(&self, owner: Pid) -> Result<Pid, SupervisorError> {
        let terminal = self
            .start_boxed(
                self.config.terminal_program.clone(),
                StartOptions::default(),
                StartMode::TerminalHost,
            )
            .await?;
        if let Err(err) = self
            .table
            .update(owner, |r| r.terminal_pid = Some(terminal))
        {
            warn!("pid {owner}: recording terminal host {terminal} failed; closing it");
            if let Err(kill_err) = self.kill_boxed(terminal, true, true).await {
                warn!("closing unpaired terminal host {terminal} failed: {kill_err}");
            }
            return Err(err.into());
        }

        let timeout = self.config.terminal_ready_timeout;
        if self.ready.wait(&terminal, timeout).await.is_none() {
            warn!("terminal host {terminal} for pid {owner} not ready after {timeout:?}");
            return Err(SupervisorError::TerminalTimeout {
                pid: terminal,
                timeout,
            });
        }
        debug!("pid {owner} paired with terminal host {terminal}");
        Ok(terminal)
    }

    /// Roll back a start whose program never registered.
    async fn discard(&self, pid: Pid) {
        if let Some(memory) = &self.memory {
            let holds_memory = matches!(self.table.get(pid), Ok(Some(r)) if !r.memory_refs.is_empty());
            if holds_memory {
                if let Err(err) = memory.free(pid).await {
                    warn!("pid {pid}: freeing memory during rollback failed: {err:#}");
                }
            }
        }
        self.ready.remove(&pid);
        if let Err(err) = self.table.delete(pid) {
            warn!("pid {pid}: removing record during rollback failed: {err}");
        }
    }

    async fn revoke_grants(&self, pid: Pid) {
        if let Some(checker) = &self.checker {
            if let Err(err) = checker.revoke_all(pid).await {
                warn!("pid {pid}: revoking grants during rollback failed: {err:#}");
            }
        }
    }

    /// Roll back a start that got as far as the initializer.
    async fn abort_start(&self, pid: Pid) {
        if let Err(err) = self.kill_boxed(pid, true, false).await {
            warn!("pid {pid}: cleanup after failed start failed: {err}");
        }
    }
}
