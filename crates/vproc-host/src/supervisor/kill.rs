use futures::future::{BoxFuture, FutureExt};
use serde_json::json;
use tracing::{debug, info, warn};
use vproc_kernel::{
    KillStart, Pid, ProcessRecord, ProcessRepository, ProcessStatus, ResourceHandle, ResourceKind,
};

use super::Supervisor;
use crate::error::SupervisorError;
use crate::program::ExitContext;

impl Supervisor {
    /// Terminate `pid`. Returns `false` when there was nothing to do: unknown
    /// PID, a kill already running for it, or an exited record with nothing
    /// left to clean up.
    ///
    /// Without `force`, a failing exit hook aborts the kill and leaves the
    /// record `exiting`; retry with `force` to finish it.
    pub async fn kill_program(&self, pid: Pid, force: bool) -> Result<bool, SupervisorError> {
        if pid.is_privileged() {
            return Err(SupervisorError::InvalidArgument(format!(
                "pid {pid} is the privileged process and cannot be killed"
            )));
        }
        self.kill_boxed(pid, force, true).await
    }

    pub(super) fn kill_boxed(
        &self,
        pid: Pid,
        force: bool,
        run_exit_hook: bool,
    ) -> BoxFuture<'_, Result<bool, SupervisorError>> {
        self.kill_guarded(pid, force, run_exit_hook).boxed()
    }

    async fn kill_guarded(
        &self,
        pid: Pid,
        force: bool,
        run_exit_hook: bool,
    ) -> Result<bool, SupervisorError> {
        match self.table.begin_kill(pid)? {
            KillStart::Missing => {
                debug!("kill of unknown pid {pid} ignored");
                Ok(false)
            }
            KillStart::InProgress => {
                debug!("kill of pid {pid} already in progress");
                Ok(false)
            }
            KillStart::Begun { previous } => {
                let outcome = self
                    .kill_sequence(pid, previous, force, run_exit_hook)
                    .await;
                self.table.finish_kill(pid);
                outcome
            }
        }
    }

    async fn kill_sequence(
        &self,
        pid: Pid,
        previous: ProcessStatus,
        force: bool,
        run_exit_hook: bool,
    ) -> Result<bool, SupervisorError> {
        if previous == ProcessStatus::Exited {
            if !self.has_visual_leftovers(pid)? {
                return Ok(false);
            }
            warn!("pid {pid} has exited but still owns visual resources; cleaning up again");
        } else if run_exit_hook {
            self.run_exit_hook(pid, force).await?;
        }

        let Some(record) = self.table.get(pid)? else {
            return Ok(false);
        };

        if let Some(terminal) = record.owns_private_terminal() {
            if terminal != pid {
                debug!("pid {pid}: closing private terminal host {terminal}");
                if let Err(err) = self.kill_boxed(terminal, true, true).await {
                    warn!("pid {pid}: closing terminal host {terminal} failed: {err}");
                }
            }
        }
        if record.is_cli_terminal {
            self.schedule_paired_kills(pid)?;
        }

        self.release_resources(&record).await;
        if let Some(memory) = &self.memory {
            if let Err(err) = memory.free(pid).await {
                warn!("pid {pid}: freeing memory failed: {err:#}");
            }
        }
        self.ready.remove(&pid);

        self.table.update(pid, |r| {
            r.clear_owned();
            r.set_status(ProcessStatus::Exited);
            r.log_action("exit", json!({ "force": force }));
        })?;
        info!("pid {pid} ('{}') exited", record.name);
        self.notify(pid, ProcessStatus::Exited);
        Ok(true)
    }

    async fn run_exit_hook(&self, pid: Pid, force: bool) -> Result<(), SupervisorError> {
        let Some(record) = self.table.get(pid)? else {
            return Ok(());
        };
        let Some(program) = self.programs.get(&record.name_canonical) else {
            return Ok(());
        };
        let ctx = ExitContext {
            pid,
            force,
            host: self.handle(),
        };
        match program.exit(ctx).await {
            Ok(()) => Ok(()),
            Err(source) if force => {
                warn!("pid {pid}: exit hook failed, continuing forced kill: {source:#}");
                Ok(())
            }
            Err(source) => {
                self.table.record_action(
                    pid,
                    "exit.failed",
                    json!({ "error": format!("{source:#}") }),
                )?;
                Err(SupervisorError::ExitHookFailed { pid, source })
            }
        }
    }

    /// Release owned resources class by class in cascade order. Persistent
    /// handles are left out. Failures are logged; the kill always completes.
    async fn release_resources(&self, record: &ProcessRecord) {
        let pid = record.pid;
        for kind in ResourceKind::CASCADE_ORDER {
            let handles: Vec<ResourceHandle> = record
                .owned_resource_handles
                .iter()
                .filter(|h| h.kind == kind && h.is_dependent())
                .cloned()
                .collect();
            if kind == ResourceKind::CapabilityGrant {
                if let Some(checker) = &self.checker {
                    if let Err(err) = checker.revoke_all(pid).await {
                        warn!("pid {pid}: revoking capability grants failed: {err:#}");
                    }
                }
            }
            for host in self.resources.for_kind(kind) {
                if let Err(err) = host.release(pid, &handles).await {
                    warn!("pid {pid}: releasing {kind} resources failed: {err:#}");
                }
            }
        }
    }

    fn has_visual_leftovers(&self, pid: Pid) -> Result<bool, SupervisorError> {
        let tracked = self.table.get(pid)?.is_some_and(|r| {
            r.owned_resource_handles
                .iter()
                .any(|h| h.kind.is_visual())
        });
        Ok(tracked || self.resources.has_live_visuals(pid))
    }

    /// A terminal host going away takes its paired CLI program with it. The
    /// kill is deferred so it does not nest inside this one.
    fn schedule_paired_kills(&self, terminal: Pid) -> Result<(), SupervisorError> {
        let paired = self.table.filter(|r| {
            r.terminal_pid == Some(terminal)
                && r.is_cli
                && !r.launched_from_terminal
                && r.is_running()
        })?;
        for record in paired {
            self.schedule_kill(record.pid);
        }
        Ok(())
    }

    fn schedule_kill(&self, pid: Pid) {
        let Some(supervisor) = self.me.upgrade() else {
            return;
        };
        debug!("scheduling kill of pid {pid}");
        tokio::spawn(async move {
            if let Err(err) = supervisor.kill_program(pid, true).await {
                warn!("deferred kill of pid {pid} failed: {err}");
            }
        });
    }
}
