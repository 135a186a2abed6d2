use tracing::{info, warn};
use vproc_kernel::Pid;

use super::{StartOptions, Supervisor};
use crate::error::SupervisorError;

/// Outcome of [`Supervisor::start_auto_start_programs`], in attempt order.
#[derive(Debug, Default)]
pub struct AutoStartReport {
    pub started: Vec<(String, Pid)>,
    pub failed: Vec<(String, SupervisorError)>,
}

impl Supervisor {
    /// Start every auto-start program, lowest priority first. Equal priorities
    /// keep discovery order. One failure does not stop the rest.
    pub async fn start_auto_start_programs(&self) -> AutoStartReport {
        let mut report = AutoStartReport::default();
        let manifests = match self.assets.list().await {
            Ok(manifests) => manifests,
            Err(err) => {
                warn!("listing programs for auto-start failed: {err:#}");
                return report;
            }
        };

        let mut queue: Vec<_> = manifests
            .into_iter()
            .filter(|(_, manifest)| manifest.metadata.auto_start)
            .collect();
        queue.sort_by_key(|(_, manifest)| manifest.metadata.priority);

        for (name, _) in queue {
            match self.start_program(&name, StartOptions::default()).await {
                Ok(pid) => report.started.push((name, pid)),
                Err(err) => {
                    warn!("auto-start of '{name}' failed: {err}");
                    report.failed.push((name, err));
                }
            }
        }
        info!(
            "auto-start finished: {} started, {} failed",
            report.started.len(),
            report.failed.len()
        );
        report
    }
}
