//! `vproc inspect` command.

use anyhow::{Result, anyhow};
use clap::Args;
use serde_json::json;
use vproc_kernel::Pid;

use crate::commands::open_supervisor;
use crate::opts::GlobalOpts;
use crate::output::print_json;

#[derive(Args, Debug)]
pub struct InspectArgs {
    pub pid: u64,
}

pub fn cmd_inspect(opts: &GlobalOpts, args: &InspectArgs) -> Result<()> {
    let supervisor = open_supervisor(opts)?;
    let pid = Pid(args.pid);
    let record = supervisor
        .process(pid)?
        .ok_or_else(|| anyhow!("no such process: {pid}"))?;
    let actions = supervisor.action_log(pid)?;
    print_json(&json!({
        "process": record,
        "actions": actions,
    }))
}
