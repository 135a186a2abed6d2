//! `vproc kill` command.

use anyhow::Result;
use clap::Args;
use vproc_kernel::Pid;

use crate::commands::open_supervisor;
use crate::opts::GlobalOpts;
use crate::output::print_json;

#[derive(Args, Debug)]
pub struct KillArgs {
    pub pid: u64,

    /// Ignore a failing exit hook
    #[arg(long, short = 'f')]
    pub force: bool,
}

pub async fn cmd_kill(opts: &GlobalOpts, args: &KillArgs) -> Result<()> {
    let supervisor = open_supervisor(opts)?;
    let pid = Pid(args.pid);
    let killed = supervisor.kill_program(pid, args.force).await?;
    if opts.json {
        print_json(&serde_json::json!({ "pid": pid, "killed": killed }))
    } else {
        if killed {
            println!("killed {pid}");
        } else {
            println!("nothing to kill for {pid}");
        }
        Ok(())
    }
}
