//! `vproc ps` command.

use anyhow::Result;
use clap::Args;
use vproc_host::ProcessInfo;

use crate::commands::open_supervisor;
use crate::opts::GlobalOpts;
use crate::output::print_records;

#[derive(Args, Debug)]
pub struct PsArgs {
    /// Include exited processes and terminal hosts
    #[arg(long, short = 'a')]
    pub all: bool,
}

pub fn cmd_ps(opts: &GlobalOpts, args: &PsArgs) -> Result<()> {
    let supervisor = open_supervisor(opts)?;
    let records = if args.all {
        match supervisor.get_process_info(None)? {
            ProcessInfo::All(records) => records,
            ProcessInfo::One(record) => vec![record],
        }
    } else {
        supervisor.visible_processes()?
    };
    print_records(opts, &records)
}
