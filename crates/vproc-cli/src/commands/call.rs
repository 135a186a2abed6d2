//! `vproc call` command.

use anyhow::Result;
use clap::Args;
use vproc_kernel::Pid;

use crate::commands::{open_supervisor, parse_arg};
use crate::opts::GlobalOpts;
use crate::output::print_json;

#[derive(Args, Debug)]
pub struct CallArgs {
    /// Calling process
    pub pid: u64,

    /// API name, e.g. window.create
    pub api: String,

    /// Arguments (each JSON or a plain string)
    pub args: Vec<String>,
}

pub async fn cmd_call(opts: &GlobalOpts, args: &CallArgs) -> Result<()> {
    let supervisor = open_supervisor(opts)?;
    let values = args.args.iter().map(|raw| parse_arg(raw)).collect();
    let result = supervisor
        .call_kernel_api(Pid(args.pid), &args.api, values)
        .await?;
    print_json(&result)
}
