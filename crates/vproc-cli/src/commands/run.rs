//! `vproc run` command.

use anyhow::{Result, bail};
use clap::Args;
use serde_json::{Value, json};
use tracing::info;
use vproc_host::StartOptions;

use crate::commands::{open_supervisor, parse_arg};
use crate::opts::GlobalOpts;
use crate::output::print_json;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Programs to start after the auto-start set
    pub programs: Vec<String>,

    /// Skip auto-start programs
    #[arg(long)]
    pub no_autostart: bool,

    /// Argument passed to every named program (JSON or plain string)
    #[arg(long)]
    pub arg: Option<String>,
}

pub async fn cmd_run(opts: &GlobalOpts, args: &RunArgs) -> Result<()> {
    let supervisor = open_supervisor(opts)?;

    let mut started: Vec<(String, u64)> = Vec::new();
    let mut failed: Vec<(String, String)> = Vec::new();

    if !args.no_autostart {
        let report = supervisor.start_auto_start_programs().await;
        started.extend(report.started.into_iter().map(|(name, pid)| (name, pid.get())));
        failed.extend(
            report
                .failed
                .into_iter()
                .map(|(name, err)| (name, err.to_string())),
        );
    }

    let mut named_failures = 0;
    for name in &args.programs {
        let mut options = StartOptions::default();
        if let Some(raw) = &args.arg {
            options = options.with_args(parse_arg(raw));
        }
        match supervisor.start_program(name, options).await {
            Ok(pid) => {
                info!("started {name} as pid {pid}");
                started.push((name.clone(), pid.get()));
            }
            Err(err) => {
                named_failures += 1;
                failed.push((name.clone(), err.to_string()));
            }
        }
    }

    if opts.json {
        let started: Vec<Value> = started
            .iter()
            .map(|(name, pid)| json!({ "name": name, "pid": pid }))
            .collect();
        let failed: Vec<Value> = failed
            .iter()
            .map(|(name, error)| json!({ "name": name, "error": error }))
            .collect();
        print_json(&json!({ "started": started, "failed": failed }))?;
    } else {
        for (name, pid) in &started {
            println!("started {name} (pid {pid})");
        }
        for (name, error) in &failed {
            println!("failed {name}: {error}");
        }
    }

    if named_failures > 0 {
        bail!("{named_failures} program(s) failed to start");
    }
    Ok(())
}
