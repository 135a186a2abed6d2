mod catalog;
mod commands;
mod desktop;
mod opts;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::call::CallArgs;
use commands::inspect::InspectArgs;
use commands::kill::KillArgs;
use commands::ps::PsArgs;
use commands::run::RunArgs;
use opts::GlobalOpts;

#[derive(Parser, Debug)]
#[command(name = "vproc", version, about = "Virtual process supervisor")]
struct Cli {
    #[command(flatten)]
    opts: GlobalOpts,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Bootstrap, start auto-start programs, then the named programs
    Run(RunArgs),

    /// List processes
    Ps(PsArgs),

    /// Show one process record and its action log
    Inspect(InspectArgs),

    /// Terminate a process
    Kill(KillArgs),

    /// Invoke a kernel API on behalf of a process
    Call(CallArgs),

    /// List installed programs
    Apps,
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging();
    let cli = Cli::parse();
    let opts = &cli.opts;

    match cli.command {
        Command::Run(args) => commands::run::cmd_run(opts, &args).await,
        Command::Ps(args) => commands::ps::cmd_ps(opts, &args),
        Command::Inspect(args) => commands::inspect::cmd_inspect(opts, &args),
        Command::Kill(args) => commands::kill::cmd_kill(opts, &args).await,
        Command::Call(args) => commands::call::cmd_call(opts, &args).await,
        Command::Apps => commands::apps::cmd_apps(opts),
    }
}

fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
