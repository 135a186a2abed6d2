//! Global CLI options.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use vproc_host::SupervisorConfig;

#[derive(Args, Debug, Clone)]
pub struct GlobalOpts {
    /// Directory holding the persisted process table (env: VPROC_STATE_DIR)
    #[arg(short = 's', long, global = true, env = "VPROC_STATE_DIR", default_value = ".")]
    pub state_dir: PathBuf,

    /// How long a loaded program may take to register, in milliseconds (env: VPROC_LOAD_TIMEOUT_MS)
    #[arg(long, global = true, env = "VPROC_LOAD_TIMEOUT_MS")]
    pub load_timeout_ms: Option<u64>,

    /// JSON output
    #[arg(long, global = true)]
    pub json: bool,
}

impl GlobalOpts {
    pub fn supervisor_config(&self) -> SupervisorConfig {
        let config = SupervisorConfig::from_env();
        match self.load_timeout_ms {
            Some(ms) => config.with_load_timeout(Duration::from_millis(ms)),
            None => config,
        }
    }
}
