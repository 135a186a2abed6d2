//! CLI command handlers.

pub mod apps;
pub mod call;
pub mod inspect;
pub mod kill;
pub mod ps;
pub mod run;

use std::sync::Arc;

use anyhow::{Context, Result};
use vproc_host::{ProgramRegistry, Supervisor, SupervisorBuilder};
use vproc_store::{DynKvStore, FsKvStore};

use crate::catalog::Catalog;
use crate::desktop::{self, StoreGrants};
use crate::opts::GlobalOpts;

/// Build a supervisor over the state directory, reloading whatever an earlier
/// invocation persisted.
pub fn open_supervisor(opts: &GlobalOpts) -> Result<Arc<Supervisor>> {
    let store: DynKvStore = Arc::new(
        FsKvStore::open(&opts.state_dir)
            .with_context(|| format!("open state dir {}", opts.state_dir.display()))?,
    );

    let catalog = Catalog::builtin();
    let programs = Arc::new(ProgramRegistry::new());
    catalog.preload(&programs);
    let (assets, loader) = catalog.into_parts();

    let builder = SupervisorBuilder::new(store.clone(), Arc::new(assets), Arc::new(loader))
        .config(opts.supervisor_config())
        .programs(programs)
        .capability_checker(Arc::new(StoreGrants::new(store)));
    let supervisor = desktop::install(builder).build()?;
    supervisor.bootstrap()?;
    Ok(supervisor)
}

/// Parse a CLI argument as JSON, falling back to a plain string.
pub fn parse_arg(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn args_fall_back_to_strings() {
        assert_eq!(parse_arg("42"), json!(42));
        assert_eq!(parse_arg("{\"title\":\"x\"}"), json!({"title": "x"}));
        assert_eq!(parse_arg("hello"), json!("hello"));
    }
}
