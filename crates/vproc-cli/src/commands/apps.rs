//! `vproc apps` command.

use anyhow::Result;
use serde_json::{Value, json};

use crate::catalog::Catalog;
use crate::opts::GlobalOpts;
use crate::output::print_json;

pub fn cmd_apps(opts: &GlobalOpts) -> Result<()> {
    let manifests = Catalog::builtin().manifests();
    if opts.json {
        let rows: Vec<Value> = manifests
            .iter()
            .map(|(name, manifest)| json!({ "name": name, "manifest": manifest }))
            .collect();
        return print_json(&json!({ "apps": rows }));
    }
    for (name, manifest) in &manifests {
        let meta = &manifest.metadata;
        let mut notes = Vec::new();
        if meta.auto_start {
            notes.push(format!("auto-start@{}", meta.priority));
        }
        if meta.allow_multiple_instances {
            notes.push("multi".to_string());
        }
        if meta.cli {
            notes.push("cli".to_string());
        }
        println!("{name:<12} {:<24} {}", manifest.script, notes.join(","));
    }
    Ok(())
}
