//! Programs compiled into the binary, exposed through the asset registry and
//! loader seams as if they were loaded from disk.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Result, bail};
use async_trait::async_trait;
use tracing::{debug, info};
use vproc_host::{
    AssetRegistry, ExitContext, Program, ProgramContext, ProgramInfo, ProgramLoader,
    ProgramRegistry,
};
use vproc_kernel::{ManifestMetadata, ProgramManifest, caps, canonical_name};

struct BuiltinProgram {
    name: &'static str,
    capabilities: &'static [&'static str],
    terminal_host: bool,
}

#[async_trait]
impl Program for BuiltinProgram {
    fn info(&self) -> ProgramInfo {
        ProgramInfo::with_capabilities(self.capabilities.iter().copied())
    }

    async fn init(&self, ctx: ProgramContext) -> Result<()> {
        info!("{} started as pid {}", self.name, ctx.pid);
        if self.terminal_host {
            ctx.signal_ready();
        }
        Ok(())
    }

    async fn exit(&self, ctx: ExitContext) -> Result<()> {
        info!("{} (pid {}) shutting down", self.name, ctx.pid);
        Ok(())
    }
}

struct Entry {
    name: String,
    manifest: ProgramManifest,
    program: Arc<dyn Program>,
}

pub struct Catalog {
    entries: Vec<Entry>,
}

impl Catalog {
    pub fn builtin() -> Self {
        let mut catalog = Catalog {
            entries: Vec::new(),
        };
        catalog.add(
            "terminal",
            ManifestMetadata::default().multi_instance(),
            BuiltinProgram {
                name: "terminal",
                capabilities: &[caps::WINDOWS],
                terminal_host: true,
            },
        );
        catalog.add(
            "dock",
            ManifestMetadata::default().auto_start(0),
            BuiltinProgram {
                name: "dock",
                capabilities: &[caps::WINDOWS, caps::DESKTOP_WIDGETS],
                terminal_host: false,
            },
        );
        catalog.add(
            "clock",
            ManifestMetadata::default().auto_start(10),
            BuiltinProgram {
                name: "clock",
                capabilities: &[caps::WINDOWS],
                terminal_host: false,
            },
        );
        catalog.add(
            "notes",
            ManifestMetadata::default().multi_instance(),
            BuiltinProgram {
                name: "notes",
                capabilities: &[caps::WINDOWS, caps::STORAGE, caps::NOTIFICATIONS],
                terminal_host: false,
            },
        );
        catalog.add(
            "top",
            ManifestMetadata::default().cli(),
            BuiltinProgram {
                name: "top",
                capabilities: &[caps::EVENTS],
                terminal_host: false,
            },
        );
        catalog
    }

    fn add(&mut self, name: &str, metadata: ManifestMetadata, program: BuiltinProgram) {
        self.entries.push(Entry {
            name: name.to_string(),
            manifest: ProgramManifest::new(format!("builtin/{name}.js"))
                .with_styles([format!("builtin/{name}.css")])
                .with_metadata(metadata),
            program: Arc::new(program),
        });
    }

    pub fn manifests(&self) -> Vec<(String, ProgramManifest)> {
        self.entries
            .iter()
            .map(|e| (e.name.clone(), e.manifest.clone()))
            .collect()
    }

    /// Register every entry point up front so exit hooks run for processes
    /// started by an earlier invocation.
    pub fn preload(&self, programs: &ProgramRegistry) {
        for entry in &self.entries {
            programs.register(canonical_name(&entry.name), entry.program.clone());
        }
    }

    pub fn into_parts(self) -> (BuiltinAssets, BuiltinLoader) {
        let manifests = self.manifests();
        let scripts = self
            .entries
            .into_iter()
            .map(|e| {
                (
                    e.manifest.script,
                    (canonical_name(&e.name), e.program),
                )
            })
            .collect();
        (BuiltinAssets { manifests }, BuiltinLoader { scripts })
    }
}

pub struct BuiltinAssets {
    manifests: Vec<(String, ProgramManifest)>,
}

#[async_trait]
impl AssetRegistry for BuiltinAssets {
    async fn resolve(&self, name: &str) -> Result<Option<ProgramManifest>> {
        Ok(self
            .manifests
            .iter()
            .find(|(candidate, _)| candidate == name)
            .map(|(_, manifest)| manifest.clone()))
    }

    async fn list(&self) -> Result<Vec<(String, ProgramManifest)>> {
        Ok(self.manifests.clone())
    }
}

pub struct BuiltinLoader {
    scripts: HashMap<String, (String, Arc<dyn Program>)>,
}

#[async_trait]
impl ProgramLoader for BuiltinLoader {
    async fn load_script(&self, script: &str, programs: Arc<ProgramRegistry>) -> Result<()> {
        let Some((canonical, program)) = self.scripts.get(script) else {
            bail!("no builtin script at {script}");
        };
        programs.register(canonical.clone(), program.clone());
        Ok(())
    }

    async fn load_style(&self, style: &str) -> Result<()> {
        debug!("style {style} applied");
        Ok(())
    }

    async fn load_asset(&self, asset: &str) -> Result<()> {
        debug!("asset {asset} cached");
        Ok(())
    }
}
