#[path = "helpers.rs"]
mod helpers;

use std::sync::Arc;

use helpers::*;
use vproc_kernel::{ManifestMetadata, ProgramManifest};

fn auto(h: &Harness, name: &str, priority: i64, program: TestProgram) {
    h.install_with(
        name,
        ProgramManifest::new(format!("apps/{name}.js"))
            .with_metadata(ManifestMetadata::default().auto_start(priority)),
        Arc::new(program),
    );
}

#[tokio::test]
async fn auto_start_follows_priority_then_discovery_order() {
    let h = Harness::new();
    auto(&h, "dock", 5, TestProgram::new("dock", h.log.clone()));
    auto(&h, "wallpaper", 1, TestProgram::new("wallpaper", h.log.clone()));
    auto(&h, "clock", 1, TestProgram::new("clock", h.log.clone()));
    h.install_simple("notes");
    auto(
        &h,
        "updater",
        0,
        TestProgram::new("updater", h.log.clone()).failing_init("offline"),
    );

    let report = h.supervisor.start_auto_start_programs().await;

    let inits: Vec<String> = h
        .log
        .matching("init:")
        .into_iter()
        .map(|entry| entry.split(':').nth(1).unwrap_or_default().to_string())
        .collect();
    assert_eq!(inits, vec!["updater", "wallpaper", "clock", "dock"]);

    let started: Vec<&str> = report.started.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(started, vec!["wallpaper", "clock", "dock"]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "updater");
    assert!(h.log.matching("init:notes").is_empty());
}

#[tokio::test]
async fn nothing_to_auto_start() {
    let h = Harness::new();
    h.install_simple("notes");
    let report = h.supervisor.start_auto_start_programs().await;
    assert!(report.started.is_empty());
    assert!(report.failed.is_empty());
}
