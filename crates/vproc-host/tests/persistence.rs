#[path = "helpers.rs"]
mod helpers;

use helpers::*;
use serde_json::json;
use vproc_host::{ProcessInfo, StartOptions};
use vproc_kernel::{PRIVILEGED_PID, PROCESS_TABLE_KEY, ProcessStatus, ResourceKind, caps};
use vproc_store::KvStore;

#[tokio::test]
async fn restart_restores_records_but_not_live_handles() {
    let h = Harness::new();
    h.install_simple("paint");
    h.install_simple("clock");
    let paint = h
        .supervisor
        .start_program("paint", StartOptions::default())
        .await
        .expect("paint");
    let clock = h
        .supervisor
        .start_program("clock", StartOptions::default())
        .await
        .expect("clock");
    h.permissions.grant(paint, caps::WINDOWS);
    h.supervisor
        .call_kernel_api(paint, "window.create", vec![json!({ "title": "Paint" })])
        .await
        .expect("window");
    let canvas = h
        .supervisor
        .allocate_memory(paint, None, None, Some("canvas".into()))
        .await
        .expect("memory");
    h.supervisor.kill_program(clock, false).await.expect("kill");
    let before = record(&h, paint);

    let restarted = h.rebuild();
    let after = restarted
        .process(paint)
        .expect("read")
        .expect("paint survives restart");

    assert_eq!(after.name, before.name);
    assert_eq!(after.status, ProcessStatus::Running);
    assert_eq!(after.start_time, before.start_time);
    assert_eq!(after.memory_refs.get("canvas"), Some(&canvas));
    assert!(after.owned_resource_handles.is_empty());
    assert!(
        before
            .owned_resource_handles
            .iter()
            .any(|handle| handle.kind == ResourceKind::Window)
    );

    let clock_after = restarted.process(clock).unwrap().expect("exited record kept");
    assert_eq!(clock_after.status, ProcessStatus::Exited);
    assert!(clock_after.exit_time.is_some());
}

#[tokio::test]
async fn pid_counter_continues_after_restart() {
    let h = Harness::new();
    h.install_simple("clock");
    h.install_simple("notes");
    let clock = h
        .supervisor
        .start_program("clock", StartOptions::default())
        .await
        .expect("clock");

    let restarted = h.rebuild();
    let notes = restarted
        .start_program("notes", StartOptions::default())
        .await
        .expect("notes");
    assert!(notes > clock);
}

#[tokio::test]
async fn privileged_record_is_inserted_once() {
    let h = Harness::new();
    let restarted = h.rebuild();
    assert_eq!(restarted.bootstrap().expect("bootstrap"), PRIVILEGED_PID);

    let ProcessInfo::All(records) = restarted.get_process_info(None).expect("all") else {
        panic!("expected every record");
    };
    assert_eq!(records.iter().filter(|r| r.is_privileged).count(), 1);
    assert!(h.store.get(PROCESS_TABLE_KEY).expect("store").is_some());
}

#[tokio::test]
async fn reload_drops_cached_handles() {
    let h = Harness::new();
    h.install_simple("paint");
    let pid = h
        .supervisor
        .start_program("paint", StartOptions::default())
        .await
        .expect("paint");
    h.permissions.grant(pid, caps::WINDOWS);
    h.supervisor
        .call_kernel_api(pid, "window.create", vec![])
        .await
        .expect("window");
    assert!(!record(&h, pid).owned_resource_handles.is_empty());

    assert_eq!(h.supervisor.reload().expect("reload"), 2);
    assert!(record(&h, pid).owned_resource_handles.is_empty());
    assert_eq!(status(&h, pid), ProcessStatus::Running);
}

#[tokio::test]
async fn process_info_for_one_pid() {
    let h = Harness::new();
    let ProcessInfo::One(rec) = h
        .supervisor
        .get_process_info(Some(PRIVILEGED_PID))
        .expect("privileged")
    else {
        panic!("expected one record");
    };
    assert_eq!(rec.name, "bootstrap");
    assert!(
        h.supervisor
            .get_process_info(Some(vproc_kernel::Pid(77)))
            .is_err()
    );
}
