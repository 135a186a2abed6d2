#[path = "helpers.rs"]
mod helpers;

use std::sync::Arc;

use helpers::*;
use serde_json::json;
use vproc_host::{ResourceHost, StartOptions, SupervisorError};
use vproc_kernel::{PRIVILEGED_PID, Pid, ProcessStatus, ResourceKind, caps};

async fn start(h: &Harness, program: TestProgram, name: &str) -> (Arc<TestProgram>, Pid) {
    let program = Arc::new(program);
    h.install(name, program.clone());
    let pid = h
        .supervisor
        .start_program(name, StartOptions::default())
        .await
        .expect("start");
    (program, pid)
}

#[tokio::test]
async fn cascade_runs_in_fixed_order_after_the_exit_hook() {
    let h = Harness::new();
    let (program, pid) = start(
        &h,
        TestProgram::new("paint", h.log.clone()).requesting([caps::WINDOWS, caps::EVENTS]),
        "paint",
    )
    .await;
    h.supervisor
        .call_kernel_api(pid, "window.create", vec![json!({ "title": "Paint" })])
        .await
        .expect("window");
    h.supervisor
        .call_kernel_api(pid, "event.subscribe", vec![json!("theme.changed")])
        .await
        .expect("subscribe");
    h.supervisor
        .allocate_memory(pid, Some(4096), None, Some("canvas".into()))
        .await
        .expect("memory");

    assert!(h.supervisor.kill_program(pid, false).await.expect("kill"));

    let expected: Vec<String> = [
        format!("exit:paint:{pid}"),
        format!("release:window:{pid}:1"),
        format!("release:context_menu:{pid}:0"),
        format!("release:desktop_widget:{pid}:0"),
        format!("release:drag_drop:{pid}:0"),
        format!("release:notification:{pid}:0"),
        format!("release:event_handler:{pid}:1"),
        format!("revoke:{pid}"),
        format!("release:background_task:{pid}:0"),
        format!("memory.free:{pid}"),
    ]
    .into();
    assert_eq!(log_from(&h.log, "exit:"), expected);
    assert_eq!(program.exit_count(), 1);

    let rec = record(&h, pid);
    assert_eq!(rec.status, ProcessStatus::Exited);
    assert!(rec.exit_time.is_some());
    assert!(rec.memory_refs.is_empty());
    assert!(rec.owned_resource_handles.is_empty());
    assert!(!h.permissions.holds(pid, caps::WINDOWS));
    assert_eq!(h.memory.allocations(pid), 0);
    assert_eq!(
        h.observer.events().last(),
        Some(&(pid, ProcessStatus::Exited))
    );
}

#[tokio::test]
async fn kill_from_inside_the_exit_hook_is_a_no_op() {
    let h = Harness::new();
    let (program, pid) = start(
        &h,
        TestProgram::new("looper", h.log.clone()).killing_self_on_exit(),
        "looper",
    )
    .await;

    assert!(h.supervisor.kill_program(pid, false).await.expect("kill"));
    assert_eq!(program.exit_count(), 1);
    assert_eq!(h.log.count("reentrant-kill:false"), 1);
    assert_eq!(h.log.count(&format!("memory.free:{pid}")), 1);
    assert_eq!(status(&h, pid), ProcessStatus::Exited);
}

#[tokio::test]
async fn failing_exit_hook_aborts_unless_forced() {
    let h = Harness::new();
    let (program, pid) = start(
        &h,
        TestProgram::new("stubborn", h.log.clone()).failing_exit("unsaved changes"),
        "stubborn",
    )
    .await;

    let err = h
        .supervisor
        .kill_program(pid, false)
        .await
        .expect_err("hook fails");
    assert!(matches!(err, SupervisorError::ExitHookFailed { pid: failed, .. } if failed == pid));
    assert_eq!(status(&h, pid), ProcessStatus::Exiting);
    assert!(h.log.matching("release:").is_empty());

    assert!(h.supervisor.kill_program(pid, true).await.expect("forced"));
    assert_eq!(status(&h, pid), ProcessStatus::Exited);
    assert_eq!(program.exit_count(), 2);
    assert_eq!(h.log.count(&format!("memory.free:{pid}")), 1);
}

#[tokio::test]
async fn forced_kill_swallows_hook_errors() {
    let h = Harness::new();
    let (_program, pid) = start(
        &h,
        TestProgram::new("stubborn", h.log.clone()).failing_exit("nope"),
        "stubborn",
    )
    .await;

    assert!(h.supervisor.kill_program(pid, true).await.expect("forced"));
    assert_eq!(status(&h, pid), ProcessStatus::Exited);
}

#[tokio::test]
async fn killing_unknown_or_exited_processes_does_nothing() {
    let h = Harness::new();
    assert!(!h.supervisor.kill_program(Pid(404), false).await.unwrap());

    let (program, pid) = start(&h, TestProgram::new("clock", h.log.clone()), "clock").await;
    assert!(h.supervisor.kill_program(pid, false).await.unwrap());
    h.log.clear();

    assert!(!h.supervisor.kill_program(pid, false).await.unwrap());
    assert!(!h.supervisor.kill_program(pid, true).await.unwrap());
    assert!(h.log.entries().is_empty());
    assert_eq!(program.exit_count(), 1);
}

#[tokio::test]
async fn exited_process_with_leftover_windows_is_cleaned_again() {
    let h = Harness::new();
    let (program, pid) = start(&h, TestProgram::new("viewer", h.log.clone()), "viewer").await;
    h.supervisor.kill_program(pid, false).await.expect("kill");
    h.log.clear();

    h.host(ResourceKind::Window).set_live(pid, 1);
    assert!(h.supervisor.kill_program(pid, false).await.expect("cleanup"));

    assert_eq!(program.exit_count(), 1, "hook does not run twice");
    assert!(h.log.position(&format!("release:window:{pid}:0")).is_some());
    assert_eq!(h.host(ResourceKind::Window).live_count(pid), 0);
    assert_eq!(status(&h, pid), ProcessStatus::Exited);
}

#[tokio::test]
async fn memory_free_failure_does_not_block_the_kill() {
    let h = Harness::new();
    let (_program, pid) = start(&h, TestProgram::new("clock", h.log.clone()), "clock").await;
    h.memory.fail_free(true);

    assert!(h.supervisor.kill_program(pid, false).await.expect("kill"));
    assert_eq!(status(&h, pid), ProcessStatus::Exited);
}

#[tokio::test]
async fn privileged_process_cannot_be_killed() {
    let h = Harness::new();
    let err = h
        .supervisor
        .kill_program(PRIVILEGED_PID, true)
        .await
        .expect_err("privileged");
    assert!(matches!(err, SupervisorError::InvalidArgument(_)));
    assert_eq!(status(&h, PRIVILEGED_PID), ProcessStatus::Running);
}

#[tokio::test]
async fn persistent_notifications_are_not_released_on_kill() {
    let h = Harness::new();
    let (_program, pid) = start(
        &h,
        TestProgram::new("mail", h.log.clone()).requesting([caps::NOTIFICATIONS]),
        "mail",
    )
    .await;
    h.supervisor
        .call_kernel_api(pid, "notification.show", vec![json!({ "text": "syncing" })])
        .await
        .expect("dependent notification");
    h.supervisor
        .call_kernel_api(
            pid,
            "notification.show",
            vec![json!({ "text": "3 new messages", "persistent": true })],
        )
        .await
        .expect("persistent notification");

    let owned: Vec<bool> = record(&h, pid)
        .owned_resource_handles
        .iter()
        .filter(|handle| handle.kind == ResourceKind::Notification)
        .map(|handle| handle.persistent)
        .collect();
    assert_eq!(owned.len(), 2);
    assert!(owned.contains(&true));

    assert!(h.supervisor.kill_program(pid, false).await.expect("kill"));
    assert_eq!(
        h.log.matching(&format!("release:notification:{pid}:")),
        vec![format!("release:notification:{pid}:1")]
    );
    assert_eq!(status(&h, pid), ProcessStatus::Exited);
}
