#[path = "helpers.rs"]
mod helpers;

use helpers::*;
use serde_json::json;
use vproc_host::{StartOptions, SupervisorError};
use vproc_kernel::{PRIVILEGED_PID, Pid, ResourceHandle, ResourceKind, caps};

async fn running(h: &Harness, name: &str) -> Pid {
    h.install_simple(name);
    h.supervisor
        .start_program(name, StartOptions::default())
        .await
        .expect("start")
}

#[tokio::test]
async fn denied_call_never_reaches_the_handler() {
    let h = Harness::new();
    let pid = running(&h, "editor").await;

    let err = h
        .supervisor
        .call_kernel_api(pid, "fs.write", vec![json!("/etc/passwd"), json!("x")])
        .await
        .expect_err("no fs.write grant");
    match err {
        SupervisorError::PermissionDenied {
            pid: denied,
            api,
            capability,
        } => {
            assert_eq!(denied, pid);
            assert_eq!(api, "fs.write");
            assert_eq!(capability, caps::FS_WRITE);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(h.api("fs.write").call_count(), 0);
    assert_eq!(h.permissions.check_count(), 1);
    let log = h.supervisor.action_log(pid).expect("log");
    assert_eq!(log.last().map(|e| e.action.as_str()), Some("api.denied"));
}

#[tokio::test]
async fn granted_call_dispatches_without_pid_for_plain_apis() {
    let h = Harness::new();
    let pid = running(&h, "reader").await;
    h.permissions.grant(pid, caps::FS_READ);

    let value = h
        .supervisor
        .call_kernel_api(pid, "fs.read", vec![json!("/docs/a.txt")])
        .await
        .expect("granted");
    assert_eq!(value["api"], json!("fs.read"));

    let calls = h.api("fs.read").calls();
    assert_eq!(calls, vec![(None, vec![json!("/docs/a.txt")])]);
    let log = h.supervisor.action_log(pid).expect("log");
    assert_eq!(log.last().map(|e| e.action.as_str()), Some("api:fs.read"));
}

#[tokio::test]
async fn resource_apis_receive_the_pid_and_attribute_handles() {
    let h = Harness::new();
    let pid = running(&h, "paint").await;
    h.permissions.grant(pid, caps::WINDOWS);
    h.permissions.grant(pid, caps::EVENTS);
    h.permissions.grant(pid, caps::MODULES);

    let window = h
        .supervisor
        .call_kernel_api(pid, "window.create", vec![json!({ "title": "Paint" })])
        .await
        .expect("window");
    h.supervisor
        .call_kernel_api(pid, "event.subscribe", vec![json!("theme.changed")])
        .await
        .expect("subscribe");
    h.supervisor
        .call_kernel_api(pid, "module.request", vec![json!("zip")])
        .await
        .expect("module");

    assert_eq!(h.api("window.create").calls()[0].0, Some(pid));
    assert_eq!(h.api("event.subscribe").calls()[0].0, Some(pid));

    let rec = record(&h, pid);
    let window_id = window.as_str().expect("window id");
    assert!(
        rec.owned_resource_handles
            .contains(&ResourceHandle::new(ResourceKind::Window, window_id))
    );
    assert!(
        rec.owned_resource_handles
            .iter()
            .any(|handle| handle.kind == ResourceKind::EventHandler)
    );
    assert_eq!(rec.requested_modules.len(), 1);
}

#[tokio::test]
async fn privileged_process_bypasses_capability_checks() {
    let h = Harness::new();
    h.supervisor
        .call_kernel_api(PRIVILEGED_PID, "fs.write", vec![json!("/boot.cfg")])
        .await
        .expect("privileged write");
    assert_eq!(h.permissions.check_count(), 0);
    assert_eq!(h.api("fs.write").call_count(), 1);
}

#[tokio::test]
async fn exited_process_cannot_call() {
    let h = Harness::new();
    let pid = running(&h, "clock").await;
    h.permissions.grant(pid, caps::FS_READ);
    h.supervisor.kill_program(pid, false).await.expect("kill");

    let err = h
        .supervisor
        .call_kernel_api(pid, "fs.read", vec![])
        .await
        .expect_err("exited");
    assert!(matches!(err, SupervisorError::NotRunning { status, .. } if status.is_terminal()));
    assert_eq!(h.api("fs.read").call_count(), 0);
}

#[tokio::test]
async fn unknown_pid_and_unknown_api_are_rejected() {
    let h = Harness::new();
    let pid = running(&h, "clock").await;

    let err = h
        .supervisor
        .call_kernel_api(Pid(999), "system.info", vec![])
        .await
        .expect_err("unknown pid");
    assert!(matches!(err, SupervisorError::NoSuchProcess(Pid(999))));

    let err = h
        .supervisor
        .call_kernel_api(pid, "bogus.api", vec![])
        .await
        .expect_err("unknown api");
    assert!(matches!(err, SupervisorError::UnknownApi(ref api) if api == "bogus.api"));
    assert_eq!(h.permissions.check_count(), 0);
}

#[tokio::test]
async fn apis_without_a_capability_skip_the_checker() {
    let h = Harness::new();
    let pid = running(&h, "clock").await;
    h.supervisor
        .call_kernel_api(pid, "system.time", vec![])
        .await
        .expect("no capability needed");
    assert_eq!(h.permissions.check_count(), 0);
}

#[tokio::test]
async fn checker_errors_fail_closed() {
    let h = Harness::new();
    let pid = running(&h, "editor").await;
    h.permissions.grant(pid, caps::FS_READ);
    h.permissions.fail_checks(true);

    let err = h
        .supervisor
        .call_kernel_api(pid, "fs.read", vec![])
        .await
        .expect_err("checker down");
    assert!(matches!(err, SupervisorError::PermissionDenied { .. }));
    assert_eq!(h.api("fs.read").call_count(), 0);
}

#[tokio::test]
async fn without_a_checker_calls_are_allowed() {
    let h = Harness::without_checker();
    let pid = running(&h, "editor").await;

    h.supervisor
        .call_kernel_api(pid, "fs.write", vec![json!("/tmp/x")])
        .await
        .expect("fail-open");
    assert_eq!(h.api("fs.write").call_count(), 1);
}

#[tokio::test]
async fn handler_errors_are_wrapped_with_the_api_name() {
    let h = Harness::new().with_api(
        "net.fetch",
        RecordingApi::failing("net.fetch", "connection refused"),
    );
    let pid = running(&h, "browser").await;
    h.permissions.grant(pid, caps::NETWORK);

    let err = h
        .supervisor
        .call_kernel_api(pid, "net.fetch", vec![json!("https://example.com")])
        .await
        .expect_err("handler fails");
    let SupervisorError::Api { api, source } = err else {
        panic!("expected Api error");
    };
    assert_eq!(api, "net.fetch");
    assert!(source.to_string().contains("connection refused"));
}

#[tokio::test]
async fn custom_apis_need_no_capability() {
    let h = Harness::new().with_api("shell.echo", RecordingApi::new("shell.echo"));
    let pid = running(&h, "shell").await;

    let value = h
        .supervisor
        .call_kernel_api(pid, "shell.echo", vec![json!("hi")])
        .await
        .expect("custom api");
    assert_eq!(value["api"], json!("shell.echo"));
    assert_eq!(h.permissions.check_count(), 0);
}
