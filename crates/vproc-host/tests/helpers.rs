//! Shared helpers for the supervisor integration tests.
//!
//! Each integration test compiles this module separately, so some helpers may
//! look unused from any single file.

#![allow(dead_code)]

use std::time::Duration;

pub use vproc_host::fixtures::*;
use vproc_kernel::{Pid, ProcessRecord, ProcessStatus};

pub fn record(h: &Harness, pid: Pid) -> ProcessRecord {
    h.supervisor
        .process(pid)
        .expect("read process table")
        .unwrap_or_else(|| panic!("no record for pid {pid}"))
}

pub fn status(h: &Harness, pid: Pid) -> ProcessStatus {
    record(h, pid).status
}

/// Poll `cond` while letting spawned tasks run.
pub async fn eventually(mut cond: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    cond()
}

/// Log entries from the first one starting with `prefix` onwards.
pub fn log_from(log: &CallLog, prefix: &str) -> Vec<String> {
    log.entries()
        .into_iter()
        .skip_while(|entry| !entry.starts_with(prefix))
        .collect()
}
