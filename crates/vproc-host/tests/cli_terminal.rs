#[path = "helpers.rs"]
mod helpers;

use std::sync::Arc;

use async_trait::async_trait;
use helpers::*;
use vproc_host::{ProcessInfo, Program, ProgramContext, StartOptions, SupervisorError};
use vproc_kernel::{ManifestMetadata, Pid, ProcessStatus, ProgramManifest};

fn install_cli(h: &Harness, name: &str) -> Arc<TestProgram> {
    let program = Arc::new(TestProgram::new(name, h.log.clone()));
    h.install_with(
        name,
        ProgramManifest::new(format!("apps/{name}.js"))
            .with_metadata(ManifestMetadata::default().cli()),
        program.clone(),
    );
    program
}

async fn start_cli(h: &Harness, name: &str) -> (Pid, Pid) {
    let pid = h
        .supervisor
        .start_program(name, StartOptions::default())
        .await
        .expect("start cli program");
    let terminal = record(h, pid).terminal_pid.expect("paired terminal");
    (pid, terminal)
}

#[tokio::test]
async fn cli_program_gets_a_private_hidden_terminal() {
    let h = Harness::new();
    h.install_terminal();
    install_cli(&h, "top");

    let (pid, terminal) = start_cli(&h, "top").await;

    let rec = record(&h, pid);
    assert!(rec.is_cli);
    assert!(!rec.launched_from_terminal);
    let term = record(&h, terminal);
    assert!(term.is_cli_terminal);
    assert_eq!(term.status, ProcessStatus::Running);

    let terminal_init = h.log.position(&format!("init:terminal:{terminal}")).unwrap();
    let program_init = h.log.position(&format!("init:top:{pid}")).unwrap();
    assert!(terminal_init < program_init);

    let visible: Vec<Pid> = h
        .supervisor
        .visible_processes()
        .unwrap()
        .into_iter()
        .map(|r| r.pid)
        .collect();
    assert!(visible.contains(&pid));
    assert!(!visible.contains(&terminal));
    assert!(
        h.supervisor
            .get_running_processes()
            .unwrap()
            .iter()
            .any(|r| r.pid == terminal)
    );
}

#[tokio::test]
async fn killing_the_cli_program_closes_its_terminal_first() {
    let h = Harness::new();
    h.install_terminal();
    install_cli(&h, "top");
    let (pid, terminal) = start_cli(&h, "top").await;

    assert!(h.supervisor.kill_program(pid, false).await.expect("kill"));

    let program_exit = h.log.position(&format!("exit:top:{pid}")).unwrap();
    let terminal_exit = h.log.position(&format!("exit:terminal:{terminal}")).unwrap();
    let program_windows = h
        .log
        .position(&format!("release:window:{pid}:0"))
        .unwrap();
    assert!(program_exit < terminal_exit);
    assert!(terminal_exit < program_windows);
    assert_eq!(status(&h, terminal), ProcessStatus::Exited);
    assert_eq!(status(&h, pid), ProcessStatus::Exited);
}

#[tokio::test]
async fn closing_the_terminal_takes_the_cli_program_down() {
    let h = Harness::new();
    h.install_terminal();
    let program = install_cli(&h, "top");
    let (pid, terminal) = start_cli(&h, "top").await;

    assert!(h.supervisor.kill_program(terminal, false).await.expect("kill"));
    assert!(eventually(|| status(&h, pid) == ProcessStatus::Exited).await);
    assert_eq!(program.exit_count(), 1);
}

#[tokio::test]
async fn program_launched_from_a_terminal_leaves_it_running() {
    let h = Harness::new();
    h.install_terminal();
    install_cli(&h, "grep");

    let shell = h
        .supervisor
        .start_program("terminal", StartOptions::default())
        .await
        .expect("user terminal");
    let pid = h
        .supervisor
        .start_program("grep", StartOptions::default().from_terminal(shell))
        .await
        .expect("grep");

    let rec = record(&h, pid);
    assert!(rec.launched_from_terminal);
    assert_eq!(rec.terminal_pid, Some(shell));
    assert_eq!(h.log.matching("init:terminal:").len(), 1);

    h.supervisor.kill_program(pid, false).await.expect("kill");
    assert_eq!(status(&h, shell), ProcessStatus::Running);
}

#[tokio::test]
async fn user_terminal_can_run_next_to_private_ones() {
    let h = Harness::new();
    h.install_terminal();
    install_cli(&h, "top");
    start_cli(&h, "top").await;

    h.supervisor
        .start_program("terminal", StartOptions::default())
        .await
        .expect("private terminals do not count as instances");
}

#[tokio::test(start_paused = true)]
async fn terminal_that_never_gets_ready_fails_the_start() {
    let h = Harness::new();
    h.install_simple("terminal");
    install_cli(&h, "top");

    let err = h
        .supervisor
        .start_program("top", StartOptions::default())
        .await
        .expect_err("terminal timeout");
    let SupervisorError::TerminalTimeout { pid: terminal, .. } = err else {
        panic!("expected TerminalTimeout, got {err}");
    };

    assert_eq!(status(&h, terminal), ProcessStatus::Exited);
    let cli = h
        .supervisor
        .get_process_info(None)
        .map(|info| match info {
            vproc_host::ProcessInfo::All(records) => records,
            vproc_host::ProcessInfo::One(record) => vec![record],
        })
        .unwrap()
        .into_iter()
        .find(|r| r.name == "top")
        .expect("cli record kept");
    assert_eq!(cli.status, ProcessStatus::Exited);
    assert!(h.log.matching("init:top:").is_empty());
}

/// Terminal that becomes ready and then makes the store refuse the write
/// pairing it with its owner.
struct UnpairableTerminal {
    faults: Arc<FaultyStore>,
}

#[async_trait]
impl Program for UnpairableTerminal {
    async fn init(&self, ctx: ProgramContext) -> anyhow::Result<()> {
        // the terminal's own move to `running` is let through
        self.faults.fail_write_after(1);
        ctx.signal_ready();
        Ok(())
    }
}

#[tokio::test]
async fn terminal_is_closed_when_pairing_it_fails() {
    let h = Harness::new();
    h.install(
        "terminal",
        Arc::new(UnpairableTerminal {
            faults: h.faults.clone(),
        }),
    );
    install_cli(&h, "top");

    let err = h
        .supervisor
        .start_program("top", StartOptions::default())
        .await
        .expect_err("pairing write fails");
    assert!(matches!(err, SupervisorError::Kernel(_)));

    let ProcessInfo::All(records) = h.supervisor.get_process_info(None).unwrap() else {
        panic!("expected every record");
    };
    let terminal = records
        .iter()
        .find(|r| r.is_cli_terminal)
        .expect("terminal record kept for audit");
    assert_eq!(terminal.status, ProcessStatus::Exited);
    let owner = records.iter().find(|r| r.name == "top").expect("owner record");
    assert_eq!(owner.status, ProcessStatus::Exited);
    assert!(h.log.matching("init:top").is_empty());
    assert!(records.iter().all(|r| !r.is_running() || r.is_privileged));
}
