//! Human and JSON renderings of process records.

use anyhow::Result;
use serde_json::{Value, json};
use vproc_kernel::ProcessRecord;

use crate::opts::GlobalOpts;

pub fn print_json(data: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(data)?);
    Ok(())
}

pub fn print_records(opts: &GlobalOpts, records: &[ProcessRecord]) -> Result<()> {
    if opts.json {
        let rows: Vec<Value> = records.iter().map(summary).collect();
        return print_json(&json!({ "processes": rows }));
    }
    println!("{:>5}  {:<9}  {:<16}  FLAGS", "PID", "STATUS", "NAME");
    for record in records {
        println!(
            "{:>5}  {:<9}  {:<16}  {}",
            record.pid,
            record.status,
            record.name,
            flags(record)
        );
    }
    Ok(())
}

pub fn summary(record: &ProcessRecord) -> Value {
    json!({
        "pid": record.pid,
        "name": record.name,
        "status": record.status,
        "privileged": record.is_privileged,
        "terminalPid": record.terminal_pid,
        "cliTerminal": record.is_cli_terminal,
    })
}

fn flags(record: &ProcessRecord) -> String {
    let mut flags = Vec::new();
    if record.is_privileged {
        flags.push("privileged".to_string());
    }
    if record.is_cli {
        flags.push("cli".to_string());
    }
    if record.is_cli_terminal {
        flags.push("terminal-host".to_string());
    }
    if let Some(terminal) = record.terminal_pid {
        flags.push(format!("tty={terminal}"));
    }
    flags.join(",")
}
