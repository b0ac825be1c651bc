//! The `audit` subcommand: view the JSONL audit trail.

use serde_json::Value;

use crate::config::Config;
use crate::error::Result;

/// Show the tail of the audit log, optionally filtered by server name or
/// JSON-RPC method, optionally pretty-printed.
pub fn run(
    server: Option<&str>,
    method: Option<&str>,
    lines: usize,
    pretty: bool,
) -> Result<()> {
    let config = Config::load_or_default()?;
    let audit_log = &config.auditing.audit_log;

    if !audit_log.exists() {
        eprintln!("No audit log found at: {}", audit_log.display());
        std::process::exit(1);
    }

    println!("Showing audit log from: {}\n", audit_log.display());

    let contents = std::fs::read_to_string(audit_log)?;
    let mut entries: Vec<&str> = contents.lines().collect();

    if server.is_some() || method.is_some() {
        entries.retain(|line| match serde_json::from_str::<Value>(line) {
            Ok(entry) => {
                server.map_or(true, |s| entry.get("server").and_then(Value::as_str) == Some(s))
                    && method
                        .map_or(true, |m| entry.get("method").and_then(Value::as_str) == Some(m))
            }
            Err(_) => false,
        });
    }

    let start = entries.len().saturating_sub(lines);
    for line in &entries[start..] {
        if pretty {
            match serde_json::from_str::<Value>(line) {
                Ok(entry) => {
                    println!("{}", serde_json::to_string_pretty(&entry)?);
                    println!("{}", "-".repeat(80));
                }
                Err(_) => println!("{}", line),
            }
        } else {
            println!("{}", line);
        }
    }

    Ok(())
}
