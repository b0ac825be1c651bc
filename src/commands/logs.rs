//! The `logs` subcommand: view the most recent daily gateway log.

use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::Config;
use crate::error::Result;

/// Show the tail of the newest `gateway-*.log` file, optionally following
/// appended output (tail -f style).
pub async fn run(follow: bool, lines: usize) -> Result<()> {
    let config = Config::load_or_default()?;
    let log_dir = &config.logging.destination;

    if !log_dir.exists() {
        eprintln!("No logs found at: {}", log_dir.display());
        std::process::exit(1);
    }

    let mut log_files: Vec<PathBuf> = std::fs::read_dir(log_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with("gateway-") && n.ends_with(".log"))
                .unwrap_or(false)
        })
        .collect();
    log_files.sort();

    let Some(log_file) = log_files.pop() else {
        eprintln!("No log files found in: {}", log_dir.display());
        std::process::exit(1);
    };

    println!("Showing logs from: {}\n", log_file.display());

    let contents = std::fs::read_to_string(&log_file)?;
    let all: Vec<&str> = contents.lines().collect();
    let start = all.len().saturating_sub(lines);
    for line in &all[start..] {
        println!("{}", line);
    }

    if follow {
        let mut offset = contents.len() as u64;
        loop {
            tokio::time::sleep(Duration::from_millis(100)).await;
            let len = std::fs::metadata(&log_file)?.len();
            if len > offset {
                let mut file = std::fs::File::open(&log_file)?;
                file.seek(SeekFrom::Start(offset))?;
                let mut appended = String::new();
                file.read_to_string(&mut appended)?;
                offset += appended.len() as u64;
                print!("{}", appended);
                std::io::stdout().flush()?;
            }
        }
    }

    Ok(())
}
