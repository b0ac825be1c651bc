//! Logging and auditing for the gateway
//!
//! Two append-only sinks live here:
//!
//! - the **human log**, a daily-rotated `gateway-YYYYMMDD.log` under the
//!   configured destination directory, in JSON or text format, filtered by
//!   a minimum level; Info and above are duplicated to the gateway's own
//!   stderr so an interactive operator sees them;
//! - the **audit trail**, one JSON object per line appended to a fixed
//!   path, recording every message either pump observed.
//!
//! File handles are opened per append. Appends to each file are
//! serialized, so concurrent pumps never interleave partial lines. Write
//! failures are reported on stderr and never abort a pump.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;

use crate::config::{Config, LogFormat, LogLevel};
use crate::error::Result;
use crate::parser::ParsedMessage;
use crate::scanner::{Direction, Violation};

/// ISO-8601 local time with microsecond precision.
fn timestamp() -> String {
    chrono::Local::now()
        .format("%Y-%m-%dT%H:%M:%S%.6f")
        .to_string()
}

/// Structured writer for the human log and the audit trail.
pub struct GatewayLogger {
    config: Arc<Config>,
    log_guard: Mutex<()>,
    audit_guard: Mutex<()>,
}

impl GatewayLogger {
    /// Build a logger and create the log/audit parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error when an enabled sink's directory cannot be
    /// created.
    pub fn new(config: Arc<Config>) -> Result<Self> {
        if config.logging.enabled {
            std::fs::create_dir_all(&config.logging.destination)?;
        }
        if config.auditing.enabled {
            if let Some(parent) = config.auditing.audit_log.parent() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(Self {
            config,
            log_guard: Mutex::new(()),
            audit_guard: Mutex::new(()),
        })
    }

    /// Path of today's log file. Computed per append, so a gateway running
    /// across midnight rotates automatically.
    fn current_log_file(&self) -> PathBuf {
        let day = chrono::Local::now().format("%Y%m%d");
        self.config
            .logging
            .destination
            .join(format!("gateway-{}.log", day))
    }

    /// Write one entry to the human log.
    ///
    /// Entries below the configured minimum level are discarded. Info and
    /// above are duplicated to stderr.
    pub fn log(&self, level: LogLevel, message: &str, fields: &[(&str, Value)]) {
        if !self.config.logging.enabled {
            return;
        }
        if level < self.config.logging.level {
            return;
        }

        let ts = timestamp();
        let line = match self.config.logging.format {
            LogFormat::Json => {
                let mut entry = serde_json::Map::new();
                entry.insert("timestamp".to_string(), Value::String(ts));
                entry.insert("level".to_string(), Value::String(level.as_str().to_string()));
                entry.insert("message".to_string(), Value::String(message.to_string()));
                for (key, value) in fields {
                    entry.insert((*key).to_string(), value.clone());
                }
                Value::Object(entry).to_string()
            }
            LogFormat::Text => {
                let mut line = format!("[{}] {}: {}", ts, level.as_str().to_uppercase(), message);
                for (key, value) in fields {
                    line.push_str(&format!(" {}={}", key, value));
                }
                line
            }
        };

        self.append_line(&self.log_guard, &self.current_log_file(), &line, "log file");

        if level >= LogLevel::Info {
            eprintln!("{}", line);
        }
    }

    /// Log a debug message.
    pub fn debug(&self, message: &str, fields: &[(&str, Value)]) {
        self.log(LogLevel::Debug, message, fields);
    }

    /// Log an info message.
    pub fn info(&self, message: &str, fields: &[(&str, Value)]) {
        self.log(LogLevel::Info, message, fields);
    }

    /// Log a warning message.
    pub fn warning(&self, message: &str, fields: &[(&str, Value)]) {
        self.log(LogLevel::Warning, message, fields);
    }

    /// Log an error message.
    pub fn error(&self, message: &str, fields: &[(&str, Value)]) {
        self.log(LogLevel::Error, message, fields);
    }

    /// Append one audit entry for an observed message.
    ///
    /// The entry is written before the message is forwarded or blocked,
    /// so per-direction audit order matches what the peer observed.
    pub fn audit(
        &self,
        direction: Direction,
        message: &ParsedMessage,
        server: &str,
        blocked: bool,
        violations: Option<&[Violation]>,
    ) {
        if !self.config.auditing.enabled {
            return;
        }

        let mut entry = serde_json::Map::new();
        if self.config.auditing.include_timestamps {
            entry.insert("timestamp".to_string(), Value::String(timestamp()));
        }
        entry.insert(
            "direction".to_string(),
            Value::String(direction.as_str().to_string()),
        );
        entry.insert("server".to_string(), Value::String(server.to_string()));
        entry.insert(
            "message_type".to_string(),
            Value::String(message.message_type.as_str().to_string()),
        );
        entry.insert(
            "message_id".to_string(),
            message.id.clone().unwrap_or(Value::Null),
        );
        entry.insert("blocked".to_string(), Value::Bool(blocked));

        if let Some(method) = &message.method {
            entry.insert("method".to_string(), Value::String(method.clone()));
        }
        if message.is_tool_call() {
            entry.insert(
                "tool".to_string(),
                message
                    .tool_name()
                    .map(|t| Value::String(t.to_string()))
                    .unwrap_or(Value::Null),
            );
        }
        if message.is_resource_read() {
            entry.insert(
                "resource_uri".to_string(),
                message
                    .resource_uri()
                    .map(|u| Value::String(u.to_string()))
                    .unwrap_or(Value::Null),
            );
        }

        if self.config.auditing.include_message_content {
            entry.insert(
                "params".to_string(),
                message.params.clone().unwrap_or(Value::Null),
            );
            entry.insert(
                "result".to_string(),
                message.result.clone().unwrap_or(Value::Null),
            );
            entry.insert(
                "error".to_string(),
                message
                    .error
                    .as_ref()
                    .and_then(|e| serde_json::to_value(e).ok())
                    .unwrap_or(Value::Null),
            );
        }

        if let Some(violations) = violations {
            if let Ok(value) = serde_json::to_value(violations) {
                entry.insert("violations".to_string(), value);
            }
        }

        let line = Value::Object(entry).to_string();
        self.append_line(&self.audit_guard, &self.config.auditing.audit_log, &line, "audit log");
    }

    /// Write the warning entry for one violation. The matched text is
    /// truncated to keep secrets out of the log in full.
    pub fn log_violation(
        &self,
        violation: &Violation,
        message: &ParsedMessage,
        direction: Direction,
    ) {
        self.warning(
            "Security violation detected",
            &[
                ("rule", Value::String(violation.rule_name.clone())),
                (
                    "severity",
                    Value::String(violation.severity.as_str().to_string()),
                ),
                (
                    "action",
                    Value::String(violation.action.as_str().to_string()),
                ),
                ("match", Value::String(truncate(&violation.matched, 50))),
                (
                    "direction",
                    Value::String(direction.as_str().to_string()),
                ),
                (
                    "method",
                    message
                        .method
                        .clone()
                        .map(Value::String)
                        .unwrap_or(Value::Null),
                ),
            ],
        );
    }

    /// Serialized append of one line; failures go to stderr only.
    fn append_line(&self, guard: &Mutex<()>, path: &Path, line: &str, context: &str) {
        let _lock = guard.lock().unwrap_or_else(PoisonError::into_inner);
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut file| writeln!(file, "{}", line));
        if let Err(e) = result {
            eprintln!("Error writing to {}: {}", context, e);
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max).collect();
        format!("{}...", head)
    }
}
