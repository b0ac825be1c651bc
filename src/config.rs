//! Configuration management for the MCP gateway
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from the on-disk JSON file and `MCP_GATEWAY_`-prefixed
//! environment variable overrides. The configuration is immutable after
//! load and is shared read-only by every other component.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, Result};

/// Prefix for environment variable overrides, e.g.
/// `MCP_GATEWAY_LOGGING__LEVEL=debug`.
const ENV_PREFIX: &str = "MCP_GATEWAY_";

/// Main configuration structure for the gateway
///
/// Each subsection maps to one component: logging, auditing, scanning,
/// alerting, and metrics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Human log configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Audit trail configuration
    #[serde(default)]
    pub auditing: AuditConfig,

    /// Security scanning configuration
    #[serde(default)]
    pub scanning: ScanningConfig,

    /// Alert dispatch configuration
    #[serde(default)]
    pub alerting: AlertingConfig,

    /// Metrics collection configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Logging levels, lowest to highest severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Verbose diagnostics, file-only
    Debug,
    /// Operational messages, duplicated to stderr
    Info,
    /// Security violations and recoverable failures
    Warning,
    /// Component failures
    Error,
}

impl LogLevel {
    /// Lowercase wire/display form of the level.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// On-disk log entry encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line
    Json,
    /// `[timestamp] LEVEL: message k=v ...`
    Text,
}

/// Actions to take when a scan rule matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    /// Record the violation only
    Log,
    /// Record and dispatch an alert
    Alert,
    /// Block the message and synthesize an error response
    Block,
    /// Replace the matched text before forwarding
    Redact,
}

impl ActionType {
    /// Lowercase wire/display form of the action.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Log => "log",
            ActionType::Alert => "alert",
            ActionType::Block => "block",
            ActionType::Redact => "redact",
        }
    }
}

/// Severity levels for security findings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Lowercase wire/display form of the severity.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

/// Human log configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Master switch for the human log
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Directory that receives the daily `gateway-YYYYMMDD.log` files.
    /// A leading `~` expands to the invoking user's home directory.
    #[serde(default = "default_log_destination")]
    pub destination: PathBuf,

    /// Minimum level written to the log file
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// Log file encoding
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
}

fn default_true() -> bool {
    true
}

fn default_log_destination() -> PathBuf {
    gateway_home().join("logs")
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

fn default_log_format() -> LogFormat {
    LogFormat::Json
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            destination: default_log_destination(),
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Audit trail configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Master switch for the audit trail
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Path of the JSON-lines audit file. A leading `~` expands to the
    /// invoking user's home directory.
    #[serde(default = "default_audit_log")]
    pub audit_log: PathBuf,

    /// When set, audit entries carry the message's params/result/error
    #[serde(default = "default_true")]
    pub include_message_content: bool,

    /// When set, audit entries carry an ISO-8601 timestamp
    #[serde(default = "default_true")]
    pub include_timestamps: bool,
}

fn default_audit_log() -> PathBuf {
    gateway_home().join("audit.jsonl")
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            audit_log: default_audit_log(),
            include_message_content: true,
            include_timestamps: true,
        }
    }
}

/// One security scanning rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRule {
    /// Unique rule name, used in logs, metrics, and redaction placeholders
    pub name: String,

    /// Human description carried into violation reports
    #[serde(default)]
    pub description: String,

    /// Regular expression source; compiled case-insensitively
    pub pattern: String,

    /// What to do when the pattern matches
    #[serde(default = "default_action")]
    pub action: ActionType,

    /// How serious a match is
    #[serde(default = "default_severity")]
    pub severity: Severity,

    /// Disabled rules are skipped at compile time
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_action() -> ActionType {
    ActionType::Log
}

fn default_severity() -> Severity {
    Severity::Medium
}

/// Security scanning configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanningConfig {
    /// Master switch; when off, every scan returns an empty result
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Ordered rule list; order determines violation reporting order
    #[serde(default)]
    pub rules: Vec<ScanRule>,

    /// Scan client->server messages
    #[serde(default = "default_true")]
    pub scan_request: bool,

    /// Scan server->client messages
    #[serde(default = "default_true")]
    pub scan_response: bool,
}

impl Default for ScanningConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rules: Vec::new(),
            scan_request: true,
            scan_response: true,
        }
    }
}

/// Alert dispatch configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertingConfig {
    /// Master switch; alerting is off by default
    #[serde(default)]
    pub enabled: bool,

    /// When set, violation alerts are POSTed here as JSON
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// When set, violation alerts are handed to the email backend
    #[serde(default)]
    pub email: Option<String>,
}

/// Metrics collection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Master switch; controls the shutdown summary
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Accumulate per-line processing latency
    #[serde(default = "default_true")]
    pub collect_latency: bool,

    /// Count messages by direction, type, and tool
    #[serde(default = "default_true")]
    pub collect_message_counts: bool,

    /// Count violations by rule and blocked messages
    #[serde(default = "default_true")]
    pub collect_violation_counts: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            collect_latency: true,
            collect_message_counts: true,
            collect_violation_counts: true,
        }
    }
}

/// Returns `~/.mcp-gateway`, falling back to a relative path when the home
/// directory cannot be determined (e.g. stripped-down containers).
fn gateway_home() -> PathBuf {
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().join(".mcp-gateway"))
        .unwrap_or_else(|| PathBuf::from(".mcp-gateway"))
}

/// Expands a leading `~` or `~/` in `path` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
    let Some(s) = path.to_str() else {
        return path.to_path_buf();
    };
    if s == "~" {
        if let Some(dirs) = directories::BaseDirs::new() {
            return dirs.home_dir().to_path_buf();
        }
    } else if let Some(rest) = s.strip_prefix("~/") {
        if let Some(dirs) = directories::BaseDirs::new() {
            return dirs.home_dir().join(rest);
        }
    }
    path.to_path_buf()
}

impl Config {
    /// Load configuration from a JSON file, applying `MCP_GATEWAY_`
    /// environment overrides and `~` expansion.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] when the file cannot be read or the
    /// JSON does not match the schema.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            GatewayError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let value: serde_json::Value = serde_json::from_str(&raw).map_err(|e| {
            GatewayError::Config(format!("invalid JSON in {}: {}", path.display(), e))
        })?;
        Self::from_value(value)
    }

    /// Load configuration from the default path, or fall back to built-in
    /// defaults when no file exists.
    pub fn load_or_default() -> Result<Self> {
        let path = Self::default_config_path();
        if path.exists() {
            Self::load_from_file(&path)
        } else {
            Self::from_value(serde_json::Value::Object(serde_json::Map::new()))
        }
    }

    /// The default configuration file path, `~/.mcp-gateway/config.json`.
    pub fn default_config_path() -> PathBuf {
        gateway_home().join("config.json")
    }

    /// Finalize a raw JSON value into a `Config`: apply environment
    /// overrides, deserialize, then expand `~` in path fields.
    fn from_value(mut value: serde_json::Value) -> Result<Self> {
        apply_env_overrides(&mut value, std::env::vars());
        let mut config: Config = serde_json::from_value(value)
            .map_err(|e| GatewayError::Config(format!("invalid configuration: {}", e)))?;
        config.logging.destination = expand_tilde(&config.logging.destination);
        config.auditing.audit_log = expand_tilde(&config.auditing.audit_log);
        Ok(config)
    }

    /// Validate semantic constraints the schema cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] for empty rule names, duplicate rule
    /// names, or a webhook URL that is not http(s).
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for rule in &self.scanning.rules {
            if rule.name.trim().is_empty() {
                return Err(GatewayError::Config("scan rule with empty name".into()).into());
            }
            if !seen.insert(rule.name.as_str()) {
                return Err(GatewayError::Config(format!(
                    "duplicate scan rule name: {}",
                    rule.name
                ))
                .into());
            }
        }
        if let Some(url) = &self.alerting.webhook_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(GatewayError::Config(format!(
                    "webhook_url must be http(s), got: {}",
                    url
                ))
                .into());
            }
        }
        Ok(())
    }
}

/// Overlay `MCP_GATEWAY_`-prefixed environment variables onto a raw config
/// value before deserialization.
///
/// The variable name after the prefix dots into subfields with `__`, e.g.
/// `MCP_GATEWAY_LOGGING__LEVEL=debug` sets `logging.level`. Values are
/// parsed as JSON when possible (numbers, booleans, objects) and fall back
/// to plain strings.
fn apply_env_overrides(
    value: &mut serde_json::Value,
    vars: impl Iterator<Item = (String, String)>,
) {
    for (key, raw) in vars {
        let Some(path) = key.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let segments: Vec<String> = path.split("__").map(|s| s.to_lowercase()).collect();
        if segments.is_empty() || segments.iter().any(|s| s.is_empty()) {
            continue;
        }

        let parsed: serde_json::Value = serde_json::from_str(&raw)
            .unwrap_or_else(|_| serde_json::Value::String(raw.clone()));

        let mut cursor = &mut *value;
        for segment in &segments[..segments.len() - 1] {
            cursor = ensure_object(cursor)
                .entry(segment.clone())
                .or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()));
        }
        ensure_object(cursor).insert(segments[segments.len() - 1].clone(), parsed);
    }
}

/// Coerce a JSON value to an object in place and return the map.
fn ensure_object(value: &mut serde_json::Value) -> &mut serde_json::Map<String, serde_json::Value> {
    if !value.is_object() {
        *value = serde_json::Value::Object(serde_json::Map::new());
    }
    match value {
        serde_json::Value::Object(map) => map,
        _ => unreachable!("value was just coerced to an object"),
    }
}

/// The built-in security scanning rules written by `config init`.
///
/// The list is plain configuration: users may edit, disable, or replace any
/// of these rules after initialization.
pub fn default_scan_rules() -> Vec<ScanRule> {
    fn rule(
        name: &str,
        description: &str,
        pattern: &str,
        action: ActionType,
        severity: Severity,
    ) -> ScanRule {
        ScanRule {
            name: name.to_string(),
            description: description.to_string(),
            pattern: pattern.to_string(),
            action,
            severity,
            enabled: true,
        }
    }

    vec![
        rule(
            "openai-api-key",
            "OpenAI API key",
            r"sk-[a-zA-Z0-9]{32,}",
            ActionType::Alert,
            Severity::Critical,
        ),
        rule(
            "aws-access-key",
            "AWS Access Key ID",
            r"AKIA[0-9A-Z]{16}",
            ActionType::Block,
            Severity::Critical,
        ),
        rule(
            "aws-secret-key",
            "AWS Secret Access Key",
            r#"aws_secret_access_key\s*=\s*['"]?([a-zA-Z0-9/+=]{40})['"]?"#,
            ActionType::Block,
            Severity::Critical,
        ),
        rule(
            "private-key",
            "Private key (RSA, EC, OpenSSH)",
            r"-----BEGIN (RSA |EC |OPENSSH )?PRIVATE KEY-----",
            ActionType::Block,
            Severity::Critical,
        ),
        rule(
            "github-token",
            "GitHub personal access token",
            r"gh[ps]_[a-zA-Z0-9]{36,}",
            ActionType::Alert,
            Severity::High,
        ),
        rule(
            "jwt-token",
            "JWT token",
            r"eyJ[a-zA-Z0-9_-]+\.eyJ[a-zA-Z0-9_-]+\.[a-zA-Z0-9_-]+",
            ActionType::Alert,
            Severity::Medium,
        ),
        rule(
            "context7-api-key",
            "Context7 API key",
            r"ctx7sk-[a-zA-Z0-9-]{32,}",
            ActionType::Alert,
            Severity::High,
        ),
        rule(
            "generic-api-key",
            "Generic API key pattern",
            r#"api[_-]?key['"]?\s*[:=]\s*['"]?([a-zA-Z0-9_-]{16,})"#,
            ActionType::Log,
            Severity::Medium,
        ),
        rule(
            "email-address",
            "Email address",
            r"\b[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}\b",
            ActionType::Log,
            Severity::Low,
        ),
        rule(
            "credit-card",
            "Credit card number",
            r"\b(?:\d{4}[-\s]?){3}\d{4}\b",
            ActionType::Block,
            Severity::Critical,
        ),
        rule(
            "ssn",
            "Social Security Number",
            r"\b\d{3}-\d{2}-\d{4}\b",
            ActionType::Block,
            Severity::Critical,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.logging.enabled);
        assert_eq!(config.logging.level, LogLevel::Info);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(config.auditing.enabled);
        assert!(config.auditing.include_message_content);
        assert!(config.scanning.enabled);
        assert!(config.scanning.scan_request);
        assert!(config.scanning.scan_response);
        assert!(!config.alerting.enabled);
        assert!(config.metrics.enabled);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "logging": {{"enabled": false, "level": "debug", "format": "text"}},
                "scanning": {{"rules": [
                    {{"name": "test", "pattern": "secret", "action": "block", "severity": "high"}}
                ]}}
            }}"#
        )
        .unwrap();

        let config = Config::load_from_file(file.path()).unwrap();
        assert!(!config.logging.enabled);
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.format, LogFormat::Text);
        assert_eq!(config.scanning.rules.len(), 1);
        assert_eq!(config.scanning.rules[0].name, "test");
        assert_eq!(config.scanning.rules[0].action, ActionType::Block);
        assert_eq!(config.scanning.rules[0].severity, Severity::High);
        assert!(config.scanning.rules[0].enabled);
    }

    #[test]
    fn test_load_from_missing_file_errors() {
        let result = Config::load_from_file(Path::new("/nonexistent/config.json"));
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Configuration"));
    }

    #[test]
    fn test_load_from_invalid_json_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();
        assert!(Config::load_from_file(file.path()).is_err());
    }

    #[test]
    fn test_tilde_expansion() {
        let expanded = expand_tilde(Path::new("~/logs"));
        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert!(expanded.to_string_lossy().ends_with("logs"));

        // Non-tilde paths pass through untouched.
        let plain = expand_tilde(Path::new("/var/log/gateway"));
        assert_eq!(plain, PathBuf::from("/var/log/gateway"));
    }

    #[test]
    fn test_env_overrides_nested_field() {
        let mut value = serde_json::json!({"logging": {"level": "info"}});
        let vars = vec![
            ("MCP_GATEWAY_LOGGING__LEVEL".to_string(), "debug".to_string()),
            ("UNRELATED_VAR".to_string(), "ignored".to_string()),
        ];
        apply_env_overrides(&mut value, vars.into_iter());
        assert_eq!(value["logging"]["level"], "debug");

        let config: Config = serde_json::from_value(value).unwrap();
        assert_eq!(config.logging.level, LogLevel::Debug);
    }

    #[test]
    fn test_env_overrides_parse_json_values() {
        let mut value = serde_json::json!({});
        let vars = vec![
            (
                "MCP_GATEWAY_SCANNING__ENABLED".to_string(),
                "false".to_string(),
            ),
            (
                "MCP_GATEWAY_ALERTING__WEBHOOK_URL".to_string(),
                "https://example.com/hook".to_string(),
            ),
        ];
        apply_env_overrides(&mut value, vars.into_iter());
        assert_eq!(value["scanning"]["enabled"], serde_json::json!(false));
        assert_eq!(
            value["alerting"]["webhook_url"],
            serde_json::json!("https://example.com/hook")
        );
    }

    #[test]
    fn test_default_scan_rules_catalog() {
        let rules = default_scan_rules();
        assert_eq!(rules.len(), 11);

        let aws = rules.iter().find(|r| r.name == "aws-access-key").unwrap();
        assert_eq!(aws.action, ActionType::Block);
        assert_eq!(aws.severity, Severity::Critical);

        let email = rules.iter().find(|r| r.name == "email-address").unwrap();
        assert_eq!(email.action, ActionType::Log);
        assert_eq!(email.severity, Severity::Low);

        // All built-in patterns must compile.
        for rule in &rules {
            assert!(
                regex::RegexBuilder::new(&rule.pattern)
                    .case_insensitive(true)
                    .build()
                    .is_ok(),
                "pattern failed to compile for rule {}",
                rule.name
            );
        }
    }

    #[test]
    fn test_validate_rejects_empty_rule_name() {
        let mut config = Config::default();
        config.scanning.rules.push(ScanRule {
            name: "  ".to_string(),
            description: String::new(),
            pattern: "x".to_string(),
            action: ActionType::Log,
            severity: Severity::Low,
            enabled: true,
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_rule_names() {
        let mut config = Config::default();
        config.scanning.rules = default_scan_rules();
        config.scanning.rules.push(config.scanning.rules[0].clone());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_webhook_scheme() {
        let mut config = Config::default();
        config.alerting.webhook_url = Some("ftp://example.com".to_string());
        assert!(config.validate().is_err());

        config.alerting.webhook_url = Some("https://example.com/alerts".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_serialization_roundtrip() {
        let mut config = Config::default();
        config.scanning.rules = default_scan_rules();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(back.scanning.rules.len(), 11);
        assert_eq!(back.logging.level, LogLevel::Info);
    }

    #[test]
    fn test_action_and_severity_wire_form() {
        assert_eq!(
            serde_json::to_string(&ActionType::Redact).unwrap(),
            "\"redact\""
        );
        assert_eq!(
            serde_json::to_string(&Severity::Critical).unwrap(),
            "\"critical\""
        );
        assert_eq!(serde_json::to_string(&LogLevel::Warning).unwrap(), "\"warning\"");
    }
}
