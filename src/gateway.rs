//! Interposition engine for stdio MCP servers
//!
//! [`StdioGateway`] sits between a client speaking JSON-RPC on the
//! gateway's own stdin/stdout and a wrapped MCP server spawned as a child
//! process. Three concurrent pumps move the traffic:
//!
//! - client->server: gateway stdin, through scan-and-decide, to the
//!   child's stdin;
//! - server->client: the child's stdout, through scan-and-decide, to the
//!   gateway's stdout;
//! - stderr: the child's stderr re-emitted line by line on the gateway's
//!   stderr with a `[<server-name>] ` prefix.
//!
//! Each JSON-RPC pump owns its own [`MessageParser`]; the two streams are
//! framed independently and never share a buffer. The gateway's stdout
//! has two producers (forwarded server traffic and synthesized block
//! responses), so all stdout writes go through one shared async mutex at
//! full-message granularity.
//!
//! Errors inside a pump are caught at the pump boundary: one failing
//! direction never brings down the other. Only spawn failure is fatal.

use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader, Stdout};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tokio::time::timeout;

use crate::alerts::AlertManager;
use crate::config::{ActionType, Config};
use crate::error::{GatewayError, Result};
use crate::logger::GatewayLogger;
use crate::metrics::MetricsCollector;
use crate::parser::{MessageParser, ParsedMessage};
use crate::scanner::{Direction, SecurityScanner};

/// Bound on joining a JSON-RPC pump at shutdown; a stuck peer must not
/// stall the gateway.
const PUMP_JOIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Grace period between terminate and kill for a lingering child.
const CHILD_KILL_GRACE: Duration = Duration::from_secs(5);

/// Gateway wrapper for one stdio-based MCP server.
pub struct StdioGateway {
    server_command: Vec<String>,
    server_name: String,
    config: Arc<Config>,
    logger: Arc<GatewayLogger>,
    scanner: Arc<SecurityScanner>,
    alerts: Arc<AlertManager>,
    metrics: Arc<MetricsCollector>,
}

/// The shared components each pump task carries.
#[derive(Clone)]
struct PumpState {
    logger: Arc<GatewayLogger>,
    scanner: Arc<SecurityScanner>,
    alerts: Arc<AlertManager>,
    metrics: Arc<MetricsCollector>,
    server_name: String,
}

/// Where a forwarded message goes: the child's stdin for client->server,
/// the gateway's (shared) stdout for server->client.
enum ForwardSink<'a> {
    ChildStdin(&'a mut ChildStdin),
    GatewayStdout(&'a Mutex<Stdout>),
}

impl ForwardSink<'_> {
    /// Write one message plus its `\n` terminator and flush.
    async fn write_message(&mut self, payload: &str) -> io::Result<()> {
        match self {
            ForwardSink::ChildStdin(stdin) => {
                stdin.write_all(payload.as_bytes()).await?;
                stdin.write_all(b"\n").await?;
                stdin.flush().await
            }
            ForwardSink::GatewayStdout(stdout) => write_to_stdout(stdout, payload).await,
        }
    }
}

/// Serialized full-message write to the gateway's stdout.
async fn write_to_stdout(stdout: &Mutex<Stdout>, payload: &str) -> io::Result<()> {
    let mut guard = stdout.lock().await;
    guard.write_all(payload.as_bytes()).await?;
    guard.write_all(b"\n").await?;
    guard.flush().await
}

impl StdioGateway {
    /// Build the gateway: logger, scanner, alert manager, metrics.
    ///
    /// `server_name` defaults to the first element of `server_command` and
    /// is used in logs, audit entries, and the stderr prefix.
    ///
    /// # Errors
    ///
    /// Returns an error when `server_command` is empty or the log/audit
    /// directories cannot be created.
    pub fn new(
        server_command: Vec<String>,
        config: Config,
        server_name: Option<String>,
    ) -> Result<Self> {
        let Some(program) = server_command.first() else {
            return Err(GatewayError::Config("no server command specified".into()).into());
        };
        let server_name = server_name.unwrap_or_else(|| program.clone());

        let config = Arc::new(config);
        let logger = Arc::new(GatewayLogger::new(Arc::clone(&config))?);
        let scanner = Arc::new(SecurityScanner::new(Arc::clone(&config)));
        let alerts = Arc::new(AlertManager::new(Arc::clone(&config)));
        let metrics = Arc::new(MetricsCollector::new(Arc::clone(&config)));

        Ok(Self {
            server_command,
            server_name,
            config,
            logger,
            scanner,
            alerts,
            metrics,
        })
    }

    /// Replace the alert manager (e.g. to inject an email backend).
    pub fn with_alert_manager(mut self, alerts: AlertManager) -> Self {
        self.alerts = Arc::new(alerts);
        self
    }

    /// Run the gateway to completion.
    ///
    /// Spawns the wrapped server, starts the three pumps, and waits for
    /// the child to exit or for Ctrl-C. Shutdown joins the JSON-RPC pumps
    /// with a bounded wait, writes the metrics summary, and escalates
    /// terminate -> kill on a lingering child.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Spawn`] when the child cannot be started or
    /// its stdio pipes are unavailable.
    pub async fn run(self) -> Result<()> {
        self.logger.info(
            &format!("Starting MCP Gateway for {}", self.server_name),
            &[("command", json!(self.server_command.join(" ")))],
        );

        let mut child = Command::new(&self.server_command[0])
            .args(&self.server_command[1..])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                let err = GatewayError::Spawn(format!(
                    "failed to spawn `{}`: {}",
                    self.server_command[0], e
                ));
                self.logger.error(&err.to_string(), &[]);
                err
            })?;

        let child_stdin = child
            .stdin
            .take()
            .ok_or_else(|| GatewayError::Spawn("child stdin unavailable after spawn".into()))?;
        let child_stdout = child
            .stdout
            .take()
            .ok_or_else(|| GatewayError::Spawn("child stdout unavailable after spawn".into()))?;
        let child_stderr = child
            .stderr
            .take()
            .ok_or_else(|| GatewayError::Spawn("child stderr unavailable after spawn".into()))?;

        let stdout_sink = Arc::new(Mutex::new(io::stdout()));
        let state = PumpState {
            logger: Arc::clone(&self.logger),
            scanner: Arc::clone(&self.scanner),
            alerts: Arc::clone(&self.alerts),
            metrics: Arc::clone(&self.metrics),
            server_name: self.server_name.clone(),
        };

        let mut client_pump = tokio::spawn(pump_client_to_server(
            state.clone(),
            child_stdin,
            Arc::clone(&stdout_sink),
        ));
        let mut server_pump = tokio::spawn(pump_server_to_client(
            state,
            child_stdout,
            Arc::clone(&stdout_sink),
        ));
        let stderr_pump = tokio::spawn(pump_server_stderr(
            Arc::clone(&self.logger),
            self.server_name.clone(),
            child_stderr,
        ));

        tokio::select! {
            status = child.wait() => match status {
                Ok(status) => self
                    .logger
                    .info("Server process exited", &[("status", json!(status.to_string()))]),
                Err(e) => self
                    .logger
                    .error(&format!("Error waiting for server process: {}", e), &[]),
            },
            _ = tokio::signal::ctrl_c() => {
                eprintln!("\nGateway interrupted by user");
            }
        }

        for pump in [&mut client_pump, &mut server_pump] {
            if timeout(PUMP_JOIN_TIMEOUT, &mut *pump).await.is_err() {
                pump.abort();
            }
        }
        stderr_pump.abort();

        self.shutdown(&mut child).await;
        Ok(())
    }

    /// Final cleanup: metrics summary, then terminate-then-kill a child
    /// that is still running.
    async fn shutdown(&self, child: &mut Child) {
        self.logger
            .info("Gateway shutting down", &[("server", json!(self.server_name))]);

        if self.config.metrics.enabled {
            self.logger
                .info(&format!("Metrics summary:\n{}", self.metrics.summary()), &[]);
        }

        if !matches!(child.try_wait(), Ok(Some(_))) {
            terminate(child);
            if timeout(CHILD_KILL_GRACE, child.wait()).await.is_err() {
                if let Err(e) = child.kill().await {
                    self.logger
                        .error(&format!("Error killing server process: {}", e), &[]);
                }
            }
        }
    }
}

/// Ask the child to exit: SIGTERM on Unix, hard kill elsewhere.
fn terminate(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        // SAFETY: pid is a valid process ID obtained from tokio::process::Child.
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGTERM);
        }
        return;
    }

    let _ = child.start_kill();
}

/// Forward messages from the client (gateway stdin) to the server, with
/// inspection.
async fn pump_client_to_server(
    state: PumpState,
    mut child_stdin: ChildStdin,
    stdout_sink: Arc<Mutex<Stdout>>,
) {
    let mut parser = MessageParser::new();
    let mut lines = BufReader::new(io::stdin()).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                state
                    .logger
                    .error(&format!("Error in client->server forwarding: {}", e), &[]);
                break;
            }
        };

        let start = Instant::now();
        for message in parser.feed(&line) {
            let mut sink = ForwardSink::ChildStdin(&mut child_stdin);
            if let Err(e) =
                process_message(&state, &message, Direction::ClientToServer, &mut sink, &stdout_sink)
                    .await
            {
                state
                    .logger
                    .error(&format!("Error in client->server forwarding: {}", e), &[]);
            }
        }
        state
            .metrics
            .record_latency(start.elapsed().as_secs_f64() * 1000.0);
    }

    // The client closed its stream; propagate EOF so the child can exit.
    let _ = child_stdin.shutdown().await;
}

/// Forward messages from the server (child stdout) to the client, with
/// inspection.
async fn pump_server_to_client(
    state: PumpState,
    child_stdout: ChildStdout,
    stdout_sink: Arc<Mutex<Stdout>>,
) {
    let mut parser = MessageParser::new();
    let mut lines = BufReader::new(child_stdout).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                state
                    .logger
                    .error(&format!("Error in server->client forwarding: {}", e), &[]);
                break;
            }
        };

        let start = Instant::now();
        for message in parser.feed(&line) {
            let mut sink = ForwardSink::GatewayStdout(&stdout_sink);
            if let Err(e) =
                process_message(&state, &message, Direction::ServerToClient, &mut sink, &stdout_sink)
                    .await
            {
                state
                    .logger
                    .error(&format!("Error in server->client forwarding: {}", e), &[]);
            }
        }
        state
            .metrics
            .record_latency(start.elapsed().as_secs_f64() * 1000.0);
    }
}

/// Re-emit the child's stderr on the gateway's stderr, line by line, with
/// a `[<server-name>] ` prefix. Per the MCP convention, server stderr is
/// diagnostic output, never an error condition.
async fn pump_server_stderr(
    logger: Arc<GatewayLogger>,
    server_name: String,
    child_stderr: ChildStderr,
) {
    let mut lines = BufReader::new(child_stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        logger.debug(&format!("Server stderr: {}", line), &[]);
        eprintln!("[{}] {}", server_name, line);
    }
}

/// The scan-and-decide pipeline for one parsed message.
///
/// Order matters: metrics, scan, violation logging, alert, audit, then
/// the forward/block decision. The audit entry always lands before the
/// bytes that the peer observes.
async fn process_message(
    state: &PumpState,
    message: &ParsedMessage,
    direction: Direction,
    sink: &mut ForwardSink<'_>,
    stdout_sink: &Mutex<Stdout>,
) -> io::Result<()> {
    state.metrics.record_message(message, direction);

    let scan_result = state.scanner.scan_message(message, direction);

    for violation in &scan_result.violations {
        state.logger.log_violation(violation, message, direction);
        state
            .metrics
            .record_violation(&violation.rule_name, violation.action == ActionType::Block);
    }

    if scan_result.has_violations() {
        state
            .alerts
            .send_alert(message, &scan_result, direction, &state.server_name);
    }

    state.logger.audit(
        direction,
        message,
        &state.server_name,
        scan_result.should_block,
        scan_result
            .has_violations()
            .then_some(scan_result.violations.as_slice()),
    );

    if scan_result.should_block {
        // JSON-RPC 2.0 forbids responses to notifications; a blocked
        // notification is dropped without a trace on the wire.
        if message.id.is_some() {
            let response = state.scanner.create_block_response(message, &scan_result);
            write_to_stdout(stdout_sink, &response).await?;
        }
        return Ok(());
    }

    let payload = scan_result
        .modified_message
        .as_deref()
        .unwrap_or(message.raw.as_str());
    sink.write_message(payload).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.logging.destination = dir.join("logs");
        config.auditing.audit_log = dir.join("audit.jsonl");
        config
    }

    #[test]
    fn test_new_rejects_empty_command() {
        let tmp = tempfile::tempdir().unwrap();
        let result = StdioGateway::new(vec![], test_config(tmp.path()), None);
        assert!(result.is_err());
    }

    #[test]
    fn test_server_name_defaults_to_program() {
        let tmp = tempfile::tempdir().unwrap();
        let gateway = StdioGateway::new(
            vec!["cat".to_string(), "-u".to_string()],
            test_config(tmp.path()),
            None,
        )
        .unwrap();
        assert_eq!(gateway.server_name, "cat");

        let named = StdioGateway::new(
            vec!["cat".to_string()],
            test_config(tmp.path()),
            Some("friendly".to_string()),
        )
        .unwrap();
        assert_eq!(named.server_name, "friendly");
    }

    #[tokio::test]
    async fn test_run_with_nonexistent_binary_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let gateway = StdioGateway::new(
            vec!["/nonexistent/mcp/server".to_string()],
            test_config(tmp.path()),
            None,
        )
        .unwrap();

        let result = gateway.run().await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Failed to spawn"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_terminate_stops_child() {
        let mut child = Command::new("sleep")
            .arg("30")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .spawn()
            .unwrap();

        terminate(&mut child);
        let status = timeout(Duration::from_secs(5), child.wait())
            .await
            .expect("child did not exit after SIGTERM")
            .unwrap();
        assert!(!status.success());
    }
}
