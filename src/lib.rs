//! MCP Gateway - transparent security gateway library
//!
//! This library provides the core functionality for the MCP gateway: a
//! transparent proxy that wraps a stdio MCP server, scans every JSON-RPC
//! message crossing in either direction against configurable rules, and
//! forwards, redacts, blocks, or drops it while writing audit and
//! violation logs.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `parser`: incremental JSON-RPC framing and classification
//! - `scanner`: regex ruleset compilation and scan-and-decide verdicts
//! - `gateway`: the interposition engine wiring three concurrent pumps
//! - `logger`: human log and JSONL audit trail writers
//! - `metrics`: in-memory counters summarized at shutdown
//! - `alerts`: fire-and-forget webhook/email dispatch
//! - `config`: configuration model, loading, and built-in scan rules
//! - `error`: error types and result aliases
//! - `cli`: command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use mcp_gateway::{Config, StdioGateway};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load_or_default()?;
//!     config.validate()?;
//!
//!     let gateway = StdioGateway::new(
//!         vec!["npx".into(), "-y".into(), "@upstash/context7-mcp".into()],
//!         config,
//!         None,
//!     )?;
//!     gateway.run().await
//! }
//! ```

pub mod alerts;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod gateway;
pub mod logger;
pub mod metrics;
pub mod parser;
pub mod scanner;

// Re-export commonly used types
pub use config::Config;
pub use error::{GatewayError, Result};
pub use gateway::StdioGateway;
pub use parser::{MessageParser, MessageType, ParsedMessage};
pub use scanner::{Direction, ScanResult, SecurityScanner};
