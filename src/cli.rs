//! Command-line interface definition for the MCP gateway
//!
//! This module defines the CLI structure using clap's derive API,
//! providing the stdio gateway runner plus configuration, log, and audit
//! management commands.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// MCP Gateway - Security gateway for Model Context Protocol traffic
///
/// Wraps a stdio MCP server as a transparent proxy: every JSON-RPC
/// message in either direction is scanned against configurable rules and
/// forwarded, redacted, blocked, or dropped, with full audit logging.
#[derive(Parser, Debug, Clone)]
#[command(name = "mcp-gateway")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the stdio gateway wrapper around an MCP server
    Stdio {
        /// Path to configuration file (default: ~/.mcp-gateway/config.json)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Friendly server name used in logs and the stderr prefix
        /// (defaults to the server command)
        #[arg(long)]
        name: Option<String>,

        /// Command and arguments for the actual MCP server, after `--`
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },

    /// Configuration management
    Config {
        /// Configuration subcommand
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Print instructions for wrapping servers in .mcp.json
    Install,

    /// View gateway logs
    Logs {
        /// Follow log output
        #[arg(short, long)]
        follow: bool,

        /// Number of lines to show
        #[arg(short = 'n', long, default_value_t = 50)]
        lines: usize,
    },

    /// View the audit trail
    Audit {
        /// Filter by server name
        #[arg(long)]
        server: Option<String>,

        /// Filter by JSON-RPC method
        #[arg(long)]
        method: Option<String>,

        /// Number of entries to show
        #[arg(short = 'n', long, default_value_t = 50)]
        lines: usize,

        /// Pretty print JSON entries
        #[arg(long)]
        pretty: bool,
    },
}

/// Configuration management subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommand {
    /// Write the default configuration with the built-in scan rules
    Init {
        /// Output path (default: ~/.mcp-gateway/config.json)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Overwrite an existing configuration
        #[arg(long)]
        force: bool,
    },

    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        config: PathBuf,
    },

    /// Show the active configuration
    Show {
        /// Path to the configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}
