//! Error types for the MCP gateway
//!
//! This module defines all error types used throughout the application,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for gateway operations
///
/// This enum encompasses all possible errors that can occur during
/// configuration loading, server spawning, message parsing, scanning,
/// and log/audit writing.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Configuration-related errors (bad file, bad schema, bad values)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The wrapped MCP server process could not be spawned
    #[error("Failed to spawn server: {0}")]
    Spawn(String),

    /// A stdio pipe of the child process was unavailable or broken
    #[error("Transport error: {0}")]
    Transport(String),

    /// A scan rule's regex pattern failed to compile
    #[error("Invalid pattern for rule {rule}: {message}")]
    Pattern {
        /// Name of the offending rule
        rule: String,
        /// Compiler diagnostic
        message: String,
    },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP request errors (webhook alerts)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal runtime error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for gateway operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;
