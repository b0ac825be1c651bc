//! The `stdio` subcommand: run the gateway around an MCP server.

use std::path::Path;

use crate::config::Config;
use crate::error::Result;
use crate::gateway::StdioGateway;

/// Load the effective configuration: an explicit file when given,
/// otherwise the default location (falling back to built-in defaults).
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load_from_file(path)?,
        None => Config::load_or_default()?,
    };
    config.validate()?;
    Ok(config)
}

/// Run the stdio gateway wrapper until the wrapped server exits.
pub async fn run(
    config_path: Option<&Path>,
    name: Option<String>,
    server_command: Vec<String>,
) -> Result<()> {
    if server_command.is_empty() {
        eprintln!("Error: No server command specified");
        std::process::exit(1);
    }

    let config = load_config(config_path)?;
    let gateway = StdioGateway::new(server_command, config, name)?;
    gateway.run().await
}
