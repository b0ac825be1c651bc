//! MCP Gateway - transparent security gateway for MCP traffic
//!
//! Main entry point: initializes tracing (to stderr, since stdout is the
//! protocol channel), parses the CLI, and dispatches to the command
//! handlers.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mcp_gateway::cli::{Cli, Commands, ConfigCommand};
use mcp_gateway::commands;

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Stdio {
            config,
            name,
            command,
        } => commands::stdio::run(config.as_deref(), name, command).await,
        Commands::Config { command } => match command {
            ConfigCommand::Init { output, force } => commands::config::init(output, force),
            ConfigCommand::Validate { config } => commands::config::validate(&config),
            ConfigCommand::Show { config } => commands::config::show(config.as_deref()),
        },
        Commands::Install => commands::install::run(),
        Commands::Logs { follow, lines } => commands::logs::run(follow, lines).await,
        Commands::Audit {
            server,
            method,
            lines,
            pretty,
        } => commands::audit::run(server.as_deref(), method.as_deref(), lines, pretty),
    };

    if let Err(e) = result {
        eprintln!("Gateway error: {:#}", e);
        std::process::exit(1);
    }
}

/// Initialize the tracing subscriber with an environment filter. All
/// diagnostic output goes to stderr; stdout belongs to the JSON-RPC peer.
fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mcp_gateway=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
