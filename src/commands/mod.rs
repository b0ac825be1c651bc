//! Command handlers for the CLI
//!
//! One module per subcommand. The handlers are intentionally thin and
//! delegate to the library components: configuration, gateway, logger.

pub mod audit;
pub mod config;
pub mod install;
pub mod logs;
pub mod stdio;
