//! The `config` subcommands: init, validate, show.

use std::path::{Path, PathBuf};

use colored::Colorize;

use crate::config::{default_scan_rules, Config};
use crate::error::Result;

/// Write the default configuration (with the built-in scan rules) to
/// `output` or the default path. Refuses to overwrite without `force`.
pub fn init(output: Option<PathBuf>, force: bool) -> Result<()> {
    let path = output.unwrap_or_else(Config::default_config_path);

    if path.exists() && !force {
        eprintln!("Error: Configuration already exists at {}", path.display());
        eprintln!("Use --force to overwrite");
        std::process::exit(1);
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut config = Config::default();
    config.scanning.rules = default_scan_rules();

    std::fs::write(&path, serde_json::to_string_pretty(&config)?)?;
    println!("Configuration initialized at: {}", path.display());
    Ok(())
}

/// Load and validate a configuration file, printing a summary of what is
/// enabled. Exits non-zero with a diagnostic when the file is invalid.
pub fn validate(path: &Path) -> Result<()> {
    if !path.exists() {
        eprintln!("Error: Configuration file not found: {}", path.display());
        std::process::exit(1);
    }

    let loaded = Config::load_from_file(path).and_then(|config| {
        config.validate()?;
        Ok(config)
    });

    match loaded {
        Ok(config) => {
            println!("{} Configuration is valid: {}", "✓".green(), path.display());
            println!("  - Logging: {}", enabled_str(config.logging.enabled));
            println!("  - Auditing: {}", enabled_str(config.auditing.enabled));
            println!("  - Scanning: {}", enabled_str(config.scanning.enabled));
            println!("  - Scan rules: {}", config.scanning.rules.len());
            Ok(())
        }
        Err(e) => {
            eprintln!("{} Configuration is invalid: {}", "✗".red(), e);
            std::process::exit(1);
        }
    }
}

/// Pretty-print the active configuration.
pub fn show(config: Option<&Path>) -> Result<()> {
    let path = config
        .map(Path::to_path_buf)
        .unwrap_or_else(Config::default_config_path);

    if !path.exists() {
        eprintln!("No configuration found at: {}", path.display());
        eprintln!("Run 'mcp-gateway config init' to create one");
        std::process::exit(1);
    }

    let config = Config::load_from_file(&path)?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn enabled_str(enabled: bool) -> &'static str {
    if enabled {
        "enabled"
    } else {
        "disabled"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_writes_rules_and_show_roundtrips() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("config.json");

        init(Some(path.clone()), false).unwrap();
        assert!(path.exists());

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.scanning.rules.len(), 11);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_init_force_overwrites() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, "{}").unwrap();

        init(Some(path.clone()), true).unwrap();
        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.scanning.rules.len(), 11);
    }

    #[test]
    fn test_validate_accepts_initialized_config() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        init(Some(path.clone()), false).unwrap();
        assert!(validate(&path).is_ok());
    }
}
