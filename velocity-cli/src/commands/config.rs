//! `config` subcommands and configuration loading

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use velocity_config::domains::VelocityConfig;
use velocity_config::ConfigLoader;

/// Load configuration from `config_path`, or from the environment and defaults
pub fn load_config(config_path: Option<&PathBuf>) -> Result<VelocityConfig> {
    let loader = ConfigLoader::new();

    match config_path {
        Some(path) => {
            if path.exists() {
                info!("Loading configuration from: {:?}", path);
                loader
                    .from_file(path)
                    .context(format!("Failed to load configuration from {:?}", path))
            } else {
                warn!("Configuration file not found: {:?}. Using defaults.", path);
                loader
                    .from_env()
                    .context("Failed to load configuration from environment")
            }
        }
        None => {
            debug!("No configuration file specified. Loading from environment or defaults.");
            loader
                .from_env()
                .context("Failed to load configuration from environment")
        }
    }
}

/// Handle configuration validation
pub fn handle_config_validate(config_file: &Path) -> Result<()> {
    info!("Validating configuration file: {:?}", config_file);

    if !config_file.exists() {
        return Err(anyhow::anyhow!(
            "Configuration file not found: {:?}",
            config_file
        ));
    }

    match ConfigLoader::new()
        .from_file(config_file)
        .context(format!("Failed to load configuration from {:?}", config_file))
    {
        Ok(_config) => {
            println!("✅ Configuration file is valid");
            info!("Configuration validation passed");
            Ok(())
        }
        Err(e) => {
            println!("❌ Configuration validation failed: {:#}", e);
            error!("Configuration validation failed: {:#}", e);
            Err(e)
        }
    }
}

/// Handle configuration generation. Without `output` the sample goes to stdout.
pub fn handle_config_generate(output: Option<&Path>, force: bool) -> Result<()> {
    let content = VelocityConfig::generate_sample();

    let Some(output) = output else {
        print!("{}", content);
        return Ok(());
    };

    info!("Generating configuration at: {:?}", output);

    if output.exists() && !force {
        return Err(anyhow::anyhow!(
            "Output file already exists: {:?}. Use --force to overwrite.",
            output
        ));
    }

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent).context("Failed to create output directory")?;
    }

    fs::write(output, content).context("Failed to write configuration file")?;

    println!("✅ Configuration generated at: {:?}", output);
    println!(
        "🔧 Validate with: velocity config validate --config-file {:?}",
        output
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_generate_then_validate() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("velocity.yaml");

        handle_config_generate(Some(path.as_path()), false).unwrap();
        assert!(path.exists());
        handle_config_validate(&path).unwrap();
    }

    #[test]
    fn test_generate_refuses_to_overwrite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("velocity.yaml");
        fs::write(&path, "existing").unwrap();

        let err = handle_config_generate(Some(path.as_path()), false).unwrap_err();
        assert!(err.to_string().contains("--force"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "existing");

        handle_config_generate(Some(path.as_path()), true).unwrap();
        assert_ne!(fs::read_to_string(&path).unwrap(), "existing");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("velocity.yaml");
        fs::write(&path, "pipeline:\n  ping_count: 0\n").unwrap();

        assert!(handle_config_validate(&path).is_err());
        assert!(handle_config_validate(&dir.path().join("missing.yaml")).is_err());
    }

    #[test]
    fn test_missing_config_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = load_config(Some(&dir.path().join("missing.yaml"))).unwrap();
        assert_eq!(config.rate_limit.max_runs, VelocityConfig::default().rate_limit.max_runs);
    }
}
