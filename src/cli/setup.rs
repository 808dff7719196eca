use crate::core::config::AppConfig;
use anyhow::{Context, Result};
use std::path::Path;

// Example files embedded in the binary
const EXAMPLE_CONFIG: &str = include_str!("../../docs/example_config.yaml");
const EXAMPLE_TARGETS: &str = include_str!("../../docs/example_targets.json");
const TARGETS_FILE: &str = "targets.json";

/// Creates the example configuration and targets at the default location
pub fn setup() -> Result<()> {
    setup_at_path(AppConfig::default_config_path()?)
}

/// Creates the example configuration at `path` and the example targets next
/// to it. Existing files are never overwritten.
pub fn setup_at_path<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();

    if path.exists() {
        anyhow::bail!("Configuration file already exists at {}", path.display());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    std::fs::write(path, EXAMPLE_CONFIG)
        .with_context(|| format!("Failed to write config file to {}", path.display()))?;
    tracing::info!("Created default configuration at {}", path.display());

    let targets_path = path.with_file_name(TARGETS_FILE);
    if targets_path.exists() {
        tracing::warn!("Keeping existing targets at {}", targets_path.display());
    } else {
        std::fs::write(&targets_path, EXAMPLE_TARGETS)
            .with_context(|| format!("Failed to write targets file to {}", targets_path.display()))?;
        tracing::info!("Created example targets at {}", targets_path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::targets::TargetConfig;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_setup_creates_config_and_targets() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("nested").join("config.yaml");

        setup_at_path(&config_path)?;

        assert!(config_path.exists());
        let content = fs::read_to_string(&config_path)?;
        assert!(content.contains("holdings:"));
        assert!(content.contains("cash:"));
        assert!(content.contains("# Example configuration file for topup"));

        let config = AppConfig::load_from_path(&config_path)?;
        let targets = TargetConfig::load_from_path(config.targets_path()?)?;
        assert_eq!(targets.target_shares().len(), 3);

        Ok(())
    }

    #[test]
    fn test_setup_fails_if_config_exists() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(&config_path, "test")?;

        let result = setup_at_path(&config_path);
        assert!(result.unwrap_err().to_string().contains("already exists"));

        Ok(())
    }

    #[test]
    fn test_setup_keeps_existing_targets() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let targets_path = temp_dir.path().join(TARGETS_FILE);
        fs::write(&targets_path, "mine")?;

        setup_at_path(temp_dir.path().join("config.yaml"))?;
        assert_eq!(fs::read_to_string(&targets_path)?, "mine");

        Ok(())
    }

    #[test]
    fn test_example_files_are_valid() -> Result<()> {
        let config: AppConfig =
            serde_yaml::from_str(EXAMPLE_CONFIG).context("Failed to parse example config")?;
        assert!(!config.holdings.is_empty());
        assert!(config.cash > 0.0);

        let targets = TargetConfig::from_json(EXAMPLE_TARGETS)?;
        for holding in &config.holdings {
            assert!(targets.target_for(&holding.symbol).is_some());
        }

        Ok(())
    }
}
