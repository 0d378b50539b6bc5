// Configuration management for the gattbridge CLI
//
// Cross-platform config stored in:
// - macOS: ~/Library/Application Support/gattbridge/config.json
// - Linux: ~/.config/gattbridge/config.json
// - Windows: %APPDATA%\gattbridge\config.json

use anyhow::{Context, Result};
use gattbridge_core::BridgeConfig;
use std::path::{Path, PathBuf};

/// Get the config directory path (cross-platform)
pub fn config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .context("Failed to determine config directory")?
        .join("gattbridge");

    std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;

    Ok(config_dir)
}

/// Get the config file path
pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.json"))
}

/// Load config from the default location, or defaults if not yet saved
pub fn load() -> Result<BridgeConfig> {
    load_from(&config_file()?)
}

pub fn load_from(path: &Path) -> Result<BridgeConfig> {
    BridgeConfig::load(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))
}

pub fn save_to(config: &BridgeConfig, path: &Path) -> Result<()> {
    config
        .save(path)
        .with_context(|| format!("Failed to write config to {}", path.display()))
}

/// Set one key and persist the result
pub fn set_and_save(path: &Path, key: &str, value: &str) -> Result<BridgeConfig> {
    let mut config = load_from(path)?;
    config
        .set(key, value)
        .with_context(|| format!("Failed to set {}", key))?;
    save_to(&config, path)?;
    Ok(config)
}

/// All config values in display form
pub fn list(config: &BridgeConfig) -> Vec<(&'static str, String)> {
    BridgeConfig::keys()
        .iter()
        .map(|key| {
            let value = config.get(key).unwrap_or_else(|| "(unset)".to_string());
            (*key, value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_loads_defaults() {
        let dir = tempdir().unwrap();
        let config = load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, BridgeConfig::default());
    }

    #[test]
    fn test_set_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        set_and_save(&path, "log_filter", "gattbridge_core=debug").unwrap();
        set_and_save(&path, "log_json", "true").unwrap();

        let reloaded = load_from(&path).unwrap();
        assert_eq!(reloaded.log_filter, "gattbridge_core=debug");
        assert!(reloaded.log_json);
    }

    #[test]
    fn test_invalid_value_not_persisted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        assert!(set_and_save(&path, "max_attribute_len", "0").is_err());
        assert!(set_and_save(&path, "no_such_key", "1").is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_list_covers_every_key() {
        let entries = list(&BridgeConfig::default());
        assert_eq!(entries.len(), BridgeConfig::keys().len());
        assert!(entries
            .iter()
            .any(|(key, value)| *key == "log_dir" && value == "(unset)"));
    }
}
