//! Player configuration for stemset-player
//!
//! Configuration is stored as YAML in the user's config directory.
//! Default location: ~/.config/stemset-player/config.yaml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Directory that `download <stem>` copies WAV renditions into
    pub downloads_dir: PathBuf,
    /// Position display refresh interval in milliseconds
    pub tick_interval_ms: u64,
    /// Step used by the `nudge` command, in seconds
    pub nudge_step: f64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        let downloads_dir = dirs::download_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join("Downloads")))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("stemset");

        Self {
            downloads_dir,
            tick_interval_ms: 100,
            nudge_step: 0.5,
        }
    }
}

/// Get the default config file path
///
/// Returns: ~/.config/stemset-player/config.yaml
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join("stemset-player")
        .join("config.yaml")
}

/// Load configuration from a YAML file
///
/// If the file doesn't exist, returns default config.
/// If the file exists but is invalid, logs a warning and returns default config.
pub fn load_config(path: &Path) -> PlayerConfig {
    log::info!("load_config: Loading from {:?}", path);

    if !path.exists() {
        log::info!("load_config: Config file doesn't exist, using defaults");
        return PlayerConfig::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str::<PlayerConfig>(&contents) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("load_config: Failed to parse config: {}, using defaults", e);
                PlayerConfig::default()
            }
        },
        Err(e) => {
            log::warn!(
                "load_config: Failed to read config file: {}, using defaults",
                e
            );
            PlayerConfig::default()
        }
    }
}

/// Save configuration to a YAML file
///
/// Creates parent directories if they don't exist.
pub fn save_config(config: &PlayerConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize config to YAML")?;

    std::fs::write(path, yaml)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    log::info!("save_config: Config saved to {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PlayerConfig::default();
        assert_eq!(config.tick_interval_ms, 100);
        assert_eq!(config.nudge_step, 0.5);
        assert!(config.downloads_dir.ends_with("stemset"));
    }

    #[test]
    fn test_yaml_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");

        let config = PlayerConfig {
            downloads_dir: PathBuf::from("/tmp/stems"),
            tick_interval_ms: 250,
            nudge_step: 0.1,
        };
        save_config(&config, &path).unwrap();

        let parsed = load_config(&path);
        assert_eq!(parsed.downloads_dir, PathBuf::from("/tmp/stems"));
        assert_eq!(parsed.tick_interval_ms, 250);
        assert_eq!(parsed.nudge_step, 0.1);
    }

    #[test]
    fn test_invalid_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "downloads_dir: [not, a, path").unwrap();

        let config = load_config(&path);
        assert_eq!(config.tick_interval_ms, 100);
    }
}
