//! Configuration file support for medtrack.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/medtrack/config.toml`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub forecast: ForecastConfig,

    #[serde(default)]
    pub adherence: AdherenceConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Stock forecasting parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ForecastConfig {
    /// Days of history used to estimate the daily consumption rate
    #[serde(default = "default_observation_window_days")]
    pub observation_window_days: u32,

    #[serde(default = "default_expiry_warning_days")]
    pub expiry_warning_days: u32,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            observation_window_days: default_observation_window_days(),
            expiry_warning_days: default_expiry_warning_days(),
        }
    }
}

/// Which 7-day window `adherence` shows when no start date is given
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum WindowAnchor {
    /// Monday-to-Sunday week containing today
    #[default]
    Monday,
    /// The seven days ending today
    Trailing,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct AdherenceConfig {
    #[serde(default)]
    pub window: WindowAnchor,
}

fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("medtrack")
}

fn default_observation_window_days() -> u32 {
    14
}

fn default_expiry_warning_days() -> u32 {
    30
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."));
        base.join("medtrack").join("config.toml")
    }

    pub fn validate(&self) -> Result<()> {
        if self.forecast.observation_window_days == 0 {
            return Err(Error::Config(
                "forecast.observation_window_days must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Save the current configuration to the default path
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.forecast.observation_window_days, 14);
        assert_eq!(config.forecast.expiry_warning_days, 30);
        assert_eq!(config.adherence.window, WindowAnchor::Monday);
        assert!(config.data.data_dir.ends_with("medtrack"));
    }

    #[test]
    fn test_config_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested/config.toml");

        let mut config = Config::default();
        config.adherence.window = WindowAnchor::Trailing;
        config.forecast.observation_window_days = 7;
        config.save_to(&path).unwrap();

        let parsed = Config::load_from(&path).unwrap();
        assert_eq!(parsed.adherence.window, WindowAnchor::Trailing);
        assert_eq!(parsed.forecast.observation_window_days, 7);
        assert_eq!(parsed.data.data_dir, config.data.data_dir);
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[forecast]
observation_window_days = 28
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.forecast.observation_window_days, 28);
        assert_eq!(config.forecast.expiry_warning_days, 30); // default
        assert_eq!(config.adherence.window, WindowAnchor::Monday); // default
    }

    #[test]
    fn test_zero_window_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[forecast]\nobservation_window_days = 0\n").unwrap();

        assert!(matches!(Config::load_from(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_unknown_window_anchor_is_a_parse_error() {
        let toml_str = "[adherence]\nwindow = \"fortnight\"\n";
        assert!(toml::from_str::<Config>(toml_str).is_err());
    }
}
