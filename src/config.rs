// Configuration for the tasklist binary

use eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "tasklist";
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Runtime settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the task store
    pub data_dir: PathBuf,

    /// Default tracing level when RUST_LOG is unset
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file, environment variables, or defaults
    ///
    /// The file comes from `TASKLIST_CONFIG`, else
    /// `<config_dir>/tasklist/config.yaml` if it exists. `TASKLIST_DATA_DIR`
    /// and `TASKLIST_LOG_LEVEL` override whatever the file says.
    pub fn load() -> Result<Self> {
        match env::var_os("TASKLIST_CONFIG") {
            Some(path) => Self::load_from(Path::new(&path)),
            None => match default_config_path().filter(|p| p.exists()) {
                Some(path) => Self::load_from(&path),
                None => {
                    let mut config = Self::default();
                    config.apply_env();
                    config.validate()?;
                    Ok(config)
                }
            },
        }
    }

    /// Load a specific YAML file, then apply environment overrides
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content).context("Failed to parse config")?;

        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Some(dir) = env::var_os("TASKLIST_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Ok(level) = env::var("TASKLIST_LOG_LEVEL") {
            self.log_level = level;
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(eyre!("data_dir cannot be empty"));
        }
        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(eyre!(
                "Invalid log_level: {} (expected one of {})",
                self.log_level,
                LOG_LEVELS.join(", ")
            ));
        }
        Ok(())
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from(".tasklist"))
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join("config.yaml"))
}
