// ABOUTME: Configuration management for the blockforge rendering engine
// ABOUTME: Handles loading engine and logging settings from YAML files and environment variables

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_MAX_CALLS: usize = 10_000;
pub const DEFAULT_ENTRYPOINT: &str = "main";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Block invocations allowed per top-level render
    pub max_calls: usize,
    /// Block rendered when a render names none
    pub entrypoint: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_calls: DEFAULT_MAX_CALLS,
            entrypoint: DEFAULT_ENTRYPOINT.to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file path or default locations
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => Some(p),
            None => Self::find_config_file(),
        };

        let mut config = match config_path {
            Some(path) if path.exists() => {
                let contents = std::fs::read_to_string(&path)?;
                serde_yaml::from_str(&contents)?
            }
            _ => Config::default(),
        };

        config.merge_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let possible_paths = [
            PathBuf::from("blockforge.yaml"),
            PathBuf::from("blockforge.yml"),
            PathBuf::from(".blockforge.yaml"),
        ];

        if let Some(path) = possible_paths.into_iter().find(|p| p.exists()) {
            return Some(path);
        }

        dirs::home_dir()
            .map(|home| home.join(".blockforge").join("config.yaml"))
            .filter(|p| p.exists())
    }

    /// Merge environment variables into configuration
    fn merge_env(&mut self) -> Result<()> {
        self.merge_env_from(|key| std::env::var(key).ok())
    }

    /// Overlay settings from an arbitrary variable lookup
    pub fn merge_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(max_calls) = lookup("BLOCKFORGE_MAX_CALLS") {
            self.engine.max_calls = max_calls.trim().parse()?;
        }
        if let Some(entrypoint) = lookup("BLOCKFORGE_ENTRYPOINT") {
            self.engine.entrypoint = entrypoint;
        }
        if let Some(level) = lookup("BLOCKFORGE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("BLOCKFORGE_LOG_FORMAT") {
            self.logging.format = format;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.engine.max_calls == 0 {
            bail!("engine.max_calls must be greater than zero");
        }
        if self.engine.entrypoint.is_empty() {
            bail!("engine.entrypoint must not be empty");
        }
        Ok(())
    }
}
