//! Configuration file resolution and TOML loading

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV_VAR: &str = "ROCKFALL_CONFIG";

/// Where the effective configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// `--config` command-line argument
    Cli(PathBuf),
    /// `ROCKFALL_CONFIG` environment variable
    Env(PathBuf),
    /// Platform configuration file discovered on disk
    File(PathBuf),
    /// No file found; compiled defaults apply
    Defaults,
}

impl ConfigSource {
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigSource::Cli(p) | ConfigSource::Env(p) | ConfigSource::File(p) => Some(p),
            ConfigSource::Defaults => None,
        }
    }
}

/// Logging section shared by every binary's config file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default tracing level when RUST_LOG is not set
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Config file resolution following priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. Platform config file (`~/.config/<app>/config.toml`, then `/etc/<app>/config.toml` on Linux)
/// 4. Compiled defaults (fallback)
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    app_name: String,
    env_var: String,
}

impl ConfigResolver {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            env_var: CONFIG_ENV_VAR.to_string(),
        }
    }

    /// Override the environment variable consulted at priority 2
    pub fn with_env_var(mut self, env_var: impl Into<String>) -> Self {
        self.env_var = env_var.into();
        self
    }

    pub fn resolve(&self, cli_arg: Option<&Path>) -> ConfigSource {
        // Priority 1: Command-line argument
        if let Some(path) = cli_arg {
            return ConfigSource::Cli(path.to_path_buf());
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(&self.env_var) {
            if !path.trim().is_empty() {
                return ConfigSource::Env(PathBuf::from(path));
            }
        }

        // Priority 3: Platform config file
        if let Some(path) = self.platform_config_file() {
            return ConfigSource::File(path);
        }

        // Priority 4: Compiled defaults
        ConfigSource::Defaults
    }

    fn platform_config_file(&self) -> Option<PathBuf> {
        let user_config = dirs::config_dir().map(|d| d.join(&self.app_name).join("config.toml"));
        if let Some(path) = user_config {
            if path.exists() {
                return Some(path);
            }
        }

        if cfg!(target_os = "linux") {
            let system_config = PathBuf::from("/etc").join(&self.app_name).join("config.toml");
            if system_config.exists() {
                return Some(system_config);
            }
        }

        None
    }

    /// Resolve and load a TOML configuration document
    ///
    /// An explicitly named file (CLI or ENV) must exist. A missing platform
    /// file is not an error: defaults are returned with a warning.
    pub fn load<T>(&self, cli_arg: Option<&Path>) -> Result<(T, ConfigSource)>
    where
        T: DeserializeOwned + Default,
    {
        let source = self.resolve(cli_arg);
        let value = match source.path() {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                load_toml(path)?
            }
            None => {
                warn!(
                    "No configuration file found for {}; using compiled defaults",
                    self.app_name
                );
                T::default()
            }
        };
        Ok((value, source))
    }
}

/// Read and parse a TOML file into `T`
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Err(Error::Config(format!(
            "Config file not found: {}",
            path.display()
        )));
    }
    let content = std::fs::read_to_string(path)?;
    let value = toml::from_str(&content)?;
    Ok(value)
}
