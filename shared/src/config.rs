//! Host configuration loaded from the environment.
//!
//! User-facing options live in the settings record; this only covers what
//! the host process needs before it can open that record.

use std::env;
use std::path::PathBuf;

use crate::settings::Settings;
use crate::{Error, Result};

/// Host process configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Where the settings record is stored
    pub settings_path: PathBuf,
    /// Endpoint written into the settings record on first run
    pub default_endpoint: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let settings_path = match env::var_os("MARCHIVER_SETTINGS_PATH") {
            Some(path) if !path.is_empty() => PathBuf::from(path),
            _ => default_settings_path()?,
        };

        Ok(Self {
            settings_path,
            default_endpoint: env::var("MARCHIVER_DEFAULT_ENDPOINT")
                .ok()
                .filter(|v| !v.trim().is_empty()),
        })
    }

    /// Settings record a fresh install starts from.
    pub fn install_defaults(&self) -> Settings {
        Settings::with_endpoint(self.default_endpoint.as_deref())
    }
}

fn default_settings_path() -> Result<PathBuf> {
    let base = env::var_os("XDG_CONFIG_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
        .or_else(|| env::var_os("APPDATA").map(PathBuf::from))
        .ok_or_else(|| {
            Error::Config("Cannot locate a config directory; set MARCHIVER_SETTINGS_PATH".to_string())
        })?;

    Ok(base.join("marchiver").join("settings.json"))
}
