//! Application settings loaded from `appsettings.json`
//!
//! ```json
//! {
//!   "ConnectionStrings": { "Shop": "Server=tcp:db,1433;Database=shop;..." },
//!   "Procall": { "DefaultCommandTimeoutSecs": 30 }
//! }
//! ```

use procall_core::{ProcallError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings file name looked up by `AppSettings::discover`
pub const SETTINGS_FILE_NAME: &str = "appsettings.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct AppSettings {
    /// Logical database name to connection string
    pub connection_strings: HashMap<String, String>,
    pub procall: InvokerSettings,
}

/// Timeouts used by the invoker. A value of 0 means no limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct InvokerSettings {
    pub default_command_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Connect timeout for `spawn_non_query`
    pub fire_and_forget_connect_timeout_secs: u64,
}

impl Default for InvokerSettings {
    fn default() -> Self {
        Self {
            default_command_timeout_secs: 30,
            connect_timeout_secs: 15,
            fire_and_forget_connect_timeout_secs: 4000,
        }
    }
}

fn limit(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

impl InvokerSettings {
    pub fn command_timeout(&self) -> Option<Duration> {
        limit(self.default_command_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        limit(self.connect_timeout_secs)
    }

    pub fn fire_and_forget_connect_timeout(&self) -> Option<Duration> {
        limit(self.fire_and_forget_connect_timeout_secs)
    }
}

impl AppSettings {
    /// Load settings from a file; a missing file gives the defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no settings file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content).map_err(|e| match e {
            ProcallError::Configuration(msg) => {
                ProcallError::Configuration(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| ProcallError::Configuration(e.to_string()))
    }

    /// Load the first settings file found in the working directory or the
    /// user config directory (`<config>/procall/appsettings.json`)
    pub fn discover() -> Result<Self> {
        match Self::candidate_paths().into_iter().find(|p| p.exists()) {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    fn candidate_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(SETTINGS_FILE_NAME)];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("procall").join(SETTINGS_FILE_NAME));
        }
        paths
    }

    pub fn connection_string(&self, name: &str) -> Option<&str> {
        self.connection_strings.get(name).map(String::as_str)
    }

    pub fn with_connection_string(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.connection_strings.insert(name.into(), value.into());
        self
    }
}
