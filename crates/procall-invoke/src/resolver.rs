//! Connection-string resolution

use crate::config::AppSettings;
use procall_core::Result;
use std::collections::HashMap;
use std::path::Path;

/// Maps a logical database name to a connection string.
///
/// An empty string means "not configured".
pub trait ConnectionResolver: Send + Sync {
    fn resolve(&self, name: &str) -> String;
}

impl<F> ConnectionResolver for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn resolve(&self, name: &str) -> String {
        self(name)
    }
}

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Resolves from an environment variable named after the database, then
/// from the `ConnectionStrings` settings section
pub struct EnvConfigResolver {
    connection_strings: HashMap<String, String>,
    env: EnvLookup,
}

impl EnvConfigResolver {
    pub fn new(settings: &AppSettings) -> Self {
        Self {
            connection_strings: settings.connection_strings.clone(),
            env: Box::new(|name| std::env::var(name).ok()),
        }
    }

    /// Resolver over the settings file at `path`
    pub fn from_file(path: &Path) -> Result<Self> {
        Ok(Self::new(&AppSettings::load(path)?))
    }

    /// Replace the environment lookup
    pub fn with_env_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env = Box::new(lookup);
        self
    }
}

impl ConnectionResolver for EnvConfigResolver {
    fn resolve(&self, name: &str) -> String {
        if let Some(value) = (self.env)(name).filter(|v| !v.is_empty()) {
            return value;
        }
        self.connection_strings.get(name).cloned().unwrap_or_default()
    }
}

impl std::fmt::Debug for EnvConfigResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.connection_strings.keys().collect();
        names.sort();
        f.debug_struct("EnvConfigResolver")
            .field("configured", &names)
            .finish()
    }
}
