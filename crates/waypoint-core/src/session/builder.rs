//! Builder for creating and configuring SessionStore instances.

use std::path::{Path, PathBuf};

use super::SessionStore;
use crate::{config::EngineConfig, error::Result};

/// Builder for creating and configuring SessionStore instances.
#[derive(Debug, Clone, Default)]
pub struct SessionBuilder {
    config_file: Option<PathBuf>,
    config: Option<EngineConfig>,
}

impl SessionBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a configuration file to load.
    ///
    /// If not specified, uses `$XDG_CONFIG_HOME/waypoint/config.json` when it
    /// exists, and built-in defaults otherwise.
    pub fn with_config_file<P: AsRef<Path>>(mut self, path: Option<P>) -> Self {
        if let Some(path) = path {
            self.config_file = Some(path.as_ref().to_path_buf());
        }
        self
    }

    /// Uses the given configuration, ignoring any configuration file.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Builds the configured store.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::FileSystem` if a configuration file cannot be read
    /// Returns `EngineError::Configuration` if it does not parse
    pub fn build(self) -> Result<SessionStore> {
        let config = match self.config {
            Some(config) => config,
            None => EngineConfig::load(self.config_file.as_deref())?,
        };

        log::debug!(
            "Building session store (max_retries={}, auto_verification={})",
            config.max_retries,
            config.auto_verification
        );

        Ok(SessionStore::new(config))
    }
}
