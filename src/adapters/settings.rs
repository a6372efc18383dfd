//! JSON settings file: implements [`ConfigPort`].
//!
//! The file holds one JSON object with camelCase keys.  Unknown keys are
//! ignored and missing or invalid fields fall back to their defaults (see
//! [`VerifierConfig::from_json_object`]).

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde_json::{Map, Value};

use crate::app::ports::ConfigPort;
use crate::config::VerifierConfig;
use crate::error::ConfigError;

/// Settings stored in a JSON file on disk.
#[derive(Debug, Clone)]
pub struct JsonSettings {
    path: PathBuf,
}

impl JsonSettings {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigPort for JsonSettings {
    fn load(&self) -> Result<VerifierConfig, ConfigError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ConfigError::NotFound(self.path.clone()));
            }
            Err(source) => {
                return Err(ConfigError::Load {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let map: Map<String, Value> =
            serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
                path: self.path.clone(),
                source,
            })?;
        Ok(VerifierConfig::from_json_object(&map))
    }

    fn save(&self, config: &VerifierConfig) -> Result<(), ConfigError> {
        let mut text = serde_json::to_string_pretty(config)?;
        text.push('\n');
        fs::write(&self.path, text).map_err(|source| ConfigError::Save {
            path: self.path.clone(),
            source,
        })
    }
}

/// Load the configuration, never failing.
///
/// * missing file: defaults, which are then written out
/// * unreadable or corrupt file: defaults, file left untouched
pub fn load_or_init(port: &impl ConfigPort) -> VerifierConfig {
    match port.load() {
        Ok(config) => {
            info!("CONFIG: loaded");
            config
        }
        Err(ConfigError::NotFound(path)) => {
            let config = VerifierConfig::default();
            match port.save(&config) {
                Ok(()) => info!("CONFIG: wrote defaults to {}", path.display()),
                Err(e) => warn!("CONFIG: could not write defaults: {}", e),
            }
            config
        }
        Err(e) => {
            warn!("CONFIG: {}; using defaults", e);
            VerifierConfig::default()
        }
    }
}
