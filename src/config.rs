//! Service configuration
//!
//! Read from the environment (binaries load `.env` first via dotenv).
//! The threshold registry is the only tunable of the decision engine itself.

use crate::error::ClassificationError;
use crate::registry::ThresholdRegistry;
use crate::Result;
use std::env;
use std::path::PathBuf;
use tracing::info;

const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub port: u16,
    /// JSON file with per-type threshold overrides
    pub thresholds_path: Option<PathBuf>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            thresholds_path: None,
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let port = match lookup("PORT").or_else(|| lookup("API_PORT")) {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ClassificationError::Config(format!("invalid port: {}", raw)))?,
            None => DEFAULT_PORT,
        };

        let thresholds_path = lookup("CLASSIFIER_THRESHOLDS_PATH")
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            port,
            thresholds_path,
        })
    }

    /// Built-in thresholds, or the override file merged on top
    pub fn load_registry(&self) -> Result<ThresholdRegistry> {
        match &self.thresholds_path {
            Some(path) => {
                info!(path = %path.display(), "Loading threshold overrides");
                ThresholdRegistry::from_file(path)
            }
            None => ThresholdRegistry::with_defaults(),
        }
    }
}
