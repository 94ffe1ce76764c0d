//! Catalog configuration
//!
//! Loads and validates the YAML file naming the service-code method and the
//! talkable-message marker.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::doc::TALK_MARKER;

/// Environment variable pointing at a YAML config file
pub const CONFIG_ENV_VAR: &str = "STATUS_CATALOG_CONFIG";

/// Conventional name of the service-code method
pub const DEFAULT_SERVICE_CODE_METHOD: &str = status_types::SERVICE_CODE_METHOD;

/// Configuration for the catalog builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Name of the zero-argument method whose literal return value offsets every code.
    pub service_code_method: String,
    /// Doc-comment prefix marking a message as talkable (including its trailing space).
    pub talk_marker: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            service_code_method: DEFAULT_SERVICE_CODE_METHOD.to_string(),
            talk_marker: TALK_MARKER.to_string(),
        }
    }
}

impl CatalogConfig {
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: CatalogConfig =
            serde_yaml::from_str(content).context("Failed to parse catalog config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading catalog configuration from {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        Self::from_yaml_str(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    /// Load from `STATUS_CATALOG_CONFIG` if set, defaults otherwise
    pub fn from_env() -> Result<Self> {
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(path) if !path.is_empty() => Self::from_file(path),
            _ => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.service_code_method.trim().is_empty() {
            bail!("service_code_method must not be empty");
        }
        if self.talk_marker.is_empty() {
            bail!("talk_marker must not be empty");
        }
        Ok(())
    }
}
