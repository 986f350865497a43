// cartograph/src/config.rs

//! Controller configuration. Every field has a default, so an empty JSON
//! object is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("read config {}: {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("parse config: {0}")]
  Parse(#[from] serde_json::Error),

  #[error("invalid config: {0}")]
  Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerConfig {
  /// Type of the summary condition leading every owner's condition list.
  #[serde(default = "default_ready_condition_type")]
  pub ready_condition_type: String,
  /// Prefix of the labels and annotations put on stamped objects.
  #[serde(default = "default_label_prefix")]
  pub label_prefix: String,
}

fn default_ready_condition_type() -> String {
  "Ready".to_string()
}

fn default_label_prefix() -> String {
  "cartograph.dev".to_string()
}

impl Default for ControllerConfig {
  fn default() -> Self {
    Self {
      ready_condition_type: default_ready_condition_type(),
      label_prefix: default_label_prefix(),
    }
  }
}

impl ControllerConfig {
  pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
    let config: ControllerConfig = serde_json::from_str(raw)?;
    config.validate()?;
    Ok(config)
  }

  pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    Self::from_json_str(&raw)
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.ready_condition_type.trim().is_empty() {
      return Err(ConfigError::Invalid("readyConditionType must not be empty".to_string()));
    }
    if self.label_prefix.trim().is_empty() || self.label_prefix.contains('/') {
      return Err(ConfigError::Invalid(format!(
        "labelPrefix '{}' must be a non-empty DNS prefix",
        self.label_prefix
      )));
    }
    Ok(())
  }

  /// `<prefix>/<name>`, the key format for labels and annotations.
  pub fn key(&self, name: &str) -> String {
    format!("{}/{}", self.label_prefix, name)
  }
}
