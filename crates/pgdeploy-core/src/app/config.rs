//! Pipeline configuration loaded from a JSON file.
//!
//! Every field has a default, so `{}` (or no file at all) is a valid config.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::render::InfrastructureSettings;

pub const DEFAULT_STEP_TIMEOUT_SECS: u64 = 1800;
pub const DEFAULT_STDERR_EXCERPT_BYTES: usize = 4096;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Executables for the wrapped tools (names on PATH or absolute paths).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPaths {
    pub terraform: String,
    pub ansible_playbook: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            terraform: "terraform".to_string(),
            ansible_playbook: "ansible-playbook".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Parent directory of every run namespace.
    pub work_root: PathBuf,

    pub tools: ToolPaths,

    /// Per-invocation timeout; `null` disables it.
    pub step_timeout_secs: Option<u64>,

    /// Upper bound on the stderr excerpt carried by tool errors.
    pub stderr_excerpt_bytes: usize,

    /// Require the SSH private key to be readable before writing the inventory.
    pub require_key_file: bool,

    pub infrastructure: InfrastructureSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            work_root: PathBuf::from("pgdeploy-runs"),
            tools: ToolPaths::default(),
            step_timeout_secs: Some(DEFAULT_STEP_TIMEOUT_SECS),
            stderr_excerpt_bytes: DEFAULT_STDERR_EXCERPT_BYTES,
            require_key_file: false,
            infrastructure: InfrastructureSettings::default(),
        }
    }
}

impl PipelineConfig {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        let config: PipelineConfig =
            serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn step_timeout(&self) -> Option<Duration> {
        self.step_timeout_secs.map(Duration::from_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tools.terraform.trim().is_empty() {
            return Err(ConfigError::Invalid("tools.terraform is empty".to_string()));
        }
        if self.tools.ansible_playbook.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "tools.ansible_playbook is empty".to_string(),
            ));
        }
        if self.stderr_excerpt_bytes == 0 {
            return Err(ConfigError::Invalid(
                "stderr_excerpt_bytes must be positive".to_string(),
            ));
        }
        if self.step_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "step_timeout_secs must be positive (use null to disable)".to_string(),
            ));
        }
        Ok(())
    }
}
