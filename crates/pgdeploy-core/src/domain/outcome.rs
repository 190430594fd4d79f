//! Outcome model: the result format every pipeline stage reports.
//!
//! Each executed stage produces exactly one [`StageResult`]. Results are
//! returned to the caller and collected in the [`PipelineReport`]; they are
//! never dropped on the floor.

use serde::{Deserialize, Serialize};

use super::errors::{ErrorKind, ProvisionError};
use super::ids::RunId;
use super::state::{PipelineState, Stage};

/// A reference to something produced or observed during a stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum Artifact {
    /// Path to a file produced or used.
    FilePath(String),

    /// Rendered text (descriptor or inventory content).
    Text(String),

    /// Standard output captured from a tool.
    Stdout(String),

    /// Structured observation (e.g. the captured topology).
    Json(serde_json::Value),
}

/// Tagged outcome of one stage.
///
/// Serialized as SCREAMING_SNAKE_CASE under `outcome`: SUCCESS / FAILURE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageResult {
    Success {
        stage: Stage,
        details: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        artifacts: Vec<Artifact>,
    },
    Failure {
        stage: Stage,
        kind: ErrorKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        exit_code: Option<i32>,
        #[serde(default, skip_serializing_if = "String::is_empty")]
        stderr_excerpt: String,
        cause: String,
    },
}

impl StageResult {
    pub fn success(stage: Stage, details: impl Into<String>) -> Self {
        StageResult::Success {
            stage,
            details: details.into(),
            artifacts: Vec::new(),
        }
    }

    pub fn failure(stage: Stage, err: &ProvisionError) -> Self {
        StageResult::Failure {
            stage,
            kind: err.kind(),
            exit_code: err.exit_code(),
            stderr_excerpt: err.stderr_excerpt().to_string(),
            cause: err.to_string(),
        }
    }

    pub fn from_result<T>(
        stage: Stage,
        result: &Result<T, ProvisionError>,
        details: impl FnOnce(&T) -> StageResult,
    ) -> Self {
        match result {
            Ok(value) => details(value),
            Err(err) => StageResult::failure(stage, err),
        }
    }

    /// Attach an artifact (no-op on failures).
    pub fn with_artifact(mut self, artifact: Artifact) -> Self {
        if let StageResult::Success { artifacts, .. } = &mut self {
            artifacts.push(artifact);
        }
        self
    }

    pub fn stage(&self) -> Stage {
        match self {
            StageResult::Success { stage, .. } | StageResult::Failure { stage, .. } => *stage,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, StageResult::Success { .. })
    }
}

/// Everything a pipeline run reports back: where it ended and how each stage went.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub run_id: RunId,
    pub namespace: String,
    pub final_state: PipelineState,
    pub stages: Vec<StageResult>,
}

impl PipelineReport {
    pub fn succeeded(&self) -> bool {
        self.final_state == PipelineState::Configured
    }
}
