//! State - パイプラインの状態
//!
//! # 状態遷移
//! - Idle -> Rendered -> Applied -> TopologyCaptured -> InventoryReady -> Configured
//! - 非終端状態からはどこでも Failed に遷移できる
//! - 遷移は前進のみ（自動リトライなし）

use std::fmt;

use serde::{Deserialize, Serialize};

use super::errors::ErrorKind;

/// One pipeline stage, named for the state it moves the pipeline into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Rendered,
    Applied,
    TopologyCaptured,
    InventoryReady,
    Configured,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Rendered,
        Stage::Applied,
        Stage::TopologyCaptured,
        Stage::InventoryReady,
        Stage::Configured,
    ];

    /// State the pipeline must be in before this stage may run.
    pub fn requires(self) -> PipelineState {
        match self {
            Stage::Rendered => PipelineState::Idle,
            Stage::Applied => PipelineState::Rendered,
            Stage::TopologyCaptured => PipelineState::Applied,
            Stage::InventoryReady => PipelineState::TopologyCaptured,
            Stage::Configured => PipelineState::InventoryReady,
        }
    }

    /// State the pipeline is in after this stage succeeds.
    pub fn reaches(self) -> PipelineState {
        match self {
            Stage::Rendered => PipelineState::Rendered,
            Stage::Applied => PipelineState::Applied,
            Stage::TopologyCaptured => PipelineState::TopologyCaptured,
            Stage::InventoryReady => PipelineState::InventoryReady,
            Stage::Configured => PipelineState::Configured,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Rendered => "render",
            Stage::Applied => "apply",
            Stage::TopologyCaptured => "capture-topology",
            Stage::InventoryReady => "build-inventory",
            Stage::Configured => "configure",
        };
        f.write_str(s)
    }
}

/// PipelineState はパイプライン全体の状態
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Rendered,
    Applied,
    TopologyCaptured,
    InventoryReady,
    Configured,
    /// 終端状態。`at_state` は失敗したステージ（遷移しようとしていた先）
    Failed {
        at_state: Stage,
        kind: ErrorKind,
        cause: String,
    },
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Configured | PipelineState::Failed { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, PipelineState::Failed { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::Rendered => "rendered",
            PipelineState::Applied => "applied",
            PipelineState::TopologyCaptured => "topology_captured",
            PipelineState::InventoryReady => "inventory_ready",
            PipelineState::Configured => "configured",
            PipelineState::Failed { .. } => "failed",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
