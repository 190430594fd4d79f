//! Errors - パイプラインのエラー型と分類
//!
//! すべてのコンポーネントは `ProvisionError` を返し、握りつぶさない。
//! Sequencer は最初のエラーで `Failed` に遷移して停止する。

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// ErrorKind はエラーの運用分類（呼び出し側に返すペイロード用）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// 入力パラメータ・認証情報の不備（外部ツールには到達しない）
    Validation,
    /// artifact の読み書き失敗
    Io,
    /// apply ツール出力の形式不正
    Parse,
    /// ステージの前提条件（必要な artifact など）が満たされていない
    Precondition,
    /// インフラ apply ツールの失敗
    Provisioning,
    /// 構成管理ツールの失敗
    Configuration,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Io => "io",
            ErrorKind::Parse => "parse",
            ErrorKind::Precondition => "precondition",
            ErrorKind::Provisioning => "provisioning",
            ErrorKind::Configuration => "configuration",
        };
        f.write_str(s)
    }
}

/// Why an external tool invocation did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cause", rename_all = "snake_case")]
pub enum ToolFailure {
    /// The process ran and exited non-zero (or was killed by a signal).
    Exit,
    /// The process exceeded the configured step timeout.
    Timeout { after_secs: u64 },
    /// The run was cancelled while the process was in flight.
    Cancelled,
    /// The process could not be started at all.
    Spawn { message: String },
}

impl ToolFailure {
    /// Whole seconds, rounded up so a sub-second timeout never reads as 0s.
    pub fn timeout(after: Duration) -> Self {
        let partial = after.subsec_nanos() > 0;
        ToolFailure::Timeout {
            after_secs: after.as_secs() + u64::from(partial),
        }
    }
}

impl fmt::Display for ToolFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolFailure::Exit => f.write_str("non-zero exit"),
            ToolFailure::Timeout { after_secs } => write!(f, "timeout after {after_secs}s"),
            ToolFailure::Cancelled => f.write_str("cancelled"),
            ToolFailure::Spawn { message } => write!(f, "failed to start: {message}"),
        }
    }
}

/// Sub-steps of the infrastructure apply tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionStep {
    Init,
    Plan,
    Apply,
    Output,
}

impl ProvisionStep {
    pub fn as_str(self) -> &'static str {
        match self {
            ProvisionStep::Init => "init",
            ProvisionStep::Plan => "plan",
            ProvisionStep::Apply => "apply",
            ProvisionStep::Output => "output",
        }
    }
}

impl fmt::Display for ProvisionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ProvisionError はパイプライン全体のエラー
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("invalid input: {message}")]
    Validation { message: String },

    #[error("I/O on {} failed: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed apply output: {message}")]
    Parse { message: String },

    #[error("precondition not met: {message}")]
    Precondition { message: String },

    #[error("terraform {step} failed: {cause}")]
    Provisioning {
        step: ProvisionStep,
        exit_code: Option<i32>,
        stderr_excerpt: String,
        cause: ToolFailure,
    },

    #[error("ansible-playbook failed: {cause}")]
    Configuration {
        exit_code: Option<i32>,
        stderr_excerpt: String,
        cause: ToolFailure,
    },
}

impl ProvisionError {
    pub fn validation(message: impl Into<String>) -> Self {
        ProvisionError::Validation {
            message: message.into(),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        ProvisionError::Parse {
            message: message.into(),
        }
    }

    pub fn precondition(message: impl Into<String>) -> Self {
        ProvisionError::Precondition {
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ProvisionError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ProvisionError::Validation { .. } => ErrorKind::Validation,
            ProvisionError::Io { .. } => ErrorKind::Io,
            ProvisionError::Parse { .. } => ErrorKind::Parse,
            ProvisionError::Precondition { .. } => ErrorKind::Precondition,
            ProvisionError::Provisioning { .. } => ErrorKind::Provisioning,
            ProvisionError::Configuration { .. } => ErrorKind::Configuration,
        }
    }

    /// Exit code of the failed external tool, if one ran to completion.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ProvisionError::Provisioning { exit_code, .. }
            | ProvisionError::Configuration { exit_code, .. } => *exit_code,
            _ => None,
        }
    }

    /// Bounded stderr excerpt captured from the failed tool (empty otherwise).
    pub fn stderr_excerpt(&self) -> &str {
        match self {
            ProvisionError::Provisioning { stderr_excerpt, .. }
            | ProvisionError::Configuration { stderr_excerpt, .. } => stderr_excerpt,
            _ => "",
        }
    }
}

/// Keep the tail of `text`, at most `max_bytes` long, on a char boundary.
///
/// Tools print their diagnostics last, so the tail is the useful part.
pub fn stderr_excerpt(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut start = text.len() - max_bytes;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    text[start..].to_string()
}
