//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせてパイプラインを実装します。
//!
//! # 主要コンポーネント
//! - **PipelineBuilder**: 設定から store / driver を組み立てる
//! - **ProvisioningDriver**: terraform init → plan → apply / output
//! - **ConfigurationDriver**: ansible-playbook
//! - **Sequencer**: 状態機械（Idle → … → Configured / Failed）
//! - **requests**: 1 ステージずつ実行するリクエスト操作

pub mod builder;
pub mod config;
pub mod configure;
pub mod provision;
pub mod requests;
pub mod sequencer;
mod stages;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, PipelineBuilder, PipelineContext};
pub use self::config::{ConfigError, PipelineConfig, ToolPaths};
pub use self::configure::{ConfigurationDriver, ConfigureOutput};
pub use self::provision::{ApplyOutput, ProvisioningDriver, StepOutput};
pub use self::sequencer::Sequencer;
