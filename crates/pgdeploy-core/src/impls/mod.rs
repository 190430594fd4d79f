//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **LocalArtifactStore**: namespace ディレクトリに artifact を保存
//! - **ProcessRunner**: tokio::process で外部ツールを実行（タイムアウト・キャンセル対応）
//! - **ScriptedRunner**: テスト用（プロセスを起動しない）

pub mod local_store;
pub mod process;
#[cfg(test)]
pub mod scripted;

// 主要な型を再エクスポート
pub use self::local_store::{LocalArtifactStore, validate_namespace};
pub use self::process::ProcessRunner;
