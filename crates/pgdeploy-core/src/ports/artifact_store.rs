//! ArtifactStore port - 生成物（descriptor / inventory）の保存先
//!
//! ステージ間の受け渡しは store 経由で行う。
//!
//! # 設計原則
//! - 1 つの store は 1 つの namespace（実行ごとの作業ディレクトリ）に対応
//! - 上書き保存（バージョン管理なし）
//! - I/O エラーは呼び出し側に返す（握りつぶさない）

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::domain::{ArtifactName, ProvisionError};

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Write (or overwrite) an artifact.
    async fn write(&self, name: ArtifactName, content: &str) -> Result<(), ProvisionError>;

    /// Read an artifact back.
    async fn read(&self, name: ArtifactName) -> Result<String, ProvisionError>;

    async fn exists(&self, name: ArtifactName) -> Result<bool, ProvisionError>;

    /// Path external tools are given for this artifact.
    fn path_of(&self, name: ArtifactName) -> PathBuf;

    /// Working directory external tools run in.
    fn root(&self) -> &Path;

    /// Namespace this store is bound to.
    fn namespace(&self) -> &str;
}
