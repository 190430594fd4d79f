//! LocalArtifactStore - namespace ごとのディレクトリに artifact を保存
//!
//! `<work_root>/<namespace>/terraform.tf` のように配置する。
//! 同時実行される各リクエストは別々の namespace を使うので、
//! 同じファイルへの同時書き込みは起こらない（ロック不要）。

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::domain::{ArtifactName, ProvisionError, RunId};
use crate::ports::ArtifactStore;

pub struct LocalArtifactStore {
    root: PathBuf,
    namespace: String,
}

impl LocalArtifactStore {
    /// Open (creating if needed) the namespace directory under `work_root`.
    ///
    /// The stored root is absolute, so paths handed to tools that run with a
    /// different working directory still resolve.
    pub async fn open(
        work_root: impl AsRef<Path>,
        namespace: &str,
    ) -> Result<Self, ProvisionError> {
        validate_namespace(namespace)?;
        let root = work_root.as_ref().join(namespace);
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| ProvisionError::io(&root, e))?;
        let root = std::path::absolute(&root).map_err(|e| ProvisionError::io(&root, e))?;
        debug!(namespace, root = %root.display(), "opened artifact namespace");
        Ok(Self {
            root,
            namespace: namespace.to_string(),
        })
    }

    /// Fresh namespace for one pipeline run.
    pub async fn for_run(work_root: impl AsRef<Path>, run_id: RunId) -> Result<Self, ProvisionError> {
        Self::open(work_root, &run_id.to_string()).await
    }
}

/// Namespaces become directory names, so only a safe character set is allowed.
pub fn validate_namespace(namespace: &str) -> Result<(), ProvisionError> {
    let ok = !namespace.is_empty()
        && namespace.len() <= 128
        && namespace
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !ok {
        return Err(ProvisionError::validation(format!(
            "namespace {namespace:?} must be 1-128 characters of [A-Za-z0-9_-]"
        )));
    }
    Ok(())
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn write(&self, name: ArtifactName, content: &str) -> Result<(), ProvisionError> {
        let path = self.path_of(name);
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| ProvisionError::io(&path, e))?;
        debug!(artifact = %name, bytes = content.len(), "wrote artifact");
        Ok(())
    }

    async fn read(&self, name: ArtifactName) -> Result<String, ProvisionError> {
        let path = self.path_of(name);
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ProvisionError::io(&path, e))
    }

    async fn exists(&self, name: ArtifactName) -> Result<bool, ProvisionError> {
        let path = self.path_of(name);
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| ProvisionError::io(&path, e))
    }

    fn path_of(&self, name: ArtifactName) -> PathBuf {
        self.root.join(name.file_name())
    }

    fn root(&self) -> &Path {
        &self.root
    }

    fn namespace(&self) -> &str {
        &self.namespace
    }
}
