//! PipelineBuilder - 設定からパイプラインの部品を組み立てる
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）：設定が不正なら何も起動しない
//! - CommandRunner を差し替えればプロセスを起動せずにテストできる

use std::path::Path;
use std::sync::Arc;

use tokio::sync::watch;

use crate::domain::{ProvisionError, RunId};
use crate::impls::{LocalArtifactStore, ProcessRunner};
use crate::ports::{ArtifactStore, CommandRunner};
use crate::render::InfrastructureSettings;

use super::config::{ConfigError, PipelineConfig};
use super::configure::ConfigurationDriver;
use super::provision::ProvisioningDriver;

/// Everything a stage needs: where artifacts live and how tools are run.
pub struct PipelineContext {
    pub store: Arc<dyn ArtifactStore>,
    pub provisioner: ProvisioningDriver,
    pub configurator: ConfigurationDriver,
    pub settings: InfrastructureSettings,
    pub require_key_file: bool,
}

/// BuildError はパイプライン構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to open artifact namespace: {0}")]
    Store(#[from] ProvisionError),
}

/// PipelineBuilder はパイプラインを構築
///
/// # 使用例
/// ```ignore
/// let ctx = PipelineBuilder::new(config)
///     .cancellation(cancel_rx)
///     .open("staging-1")
///     .await?;
/// ```
pub struct PipelineBuilder {
    config: PipelineConfig,
    runner: Option<Arc<dyn CommandRunner>>,
    cancel: Option<watch::Receiver<bool>>,
}

impl PipelineBuilder {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            runner: None,
            cancel: None,
        }
    }

    /// Use this runner instead of spawning real processes.
    pub fn runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    /// Cancel in-flight tools once `true` is sent. Ignored when a custom runner is set.
    pub fn cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Open (or reuse) a named namespace under the configured work root.
    pub async fn open(self, namespace: &str) -> Result<PipelineContext, BuildError> {
        self.config.validate()?;
        let store = LocalArtifactStore::open(&self.config.work_root, namespace).await?;
        self.build_with_store(Arc::new(store))
    }

    /// Open a fresh namespace named after the run.
    pub async fn open_run(self, run_id: RunId) -> Result<PipelineContext, BuildError> {
        self.open(&run_id.to_string()).await
    }

    /// Wire the drivers around an already opened store.
    pub fn build_with_store(
        self,
        store: Arc<dyn ArtifactStore>,
    ) -> Result<PipelineContext, BuildError> {
        self.config.validate()?;
        let runner: Arc<dyn CommandRunner> = match self.runner {
            Some(runner) => runner,
            None => {
                let mut process = ProcessRunner::new().with_timeout(self.config.step_timeout());
                if let Some(cancel) = self.cancel {
                    process = process.with_cancellation(cancel);
                }
                Arc::new(process)
            }
        };

        let excerpt = self.config.stderr_excerpt_bytes;
        Ok(PipelineContext {
            store,
            provisioner: ProvisioningDriver::new(
                runner.clone(),
                self.config.tools.terraform,
                excerpt,
            ),
            configurator: ConfigurationDriver::new(
                runner,
                self.config.tools.ansible_playbook,
                excerpt,
            ),
            settings: self.config.infrastructure,
            require_key_file: self.config.require_key_file,
        })
    }
}

impl PipelineContext {
    pub fn work_dir(&self) -> &Path {
        self.store.root()
    }
}
