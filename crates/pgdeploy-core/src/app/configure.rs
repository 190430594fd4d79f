//! ConfigurationDriver - ansible-playbook で構成を適用

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::errors::stderr_excerpt;
use crate::domain::{ProvisionError, ToolFailure};
use crate::ports::{CommandRunner, Invocation};

use super::provision::tool_failure;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigureOutput {
    pub stdout: String,
    pub stderr: String,
}

pub struct ConfigurationDriver {
    runner: Arc<dyn CommandRunner>,
    program: String,
    excerpt_bytes: usize,
}

impl ConfigurationDriver {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        program: impl Into<String>,
        excerpt_bytes: usize,
    ) -> Self {
        Self {
            runner,
            program: program.into(),
            excerpt_bytes,
        }
    }

    /// `ansible-playbook -i <inventory> <playbook>`, run from the inventory's directory.
    ///
    /// Both files must exist; otherwise nothing is started.
    pub async fn configure(
        &self,
        inventory_path: &Path,
        playbook_path: &Path,
    ) -> Result<ConfigureOutput, ProvisionError> {
        require_file(inventory_path, "inventory").await?;
        require_file(playbook_path, "configuration descriptor").await?;
        // 子プロセスは別の cwd で動くので相対パスのまま渡さない
        let inventory_path = absolute(inventory_path)?;
        let playbook_path = absolute(playbook_path)?;
        let cwd = inventory_path.parent().unwrap_or_else(|| Path::new("/"));

        let invocation = Invocation::new(
            &self.program,
            [
                "-i".to_string(),
                inventory_path.to_string_lossy().into_owned(),
                playbook_path.to_string_lossy().into_owned(),
            ],
            cwd,
        );
        info!(inventory = %inventory_path.display(), "ansible-playbook starting");

        let out = match self.runner.run(&invocation).await {
            Ok(out) => out,
            Err(err) => {
                warn!(error = %err, "ansible-playbook did not complete");
                return Err(ProvisionError::Configuration {
                    exit_code: None,
                    stderr_excerpt: String::new(),
                    cause: tool_failure(err),
                });
            }
        };
        if !out.success() {
            warn!(exit_code = ?out.exit_code, "ansible-playbook failed");
            return Err(ProvisionError::Configuration {
                exit_code: out.exit_code,
                stderr_excerpt: stderr_excerpt(&out.stderr, self.excerpt_bytes),
                cause: ToolFailure::Exit,
            });
        }
        info!("ansible-playbook finished");
        Ok(ConfigureOutput {
            stdout: out.stdout,
            stderr: out.stderr,
        })
    }
}

fn absolute(path: &Path) -> Result<PathBuf, ProvisionError> {
    std::path::absolute(path).map_err(|e| ProvisionError::io(path, e))
}

async fn require_file(path: &Path, what: &str) -> Result<(), ProvisionError> {
    let exists = tokio::fs::try_exists(path)
        .await
        .map_err(|e| ProvisionError::io(path, e))?;
    if !exists {
        return Err(ProvisionError::precondition(format!(
            "{what} {} does not exist",
            path.display()
        )));
    }
    Ok(())
}
