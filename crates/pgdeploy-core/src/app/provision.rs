//! ProvisioningDriver - terraform の init → plan → apply を実行
//!
//! # 学習ポイント
//! - 手順は固定順で、最初に失敗した手順で止まる（後続は起動しない）
//! - 作業ディレクトリは descriptor のあるディレクトリ（namespace）
//! - プロセス起動は CommandRunner 経由なのでテストでは差し替えられる

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::errors::stderr_excerpt;
use crate::domain::{ProvisionError, ProvisionStep, ToolFailure};
use crate::ports::{CommandOutput, CommandRunner, Invocation, RunError};

/// Captured output of one successful terraform step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutput {
    pub step: ProvisionStep,
    pub stdout: String,
    pub stderr: String,
}

/// Outputs of init, plan and apply, in execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyOutput {
    pub steps: Vec<StepOutput>,
}

impl ApplyOutput {
    pub fn step(&self, step: ProvisionStep) -> Option<&StepOutput> {
        self.steps.iter().find(|s| s.step == step)
    }
}

pub struct ProvisioningDriver {
    runner: Arc<dyn CommandRunner>,
    program: String,
    excerpt_bytes: usize,
}

impl ProvisioningDriver {
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

    /// Run init, plan and apply against the directory holding `descriptor_path`.
    pub async fn apply(&self, descriptor_path: &Path) -> Result<ApplyOutput, ProvisionError> {
        let exists = tokio::fs::try_exists(descriptor_path)
            .await
            .map_err(|e| ProvisionError::io(descriptor_path, e))?;
        if !exists {
            return Err(ProvisionError::precondition(format!(
                "infrastructure descriptor {} does not exist",
                descriptor_path.display()
            )));
        }
        let workdir = descriptor_path.parent().ok_or_else(|| {
            ProvisionError::precondition(format!(
                "infrastructure descriptor {} has no parent directory",
                descriptor_path.display()
            ))
        })?;

        let plan: [(ProvisionStep, &[&str]); 3] = [
            (ProvisionStep::Init, &["init", "-input=false", "-no-color"]),
            (ProvisionStep::Plan, &["plan", "-input=false", "-no-color"]),
            (
                ProvisionStep::Apply,
                &["apply", "-auto-approve", "-input=false", "-no-color"],
            ),
        ];

        let mut steps = Vec::with_capacity(plan.len());
        for (step, args) in plan {
            let out = self.run_step(step, args, workdir).await?;
            steps.push(StepOutput {
                step,
                stdout: out.stdout,
                stderr: out.stderr,
            });
        }
        Ok(ApplyOutput { steps })
    }

    /// Raw `terraform output -json` for an applied working directory.
    pub async fn outputs(&self, workdir: &Path) -> Result<String, ProvisionError> {
        let out = self
            .run_step(ProvisionStep::Output, &["output", "-json"], workdir)
            .await?;
        Ok(out.stdout)
    }

    async fn run_step(
        &self,
        step: ProvisionStep,
        args: &[&str],
        workdir: &Path,
    ) -> Result<CommandOutput, ProvisionError> {
        let invocation = Invocation::new(&self.program, args.iter().copied(), workdir);
        info!(%step, cwd = %workdir.display(), "terraform step starting");

        let failed = |exit_code, stderr: &str, cause| ProvisionError::Provisioning {
            step,
            exit_code,
            stderr_excerpt: stderr_excerpt(stderr, self.excerpt_bytes),
            cause,
        };

        let out = match self.runner.run(&invocation).await {
            Ok(out) => out,
            Err(err) => {
                warn!(%step, error = %err, "terraform step did not complete");
                return Err(failed(None, "", tool_failure(err)));
            }
        };
        if !out.success() {
            warn!(%step, exit_code = ?out.exit_code, "terraform step failed");
            return Err(failed(out.exit_code, &out.stderr, ToolFailure::Exit));
        }
        info!(%step, "terraform step finished");
        Ok(out)
    }
}

pub(crate) fn tool_failure(err: RunError) -> ToolFailure {
    match err {
        RunError::TimedOut(after) => ToolFailure::timeout(after),
        RunError::Cancelled => ToolFailure::Cancelled,
        RunError::Spawn { program, source } => ToolFailure::Spawn {
            message: format!("{program}: {source}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorKind;
    use crate::impls::scripted::{Reply, ScriptedRunner};
    use std::time::Duration;

    fn driver(runner: &Arc<ScriptedRunner>) -> ProvisioningDriver {
        ProvisioningDriver::new(runner.clone(), "terraform", 64)
    }

    fn descriptor(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let path = dir.path().join("terraform.tf");
        std::fs::write(&path, "# descriptor").unwrap();
        path
    }

    #[tokio::test]
    async fn runs_init_plan_apply_in_descriptor_directory() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new().on("apply", Reply::ok("Apply complete!")));

        let out = driver(&runner).apply(&descriptor(&dir)).await.unwrap();

        assert_eq!(
            runner.call_names(),
            vec!["terraform init", "terraform plan", "terraform apply"]
        );
        assert!(runner.calls().iter().all(|c| c.cwd == dir.path()));
        assert!(runner.calls()[2].args.contains(&"-auto-approve".to_string()));
        assert_eq!(
            out.step(ProvisionStep::Apply).unwrap().stdout,
            "Apply complete!"
        );
        assert_eq!(out.steps.len(), 3);
    }

    #[tokio::test]
    async fn failing_plan_stops_before_apply() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(
            ScriptedRunner::new().on("plan", Reply::fail(1, "Error: invalid AMI id")),
        );

        let err = driver(&runner).apply(&descriptor(&dir)).await.unwrap_err();

        assert_eq!(runner.call_names(), vec!["terraform init", "terraform plan"]);
        assert_eq!(err.kind(), ErrorKind::Provisioning);
        assert_eq!(err.exit_code(), Some(1));
        assert_eq!(err.stderr_excerpt(), "Error: invalid AMI id");
        assert!(matches!(
            err,
            ProvisionError::Provisioning {
                step: ProvisionStep::Plan,
                cause: ToolFailure::Exit,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn long_stderr_is_truncated_to_tail() {
        let dir = tempfile::tempdir().unwrap();
        let noisy = format!("{}\nError: quota exceeded", "x".repeat(500));
        let runner = Arc::new(ScriptedRunner::new().on("init", Reply::fail(1, noisy)));

        let err = driver(&runner).apply(&descriptor(&dir)).await.unwrap_err();

        assert!(err.stderr_excerpt().len() <= 64);
        assert!(err.stderr_excerpt().ends_with("Error: quota exceeded"));
    }

    #[tokio::test]
    async fn timeout_and_spawn_failures_map_to_tool_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = descriptor(&dir);

        let runner = Arc::new(
            ScriptedRunner::new().on("apply", Reply::TimedOut(Duration::from_secs(1800))),
        );
        let err = driver(&runner).apply(&path).await.unwrap_err();
        assert!(matches!(
            err,
            ProvisionError::Provisioning {
                step: ProvisionStep::Apply,
                exit_code: None,
                cause: ToolFailure::Timeout { after_secs: 1800 },
                ..
            }
        ));

        let runner = Arc::new(ScriptedRunner::new().on("terraform", Reply::SpawnFailure));
        let err = driver(&runner).apply(&path).await.unwrap_err();
        assert!(matches!(
            err,
            ProvisionError::Provisioning {
                step: ProvisionStep::Init,
                cause: ToolFailure::Spawn { .. },
                ..
            }
        ));
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn missing_descriptor_is_precondition_without_invocation() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new());

        let err = driver(&runner)
            .apply(&dir.path().join("terraform.tf"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Precondition);
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn outputs_returns_stdout_of_output_json() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new().on("output", Reply::ok("{}")));

        let raw = driver(&runner).outputs(dir.path()).await.unwrap();

        assert_eq!(raw, "{}");
        assert_eq!(runner.calls()[0].args, vec!["output", "-json"]);
    }

    #[tokio::test]
    async fn cancelled_output_step_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new().on("output", Reply::Cancelled));

        let err = driver(&runner).outputs(dir.path()).await.unwrap_err();
        assert!(matches!(
            err,
            ProvisionError::Provisioning {
                step: ProvisionStep::Output,
                cause: ToolFailure::Cancelled,
                ..
            }
        ));
    }
}
