//! ProcessRunner - tokio::process による CommandRunner 実装
//!
//! # 学習ポイント
//! - `kill_on_drop(true)`: future を drop すると子プロセスも kill される
//! - `tokio::select!` で完了・タイムアウト・キャンセルを競合させる
//! - キャンセルは `watch::Receiver<bool>`（true でキャンセル）

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::ports::{CommandOutput, CommandRunner, Invocation, RunError};

/// Spawns real processes.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    timeout: Option<Duration>,
    cancel: Option<watch::Receiver<bool>>,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill the child and fail with `TimedOut` if a single invocation runs longer.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Kill the child and fail with `Cancelled` once `true` is sent on this channel.
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, RunError> {
        let mut cancel = self.cancel.clone();
        if cancel.as_ref().is_some_and(|rx| *rx.borrow()) {
            return Err(RunError::Cancelled);
        }

        debug!(
            program = %invocation.program,
            args = ?invocation.args,
            cwd = %invocation.cwd.display(),
            "spawning"
        );
        let child = Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(&invocation.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RunError::Spawn {
                program: invocation.program.clone(),
                source,
            })?;

        let output = child.wait_with_output();
        let timeout = async {
            match self.timeout {
                Some(d) => tokio::time::sleep(d).await,
                None => std::future::pending::<()>().await,
            }
        };
        let cancelled = async {
            match cancel.as_mut() {
                Some(rx) => {
                    // 送信側が drop されたらキャンセルは来ない
                    let sender_gone = rx.wait_for(|c| *c).await.is_err();
                    if sender_gone {
                        std::future::pending::<()>().await;
                    }
                }
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            res = output => {
                let out = res.map_err(|source| RunError::Spawn {
                    program: invocation.program.clone(),
                    source,
                })?;
                let output = CommandOutput {
                    exit_code: out.status.code(),
                    stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
                };
                debug!(program = %invocation.program, exit_code = ?output.exit_code, "finished");
                Ok(output)
            }
            _ = timeout => {
                let after = self.timeout.unwrap_or_default();
                warn!(program = %invocation.program, ?after, "timed out, killing");
                Err(RunError::TimedOut(after))
            }
            _ = cancelled => {
                warn!(program = %invocation.program, "cancelled, killing");
                Err(RunError::Cancelled)
            }
        }
    }
}
