//! ScriptedRunner - テスト用の CommandRunner
//!
//! 実プロセスを起動せず、あらかじめ決めた応答を返して呼び出しを記録する。

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::ports::{CommandOutput, CommandRunner, Invocation, RunError};

#[derive(Debug, Clone)]
pub enum Reply {
    Exit {
        code: i32,
        stdout: String,
        stderr: String,
    },
    TimedOut(Duration),
    Cancelled,
    SpawnFailure,
}

impl Reply {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Reply::Exit {
            code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn fail(code: i32, stderr: impl Into<String>) -> Self {
        Reply::Exit {
            code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    fn to_result(&self, invocation: &Invocation) -> Result<CommandOutput, RunError> {
        match self {
            Reply::Exit {
                code,
                stdout,
                stderr,
            } => Ok(CommandOutput {
                exit_code: Some(*code),
                stdout: stdout.clone(),
                stderr: stderr.clone(),
            }),
            Reply::TimedOut(d) => Err(RunError::TimedOut(*d)),
            Reply::Cancelled => Err(RunError::Cancelled),
            Reply::SpawnFailure => Err(RunError::Spawn {
                program: invocation.program.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
            }),
        }
    }
}

/// Replies by matching the program name or the first argument (the subcommand).
/// Unmatched invocations succeed with empty output.
#[derive(Default)]
pub struct ScriptedRunner {
    rules: Vec<(String, Reply)>,
    calls: Mutex<Vec<Invocation>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, key: impl Into<String>, reply: Reply) -> Self {
        self.rules.push((key.into(), reply));
        self
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    /// `program first-arg` of every call, in order.
    pub fn call_names(&self) -> Vec<String> {
        self.calls()
            .iter()
            .map(|c| match c.args.first() {
                Some(first) => format!("{} {first}", c.program),
                None => c.program.clone(),
            })
            .collect()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, RunError> {
        self.calls.lock().unwrap().push(invocation.clone());
        let reply = self.rules.iter().find(|(key, _)| {
            invocation.program == *key || invocation.args.first() == Some(key)
        });
        match reply {
            Some((_, reply)) => reply.to_result(invocation),
            None => Ok(CommandOutput {
                exit_code: Some(0),
                ..CommandOutput::default()
            }),
        }
    }
}
