use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Captured result of an external command. Spawn failures are folded into
/// a nonzero exit code with the error text on stderr, so callers only ever
/// deal with one shape.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs external commands to completion, capturing their output. Blocking
/// from the caller's point of view: the future resolves only once the
/// command has exited.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn run(&self, program: &str, args: &[String], input: Option<&str>) -> CommandOutput;
}

/// Executor backed by real subprocesses.
pub struct SystemExecutor;

#[async_trait]
impl CommandExecutor for SystemExecutor {
    async fn run(&self, program: &str, args: &[String], input: Option<&str>) -> CommandOutput {
        debug!(program, ?args, "running command");

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => return spawn_failure(program, &e),
        };

        if let Some(input) = input {
            if let Some(mut stdin) = child.stdin.take() {
                // The child may exit without reading; a broken pipe here is
                // reported through its exit status, not ours.
                let _ = stdin.write_all(input.as_bytes()).await;
                let _ = stdin.shutdown().await;
            }
        }

        match child.wait_with_output().await {
            Ok(output) => CommandOutput {
                exit_code: output.status.code().unwrap_or(-1),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            },
            Err(e) => spawn_failure(program, &e),
        }
    }
}

fn spawn_failure(program: &str, error: &std::io::Error) -> CommandOutput {
    CommandOutput {
        exit_code: 127,
        stdout: String::new(),
        stderr: format!("failed to run {program}: {error}"),
    }
}
