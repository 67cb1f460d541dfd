//! Cancellable subprocess execution.

use anyhow::Context;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::cancellation::CancellationToken;

/// Captured output of a finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` if killed by a signal.
    pub code: Option<i32>,
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr.
    pub stderr: String,
}

impl CommandOutput {
    /// Returns true if the command exited with code 0.
    #[must_use]
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// The last `lines` lines of stderr, for error messages.
    #[must_use]
    pub fn stderr_tail(&self, lines: usize) -> String {
        let all: Vec<&str> = self.stderr.trim_end().lines().collect();
        all[all.len().saturating_sub(lines)..].join("\n")
    }
}

/// How a command ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    /// The command ran to completion (successfully or not).
    Finished(CommandOutput),
    /// The run was cancelled and the child was killed.
    Cancelled,
}

/// Runs `command` to completion, killing it if `cancel` fires first.
///
/// Spawn and wait failures are errors; a non-zero exit is not.
pub async fn run_command(mut command: Command, cancel: &CancellationToken) -> anyhow::Result<CommandResult> {
    let program = command.as_std().get_program().to_string_lossy().into_owned();
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if cancel.is_cancelled() {
        return Ok(CommandResult::Cancelled);
    }

    let child = command
        .spawn()
        .with_context(|| format!("failed to spawn '{program}'"))?;

    let Some(output) = cancel.run_until_cancelled(child.wait_with_output()).await else {
        debug!(program = %program, "Command killed by cancellation");
        return Ok(CommandResult::Cancelled);
    };
    let output = output.with_context(|| format!("failed to wait for '{program}'"))?;
    let output = CommandOutput {
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };
    debug!(program = %program, code = ?output.code, "Command finished");
    Ok(CommandResult::Finished(output))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[tokio::test]
    async fn test_captures_output() {
        let token = CancellationToken::new();
        let result = run_command(sh("echo hello; echo oops >&2; exit 3"), &token).await.unwrap();
        let CommandResult::Finished(output) = result else {
            panic!("expected finished command");
        };
        assert_eq!(output.code, Some(3));
        assert!(!output.success());
        assert_eq!(output.stdout.trim(), "hello");
        assert_eq!(output.stderr_tail(1), "oops");
    }

    #[tokio::test]
    async fn test_missing_program_is_error() {
        let token = CancellationToken::new();
        let err = run_command(Command::new("definitely-not-a-real-binary-xyz"), &token)
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("failed to spawn"));
    }

    #[tokio::test]
    async fn test_cancellation_kills_child() {
        let token = Arc::new(CancellationToken::new());
        let canceller = {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                token.cancel("stop");
            })
        };

        let started = std::time::Instant::now();
        let result = run_command(sh("sleep 5"), &token).await.unwrap();
        canceller.await.unwrap();

        assert_eq!(result, CommandResult::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_stderr_tail() {
        let output = CommandOutput {
            code: Some(1),
            stdout: String::new(),
            stderr: "a\nb\nc\n".into(),
        };
        assert_eq!(output.stderr_tail(2), "b\nc");
        assert_eq!(output.stderr_tail(10), "a\nb\nc");
    }
}
