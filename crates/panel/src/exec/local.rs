//! Local: run command lines through `sh -c` on this host.
//!
//! Used when the Docker CLI is reachable locally but the socket should not
//! be opened directly (e.g. a rootless daemon behind a wrapper script).

use std::process::Stdio;
use std::time::Duration;

use tracing::debug;

use super::{failed_command, BoxFuture, CommandExecutor, ExecutionError, DEFAULT_COMMAND_TIMEOUT};

#[derive(Debug, Clone)]
pub struct LocalExecutor {
    shell: String,
    timeout: Duration,
}

impl LocalExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self {
            shell: "sh".to_string(),
            timeout,
        }
    }

    async fn run(&self, command: &str) -> Result<String, ExecutionError> {
        debug!(command = %command, "Running local command");

        let child = tokio::process::Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExecutionError::new(format!("failed to spawn {}: {}", self.shell, e)))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                ExecutionError::new(format!("timed out after {}s", self.timeout.as_secs()))
            })?
            .map_err(|e| ExecutionError::new(format!("failed to collect output: {}", e)))?;

        if !output.status.success() {
            return Err(failed_command(output.status.code(), &output.stderr));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for LocalExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_TIMEOUT)
    }
}

impl CommandExecutor for LocalExecutor {
    fn execute<'a>(&'a self, command: &'a str) -> BoxFuture<'a, Result<String, ExecutionError>> {
        Box::pin(self.run(command))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stdout_returned_with_trailing_whitespace() {
        let exec = LocalExecutor::default();
        let out = exec.execute("printf 'a\\tb\\n  \\n'").await.unwrap();
        assert_eq!(out, "a\tb\n  \n");
    }

    #[tokio::test]
    async fn test_non_zero_exit_carries_stderr() {
        let exec = LocalExecutor::default();
        let err = exec
            .execute("echo 'Error: No such container: ghost' >&2; exit 1")
            .await
            .unwrap_err();
        assert_eq!(err.stderr, "Error: No such container: ghost");
    }

    #[tokio::test]
    async fn test_non_zero_exit_without_stderr() {
        let exec = LocalExecutor::default();
        let err = exec.execute("exit 3").await.unwrap_err();
        assert!(err.stderr.contains('3'));
    }

    #[tokio::test]
    async fn test_timeout_is_an_execution_error() {
        let exec = LocalExecutor::new(Duration::from_millis(100));
        let err = exec.execute("sleep 5").await.unwrap_err();
        assert!(err.stderr.contains("timed out"));
    }
}
