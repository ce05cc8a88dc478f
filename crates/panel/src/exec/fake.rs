//! Fake: canned command outputs for testing command-line backends.

use std::collections::HashMap;
use std::sync::Mutex;

use super::{BoxFuture, CommandExecutor, ExecutionError};

/// Maps exact command lines to canned results and records every call.
///
/// A command with no canned result fails like an unknown binary would.
#[derive(Default)]
pub struct CannedExecutor {
    responses: Mutex<HashMap<String, Result<String, ExecutionError>>>,
    history: Mutex<Vec<String>>,
}

impl CannedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Succeed with `stdout` whenever `command` runs.
    pub fn on(self, command: &str, stdout: &str) -> Self {
        self.insert(command, Ok(stdout.to_string()));
        self
    }

    /// Fail with `stderr` whenever `command` runs.
    pub fn fail(self, command: &str, stderr: &str) -> Self {
        self.insert(command, Err(ExecutionError::new(stderr)));
        self
    }

    /// Command lines executed so far, oldest first.
    pub fn history(&self) -> Vec<String> {
        self.history.lock().map(|h| h.clone()).unwrap_or_default()
    }

    fn insert(&self, command: &str, result: Result<String, ExecutionError>) {
        if let Ok(mut responses) = self.responses.lock() {
            responses.insert(command.to_string(), result);
        }
    }
}

impl CommandExecutor for CannedExecutor {
    fn execute<'a>(&'a self, command: &'a str) -> BoxFuture<'a, Result<String, ExecutionError>> {
        Box::pin(async move {
            if let Ok(mut history) = self.history.lock() {
                history.push(command.to_string());
            }
            self.responses
                .lock()
                .ok()
                .and_then(|r| r.get(command).cloned())
                .unwrap_or_else(|| Err(ExecutionError::new(format!("sh: unexpected command: {}", command))))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_canned_output_and_history() {
        let exec = CannedExecutor::new()
            .on("docker ps", "abc\n")
            .fail("docker stop x", "boom");

        assert_eq!(exec.execute("docker ps").await.unwrap(), "abc\n");
        assert_eq!(exec.execute("docker stop x").await.unwrap_err().stderr, "boom");
        assert!(exec.execute("rm -rf /").await.is_err());
        assert_eq!(exec.history(), vec!["docker ps", "docker stop x", "rm -rf /"]);
    }
}
