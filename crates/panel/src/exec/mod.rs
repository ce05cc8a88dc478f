//! Exec module: run a single shell line against a host and capture stdout.
//!
//! Every executor opens a fresh transport per call: no pooling, no retry.
//! Non-zero exit, connection failure, and timeout all collapse into one
//! [`ExecutionError`] carrying whatever the command wrote to stderr.

pub mod fake;
pub mod local;
pub mod ssh;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use thiserror::Error;

pub use fake::CannedExecutor;
pub use local::LocalExecutor;
pub use ssh::{SshCredential, SshExecutor, SshTarget};

/// Default deadline for one command, transport setup included.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Boxed future returned by the object-safe async traits in this crate.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A command (or the channel carrying it) failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("command failed: {stderr}")]
pub struct ExecutionError {
    /// Captured standard error, or the transport's own error text.
    pub stderr: String,
}

impl ExecutionError {
    pub fn new(stderr: impl Into<String>) -> Self {
        Self { stderr: stderr.into() }
    }
}

/// Runs one shell line and returns its standard output.
///
/// Implementations must be `Send + Sync` so they can sit behind an `Arc`
/// shared by concurrently handled interactions, and must never block the
/// async runtime while the command runs.
pub trait CommandExecutor: Send + Sync {
    fn execute<'a>(&'a self, command: &'a str) -> BoxFuture<'a, Result<String, ExecutionError>>;
}

/// Build the error for a finished command from its exit status and stderr.
pub(crate) fn failed_command(status: Option<i32>, stderr: &[u8]) -> ExecutionError {
    let text = String::from_utf8_lossy(stderr).trim_end().to_string();
    if text.is_empty() {
        match status {
            Some(code) => ExecutionError::new(format!("exited with status {}", code)),
            None => ExecutionError::new("terminated without exit status"),
        }
    } else {
        ExecutionError::new(text)
    }
}
