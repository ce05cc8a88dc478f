//! Backend trait: abstract interface for every runtime operation.
//!
//! `socket.rs` provides the bollard-backed implementation, `shell.rs` the
//! command-line one, and `fake.rs` a test double. Implementations must be
//! `Send + Sync` so one instance can be shared by concurrent interactions.

use crate::exec::BoxFuture;

use super::error::DockerError;
use super::model::{ContainerDetail, ContainerSummary, ImageSummary, ServerStats};

pub trait RuntimeBackend: Send + Sync {
    /// Short label for logs ("socket", "ssh://host", ...).
    fn describe(&self) -> String;

    // ── Container queries ───────────────────────────────────────

    fn list_containers(
        &self,
        include_stopped: bool,
    ) -> BoxFuture<'_, Result<Vec<ContainerSummary>, DockerError>>;

    fn container_detail<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<ContainerDetail, DockerError>>;

    // ── Container lifecycle ─────────────────────────────────────

    fn start<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<(), DockerError>>;

    fn stop<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<(), DockerError>>;

    fn restart<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<(), DockerError>>;

    // ── Logs ────────────────────────────────────────────────────

    /// The `tail_lines` most recent log lines, stdout and stderr interleaved.
    fn logs<'a>(&'a self, id: &'a str, tail_lines: usize) -> BoxFuture<'a, Result<String, DockerError>>;

    // ── Images & host ───────────────────────────────────────────

    fn list_images(&self) -> BoxFuture<'_, Result<Vec<ImageSummary>, DockerError>>;

    fn stats(&self) -> BoxFuture<'_, Result<ServerStats, DockerError>>;
}
