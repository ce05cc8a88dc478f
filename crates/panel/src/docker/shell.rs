//! Shell: drive the Docker CLI through a [`CommandExecutor`].
//!
//! Works over SSH or against a local CLI. Container references come from
//! chat buttons, so they are checked against Docker's name/id alphabet
//! before being spliced into a command line.

use std::sync::Arc;

use tracing::{info, warn};

use crate::exec::{BoxFuture, CommandExecutor, ExecutionError};

use super::backend::RuntimeBackend;
use super::error::DockerError;
use super::model::{ContainerDetail, ContainerSummary, ImageSummary, ServerStats};
use super::parse::{
    parse_container_table, parse_df_usage, parse_image_table, parse_inspect, parse_stats_table,
    CONTAINER_FORMAT, IMAGE_FORMAT, STATS_FORMAT,
};

#[derive(Clone)]
pub struct ShellBackend {
    executor: Arc<dyn CommandExecutor>,
    label: String,
}

impl ShellBackend {
    pub fn new(executor: Arc<dyn CommandExecutor>, label: impl Into<String>) -> Self {
        Self {
            executor,
            label: label.into(),
        }
    }

    async fn run(&self, command: &str) -> Result<String, DockerError> {
        Ok(self.executor.execute(command).await?)
    }

    async fn list_containers(&self, include_stopped: bool) -> Result<Vec<ContainerSummary>, DockerError> {
        let all = if include_stopped { " -a" } else { "" };
        let raw = self
            .run(&format!("docker ps{} --format '{}'", all, CONTAINER_FORMAT))
            .await?;
        Ok(parse_container_table(&raw))
    }

    async fn container_detail(&self, id: &str) -> Result<ContainerDetail, DockerError> {
        let id = container_ref(id)?;
        let raw = self.run(&format!("docker inspect --type container {}", id)).await?;
        Ok(parse_inspect(&raw)?)
    }

    async fn lifecycle(&self, verb: &str, id: &str) -> Result<(), DockerError> {
        let id = container_ref(id)?;
        info!(container_id = %id, action = verb, backend = %self.label, "Container lifecycle command");
        self.run(&format!("docker {} {}", verb, id)).await?;
        Ok(())
    }

    async fn logs(&self, id: &str, tail_lines: usize) -> Result<String, DockerError> {
        let id = container_ref(id)?;
        // Inspect first so a missing container reports Docker's own stderr
        // instead of the merged log stream.
        self.run(&format!(
            "docker inspect --type container --format '{{{{.Id}}}}' {id} >/dev/null && docker logs --tail {tail_lines} {id} 2>&1"
        ))
        .await
    }

    async fn list_images(&self) -> Result<Vec<ImageSummary>, DockerError> {
        let raw = self
            .run(&format!("docker images --format '{}'", IMAGE_FORMAT))
            .await?;
        Ok(parse_image_table(&raw))
    }

    async fn stats(&self) -> Result<ServerStats, DockerError> {
        let stats_cmd = format!("docker stats --no-stream --format '{}'", STATS_FORMAT);
        let (usage, disk, listing) = tokio::join!(
            self.run(&stats_cmd),
            self.run("df -P /"),
            self.list_containers(true),
        );

        let usage = match usage {
            Ok(raw) => parse_stats_table(&raw),
            Err(e) => {
                warn!(error = %e, backend = %self.label, "Stats snapshot failed, reporting zero usage");
                Vec::new()
            }
        };
        let disk = match disk {
            Ok(raw) => parse_df_usage(&raw),
            Err(e) => {
                warn!(error = %e, backend = %self.label, "Disk usage unavailable");
                None
            }
        };

        Ok(ServerStats::aggregate(usage, &listing?, disk))
    }
}

/// Accept only `[A-Za-z0-9][A-Za-z0-9_.-]*`, the alphabet of container ids
/// and names.
fn container_ref(id: &str) -> Result<&str, DockerError> {
    let mut chars = id.chars();
    let valid = match chars.next() {
        Some(first) => {
            first.is_ascii_alphanumeric()
                && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        }
        None => false,
    };
    if valid {
        Ok(id)
    } else {
        Err(ExecutionError::new(format!("invalid container reference: {:?}", id)).into())
    }
}

impl RuntimeBackend for ShellBackend {
    fn describe(&self) -> String {
        self.label.clone()
    }

    fn list_containers(
        &self,
        include_stopped: bool,
    ) -> BoxFuture<'_, Result<Vec<ContainerSummary>, DockerError>> {
        Box::pin(self.list_containers(include_stopped))
    }

    fn container_detail<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<ContainerDetail, DockerError>> {
        Box::pin(self.container_detail(id))
    }

    fn start<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<(), DockerError>> {
        Box::pin(self.lifecycle("start", id))
    }

    fn stop<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<(), DockerError>> {
        Box::pin(self.lifecycle("stop", id))
    }

    fn restart<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<(), DockerError>> {
        Box::pin(self.lifecycle("restart", id))
    }

    fn logs<'a>(&'a self, id: &'a str, tail_lines: usize) -> BoxFuture<'a, Result<String, DockerError>> {
        Box::pin(self.logs(id, tail_lines))
    }

    fn list_images(&self) -> BoxFuture<'_, Result<Vec<ImageSummary>, DockerError>> {
        Box::pin(self.list_images())
    }

    fn stats(&self) -> BoxFuture<'_, Result<ServerStats, DockerError>> {
        Box::pin(self.stats())
    }
}
