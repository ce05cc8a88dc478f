//! Socket: bollard client on the local Docker daemon.

use bollard::models::{ContainerInspectResponse, ContainerStatsResponse};
use bollard::query_parameters::{ListContainersOptions, ListImagesOptions, LogsOptions, StatsOptions};
use bollard::Docker;
use futures_util::future::join_all;
use futures_util::stream::StreamExt;
use tracing::{info, warn};

use crate::exec::BoxFuture;

use super::backend::RuntimeBackend;
use super::error::{container_error, DockerError, ParseError};
use super::model::{
    human_size, short_id, short_timestamp, ContainerDetail, ContainerStatus, ContainerSummary, ContainerUsage,
    ImageSummary, ServerStats,
};

#[derive(Debug, Clone)]
pub struct SocketBackend {
    client: Docker,
    /// The Docker socket path this client is connected to (empty = defaults).
    socket_path: String,
}

impl SocketBackend {
    pub fn new(socket_path: &str) -> Result<Self, DockerError> {
        let connection = if socket_path.is_empty() {
            Docker::connect_with_defaults()?
        } else {
            let clean_path = socket_path.trim_start_matches("unix://");
            Docker::connect_with_socket(clean_path, 120, &bollard::API_DEFAULT_VERSION)?
        };

        Ok(SocketBackend {
            client: connection,
            socket_path: socket_path.to_string(),
        })
    }

    /// Round-trip to the daemon; used as the startup reachability check.
    pub async fn ping(&self) -> Result<(), DockerError> {
        self.client.ping().await?;
        Ok(())
    }

    async fn list_containers(&self, include_stopped: bool) -> Result<Vec<ContainerSummary>, DockerError> {
        let options = Some(ListContainersOptions {
            all: include_stopped,
            ..Default::default()
        });
        let containers = self.client.list_containers(options).await?;
        Ok(containers.into_iter().map(summary_from).collect())
    }

    async fn container_detail(&self, id: &str) -> Result<ContainerDetail, DockerError> {
        let details = self
            .client
            .inspect_container(id, None)
            .await
            .map_err(|e| container_error(id, e))?;
        Ok(detail_from(details)?)
    }

    async fn start(&self, id: &str) -> Result<(), DockerError> {
        info!(container_id = %id, "Starting container");
        self.client
            .start_container(id, None)
            .await
            .map_err(|e| container_error(id, e))
    }

    async fn stop(&self, id: &str) -> Result<(), DockerError> {
        info!(container_id = %id, "Stopping container");
        match self.client.stop_container(id, None).await {
            Ok(()) => Ok(()),
            // 304: already stopped, which is what the caller asked for.
            Err(bollard::errors::Error::DockerResponseServerError { status_code: 304, .. }) => Ok(()),
            Err(e) => Err(container_error(id, e)),
        }
    }

    async fn restart(&self, id: &str) -> Result<(), DockerError> {
        info!(container_id = %id, "Restarting container");
        self.client
            .restart_container(id, None)
            .await
            .map_err(|e| container_error(id, e))
    }

    async fn logs(&self, id: &str, tail_lines: usize) -> Result<String, DockerError> {
        let options = LogsOptions {
            follow: false,
            stdout: true,
            stderr: true,
            since: 0,
            until: 0,
            timestamps: false,
            tail: tail_lines.to_string(),
        };

        let mut stream = self.client.logs(id, Some(options));
        let mut text = String::new();
        while let Some(chunk) = stream.next().await {
            let output = chunk.map_err(|e| container_error(id, e))?;
            text.push_str(&String::from_utf8_lossy(&output.into_bytes()));
        }
        Ok(text)
    }

    async fn list_images(&self) -> Result<Vec<ImageSummary>, DockerError> {
        let options = Some(ListImagesOptions {
            all: false,
            ..Default::default()
        });
        let images = self.client.list_images(options).await?;
        Ok(images.into_iter().flat_map(images_from).collect())
    }

    async fn stats(&self) -> Result<ServerStats, DockerError> {
        let listing = self.list_containers(true).await?;

        let snapshots = listing
            .iter()
            .filter(|c| c.status.is_running())
            .map(|c| self.usage(c));
        let usage = join_all(snapshots).await;

        Ok(ServerStats::aggregate(usage, &listing, None))
    }

    /// One stats snapshot; failures read as zero usage.
    async fn usage(&self, container: &ContainerSummary) -> ContainerUsage {
        let options = Some(StatsOptions {
            stream: false,
            ..Default::default()
        });
        let mut stream = self.client.stats(&container.id, options);

        match stream.next().await {
            Some(Ok(stats)) => ContainerUsage {
                name: container.name.clone(),
                cpu_percent: calculate_cpu_percentage(&stats),
                memory_percent: calculate_memory_percentage(&stats),
            },
            other => {
                if let Some(Err(e)) = other {
                    warn!(container_id = %container.id, error = %e, "Stats snapshot failed");
                }
                ContainerUsage {
                    name: container.name.clone(),
                    cpu_percent: 0.0,
                    memory_percent: 0.0,
                }
            }
        }
    }
}

impl RuntimeBackend for SocketBackend {
    fn describe(&self) -> String {
        if self.socket_path.is_empty() {
            "docker socket (default)".to_string()
        } else {
            format!("docker socket {}", self.socket_path)
        }
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
        Box::pin(self.start(id))
    }

    fn stop<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<(), DockerError>> {
        Box::pin(self.stop(id))
    }

    fn restart<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<(), DockerError>> {
        Box::pin(self.restart(id))
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

fn summary_from(s: bollard::models::ContainerSummary) -> ContainerSummary {
    ContainerSummary {
        id: short_id(s.id.as_deref().unwrap_or_default()),
        name: s
            .names
            .as_deref()
            .and_then(|n| n.first())
            .map(|n| n.trim_start_matches('/'))
            .unwrap_or("unknown")
            .to_string(),
        status: s
            .state
            .map(|state| ContainerStatus::from_state(&state.to_string()))
            .unwrap_or_else(|| ContainerStatus::Other("unknown".to_string())),
        image: s.image.unwrap_or_default(),
    }
}

fn detail_from(details: ContainerInspectResponse) -> Result<ContainerDetail, ParseError> {
    let missing = |field: &str| ParseError::new("container inspect", format!("missing field `{}`", field));

    let id = details.id.ok_or_else(|| missing("Id"))?;
    let name = details.name.ok_or_else(|| missing("Name"))?;
    let status = details
        .state
        .and_then(|s| s.status)
        .ok_or_else(|| missing("State.Status"))?;
    let image = details
        .config
        .and_then(|c| c.image)
        .ok_or_else(|| missing("Config.Image"))?;
    let created = details.created.ok_or_else(|| missing("Created"))?;

    Ok(ContainerDetail {
        id: short_id(&id),
        name: name.trim_start_matches('/').to_string(),
        status: ContainerStatus::from_state(&status.to_string()),
        image,
        created: short_timestamp(&created),
    })
}

/// One entry per repo tag; untagged images show as `<none>:<none>`.
fn images_from(image: bollard::models::ImageSummary) -> Vec<ImageSummary> {
    let size = human_size(image.size);
    let created = chrono::DateTime::from_timestamp(image.created, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default();

    if image.repo_tags.is_empty() {
        return vec![ImageSummary {
            name: "<none>:<none>".to_string(),
            size,
            created,
        }];
    }

    image
        .repo_tags
        .into_iter()
        .map(|tag| ImageSummary {
            name: tag,
            size: size.clone(),
            created: created.clone(),
        })
        .collect()
}

pub fn calculate_cpu_percentage(stats: &ContainerStatsResponse) -> f64 {
    let cpu_stats = match &stats.cpu_stats {
        Some(cpu) => cpu,
        None => return 0.0,
    };

    let precpu_stats = match &stats.precpu_stats {
        Some(precpu) => precpu,
        None => return 0.0,
    };

    let cpu_total = cpu_stats.cpu_usage
        .as_ref()
        .and_then(|u| u.total_usage)
        .unwrap_or(0);
    let precpu_total = precpu_stats.cpu_usage
        .as_ref()
        .and_then(|u| u.total_usage)
        .unwrap_or(0);

    let cpu_delta = cpu_total.saturating_sub(precpu_total) as f64;

    let sys_current = cpu_stats.system_cpu_usage.unwrap_or(0);
    let sys_previous = precpu_stats.system_cpu_usage.unwrap_or(0);
    let system_delta = sys_current.saturating_sub(sys_previous) as f64;

    if system_delta > 0.0 && cpu_delta > 0.0 {
        let num_cpus = cpu_stats.online_cpus.unwrap_or(1).max(1) as f64;
        let pct = (cpu_delta / system_delta) * num_cpus * 100.0;
        if pct.is_finite() { pct } else { 0.0 }
    } else {
        0.0
    }
}

pub fn calculate_memory_percentage(stats: &ContainerStatsResponse) -> f64 {
    let Some(mem) = &stats.memory_stats else {
        return 0.0;
    };
    let usage = mem.usage.unwrap_or(0);
    let limit = mem.limit.unwrap_or(0);
    if limit > 0 {
        (usage as f64 / limit as f64) * 100.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bollard::models::{ContainerCpuStats, ContainerCpuUsage, ContainerMemoryStats};

    fn stats_with_cpu(cpu_total: u64, precpu_total: u64, sys_total: u64, presys_total: u64, online_cpus: u32) -> ContainerStatsResponse {
        ContainerStatsResponse {
            cpu_stats: Some(ContainerCpuStats {
                cpu_usage: Some(ContainerCpuUsage {
                    total_usage: Some(cpu_total),
                    percpu_usage: None,
                    usage_in_kernelmode: None,
                    usage_in_usermode: None,
                }),
                system_cpu_usage: Some(sys_total),
                online_cpus: Some(online_cpus),
                throttling_data: None,
            }),
            precpu_stats: Some(ContainerCpuStats {
                cpu_usage: Some(ContainerCpuUsage {
                    total_usage: Some(precpu_total),
                    percpu_usage: None,
                    usage_in_kernelmode: None,
                    usage_in_usermode: None,
                }),
                system_cpu_usage: Some(presys_total),
                online_cpus: Some(online_cpus),
                throttling_data: None,
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_cpu_percentage_multi_core() {
        let stats = stats_with_cpu(200_000_000, 100_000_000, 2_000_000_000, 1_800_000_000, 4);
        let pct = calculate_cpu_percentage(&stats);
        assert!((pct - 200.0).abs() < 0.01, "Expected ~200%, got {}", pct);
    }

    #[test]
    fn test_cpu_percentage_counter_reset_reads_zero() {
        let stats = stats_with_cpu(50_000_000, 100_000_000, 2_000_000_000, 1_800_000_000, 1);
        assert_eq!(calculate_cpu_percentage(&stats), 0.0);
        assert_eq!(calculate_cpu_percentage(&ContainerStatsResponse::default()), 0.0);
    }

    #[test]
    fn test_memory_percentage() {
        let stats = ContainerStatsResponse {
            memory_stats: Some(ContainerMemoryStats {
                usage: Some(256),
                limit: Some(1024),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(calculate_memory_percentage(&stats), 25.0);

        let unlimited = ContainerStatsResponse {
            memory_stats: Some(ContainerMemoryStats {
                usage: Some(256),
                limit: Some(0),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(calculate_memory_percentage(&unlimited), 0.0);
    }

    #[test]
    fn test_summary_from_list_entry() {
        let raw: bollard::models::ContainerSummary = serde_json::from_value(serde_json::json!({
            "Id": "4f66ad9a0b2e8c1f7d3e5a6b9c0d1e2f3a4b5c6d7e8f9a0b1c2d3e4f5a6b7c8d",
            "Names": ["/web"],
            "Image": "nginx:latest",
            "State": "running",
            "Status": "Up 2 hours"
        }))
        .unwrap();

        let summary = summary_from(raw);
        assert_eq!(summary.id, "4f66ad9a0b2e");
        assert_eq!(summary.name, "web");
        assert_eq!(summary.status, ContainerStatus::Running);
        assert_eq!(summary.image, "nginx:latest");
    }

    #[test]
    fn test_detail_from_inspect() {
        let raw: ContainerInspectResponse = serde_json::from_value(serde_json::json!({
            "Id": "4f66ad9a0b2e8c1f7d3e5a6b9c0d1e2f3a4b5c6d7e8f9a0b1c2d3e4f5a6b7c8d",
            "Name": "/web",
            "Created": "2024-03-01T10:20:30.123456789Z",
            "State": {"Status": "exited"},
            "Config": {"Image": "nginx:latest"}
        }))
        .unwrap();

        let detail = detail_from(raw).unwrap();
        assert_eq!(detail.name, "web");
        assert_eq!(detail.status, ContainerStatus::Exited);
        assert_eq!(detail.created, "2024-03-01 10:20:30");
    }

    #[test]
    fn test_detail_missing_state_is_parse_error() {
        let raw = ContainerInspectResponse {
            id: Some("abc".to_string()),
            name: Some("/web".to_string()),
            ..Default::default()
        };
        let err = detail_from(raw).unwrap_err();
        assert!(err.reason.contains("State.Status"));
    }

    #[test]
    fn test_images_expand_tags() {
        let raw: bollard::models::ImageSummary = serde_json::from_value(serde_json::json!({
            "Id": "sha256:0123",
            "ParentId": "",
            "RepoTags": ["nginx:latest", "nginx:1.25"],
            "RepoDigests": [],
            "Created": 1707880364,
            "Size": 187654321,
            "SharedSize": -1,
            "Labels": {},
            "Containers": -1
        }))
        .unwrap();

        let images = images_from(raw);
        assert_eq!(images.len(), 2);
        assert_eq!(images[1].name, "nginx:1.25");
        assert_eq!(images[0].size, "187.7MB");
        assert_eq!(images[0].created, "2024-02-14 03:12:44");
    }
}
