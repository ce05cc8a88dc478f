//! Fake: test double for the runtime backend.
//!
//! Provides a deterministic [`FakeRuntime`] that implements
//! [`RuntimeBackend`] over in-memory state, so navigation can be tested
//! without a running Docker daemon.

use std::collections::HashMap;

use tokio::sync::Mutex;

use crate::exec::{BoxFuture, ExecutionError};

use super::backend::RuntimeBackend;
use super::error::{DockerError, ParseError};
use super::model::{ContainerDetail, ContainerStatus, ContainerSummary, ContainerUsage, ImageSummary, ServerStats};

/// Operations that can be scripted to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FakeOp {
    List,
    Detail,
    Start,
    Stop,
    Restart,
    Logs,
    Images,
    Stats,
}

/// A canned container for the fake store.
#[derive(Clone, Debug)]
pub struct FakeContainer {
    pub detail: ContainerDetail,
    pub logs: String,
    pub cpu_percent: f64,
    pub memory_percent: f64,
}

impl FakeContainer {
    pub fn new(id: &str, name: &str, status: ContainerStatus, image: &str) -> Self {
        Self {
            detail: ContainerDetail {
                id: id.to_string(),
                name: name.to_string(),
                status,
                image: image.to_string(),
                created: "2024-01-01 00:00:00".to_string(),
            },
            logs: String::new(),
            cpu_percent: 0.0,
            memory_percent: 0.0,
        }
    }

    pub fn with_logs(mut self, logs: &str) -> Self {
        self.logs = logs.to_string();
        self
    }

    pub fn with_usage(mut self, cpu_percent: f64, memory_percent: f64) -> Self {
        self.cpu_percent = cpu_percent;
        self.memory_percent = memory_percent;
        self
    }
}

/// Mutable inner state protected by a mutex.
#[derive(Default)]
struct Inner {
    containers: Vec<FakeContainer>,
    images: Vec<ImageSummary>,
    failures: HashMap<FakeOp, DockerError>,
    calls: Vec<String>,
}

impl Inner {
    fn check(&mut self, op: FakeOp, call: String) -> Result<(), DockerError> {
        self.calls.push(call);
        match self.failures.get(&op) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn container_mut(&mut self, id: &str) -> Result<&mut FakeContainer, DockerError> {
        self.containers
            .iter_mut()
            .find(|c| c.detail.id == id || c.detail.name == id)
            .ok_or_else(|| ExecutionError::new(format!("No such container: {}", id)).into())
    }
}

/// A fake runtime for deterministic testing.
///
/// Containers keep insertion order, so rendered listings are stable.
pub struct FakeRuntime {
    inner: Mutex<Inner>,
}

impl FakeRuntime {
    /// Create an empty fake runtime.
    pub fn new() -> Self {
        Self { inner: Mutex::new(Inner::default()) }
    }

    /// Seed a container into the fake store.
    pub async fn add_container(&self, container: FakeContainer) {
        self.inner.lock().await.containers.push(container);
    }

    /// Seed an image.
    pub async fn add_image(&self, image: ImageSummary) {
        self.inner.lock().await.images.push(image);
    }

    /// Make every later call of `op` fail with an execution error.
    pub async fn fail(&self, op: FakeOp, stderr: &str) {
        self.inner
            .lock()
            .await
            .failures
            .insert(op, ExecutionError::new(stderr).into());
    }

    /// Make every later call of `op` fail with a parse error.
    pub async fn fail_parse(&self, op: FakeOp, reason: &str) {
        self.inner
            .lock()
            .await
            .failures
            .insert(op, ParseError::new("fake output", reason).into());
    }

    /// Remove a scripted failure.
    pub async fn heal(&self, op: FakeOp) {
        self.inner.lock().await.failures.remove(&op);
    }

    /// Calls received so far, as "op id" strings.
    pub async fn calls(&self) -> Vec<String> {
        self.inner.lock().await.calls.clone()
    }

    async fn set_status(&self, op: FakeOp, verb: &str, id: &str, status: ContainerStatus) -> Result<(), DockerError> {
        let mut state = self.inner.lock().await;
        state.check(op, format!("{} {}", verb, id))?;
        state.container_mut(id)?.detail.status = status;
        Ok(())
    }
}

impl Default for FakeRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeBackend for FakeRuntime {
    fn describe(&self) -> String {
        "fake".to_string()
    }

    fn list_containers(
        &self,
        include_stopped: bool,
    ) -> BoxFuture<'_, Result<Vec<ContainerSummary>, DockerError>> {
        Box::pin(async move {
            let mut state = self.inner.lock().await;
            state.check(FakeOp::List, format!("list {}", include_stopped))?;
            Ok(state
                .containers
                .iter()
                .filter(|c| include_stopped || c.detail.status.is_running())
                .map(|c| ContainerSummary {
                    id: c.detail.id.clone(),
                    name: c.detail.name.clone(),
                    status: c.detail.status.clone(),
                    image: c.detail.image.clone(),
                })
                .collect())
        })
    }

    fn container_detail<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<ContainerDetail, DockerError>> {
        Box::pin(async move {
            let mut state = self.inner.lock().await;
            state.check(FakeOp::Detail, format!("detail {}", id))?;
            Ok(state.container_mut(id)?.detail.clone())
        })
    }

    fn start<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<(), DockerError>> {
        Box::pin(self.set_status(FakeOp::Start, "start", id, ContainerStatus::Running))
    }

    fn stop<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<(), DockerError>> {
        Box::pin(self.set_status(FakeOp::Stop, "stop", id, ContainerStatus::Exited))
    }

    fn restart<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<(), DockerError>> {
        Box::pin(self.set_status(FakeOp::Restart, "restart", id, ContainerStatus::Running))
    }

    fn logs<'a>(&'a self, id: &'a str, tail_lines: usize) -> BoxFuture<'a, Result<String, DockerError>> {
        Box::pin(async move {
            let mut state = self.inner.lock().await;
            state.check(FakeOp::Logs, format!("logs {}", id))?;
            let logs = &state.container_mut(id)?.logs;
            let lines: Vec<&str> = logs.lines().collect();
            let start = lines.len().saturating_sub(tail_lines);
            Ok(lines[start..].iter().map(|l| format!("{}\n", l)).collect())
        })
    }

    fn list_images(&self) -> BoxFuture<'_, Result<Vec<ImageSummary>, DockerError>> {
        Box::pin(async move {
            let mut state = self.inner.lock().await;
            state.check(FakeOp::Images, "images".to_string())?;
            Ok(state.images.clone())
        })
    }

    fn stats(&self) -> BoxFuture<'_, Result<ServerStats, DockerError>> {
        Box::pin(async move {
            let listing = RuntimeBackend::list_containers(self, true).await?;
            let mut state = self.inner.lock().await;
            state.check(FakeOp::Stats, "stats".to_string())?;
            let usage = state
                .containers
                .iter()
                .filter(|c| c.detail.status.is_running())
                .map(|c| ContainerUsage {
                    name: c.detail.name.clone(),
                    cpu_percent: c.cpu_percent,
                    memory_percent: c.memory_percent,
                })
                .collect();
            Ok(ServerStats::aggregate(usage, &listing, None))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn web() -> FakeContainer {
        FakeContainer::new("a1b2c3d4e5f6", "web", ContainerStatus::Running, "nginx:latest")
    }

    #[tokio::test]
    async fn test_list_filters_stopped() {
        let fake = FakeRuntime::new();
        fake.add_container(web()).await;
        fake.add_container(FakeContainer::new("0f0f0f0f0f0f", "db", ContainerStatus::Exited, "postgres")).await;

        assert_eq!(fake.list_containers(true).await.unwrap().len(), 2);
        assert_eq!(fake.list_containers(false).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_container_lifecycle() {
        let fake = FakeRuntime::new();
        fake.add_container(web()).await;

        fake.stop("a1b2c3d4e5f6").await.unwrap();
        assert_eq!(fake.container_detail("a1b2c3d4e5f6").await.unwrap().status, ContainerStatus::Exited);

        // Stopping twice is tolerated.
        fake.stop("a1b2c3d4e5f6").await.unwrap();

        fake.start("web").await.unwrap();
        assert_eq!(fake.container_detail("web").await.unwrap().status, ContainerStatus::Running);
    }

    #[tokio::test]
    async fn test_unknown_container() {
        let fake = FakeRuntime::new();
        let err = fake.restart("ghost").await.unwrap_err();
        assert_eq!(err.to_string(), "command failed: No such container: ghost");
    }

    #[tokio::test]
    async fn test_logs_tail() {
        let fake = FakeRuntime::new();
        fake.add_container(web().with_logs("one\ntwo\nthree\n")).await;

        assert_eq!(fake.logs("web", 2).await.unwrap(), "two\nthree\n");
        assert_eq!(fake.logs("web", 10).await.unwrap(), "one\ntwo\nthree\n");
    }

    #[tokio::test]
    async fn test_scripted_failure_and_heal() {
        let fake = FakeRuntime::new();
        fake.fail(FakeOp::Images, "daemon unavailable").await;
        assert!(fake.list_images().await.is_err());

        fake.heal(FakeOp::Images).await;
        assert!(fake.list_images().await.unwrap().is_empty());
        assert_eq!(fake.calls().await, vec!["images", "images"]);
    }

    #[tokio::test]
    async fn test_stats_sums_running_containers() {
        let fake = FakeRuntime::new();
        fake.add_container(web().with_usage(1.5, 10.0)).await;
        fake.add_container(
            FakeContainer::new("0f0f0f0f0f0f", "db", ContainerStatus::Exited, "postgres").with_usage(9.0, 9.0),
        )
        .await;

        let stats = fake.stats().await.unwrap();
        assert_eq!(stats.cpu_percent, 1.5);
        assert_eq!(stats.memory_percent, 10.0);
        assert_eq!(stats.running_count, 1);
        assert_eq!(stats.total_count, 2);
    }
}
