use std::sync::Arc;

use anyhow::{Context, Result};
use panel::docker::shell::ShellBackend;
use panel::docker::socket::SocketBackend;
use panel::docker::RuntimeBackend;
use panel::exec::{LocalExecutor, SshExecutor};
use tracing::info;

use crate::config::{BotConfig, RuntimeMode};

/// Build the runtime backend selected by `runtime.mode`.
///
/// The socket backend is pinged here so an unreachable daemon fails startup.
/// Shell backends connect per command and are checked on first use.
pub async fn connect(config: &BotConfig) -> Result<Arc<dyn RuntimeBackend>> {
    let backend: Arc<dyn RuntimeBackend> = match config.runtime.mode {
        RuntimeMode::Socket => {
            let backend = SocketBackend::new(&config.runtime.docker_socket)
                .context("Failed to create Docker client")?;
            backend
                .ping()
                .await
                .context("Docker daemon is not reachable")?;
            Arc::new(backend)
        }
        RuntimeMode::Ssh => {
            let executor = SshExecutor::new(config.ssh_target(), config.command_timeout());
            let target = executor.target();
            let label = format!("ssh {}@{}:{}", target.user, target.host, target.port);
            Arc::new(ShellBackend::new(Arc::new(executor), label))
        }
        RuntimeMode::Local => {
            let executor = LocalExecutor::new(config.command_timeout());
            Arc::new(ShellBackend::new(Arc::new(executor), "local docker CLI"))
        }
    };
    info!(backend = %backend.describe(), "Runtime backend ready");
    Ok(backend)
}
