use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use panel::exec::{SshCredential, SshTarget};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Smallest log display cap that still leaves room for output after the marker.
pub const MIN_LOG_BYTES: usize = 64;
/// Largest log display cap that fits a chat message together with its header.
pub const MAX_LOG_BYTES: usize = 4000;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BotConfig {
    pub telegram: TelegramConfig,
    pub runtime: RuntimeConfig,
    pub logs: LogsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub token: String,
    /// Chat user ids allowed to use the panel. Empty admits everyone.
    #[serde(default)]
    pub allowed_users: Vec<i64>,
    pub poll_timeout_secs: u64,
    pub api_base: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeMode {
    /// Docker Engine API on the local socket.
    Socket,
    /// Docker CLI on a remote host over SSH.
    Ssh,
    /// Docker CLI on this host.
    Local,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RuntimeConfig {
    pub mode: RuntimeMode,
    /// Empty uses DOCKER_HOST or the platform default.
    #[serde(default)]
    pub docker_socket: String,
    pub command_timeout_secs: u64,
    #[serde(default)]
    pub ssh: SshConfig,
}

#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SshConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    pub key_path: Option<String>,
    pub key_passphrase: Option<String>,
    /// Hex SHA-256 of the server host key; unset skips verification.
    pub host_key_sha256: Option<String>,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 22,
            user: String::new(),
            password: None,
            key_path: None,
            key_passphrase: None,
            host_key_sha256: None,
        }
    }
}

impl std::fmt::Debug for SshConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("key_path", &self.key_path)
            .field("key_passphrase", &self.key_passphrase.as_ref().map(|_| "***"))
            .field("host_key_sha256", &self.host_key_sha256)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogsConfig {
    pub tail_lines: usize,
    pub max_bytes: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("telegram.token is not set (use BOT_TOKEN or DOCKBOT_TELEGRAM__TOKEN)")]
    MissingToken,

    #[error("runtime.ssh.{0} is required when runtime.mode is ssh")]
    MissingSsh(&'static str),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("logs.max_bytes must be between 64 and 4000, got {0}")]
    LogCap(usize),

    #[error("invalid user id {0:?} in allow-list")]
    MalformedAllowList(String),
}

impl BotConfig {
    /// Load configuration from bot.toml and environment variables
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = config::Config::try_from(&BotConfig::default())
            .context("Failed to serialize default configuration")?;

        let mut builder = config::Config::builder().add_source(defaults);

        // 1. /etc/dockbot/bot.toml (system install)
        // 2. config/bot.toml (working directory)
        // 3. crates/dockbot/config/bot.toml (workspace root)
        for path in ["/etc/dockbot/bot", "config/bot", "crates/dockbot/config/bot"] {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        // Nested keys use a double underscore: DOCKBOT_RUNTIME__SSH__HOST
        builder = builder.add_source(
            config::Environment::with_prefix("DOCKBOT")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("telegram.allowed_users"),
        );

        let mut config: BotConfig = builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Short variable names win over everything else.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(token) = lookup("BOT_TOKEN") {
            self.telegram.token = token;
        }
        if let Some(users) = lookup("ALLOWED_USERS") {
            self.telegram.allowed_users = parse_user_ids(&users)?;
        }
        if let Some(host) = lookup("SERVER_HOST") {
            // A remote host implies the SSH runtime.
            self.runtime.ssh.host = host;
            self.runtime.mode = RuntimeMode::Ssh;
        }
        if let Some(user) = lookup("SERVER_USER") {
            self.runtime.ssh.user = user;
        }
        if let Some(password) = lookup("SERVER_PASSWORD") {
            self.runtime.ssh.password = Some(password);
        }
        if let Some(socket) = lookup("DOCKER_SOCKET") {
            self.runtime.docker_socket = socket;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.telegram.token.trim().is_empty() {
            return Err(ConfigError::MissingToken);
        }
        if self.telegram.poll_timeout_secs == 0 {
            return Err(ConfigError::Zero("telegram.poll_timeout_secs"));
        }
        if self.runtime.command_timeout_secs == 0 {
            return Err(ConfigError::Zero("runtime.command_timeout_secs"));
        }
        if self.runtime.mode == RuntimeMode::Ssh {
            if self.runtime.ssh.host.trim().is_empty() {
                return Err(ConfigError::MissingSsh("host"));
            }
            if self.runtime.ssh.user.trim().is_empty() {
                return Err(ConfigError::MissingSsh("user"));
            }
            if self.runtime.ssh.port == 0 {
                return Err(ConfigError::Zero("runtime.ssh.port"));
            }
        }
        if self.logs.tail_lines == 0 {
            return Err(ConfigError::Zero("logs.tail_lines"));
        }
        if !(MIN_LOG_BYTES..=MAX_LOG_BYTES).contains(&self.logs.max_bytes) {
            return Err(ConfigError::LogCap(self.logs.max_bytes));
        }
        Ok(())
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.runtime.command_timeout_secs)
    }

    /// SSH target; a key file wins over a password, neither means ssh-agent.
    pub fn ssh_target(&self) -> SshTarget {
        let ssh = &self.runtime.ssh;
        let credential = match (&ssh.key_path, &ssh.password) {
            (Some(path), _) => SshCredential::KeyFile {
                path: PathBuf::from(path),
                passphrase: ssh.key_passphrase.clone(),
            },
            (None, Some(password)) => SshCredential::Password(password.clone()),
            (None, None) => SshCredential::Agent,
        };
        SshTarget {
            host: ssh.host.clone(),
            port: ssh.port,
            user: ssh.user.clone(),
            credential,
            host_key_sha256: ssh.host_key_sha256.clone(),
        }
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            telegram: TelegramConfig {
                token: String::new(),
                allowed_users: vec![],
                poll_timeout_secs: 30,
                api_base: "https://api.telegram.org".to_string(),
            },
            runtime: RuntimeConfig {
                mode: RuntimeMode::Socket,
                docker_socket: String::new(),
                command_timeout_secs: 30,
                ssh: SshConfig::default(),
            },
            logs: LogsConfig {
                tail_lines: 20,
                max_bytes: 3000,
            },
            logging: LoggingConfig {
                level: "info,dockbot=debug,panel=debug".to_string(),
                format: LogFormat::Pretty,
            },
        }
    }
}

/// Parse a comma-separated list of chat user ids. Blank entries are skipped.
pub fn parse_user_ids(raw: &str) -> Result<Vec<i64>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().map_err(|_| ConfigError::MalformedAllowList(s.to_string())))
        .collect()
}
