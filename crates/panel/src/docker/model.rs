//! Model: records produced by the facade, independent of backend.

use std::fmt;

use serde::Serialize;

/// Length of the short container id shown by `docker ps`.
pub const SHORT_ID_LEN: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    Running,
    Exited,
    /// Anything else, kept verbatim ("created", "paused", "Up 3 hours (Paused)").
    Other(String),
}

impl ContainerStatus {
    /// From a daemon state word (`State.Status` / list `State`).
    pub fn from_state(state: &str) -> Self {
        match state.trim() {
            "running" => ContainerStatus::Running,
            "exited" => ContainerStatus::Exited,
            other => ContainerStatus::Other(other.to_string()),
        }
    }

    /// From the human `STATUS` column of `docker ps` ("Up 2 hours",
    /// "Exited (0) 3 days ago").
    pub fn from_ps_status(status: &str) -> Self {
        let status = status.trim();
        if status.starts_with("Up") && !status.contains("(Paused)") {
            ContainerStatus::Running
        } else if status.starts_with("Exited") {
            ContainerStatus::Exited
        } else {
            ContainerStatus::Other(status.to_string())
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, ContainerStatus::Running)
    }
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerStatus::Running => f.write_str("running"),
            ContainerStatus::Exited => f.write_str("exited"),
            ContainerStatus::Other(raw) => f.write_str(raw),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerSummary {
    pub id: String,    // Short 12-char id
    pub name: String,  // Without leading slash
    pub status: ContainerStatus,
    pub image: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerDetail {
    pub id: String,
    pub name: String,
    pub status: ContainerStatus,
    pub image: String,
    pub created: String, // "YYYY-MM-DD HH:MM:SS"
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageSummary {
    pub name: String, // repository:tag
    pub size: String, // human readable, e.g. "187.7MB"
    pub created: String,
}

/// Resource usage of one running container.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContainerUsage {
    pub name: String,
    pub cpu_percent: f64,
    pub memory_percent: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ServerStats {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disk_percent: Option<f64>,
    pub running_count: usize,
    pub total_count: usize,
    pub containers: Vec<ContainerUsage>,
}

impl ServerStats {
    /// Totals from per-container usage plus counts from a container listing.
    pub fn aggregate(usage: Vec<ContainerUsage>, listing: &[ContainerSummary], disk_percent: Option<f64>) -> Self {
        Self {
            cpu_percent: usage.iter().map(|u| u.cpu_percent).sum(),
            memory_percent: usage.iter().map(|u| u.memory_percent).sum(),
            disk_percent,
            running_count: listing.iter().filter(|c| c.status.is_running()).count(),
            total_count: listing.len(),
            containers: usage,
        }
    }
}

/// Truncate a container id to the short form `docker ps` prints.
pub fn short_id(id: &str) -> String {
    let id = id.strip_prefix("sha256:").unwrap_or(id);
    id.chars().take(SHORT_ID_LEN).collect()
}

/// "2024-03-01T10:20:30.123456789Z" -> "2024-03-01 10:20:30".
pub fn short_timestamp(raw: &str) -> String {
    raw.chars()
        .take(19)
        .map(|c| if c == 'T' { ' ' } else { c })
        .collect()
}

/// Byte count in decimal units with four significant digits, matching the
/// Docker CLI ("187.7MB", "5.59kB").
pub fn human_size(bytes: i64) -> String {
    const UNITS: [&str; 5] = ["B", "kB", "MB", "GB", "TB"];

    let mut size = bytes.max(0) as f64;
    let mut unit = 0;
    while size >= 1000.0 && unit < UNITS.len() - 1 {
        size /= 1000.0;
        unit += 1;
    }
    // 999.95 and up would print as "1000" at four significant digits.
    if size >= 999.95 && unit < UNITS.len() - 1 {
        size /= 1000.0;
        unit += 1;
    }

    let int_digits = if size < 10.0 {
        1
    } else if size < 100.0 {
        2
    } else if size < 1000.0 {
        3
    } else {
        4
    };
    let formatted = format!("{:.*}", 4 - int_digits, size);
    let trimmed = if formatted.contains('.') {
        formatted.trim_end_matches('0').trim_end_matches('.')
    } else {
        formatted.as_str()
    };
    format!("{}{}", trimmed, UNITS[unit])
}
