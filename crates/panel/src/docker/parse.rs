//! Parse: turn Docker CLI output into facade records.
//!
//! Tabular commands are run with `--format` templates joined by tabs, so a
//! line with the wrong column count is malformed and skipped on its own.
//! Numeric telemetry never fails: unparsable percentages read as 0.0.

use serde::Deserialize;
use tracing::debug;

use super::error::ParseError;
use super::model::{short_id, short_timestamp, ContainerDetail, ContainerStatus, ContainerSummary, ContainerUsage, ImageSummary};

/// `docker ps` format producing the columns read by [`parse_container_table`].
pub const CONTAINER_FORMAT: &str = "{{.ID}}\t{{.Names}}\t{{.Status}}\t{{.Image}}";
/// `docker images` format producing the columns read by [`parse_image_table`].
pub const IMAGE_FORMAT: &str = "{{.Repository}}\t{{.Tag}}\t{{.Size}}\t{{.CreatedAt}}";
/// `docker stats` format producing the columns read by [`parse_stats_table`].
pub const STATS_FORMAT: &str = "{{.Name}}\t{{.CPUPerc}}\t{{.MemPerc}}";

fn rows(raw: &str, columns: usize) -> impl Iterator<Item = Vec<&str>> {
    raw.lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(move |line| {
            let parts: Vec<&str> = line.split('\t').collect();
            if parts.len() == columns {
                Some(parts)
            } else {
                debug!(line = %line, expected = columns, found = parts.len(), "Skipping malformed row");
                None
            }
        })
}

pub fn parse_container_table(raw: &str) -> Vec<ContainerSummary> {
    rows(raw, 4)
        .map(|parts| ContainerSummary {
            id: short_id(parts[0].trim()),
            name: parts[1].trim().to_string(),
            status: ContainerStatus::from_ps_status(parts[2]),
            image: parts[3].trim().to_string(),
        })
        .collect()
}

pub fn parse_image_table(raw: &str) -> Vec<ImageSummary> {
    rows(raw, 4)
        .map(|parts| ImageSummary {
            name: format!("{}:{}", parts[0].trim(), parts[1].trim()),
            size: parts[2].trim().to_string(),
            created: short_timestamp(parts[3].trim()),
        })
        .collect()
}

pub fn parse_stats_table(raw: &str) -> Vec<ContainerUsage> {
    rows(raw, 3)
        .map(|parts| ContainerUsage {
            name: parts[0].trim().to_string(),
            cpu_percent: parse_percent(parts[1]),
            memory_percent: parse_percent(parts[2]),
        })
        .collect()
}

/// "12.5%" -> 12.5; anything unparsable -> 0.0.
pub fn parse_percent(raw: &str) -> f64 {
    let trimmed = raw.trim();
    let number = trimmed.strip_suffix('%').unwrap_or(trimmed).trim();
    match number.parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => {
            debug!(value = %raw, "Unparsable percentage, using 0");
            0.0
        }
    }
}

/// `Use%` of the last row of `df -P` output.
pub fn parse_df_usage(raw: &str) -> Option<f64> {
    let line = raw.lines().rev().find(|l| !l.trim().is_empty())?;
    let column = line.split_whitespace().nth(4)?;
    let number = column.strip_suffix('%')?;
    number.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectPayload {
    id: String,
    name: String,
    created: String,
    state: InspectState,
    config: InspectConfig,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectState {
    status: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectConfig {
    image: String,
}

/// Parse the JSON array printed by `docker inspect <id>`.
pub fn parse_inspect(raw: &str) -> Result<ContainerDetail, ParseError> {
    let payloads: Vec<InspectPayload> =
        serde_json::from_str(raw).map_err(|e| ParseError::new("container inspect", e.to_string()))?;

    let payload = payloads
        .into_iter()
        .next()
        .ok_or_else(|| ParseError::new("container inspect", "empty result"))?;

    Ok(ContainerDetail {
        id: short_id(&payload.id),
        name: payload
            .name
            .strip_prefix('/')
            .unwrap_or(&payload.name)
            .to_string(),
        status: ContainerStatus::from_state(&payload.state.status),
        image: payload.config.image,
        created: short_timestamp(&payload.created),
    })
}
