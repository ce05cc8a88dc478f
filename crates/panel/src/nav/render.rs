//! Screen rendering: plain text plus an inline keyboard.

use std::fmt::Write as _;

use crate::docker::{ContainerDetail, ContainerSummary, DockerError, ImageSummary, ServerStats};
use crate::gate::AccessDenied;

use super::action::{Action, ControlOp};
use super::view::View;

/// Prefix put in front of clipped log output.
pub const TRUNCATION_MARKER: &str = "[... earlier output truncated]\n";

/// Screen text budget in characters, under the chat's 4096-character message limit.
pub const SCREEN_TEXT_LIMIT: usize = 4000;

pub const UNKNOWN_ACTION_NOTICE: &str = "That button is no longer understood, here is the main menu.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub action: Action,
}

impl Button {
    fn new(label: impl Into<String>, action: Action) -> Self {
        Self { label: label.into(), action }
    }

    fn back(from: View) -> Self {
        Self::new("Back", Action::Back(from))
    }
}

/// A screen ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Render {
    pub text: String,
    pub keyboard: Vec<Vec<Button>>,
}

/// Result of a lifecycle operation, shown once on top of the detail screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    Failed(String),
}

impl Outcome {
    pub fn from_result(result: Result<(), DockerError>) -> Self {
        match result {
            Ok(()) => Outcome::Ok,
            Err(err) => Outcome::Failed(err.to_string()),
        }
    }

    pub fn describe(&self, op: ControlOp, id: &str) -> String {
        match self {
            Outcome::Ok => format!("Container {} {}.", id, op.past_tense()),
            Outcome::Failed(reason) => format!("Failed to {} {}: {}", op.verb(), id, reason),
        }
    }
}

/// Keep the tail of `text` so that the marker plus the kept part fit in
/// `cap` bytes. Cuts only on character boundaries.
pub fn clip_logs(text: &str, cap: usize) -> String {
    if text.len() <= cap {
        return text.to_string();
    }
    let (marker, budget) = match cap.checked_sub(TRUNCATION_MARKER.len()) {
        Some(budget) => (TRUNCATION_MARKER, budget),
        None => ("", cap),
    };
    let mut start = text.len() - budget;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    format!("{}{}", marker, &text[start..])
}

/// Append one line per row while the text stays within `limit` characters.
/// Rows that do not fit are summarized as "... and N more".
fn push_rows(text: &mut String, rows: &[String], limit: usize) {
    let mut used = text.chars().count();
    let reserve = format!("\n... and {} more", rows.len()).chars().count();
    for (i, row) in rows.iter().enumerate() {
        let len = row.chars().count() + 1;
        let last = i + 1 == rows.len();
        if used + len + if last { 0 } else { reserve } > limit {
            let _ = write!(text, "\n... and {} more", rows.len() - i);
            return;
        }
        text.push('\n');
        text.push_str(row);
        used += len;
    }
}

/// Keep at most `limit` characters of `text`, marking the cut with "...".
fn clip_head(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let keep = limit.saturating_sub(3);
    let end = text.char_indices().nth(keep).map(|(i, _)| i).unwrap_or(text.len());
    format!("{}...", &text[..end])
}

pub fn main_menu(notice: Option<&str>) -> Render {
    let mut text = String::from("Docker control panel\nChoose a section:");
    if let Some(notice) = notice {
        text = format!("{}\n\n{}", notice, text);
    }
    Render {
        text,
        keyboard: vec![
            vec![Button::new("Containers", Action::Open(View::ContainerList))],
            vec![Button::new("Images", Action::Open(View::ImageList))],
            vec![Button::new("Server stats", Action::Open(View::Stats))],
        ],
    }
}

pub fn container_list(containers: &[ContainerSummary]) -> Render {
    let text = if containers.is_empty() {
        "No containers found.".to_string()
    } else {
        format!("Containers ({}):", containers.len())
    };
    let mut keyboard: Vec<Vec<Button>> = containers
        .iter()
        .map(|c| {
            let mark = if c.status.is_running() { "[on]" } else { "[off]" };
            vec![Button::new(
                format!("{} {}", mark, c.name),
                Action::Open(View::ContainerDetail(c.id.clone())),
            )]
        })
        .collect();
    keyboard.push(vec![Button::back(View::ContainerList)]);
    Render { text, keyboard }
}

pub fn container_detail(detail: &ContainerDetail, overlay: Option<&str>) -> Render {
    let mut text = String::new();
    if let Some(line) = overlay {
        let _ = writeln!(text, "{}\n", line);
    }
    let _ = write!(
        text,
        "Container: {}\nID: {}\nStatus: {}\nImage: {}\nCreated: {}",
        detail.name, detail.id, detail.status, detail.image, detail.created
    );

    let id = detail.id.clone();
    let control = if detail.status.is_running() {
        vec![
            Button::new("Stop", Action::Control(ControlOp::Stop, id.clone())),
            Button::new("Restart", Action::Control(ControlOp::Restart, id.clone())),
        ]
    } else {
        vec![Button::new("Start", Action::Control(ControlOp::Start, id.clone()))]
    };
    Render {
        text,
        keyboard: vec![
            control,
            vec![Button::new("Logs", Action::Open(View::Logs(id.clone())))],
            vec![Button::back(View::ContainerDetail(id))],
        ],
    }
}

pub fn logs(id: &str, text: &str) -> Render {
    let body = if text.trim().is_empty() { "(no output)" } else { text };
    Render {
        text: format!("Logs of {}:\n\n{}", id, body),
        keyboard: vec![
            vec![Button::new("Refresh", Action::Open(View::Logs(id.to_string())))],
            vec![Button::back(View::Logs(id.to_string()))],
        ],
    }
}

pub fn image_list(images: &[ImageSummary]) -> Render {
    let text = if images.is_empty() {
        "No images found.".to_string()
    } else {
        let mut text = format!("Images ({}):", images.len());
        let rows: Vec<String> = images
            .iter()
            .map(|image| format!("{}  {}  {}", image.name, image.size, image.created))
            .collect();
        push_rows(&mut text, &rows, SCREEN_TEXT_LIMIT);
        text
    };
    Render {
        text,
        keyboard: vec![vec![Button::back(View::ImageList)]],
    }
}

pub fn stats(stats: &ServerStats) -> Render {
    let mut text = format!(
        "Server stats\nCPU: {:.2}%\nMemory: {:.2}%",
        stats.cpu_percent, stats.memory_percent
    );
    if let Some(disk) = stats.disk_percent {
        let _ = write!(text, "\nDisk: {:.0}%", disk);
    }
    let _ = write!(text, "\nContainers: {} running / {} total", stats.running_count, stats.total_count);
    let rows: Vec<String> = stats
        .containers
        .iter()
        .map(|u| format!("  {}: CPU {:.2}%, memory {:.2}%", u.name, u.cpu_percent, u.memory_percent))
        .collect();
    push_rows(&mut text, &rows, SCREEN_TEXT_LIMIT);
    Render {
        text,
        keyboard: vec![
            vec![Button::new("Refresh", Action::Open(View::Stats))],
            vec![Button::back(View::Stats)],
        ],
    }
}

/// Failed fetch of `view`: offer to retry it or to leave it.
pub fn error(view: &View, err: &DockerError) -> Render {
    Render {
        text: clip_head(&format!("Error: {}", err), SCREEN_TEXT_LIMIT),
        keyboard: vec![vec![
            Button::new("Retry", Action::Open(view.clone())),
            Button::back(view.clone()),
        ]],
    }
}

pub fn denied(_denied: &AccessDenied) -> Render {
    Render {
        text: "Access denied.".to_string(),
        keyboard: Vec::new(),
    }
}

/// Shown instead of a screen the chat refused to display.
pub fn undeliverable(reason: &str) -> Render {
    Render {
        text: clip_head(&format!("This screen could not be displayed: {}", reason), SCREEN_TEXT_LIMIT),
        keyboard: vec![vec![Button::new("Main menu", Action::Open(View::Main))]],
    }
}

pub fn command_hint(name: &str) -> Render {
    Render {
        text: format!("Unknown command /{}. Send /start to open the panel.", name),
        keyboard: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docker::{ContainerStatus, ContainerUsage};
    use crate::exec::ExecutionError;

    fn detail(status: ContainerStatus) -> ContainerDetail {
        ContainerDetail {
            id: "a1b2c3d4e5f6".into(),
            name: "web".into(),
            status,
            image: "nginx:latest".into(),
            created: "2024-02-14 03:12:44".into(),
        }
    }

    fn labels(render: &Render) -> Vec<Vec<&str>> {
        render
            .keyboard
            .iter()
            .map(|row| row.iter().map(|b| b.label.as_str()).collect())
            .collect()
    }

    #[test]
    fn test_clip_short_text_untouched() {
        assert_eq!(clip_logs("hello\n", 3000), "hello\n");
    }

    #[test]
    fn test_clip_keeps_tail_within_cap() {
        let text: String = (0..500).map(|i| format!("line {}\n", i)).collect();
        for cap in [64, 100, 1000, 3000] {
            let clipped = clip_logs(&text, cap);
            assert!(clipped.len() <= cap, "cap {}", cap);
            let kept = clipped.strip_prefix(TRUNCATION_MARKER).unwrap();
            assert!(text.ends_with(kept));
        }
        assert!(clip_logs(&text, 3000).ends_with("line 499\n"));
    }

    #[test]
    fn test_clip_respects_char_boundaries() {
        let text = "é".repeat(100);
        let clipped = clip_logs(&text, 64);
        assert!(clipped.len() <= 64);
        assert!(text.ends_with(clipped.strip_prefix(TRUNCATION_MARKER).unwrap()));
    }

    #[test]
    fn test_clip_tiny_cap_drops_marker() {
        let clipped = clip_logs("abcdefghij", 4);
        assert_eq!(clipped, "ghij");
    }

    #[test]
    fn test_detail_keyboard_running() {
        let render = container_detail(&detail(ContainerStatus::Running), None);
        assert_eq!(labels(&render), vec![vec!["Stop", "Restart"], vec!["Logs"], vec!["Back"]]);
        assert_eq!(render.keyboard[2][0].action.to_string(), "back:c:a1b2c3d4e5f6");
    }

    #[test]
    fn test_detail_keyboard_stopped_with_overlay() {
        let render = container_detail(&detail(ContainerStatus::Exited), Some("Container web stopped."));
        assert_eq!(labels(&render), vec![vec!["Start"], vec!["Logs"], vec!["Back"]]);
        assert!(render.text.starts_with("Container web stopped.\n\nContainer: web"));
    }

    #[test]
    fn test_error_offers_retry_and_back() {
        let err: DockerError = ExecutionError::new("Cannot connect to the Docker daemon").into();
        let render = error(&View::Stats, &err);
        assert_eq!(render.text, "Error: command failed: Cannot connect to the Docker daemon");
        assert_eq!(render.keyboard[0][0].action, Action::Open(View::Stats));
        assert_eq!(render.keyboard[0][1].action, Action::Back(View::Stats));
    }

    #[test]
    fn test_long_image_list_fits_message() {
        let images: Vec<ImageSummary> = (0..120)
            .map(|i| ImageSummary {
                name: format!("registry.example.com/team/service-{}:v1.2.{}", i, i),
                size: "187.7MB".into(),
                created: "2024-02-14 03:12:44".into(),
            })
            .collect();
        let render = image_list(&images);

        assert!(render.text.chars().count() <= SCREEN_TEXT_LIMIT);
        assert!(render.text.starts_with("Images (120):\nregistry.example.com/team/service-0:v1.2.0"));
        let shown = render.text.lines().filter(|l| l.starts_with("registry.")).count();
        let more = format!("\n... and {} more", 120 - shown);
        assert!(shown > 0 && shown < 120);
        assert!(render.text.ends_with(&more));
    }

    #[test]
    fn test_many_containers_stats_fit_message() {
        let containers: Vec<ContainerUsage> = (0..150)
            .map(|i| ContainerUsage {
                name: format!("worker-pool-replica-{}", i),
                cpu_percent: 1.25,
                memory_percent: 0.5,
            })
            .collect();
        let render = stats(&ServerStats {
            running_count: 150,
            total_count: 150,
            containers,
            ..Default::default()
        });

        assert!(render.text.chars().count() <= SCREEN_TEXT_LIMIT);
        assert!(render.text.contains("Containers: 150 running / 150 total"));
        assert!(render.text.contains("... and "));
    }

    #[test]
    fn test_short_lists_are_not_summarized() {
        let rows = vec!["a".to_string(), "b".to_string()];
        let mut text = String::from("head");
        push_rows(&mut text, &rows, 100);
        assert_eq!(text, "head\na\nb");
    }

    #[test]
    fn test_error_text_is_clipped() {
        let err: DockerError = ExecutionError::new("x".repeat(10_000)).into();
        let render = error(&View::ImageList, &err);
        assert_eq!(render.text.chars().count(), SCREEN_TEXT_LIMIT);
        assert!(render.text.ends_with("..."));
    }

    #[test]
    fn test_undeliverable_offers_main_menu() {
        let render = undeliverable("Bad Request: message is too long");
        assert_eq!(render.text, "This screen could not be displayed: Bad Request: message is too long");
        assert_eq!(render.keyboard[0][0].action, Action::Open(View::Main));
    }

    #[test]
    fn test_outcome_describe() {
        assert_eq!(Outcome::Ok.describe(ControlOp::Restart, "web"), "Container web restarted.");
        let failed = Outcome::from_result(Err(ExecutionError::new("boom").into()));
        assert_eq!(failed.describe(ControlOp::Stop, "web"), "Failed to stop web: command failed: boom");
    }
}
