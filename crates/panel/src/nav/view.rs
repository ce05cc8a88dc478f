use std::fmt;

/// A screen of the control panel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum View {
    Main,
    ContainerList,
    ContainerDetail(String),
    ImageList,
    Stats,
    Logs(String),
}

impl View {
    /// The screen a Back button leads to.
    pub fn parent(&self) -> View {
        match self {
            View::Main => View::Main,
            View::ContainerList | View::ImageList | View::Stats => View::Main,
            View::ContainerDetail(_) => View::ContainerList,
            View::Logs(id) => View::ContainerDetail(id.clone()),
        }
    }

    /// Decode a view tag, the inverse of `Display`.
    pub(crate) fn from_tag(tag: &str) -> Option<View> {
        match tag {
            "main" => Some(View::Main),
            "list" => Some(View::ContainerList),
            "images" => Some(View::ImageList),
            "stats" => Some(View::Stats),
            _ => {
                let (kind, id) = tag.split_once(':')?;
                let id = valid_id(id)?;
                match kind {
                    "c" => Some(View::ContainerDetail(id)),
                    "logs" => Some(View::Logs(id)),
                    _ => None,
                }
            }
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            View::Main => write!(f, "main"),
            View::ContainerList => write!(f, "list"),
            View::ImageList => write!(f, "images"),
            View::Stats => write!(f, "stats"),
            View::ContainerDetail(id) => write!(f, "c:{}", id),
            View::Logs(id) => write!(f, "logs:{}", id),
        }
    }
}

/// Container ids inside tags are non-empty and free of separators.
pub(crate) fn valid_id(id: &str) -> Option<String> {
    if id.is_empty() || id.contains(':') || id.chars().any(char::is_whitespace) {
        None
    } else {
        Some(id.to_string())
    }
}
