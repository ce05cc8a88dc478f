use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::gate::ActorId;

use super::view::{valid_id, View};

/// Container lifecycle operation offered on the detail screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlOp {
    Start,
    Stop,
    Restart,
}

impl ControlOp {
    pub fn verb(self) -> &'static str {
        match self {
            ControlOp::Start => "start",
            ControlOp::Stop => "stop",
            ControlOp::Restart => "restart",
        }
    }

    pub fn past_tense(self) -> &'static str {
        match self {
            ControlOp::Start => "started",
            ControlOp::Stop => "stopped",
            ControlOp::Restart => "restarted",
        }
    }
}

/// What a button asks for.
///
/// Encoded as a short tag that fits a chat callback payload:
/// `list`, `stats`, `images`, `main`, `c:<id>`, `logs:<id>`,
/// `start:<id>`, `stop:<id>`, `restart:<id>` and `back:<view>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Open(View),
    Control(ControlOp, String),
    /// Leave the carried view for its parent.
    Back(View),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown action tag: {0:?}")]
pub struct UnknownAction(pub String);

impl FromStr for Action {
    type Err = UnknownAction;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        let unknown = || UnknownAction(tag.to_string());

        if let Some(view) = tag.strip_prefix("back:") {
            return View::from_tag(view).map(Action::Back).ok_or_else(unknown);
        }
        if let Some((verb, id)) = tag.split_once(':') {
            let op = match verb {
                "start" => Some(ControlOp::Start),
                "stop" => Some(ControlOp::Stop),
                "restart" => Some(ControlOp::Restart),
                _ => None,
            };
            if let Some(op) = op {
                return valid_id(id).map(|id| Action::Control(op, id)).ok_or_else(unknown);
            }
        }
        View::from_tag(tag).map(Action::Open).ok_or_else(unknown)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Open(view) => write!(f, "{}", view),
            Action::Control(op, id) => write!(f, "{}:{}", op.verb(), id),
            Action::Back(view) => write!(f, "back:{}", view),
        }
    }
}

/// An incoming interaction from the chat transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A slash command such as `/start`, without the slash.
    Command { name: String, actor: ActorId },
    /// A button press carrying the raw action tag.
    Button { tag: String, actor: ActorId },
}

impl Event {
    pub fn actor(&self) -> ActorId {
        match self {
            Event::Command { actor, .. } | Event::Button { actor, .. } => *actor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_menu_tags() {
        assert_eq!("list".parse::<Action>().unwrap(), Action::Open(View::ContainerList));
        assert_eq!("main".parse::<Action>().unwrap(), Action::Open(View::Main));
        assert_eq!(
            "c:a1b2c3d4e5f6".parse::<Action>().unwrap(),
            Action::Open(View::ContainerDetail("a1b2c3d4e5f6".into()))
        );
    }

    #[test]
    fn test_parse_control_and_back() {
        assert_eq!(
            "restart:web".parse::<Action>().unwrap(),
            Action::Control(ControlOp::Restart, "web".into())
        );
        assert_eq!(
            "back:logs:web".parse::<Action>().unwrap(),
            Action::Back(View::Logs("web".into()))
        );
        assert_eq!(Action::Back(View::ContainerDetail("web".into())).to_string(), "back:c:web");
    }

    #[test]
    fn test_unknown_tags() {
        for tag in ["", "back", "back:", "stop:", "kill:web", "container_web", "back:nope"] {
            assert_eq!(tag.parse::<Action>(), Err(UnknownAction(tag.to_string())), "tag {:?}", tag);
        }
    }

    #[test]
    fn test_tags_fit_callback_payload() {
        let id = "a1b2c3d4e5f6";
        let longest = Action::Back(View::Logs(id.into())).to_string();
        assert!(longest.len() <= 64);
        assert!(Action::Control(ControlOp::Restart, id.into()).to_string().len() <= 64);
    }

    #[test]
    fn test_event_actor() {
        assert_eq!(Event::Command { name: "start".into(), actor: 42 }.actor(), 42);
        assert_eq!(Event::Button { tag: "list".into(), actor: 7 }.actor(), 7);
    }
}
