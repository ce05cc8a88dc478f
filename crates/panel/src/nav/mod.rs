//! Navigation: menu state machine between the chat transport and the
//! runtime backend.
//!
//! The current screen travels inside each button's action tag, so the
//! navigator keeps no per-chat state.

pub mod action;
pub mod navigator;
pub mod render;
pub mod view;

pub use action::{Action, ControlOp, Event, UnknownAction};
pub use navigator::Navigator;
pub use render::{clip_logs, Button, Outcome, Render};
pub use view::View;
