//! Telegram transport for the control panel.

pub mod api;
pub mod poll;

pub use api::TelegramClient;
pub use poll::Poller;
