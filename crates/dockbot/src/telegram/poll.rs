//! Long-polling loop: turn updates into panel events and deliver the screens.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use panel::nav::{render, Event, Navigator, Render};
use tracing::{debug, info, warn};

use super::api::{TelegramClient, TelegramError, Update};

/// Pause after a failed getUpdates call before polling again.
const RETRY_PAUSE: Duration = Duration::from_secs(3);

/// Where the rendered screen goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// A new message in the chat.
    Send { chat_id: i64 },
    /// Replace the message whose button was pressed.
    Edit { chat_id: i64, message_id: i64, callback_id: String },
}

/// Map an update to a panel event. Plain text and unsupported updates yield `None`.
pub fn route(update: Update) -> Option<(Event, Reply)> {
    if let Some(query) = update.callback_query {
        let actor = query.from.id;
        let tag = query.data.unwrap_or_default();
        let reply = match query.message {
            Some(message) => Reply::Edit {
                chat_id: message.chat.id,
                message_id: message.message_id,
                callback_id: query.id,
            },
            // Private chats share the user id.
            None => Reply::Send { chat_id: actor },
        };
        return Some((Event::Button { tag, actor }, reply));
    }

    let message = update.message?;
    let actor = message.from.as_ref()?.id;
    let name = command_name(message.text.as_deref()?)?;
    Some((
        Event::Command { name, actor },
        Reply::Send { chat_id: message.chat.id },
    ))
}

/// `/start@my_bot args` -> `start`.
fn command_name(text: &str) -> Option<String> {
    let word = text.trim_start().strip_prefix('/')?.split_whitespace().next()?;
    let name = word.split('@').next().unwrap_or(word);
    if name.is_empty() {
        None
    } else {
        Some(name.to_lowercase())
    }
}

pub struct Poller {
    api: Arc<TelegramClient>,
    navigator: Arc<Navigator>,
}

impl Poller {
    pub fn new(api: Arc<TelegramClient>, navigator: Arc<Navigator>) -> Self {
        Self { api, navigator }
    }

    /// Poll until `shutdown` resolves. Each update is handled on its own task.
    pub async fn run(self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);
        let mut offset = 0;

        info!("Polling for updates");
        loop {
            let updates = tokio::select! {
                _ = &mut shutdown => break,
                result = self.api.get_updates(offset) => result,
            };

            match updates {
                Ok(updates) => {
                    for update in updates {
                        offset = offset.max(update.update_id + 1);
                        let update_id = update.update_id;
                        match route(update) {
                            Some((event, reply)) => self.dispatch(event, reply),
                            None => debug!(update_id, "Ignoring update"),
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Failed to fetch updates");
                    tokio::select! {
                        _ = &mut shutdown => break,
                        _ = tokio::time::sleep(RETRY_PAUSE) => {}
                    }
                }
            }
        }
        info!("Polling stopped");
    }

    fn dispatch(&self, event: Event, reply: Reply) {
        let api = self.api.clone();
        let navigator = self.navigator.clone();
        tokio::spawn(async move {
            if let Reply::Edit { callback_id, .. } = &reply {
                if let Err(e) = api.answer_callback(callback_id).await {
                    debug!(error = %e, "Failed to answer callback query");
                }
            }
            let screen = navigator.handle(event).await;
            deliver(&api, &reply, &screen).await;
        });
    }
}

async fn deliver(api: &TelegramClient, reply: &Reply, screen: &Render) {
    let Err(e) = send(api, reply, screen).await else {
        return;
    };
    warn!(error = %e, "Failed to deliver screen");

    // The chat refused the screen itself; tell the operator instead of staying silent.
    if let Some(fallback) = fallback_screen(&e) {
        if let Err(e) = send(api, reply, &fallback).await {
            warn!(error = %e, "Failed to deliver fallback screen");
        }
    }
}

async fn send(api: &TelegramClient, reply: &Reply, screen: &Render) -> Result<(), TelegramError> {
    match reply {
        Reply::Send { chat_id } => api.send_message(*chat_id, screen).await,
        Reply::Edit { chat_id, message_id, .. } => api.edit_message(*chat_id, *message_id, screen).await,
    }
}

/// A short replacement screen when the API rejected the content. Transport
/// failures get none, since a second request would fail the same way.
fn fallback_screen(err: &TelegramError) -> Option<Render> {
    match err {
        TelegramError::Api { description, .. } => Some(render::undeliverable(description)),
        TelegramError::Http(_) | TelegramError::EmptyResult(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn update(value: serde_json::Value) -> Update {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_route_command() {
        let routed = route(update(json!({
            "update_id": 1,
            "message": {
                "message_id": 3,
                "chat": {"id": -100},
                "from": {"id": 42},
                "text": "/start@dock_bot now"
            }
        })));
        assert_eq!(
            routed,
            Some((
                Event::Command { name: "start".into(), actor: 42 },
                Reply::Send { chat_id: -100 }
            ))
        );
    }

    #[test]
    fn test_route_button() {
        let routed = route(update(json!({
            "update_id": 2,
            "callback_query": {
                "id": "cb7",
                "from": {"id": 42},
                "message": {"message_id": 9, "chat": {"id": 42}},
                "data": "c:a1b2c3d4e5f6"
            }
        })));
        assert_eq!(
            routed,
            Some((
                Event::Button { tag: "c:a1b2c3d4e5f6".into(), actor: 42 },
                Reply::Edit { chat_id: 42, message_id: 9, callback_id: "cb7".into() }
            ))
        );
    }

    #[test]
    fn test_plain_text_is_ignored() {
        let routed = route(update(json!({
            "update_id": 3,
            "message": {"message_id": 4, "chat": {"id": 42}, "from": {"id": 42}, "text": "hello"}
        })));
        assert_eq!(routed, None);
        assert_eq!(route(update(json!({"update_id": 4}))), None);
    }

    #[test]
    fn test_rejected_screen_gets_fallback() {
        let rejected = TelegramError::Api {
            code: 400,
            description: "Bad Request: message is too long".to_string(),
        };
        let screen = fallback_screen(&rejected).unwrap();
        assert!(screen.text.contains("message is too long"));
        assert!(!screen.keyboard.is_empty());

        assert!(fallback_screen(&TelegramError::EmptyResult("sendMessage")).is_none());
    }

    #[test]
    fn test_command_name() {
        assert_eq!(command_name("/Start"), Some("start".into()));
        assert_eq!(command_name("  /logs web"), Some("logs".into()));
        assert_eq!(command_name("/"), None);
        assert_eq!(command_name("start"), None);
    }
}
