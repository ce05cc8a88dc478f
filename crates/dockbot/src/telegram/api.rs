//! Minimal Telegram Bot API client: the handful of methods the panel uses.

use std::time::Duration;

use panel::nav::Render;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum TelegramError {
    /// Transport failure. The request URL is stripped since it embeds the token.
    #[error("telegram request failed: {0}")]
    Http(reqwest::Error),

    #[error("telegram API error {code}: {description}")]
    Api { code: i64, description: String },

    #[error("telegram API returned no result for {0}")]
    EmptyResult(&'static str),
}

impl From<reqwest::Error> for TelegramError {
    fn from(err: reqwest::Error) -> Self {
        TelegramError::Http(err.without_url())
    }
}

impl TelegramError {
    /// Editing a message to identical content is rejected by the API.
    pub fn is_not_modified(&self) -> bool {
        matches!(self, TelegramError::Api { description, .. } if description.contains("message is not modified"))
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<i64>,
}

impl<T> ApiResponse<T> {
    fn into_result(self, method: &'static str) -> Result<T, TelegramError> {
        if !self.ok {
            return Err(TelegramError::Api {
                code: self.error_code.unwrap_or_default(),
                description: self.description.unwrap_or_default(),
            });
        }
        self.result.ok_or(TelegramError::EmptyResult(method))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Serialize, PartialEq)]
struct InlineKeyboardButton {
    text: String,
    callback_data: String,
}

#[derive(Debug, Serialize, PartialEq)]
struct InlineKeyboardMarkup {
    inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

impl From<&Render> for InlineKeyboardMarkup {
    fn from(render: &Render) -> Self {
        Self {
            inline_keyboard: render
                .keyboard
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|button| InlineKeyboardButton {
                            text: button.label.clone(),
                            callback_data: button.action.to_string(),
                        })
                        .collect()
                })
                .collect(),
        }
    }
}

pub struct TelegramClient {
    client: Client,
    base_url: String,
    poll_timeout_secs: u64,
}

impl TelegramClient {
    pub fn new(api_base: &str, token: &str, poll_timeout_secs: u64) -> Result<Self, TelegramError> {
        // Long polls hold the connection open for the whole poll timeout.
        let client = Client::builder()
            .timeout(Duration::from_secs(poll_timeout_secs + 10))
            .build()?;
        Ok(Self {
            client,
            base_url: format!("{}/bot{}", api_base.trim_end_matches('/'), token),
            poll_timeout_secs,
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &'static str,
        body: serde_json::Value,
    ) -> Result<T, TelegramError> {
        let response = self
            .client
            .post(format!("{}/{}", self.base_url, method))
            .json(&body)
            .send()
            .await?;

        // Error responses carry a JSON body too, so the status is not checked first.
        let status = response.status();
        let parsed: ApiResponse<T> = response.json().await?;
        debug!(method, status = status.as_u16(), ok = parsed.ok, "Telegram API call");
        parsed.into_result(method)
    }

    pub async fn get_me(&self) -> Result<User, TelegramError> {
        self.call("getMe", json!({})).await
    }

    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, TelegramError> {
        self.call(
            "getUpdates",
            json!({
                "offset": offset,
                "timeout": self.poll_timeout_secs,
                "allowed_updates": ["message", "callback_query"],
            }),
        )
        .await
    }

    pub async fn send_message(&self, chat_id: i64, render: &Render) -> Result<(), TelegramError> {
        let _: Message = self.call("sendMessage", message_body(chat_id, None, render)).await?;
        Ok(())
    }

    /// Replace the text and keyboard of an earlier message. Unchanged content is not an error.
    pub async fn edit_message(&self, chat_id: i64, message_id: i64, render: &Render) -> Result<(), TelegramError> {
        let result: Result<serde_json::Value, _> = self
            .call("editMessageText", message_body(chat_id, Some(message_id), render))
            .await;
        match result {
            Ok(_) => Ok(()),
            Err(err) if err.is_not_modified() => Ok(()),
            Err(err) => Err(err),
        }
    }

    pub async fn answer_callback(&self, callback_id: &str) -> Result<(), TelegramError> {
        let _: bool = self
            .call("answerCallbackQuery", json!({ "callback_query_id": callback_id }))
            .await?;
        Ok(())
    }
}

fn message_body(chat_id: i64, message_id: Option<i64>, render: &Render) -> serde_json::Value {
    let mut body = json!({
        "chat_id": chat_id,
        "text": render.text,
        "reply_markup": InlineKeyboardMarkup::from(render),
    });
    if let Some(message_id) = message_id {
        body["message_id"] = json!(message_id);
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use panel::nav::{Action, Button, View};

    fn screen() -> Render {
        Render {
            text: "Docker control panel".to_string(),
            keyboard: vec![
                vec![Button { label: "Containers".into(), action: Action::Open(View::ContainerList) }],
                vec![Button { label: "Back".into(), action: Action::Back(View::Stats) }],
            ],
        }
    }

    #[test]
    fn test_keyboard_markup() {
        let body = message_body(42, Some(7), &screen());
        assert_eq!(
            body,
            json!({
                "chat_id": 42,
                "message_id": 7,
                "text": "Docker control panel",
                "reply_markup": {
                    "inline_keyboard": [
                        [{"text": "Containers", "callback_data": "list"}],
                        [{"text": "Back", "callback_data": "back:stats"}],
                    ]
                }
            })
        );
        assert!(message_body(42, None, &screen()).get("message_id").is_none());
    }

    #[test]
    fn test_api_error_response() {
        let raw = r#"{"ok":false,"error_code":400,"description":"Bad Request: message is not modified"}"#;
        let response: ApiResponse<serde_json::Value> = serde_json::from_str(raw).unwrap();
        let err = response.into_result("editMessageText").unwrap_err();
        assert!(err.is_not_modified());
        assert_eq!(err.to_string(), "telegram API error 400: Bad Request: message is not modified");
    }

    #[test]
    fn test_ok_without_result() {
        let response: ApiResponse<bool> = serde_json::from_str(r#"{"ok":true}"#).unwrap();
        assert!(matches!(response.into_result("answerCallbackQuery"), Err(TelegramError::EmptyResult(_))));
    }

    #[test]
    fn test_parse_updates() {
        let raw = r#"{"ok":true,"result":[
            {"update_id":10,"message":{"message_id":1,"date":0,"chat":{"id":42,"type":"private"},
             "from":{"id":42,"is_bot":false,"first_name":"Ops"},"text":"/start"}},
            {"update_id":11,"callback_query":{"id":"cb1","chat_instance":"x",
             "from":{"id":42,"is_bot":false,"first_name":"Ops"},
             "message":{"message_id":5,"date":0,"chat":{"id":42,"type":"private"}},"data":"list"}}
        ]}"#;
        let response: ApiResponse<Vec<Update>> = serde_json::from_str(raw).unwrap();
        let updates = response.into_result("getUpdates").unwrap();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].message.as_ref().unwrap().text.as_deref(), Some("/start"));
        assert_eq!(updates[1].callback_query.as_ref().unwrap().data.as_deref(), Some("list"));
    }

    #[test]
    fn test_base_url_trims_slash() {
        let client = TelegramClient::new("https://api.telegram.org/", "123:abc", 30).unwrap();
        assert_eq!(client.base_url, "https://api.telegram.org/bot123:abc");
    }
}
