//! Minimal Telegram Bot API client
//!
//! Only the three methods the bot needs: `getMe` at startup, `getUpdates`
//! long polling and `sendMessage` with HTML formatting. Every method URL
//! embeds the bot token, so URLs are never logged and are stripped from
//! transport errors.

use std::fmt;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::metrics;

/// Seconds the Bot API holds a `getUpdates` call open when idle.
pub const LONG_POLL_SECS: u64 = 30;

/// Headroom on top of the long poll before the HTTP request gives up.
const POLL_GRACE: Duration = Duration::from_secs(10);

const SEND_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub from: Option<User>,
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
}

impl Chat {
    pub fn is_private(&self) -> bool {
        self.kind == "private"
    }
}

/// Envelope every Bot API response is wrapped in.
#[derive(Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Serialize)]
struct GetUpdates {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u64,
    allowed_updates: &'static [&'static str],
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    /// `{api_url}/bot{token}`
    endpoint: String,
}

impl fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramClient").finish_non_exhaustive()
    }
}

impl TelegramClient {
    pub fn new(http: reqwest::Client, api_url: &str, token: &str) -> Self {
        Self {
            http,
            endpoint: format!("{}/bot{}", api_url.trim_end_matches('/'), token),
        }
    }

    /// Identity of the bot, used to verify the token at startup.
    pub async fn get_me(&self) -> Result<User> {
        self.call("getMe", &serde_json::json!({}), SEND_TIMEOUT).await
    }

    /// Long-poll for updates after `offset`.
    pub async fn get_updates(&self, offset: Option<i64>) -> Result<Vec<Update>> {
        let body = GetUpdates {
            offset,
            timeout: LONG_POLL_SECS,
            allowed_updates: &["message"],
        };
        self.call(
            "getUpdates",
            &body,
            Duration::from_secs(LONG_POLL_SECS) + POLL_GRACE,
        )
        .await
    }

    /// Send an HTML-formatted message.
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let body = SendMessage {
            chat_id,
            text,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };
        self.call::<serde_json::Value>("sendMessage", &body, SEND_TIMEOUT)
            .await
            .map(|_| ())
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &'static str,
        body: &impl Serialize,
        timeout: Duration,
    ) -> Result<T> {
        let started = Instant::now();
        let result = self.send(method, body, timeout).await;
        metrics::record_telegram_request(method, result.is_ok(), started.elapsed().as_secs_f64());
        result
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: &'static str,
        body: &impl Serialize,
        timeout: Duration,
    ) -> Result<T> {
        let response = self
            .http
            .post(format!("{}/{}", self.endpoint, method))
            .timeout(timeout)
            .json(body)
            .send()
            .await?;

        // The Bot API answers errors with the same JSON envelope and a 4xx/5xx
        let status = response.status();
        let envelope: ApiResponse<T> = response.json().await?;
        match envelope {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiResponse { description, .. } => Err(Error::Api {
                method,
                description: description.unwrap_or_else(|| format!("HTTP {status}")),
            }),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn get_me_returns_bot_identity() {
        let (client, _mock) = mock::start().await;
        let me = client.get_me().await.unwrap();
        assert_eq!(me.id, 42);
        assert_eq!(me.username.as_deref(), Some("session_gen_bot"));
    }

    #[tokio::test]
    async fn get_updates_sends_offset_and_parses_messages() {
        let (client, mock) = mock::start().await;
        mock.push_update(mock::text_update(7, 1001, "/generate"));

        let updates = client.get_updates(Some(7)).await.unwrap();
        assert_eq!(updates.len(), 1);
        let message = updates[0].message.as_ref().unwrap();
        assert_eq!(message.from.as_ref().unwrap().id, 1001);
        assert!(message.chat.is_private());
        assert_eq!(message.text.as_deref(), Some("/generate"));

        let polls = mock.poll_requests.lock().unwrap().clone();
        assert_eq!(polls[0]["offset"], 7);
        assert_eq!(polls[0]["timeout"], LONG_POLL_SECS);
    }

    #[tokio::test]
    async fn first_poll_omits_offset() {
        let (client, mock) = mock::start().await;
        client.get_updates(None).await.unwrap();

        let polls = mock.poll_requests.lock().unwrap().clone();
        assert!(polls[0].get("offset").is_none());
    }

    #[tokio::test]
    async fn send_message_uses_html_parse_mode() {
        let (client, mock) = mock::start().await;
        client.send_message(1001, "<b>hello</b>").await.unwrap();

        assert_eq!(
            mock.sent(),
            vec![json!({
                "chat_id": 1001,
                "text": "<b>hello</b>",
                "parse_mode": "HTML",
                "disable_web_page_preview": true,
            })]
        );
    }

    #[tokio::test]
    async fn api_errors_carry_description() {
        let (client, mock) = mock::start().await;
        *mock.send_error.lock().unwrap() = Some("Bad Request: chat not found".into());

        let err = client.send_message(1, "hi").await.unwrap_err();
        match err {
            Error::Api {
                method,
                description,
            } => {
                assert_eq!(method, "sendMessage");
                assert_eq!(description, "Bad Request: chat not found");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn updates_without_text_still_parse() {
        let raw = json!({
            "update_id": 9,
            "message": {
                "message_id": 3,
                "from": {"id": 5, "is_bot": false, "first_name": "x"},
                "chat": {"id": -100, "type": "supergroup"},
                "date": 0,
                "sticker": {"file_id": "abc"}
            }
        });
        let update: Update = serde_json::from_value(raw).unwrap();
        let message = update.message.unwrap();
        assert!(message.text.is_none());
        assert!(!message.chat.is_private());
    }

    #[test]
    fn debug_output_hides_endpoint() {
        let client =
            TelegramClient::new(reqwest::Client::new(), "https://api.telegram.org", "SECRET");
        assert!(!format!("{client:?}").contains("SECRET"));
    }
}
