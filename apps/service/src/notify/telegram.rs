//! Telegram Bot API client.
//!
//! Only the handful of methods the service needs: `sendMessage`,
//! `editMessageText` and `getUpdates`. All texts are sent in HTML parse mode.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::{MessageId, Transport, TransportError};
use crate::util::split_by_line_limit;

/// Longest text sent in one message
pub const MAX_MESSAGE_LENGTH: usize = 4000;

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

pub struct TelegramClient {
    http: reqwest::Client,
    api_base: Url,
    token: String,
    chat_id: i64,
}

#[derive(Debug, Serialize)]
struct SendMessageParams<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Serialize)]
struct EditMessageTextParams<'a> {
    chat_id: i64,
    message_id: MessageId,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Serialize)]
struct GetUpdatesParams {
    offset: i64,
    timeout: u64,
    allowed_updates: [&'static str; 1],
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: MessageId,
}

/// Incoming update, reduced to what the command handler reads
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<IncomingMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

impl TelegramClient {
    pub fn new(api_base: &str, token: &str, chat_id: i64) -> Result<Self, TransportError> {
        let mut api_base = Url::parse(api_base)?;
        if !api_base.path().ends_with('/') {
            let path = format!("{}/", api_base.path());
            api_base.set_path(&path);
        }

        let http = reqwest::Client::builder().timeout(SEND_TIMEOUT).build()?;

        Ok(Self { http, api_base, token: token.to_string(), chat_id })
    }

    fn method_url(&self, method: &str) -> Result<Url, TransportError> {
        Ok(self.api_base.join(&format!("./bot{}/{}", self.token, method))?)
    }

    async fn call<P, R>(&self, method: &str, params: &P, timeout: Duration) -> Result<R, TransportError>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .http
            .post(self.method_url(method)?)
            .timeout(timeout)
            .json(params)
            .send()
            .await?;

        let body: ApiResponse<R> = response.json().await?;
        if !body.ok {
            return Err(TransportError::Api {
                code: body.error_code.unwrap_or_default(),
                description: body.description.unwrap_or_else(|| "unknown error".to_string()),
            });
        }
        body.result
            .ok_or_else(|| TransportError::InvalidResponse(format!("{method} returned no result")))
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<MessageId, TransportError> {
        let params = SendMessageParams {
            chat_id,
            text,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };
        let sent: SentMessage = self.call("sendMessage", &params, SEND_TIMEOUT).await?;
        Ok(sent.message_id)
    }

    /// Long-poll for updates newer than `offset`
    pub async fn get_updates(&self, offset: i64, poll_timeout: Duration) -> Result<Vec<Update>, TransportError> {
        let params = GetUpdatesParams {
            offset,
            timeout: poll_timeout.as_secs(),
            allowed_updates: ["message"],
        };
        // The request itself must outlive the server-side poll
        self.call("getUpdates", &params, poll_timeout + SEND_TIMEOUT).await
    }
}

#[async_trait::async_trait]
impl Transport for TelegramClient {
    async fn send_plain(&self, text: &str) -> Result<(), TransportError> {
        self.send_to(self.chat_id, text).await
    }

    async fn send_with_id(&self, text: &str) -> Result<Option<MessageId>, TransportError> {
        let chunks = split_by_line_limit(text, MAX_MESSAGE_LENGTH);
        if chunks.len() != 1 {
            self.send_plain(text).await?;
            return Ok(None);
        }
        let id = self.send_message(self.chat_id, &chunks[0]).await?;
        Ok(Some(id))
    }

    async fn edit(&self, message_id: MessageId, text: &str) -> Result<(), TransportError> {
        let chunks = split_by_line_limit(text, MAX_MESSAGE_LENGTH);
        if chunks.len() != 1 {
            debug!(message_id, "edit text too long, sending as new messages");
            return self.send_plain(text).await;
        }
        let params = EditMessageTextParams {
            chat_id: self.chat_id,
            message_id,
            text: &chunks[0],
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };
        // editMessageText answers with the edited message
        let _: serde_json::Value = self.call("editMessageText", &params, SEND_TIMEOUT).await?;
        Ok(())
    }

    async fn send_to(&self, chat_id: i64, text: &str) -> Result<(), TransportError> {
        for chunk in split_by_line_limit(text, MAX_MESSAGE_LENGTH) {
            self.send_message(chat_id, &chunk).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TOKEN: &str = "123456789:AAHdqTcvCH1vGWJxfSeofSAs0K5PALDsaw";

    /// Text that needs two messages
    fn long_text() -> String {
        (0..120)
            .map(|i| format!("line {i:03} {}", "x".repeat(40)))
            .collect::<Vec<_>>()
            .join("\n")
    }

    async fn mock_bot_api() -> MockServer {
        let server = MockServer::start().await;
        for api_method in ["sendMessage", "editMessageText"] {
            Mock::given(method("POST"))
                .and(path(format!("/bot{TOKEN}/{api_method}")))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_json(json!({"ok": true, "result": {"message_id": 77}})),
                )
                .mount(&server)
                .await;
        }
        server
    }

    /// Bot API methods called so far, in order
    async fn called_methods(server: &MockServer) -> Vec<String> {
        server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .map(|request| request.url.path().rsplit('/').next().unwrap_or_default().to_string())
            .collect()
    }

    #[test]
    fn test_method_url_with_bot_token() {
        let client = TelegramClient::new("https://api.telegram.org", TOKEN, 1).unwrap();
        let url = client.method_url("sendMessage").unwrap();
        assert_eq!(url.host_str(), Some("api.telegram.org"));
        assert_eq!(url.as_str(), format!("https://api.telegram.org/bot{TOKEN}/sendMessage"));
    }

    #[tokio::test]
    async fn test_send_with_id_returns_message_id() {
        let server = mock_bot_api().await;
        let client = TelegramClient::new(&server.uri(), TOKEN, 42).unwrap();

        assert_eq!(client.send_with_id("<b>DOWN</b>").await.unwrap(), Some(77));

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        let body: serde_json::Value = requests[0].body_json().unwrap();
        assert_eq!(body["chat_id"], 42);
        assert_eq!(body["parse_mode"], "HTML");
    }

    #[tokio::test]
    async fn test_send_with_id_untracked_when_split() {
        let server = mock_bot_api().await;
        let client = TelegramClient::new(&server.uri(), TOKEN, 42).unwrap();

        assert_eq!(client.send_with_id(&long_text()).await.unwrap(), None);
        assert_eq!(called_methods(&server).await, vec!["sendMessage", "sendMessage"]);
    }

    #[tokio::test]
    async fn test_edit_short_text_edits_in_place() {
        let server = mock_bot_api().await;
        let client = TelegramClient::new(&server.uri(), TOKEN, 42).unwrap();

        client.edit(5, "<b>DOWN -> RECOVERED</b>").await.unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(called_methods(&server).await, vec!["editMessageText"]);
        let body: serde_json::Value = requests[0].body_json().unwrap();
        assert_eq!(body["message_id"], 5);
    }

    #[tokio::test]
    async fn test_edit_falls_back_to_send_when_split() {
        let server = mock_bot_api().await;
        let client = TelegramClient::new(&server.uri(), TOKEN, 42).unwrap();

        client.edit(5, &long_text()).await.unwrap();
        assert_eq!(called_methods(&server).await, vec!["sendMessage", "sendMessage"]);
    }

    #[tokio::test]
    async fn test_api_rejection_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(
                json!({"ok": false, "error_code": 400, "description": "Bad Request: chat not found"}),
            ))
            .mount(&server)
            .await;
        let client = TelegramClient::new(&server.uri(), TOKEN, 42).unwrap();

        let err = client.send_plain("hello").await.unwrap_err();
        assert!(matches!(err, TransportError::Api { code: 400, .. }));
    }

    #[test]
    fn test_method_url_keeps_base_path() {
        let client = TelegramClient::new("https://proxy.example.com/tg", "123:abc", 42).unwrap();
        assert_eq!(
            client.method_url("sendMessage").unwrap().as_str(),
            "https://proxy.example.com/tg/bot123:abc/sendMessage"
        );

        let client = TelegramClient::new("https://api.telegram.org", "t", 1).unwrap();
        assert_eq!(
            client.method_url("getUpdates").unwrap().as_str(),
            "https://api.telegram.org/bott/getUpdates"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            TelegramClient::new("not a url", "t", 1),
            Err(TransportError::Url(_))
        ));
    }

    #[test]
    fn test_decode_api_error() {
        let body: ApiResponse<SentMessage> = serde_json::from_str(
            r#"{"ok":false,"error_code":400,"description":"Bad Request: message is not modified"}"#,
        )
        .unwrap();
        assert!(!body.ok);
        assert_eq!(body.error_code, Some(400));
        assert!(body.result.is_none());
    }

    #[test]
    fn test_decode_updates() {
        let body: ApiResponse<Vec<Update>> = serde_json::from_str(
            r#"{"ok":true,"result":[{"update_id":7,"message":{"message_id":1,"chat":{"id":-100,"type":"group"},"text":"/status"}},{"update_id":8}]}"#,
        )
        .unwrap();
        let updates = body.result.unwrap();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].message.as_ref().unwrap().chat.id, -100);
        assert_eq!(updates[0].message.as_ref().unwrap().text.as_deref(), Some("/status"));
        assert!(updates[1].message.is_none());
    }
}
