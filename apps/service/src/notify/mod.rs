/// Outbound chat transport
///
/// The alert consolidator and the command handler only talk to the
/// `Transport` trait; `telegram` is the concrete Bot API client.
pub mod telegram;

pub use telegram::TelegramClient;

use thiserror::Error;

/// Identifier of a delivered message, used for later edits
pub type MessageId = i64;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API rejected request ({code}): {description}")]
    Api { code: i64, description: String },
    #[error("unexpected API response: {0}")]
    InvalidResponse(String),
    #[error("invalid API URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Capability interface of a chat channel
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Send to the default chat
    async fn send_plain(&self, text: &str) -> Result<(), TransportError>;

    /// Send to the default chat and return the message id.
    ///
    /// `None` means the text had to be split into several messages, so
    /// there is no single message to edit later.
    async fn send_with_id(&self, text: &str) -> Result<Option<MessageId>, TransportError>;

    /// Replace the text of a message in the default chat
    async fn edit(&self, message_id: MessageId, text: &str) -> Result<(), TransportError>;

    /// Send to an arbitrary chat
    async fn send_to(&self, chat_id: i64, text: &str) -> Result<(), TransportError>;
}
