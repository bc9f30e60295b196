//! Realtime mentor chat: local message store, typing state, the channel
//! wire format, and the task that keeps one conversation connected.

pub mod connection;
pub mod model;
pub mod protocol;
pub mod session;
pub mod store;
pub mod typing;
pub mod upload;

pub use connection::{ChatConnection, ChatHandle};
pub use model::{Attachment, AttachmentKind, Conversation, Message, MAX_ATTACHMENTS};
pub use session::{ChatSession, Draft};
pub use store::{DateGroup, MessageStore};
pub use upload::{AttachmentUploader, LocalFile};

use crate::api::ApiError;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

pub const DEFAULT_SOCKET_URL: &str = "ws://localhost:5000/ws";

#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub socket_url: String,
    pub user_id: String,
    pub conversation_id: String,
    pub typing_timeout: Duration,
    pub reconnect_attempts: u32,
    /// Base delay; attempt `n` waits `n * reconnect_delay`.
    pub reconnect_delay: Duration,
    /// Upper bound on the WebSocket upgrade, first connect and reconnects alike.
    pub connect_timeout: Duration,
}

impl ChatConfig {
    pub fn new(
        socket_url: impl Into<String>,
        user_id: impl Into<String>,
        conversation_id: impl Into<String>,
    ) -> Self {
        Self {
            socket_url: socket_url.into(),
            user_id: user_id.into(),
            conversation_id: conversation_id.into(),
            typing_timeout: Duration::from_secs(5),
            reconnect_attempts: 5,
            reconnect_delay: Duration::from_millis(500),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Source of a conversation's stored messages. The REST client is the
/// production implementation.
#[async_trait]
pub trait HistoryLoader: Send + Sync {
    async fn load_history(&self, conversation_id: &str) -> Result<Vec<Message>, ChatError>;
}

/// Notifications for whatever renders the conversation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ChatEvent {
    #[serde(rename_all = "camelCase")]
    Connected { conversation_id: String },
    HistoryLoaded { count: usize },
    MessageAdded { message: Message },
    MessageUpdated { message: Message },
    #[serde(rename_all = "camelCase")]
    ReadReceipt {
        user_id: String,
        message_ids: Vec<String>,
    },
    TypingChanged { users: Vec<String> },
    Disconnected { reason: String },
    Reconnecting { attempt: u32 },
    Error { message: String },
    Closed,
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Message has no text and no attachments")]
    EmptyMessage,
    #[error("Too many attachments: {count} (at most {max})")]
    TooManyAttachments { count: usize, max: usize },
    #[error("Invalid socket URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("Connection error: {0}")]
    Connection(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("Protocol error: {0}")]
    Protocol(#[from] serde_json::Error),
    #[error("Connection closed: {0}")]
    Disconnected(String),
    #[error("Timed out connecting to {0}")]
    Timeout(String),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("File error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Chat session is closed")]
    Closed,
}

impl Serialize for ChatError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
