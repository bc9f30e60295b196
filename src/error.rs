use crate::api::ApiError;
use crate::chat::ChatError;
use serde::Serialize;

/// Error type of every command; the UI shows its message as a toast.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Chat(#[from] ChatError),
    #[error("Please sign in first")]
    NotSignedIn,
    #[error("No chat is open")]
    NoActiveChat,
    #[error("Chat was closed before it finished opening")]
    ChatCancelled,
    #[error("{0}")]
    Invalid(String),
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
