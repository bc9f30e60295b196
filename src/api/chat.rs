use super::models::UploadedFile;
use super::{ApiClient, ApiError};
use crate::chat::model::{Conversation, Message};
use crate::chat::{ChatError, HistoryLoader};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Method;
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StartConversation<'a> {
    mentor_id: &'a str,
}

impl ApiClient {
    pub async fn list_conversations(&self) -> Result<Vec<Conversation>, ApiError> {
        self.get("/chats").await
    }

    /// Opens (or returns the existing) conversation with a mentor.
    pub async fn start_conversation(&self, mentor_id: &str) -> Result<Conversation, ApiError> {
        self.post("/chats", &StartConversation { mentor_id }).await
    }

    pub async fn chat_history(&self, conversation_id: &str) -> Result<Vec<Message>, ApiError> {
        self.get(&format!("/chats/{}/messages", conversation_id))
            .await
    }

    pub async fn upload_attachment(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        mime_type: &str,
    ) -> Result<UploadedFile, ApiError> {
        let part = Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(mime_type)?;
        let form = Form::new().part("file", part);
        self.send(self.request(Method::POST, "/chats/upload").multipart(form))
            .await
    }
}

#[async_trait]
impl HistoryLoader for ApiClient {
    async fn load_history(&self, conversation_id: &str) -> Result<Vec<Message>, ChatError> {
        Ok(self.chat_history(conversation_id).await?)
    }
}
