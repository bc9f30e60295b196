use crate::chat::store::group_by_date;
use crate::chat::upload::check_attachment_count;
use crate::chat::{
    AttachmentUploader, ChatConnection, ChatEvent, ChatHandle, Conversation, DateGroup, Draft,
    LocalFile, Message,
};
use crate::error::AppError;
use crate::AppState;
use chrono::FixedOffset;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

pub async fn list_conversations(state: &AppState) -> Result<Vec<Conversation>, AppError> {
    let (api, _) = state.authed_api()?;
    Ok(api.list_conversations().await?)
}

pub async fn start_conversation(state: &AppState, mentor_id: &str) -> Result<Conversation, AppError> {
    let (api, _) = state.authed_api()?;
    Ok(api.start_conversation(mentor_id).await?)
}

/// Opens the realtime channel for one conversation, closing whichever one
/// was open before. The receiver sees the conversation's events from the
/// start.
///
/// The connect runs without holding the chat lock, so `close_chat` and
/// `logout` never wait on a slow server. If either runs (or another
/// `open_chat` starts) before the connect finishes, the new channel is shut
/// again and `ChatCancelled` is returned.
pub async fn open_chat(
    state: &AppState,
    conversation_id: &str,
) -> Result<broadcast::Receiver<ChatEvent>, AppError> {
    let (api, session) = state.authed_api()?;
    let config = state
        .config()?
        .chat_config(&session.user_id, conversation_id);

    let generation = {
        let mut active = state.chat.lock().await;
        if let Some(previous) = active.handle.take() {
            info!(conversation = previous.conversation_id(), "closing previous chat");
            previous.close();
        }
        active.generation += 1;
        active.generation
    };

    let (handle, events) = ChatConnection::open(config, Arc::new(api)).await?;

    let mut active = state.chat.lock().await;
    if active.generation != generation {
        info!(conversation = conversation_id, "chat closed while opening");
        handle.close();
        return Err(AppError::ChatCancelled);
    }
    active.handle = Some(handle);
    Ok(events)
}

async fn active_chat(state: &AppState) -> Result<ChatHandle, AppError> {
    state
        .chat
        .lock()
        .await
        .handle
        .clone()
        .filter(|h| !h.is_closed())
        .ok_or(AppError::NoActiveChat)
}

/// Uploads `files` (at most five) and sends them with `text` to the open
/// conversation.
pub async fn send_chat_message(
    state: &AppState,
    text: String,
    files: Vec<LocalFile>,
) -> Result<Message, AppError> {
    check_attachment_count(files.len())?;
    let handle = active_chat(state).await?;
    let attachments = if files.is_empty() {
        Vec::new()
    } else {
        let (api, _) = state.authed_api()?;
        AttachmentUploader::new(api).upload_all(&files).await?
    };
    Ok(handle.send(Draft { text, attachments }).await?)
}

pub async fn set_typing(state: &AppState, is_typing: bool) -> Result<(), AppError> {
    Ok(active_chat(state).await?.typing(is_typing)?)
}

/// Messages of the open conversation grouped by day in the viewer's
/// timezone.
pub async fn chat_messages(
    state: &AppState,
    utc_offset_minutes: i32,
) -> Result<Vec<DateGroup>, AppError> {
    let offset = utc_offset_minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| AppError::Invalid(format!("Invalid UTC offset: {}", utc_offset_minutes)))?;
    let messages = active_chat(state).await?.messages().await?;
    Ok(group_by_date(&messages, offset))
}

pub async fn typing_users(state: &AppState) -> Result<Vec<String>, AppError> {
    Ok(active_chat(state).await?.typing_users().await?)
}

/// Disconnects the open conversation, if any, and cancels one still opening.
pub async fn close_chat(state: &AppState) {
    let mut active = state.chat.lock().await;
    active.generation += 1;
    if let Some(handle) = active.handle.take() {
        handle.close();
    }
}
