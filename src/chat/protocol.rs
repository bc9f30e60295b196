//! Realtime channel frames. Every frame is a JSON text message of the form
//! `{"event": "<name>", "data": {...}}`.

use super::model::Message;
use serde::{Deserialize, Serialize};

/// Events the client writes to the channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    #[serde(rename_all = "camelCase")]
    Authenticate { user_id: String },
    #[serde(rename_all = "camelCase")]
    JoinChat { chat_id: String },
    #[serde(rename_all = "camelCase")]
    SendMessage { chat_id: String, message: Message },
    #[serde(rename_all = "camelCase")]
    Typing {
        chat_id: String,
        user_id: String,
        is_typing: bool,
    },
    #[serde(rename_all = "camelCase")]
    MarkAsRead {
        chat_id: String,
        user_id: String,
        message_ids: Vec<String>,
    },
}

/// Events pushed by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    #[serde(rename_all = "camelCase")]
    NewMessage { chat_id: String, message: Message },
    #[serde(rename_all = "camelCase")]
    UserTyping {
        chat_id: String,
        user_id: String,
        is_typing: bool,
    },
    #[serde(rename_all = "camelCase")]
    MessagesRead {
        chat_id: String,
        user_id: String,
        #[serde(default)]
        message_ids: Vec<String>,
    },
    Error { message: String },
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::Authenticate { .. } => "authenticate",
            ClientEvent::JoinChat { .. } => "joinChat",
            ClientEvent::SendMessage { .. } => "sendMessage",
            ClientEvent::Typing { .. } => "typing",
            ClientEvent::MarkAsRead { .. } => "markAsRead",
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Deserialize)]
struct Envelope {
    event: String,
}

/// Decodes an inbound frame. `Ok(None)` means a well-formed frame carrying
/// an event this client does not handle.
pub fn decode_server_event(text: &str) -> Result<Option<ServerEvent>, serde_json::Error> {
    match serde_json::from_str::<ServerEvent>(text) {
        Ok(event) => Ok(Some(event)),
        Err(err) => {
            let envelope: Envelope = serde_json::from_str(text)?;
            match envelope.event.as_str() {
                "newMessage" | "userTyping" | "messagesRead" | "error" => Err(err),
                _ => Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_event_shape() {
        let event = ClientEvent::MarkAsRead {
            chat_id: "c1".into(),
            user_id: "u1".into(),
            message_ids: vec!["m1".into()],
        };
        let value: serde_json::Value = serde_json::from_str(&event.encode().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"event": "markAsRead", "data": {"chatId": "c1", "userId": "u1", "messageIds": ["m1"]}})
        );
        assert_eq!(event.name(), "markAsRead");
    }

    #[test]
    fn test_decode_typing() {
        let frame = r#"{"event":"userTyping","data":{"chatId":"c1","userId":"mentor","isTyping":true}}"#;
        assert_eq!(
            decode_server_event(frame).unwrap(),
            Some(ServerEvent::UserTyping {
                chat_id: "c1".into(),
                user_id: "mentor".into(),
                is_typing: true,
            })
        );
    }

    #[test]
    fn test_decode_unknown_event_is_skipped() {
        let frame = r#"{"event":"presence","data":{"online":3}}"#;
        assert_eq!(decode_server_event(frame).unwrap(), None);
    }

    #[test]
    fn test_decode_malformed_known_event_fails() {
        let frame = r#"{"event":"newMessage","data":{"chatId":"c1"}}"#;
        assert!(decode_server_event(frame).is_err());
        assert!(decode_server_event("not json").is_err());
    }
}
