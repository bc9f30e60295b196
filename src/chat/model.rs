use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Hard cap on attachments carried by a single message.
pub const MAX_ATTACHMENTS: usize = 5;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub participants: Vec<String>,
    pub mentor_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub last_message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    Video,
    Audio,
    Document,
}

impl AttachmentKind {
    pub fn from_mime(mime: &str) -> Self {
        let top = mime
            .split('/')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match top.as_str() {
            "image" => AttachmentKind::Image,
            "video" => AttachmentKind::Video,
            "audio" => AttachmentKind::Audio,
            _ => AttachmentKind::Document,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    #[serde(rename = "type")]
    pub kind: AttachmentKind,
    pub url: String,
    pub filename: String,
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(alias = "chatId")]
    pub conversation_id: String,
    pub sender_id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub read_by: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Adds `user` to the read-by set. Returns `true` if the set grew.
    pub fn mark_read_by(&mut self, user: &str) -> bool {
        self.read_by.insert(user.to_owned())
    }

    /// Seen means some participant other than the sender has read it.
    pub fn is_seen(&self) -> bool {
        self.read_by.iter().any(|u| u != &self.sender_id)
    }

    pub fn is_read_by(&self, user: &str) -> bool {
        self.read_by.contains(user)
    }

    /// Folds a second copy of the same message into this one.
    pub fn merge(&mut self, other: &Message) -> bool {
        let before = self.read_by.len();
        self.read_by.extend(other.read_by.iter().cloned());
        if self.attachments.is_empty() && !other.attachments.is_empty() {
            self.attachments = other.attachments.clone();
            return true;
        }
        self.read_by.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(sender: &str) -> Message {
        Message {
            id: "m1".into(),
            conversation_id: "c1".into(),
            sender_id: sender.into(),
            text: "hi".into(),
            attachments: vec![],
            read_by: BTreeSet::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_attachment_kind_from_mime() {
        assert_eq!(AttachmentKind::from_mime("image/png"), AttachmentKind::Image);
        assert_eq!(AttachmentKind::from_mime("VIDEO/mp4"), AttachmentKind::Video);
        assert_eq!(AttachmentKind::from_mime("audio/mpeg"), AttachmentKind::Audio);
        assert_eq!(
            AttachmentKind::from_mime("application/pdf"),
            AttachmentKind::Document
        );
        assert_eq!(AttachmentKind::from_mime(""), AttachmentKind::Document);
    }

    #[test]
    fn test_seen_ignores_sender() {
        let mut msg = message("student");
        msg.mark_read_by("student");
        assert!(!msg.is_seen());
        assert!(msg.mark_read_by("mentor"));
        assert!(!msg.mark_read_by("mentor"));
        assert!(msg.is_seen());
    }

    #[test]
    fn test_merge_is_union() {
        let mut a = message("student");
        a.mark_read_by("x");
        let mut b = a.clone();
        b.read_by.clear();
        b.mark_read_by("y");
        assert!(a.merge(&b));
        assert!(a.is_read_by("x") && a.is_read_by("y"));
        assert!(!a.merge(&b));
    }

    #[test]
    fn test_wire_shape() {
        let json = r#"{
            "_id": "m9",
            "chatId": "c1",
            "senderId": "mentor",
            "text": "",
            "attachments": [{"type": "image", "url": "https://cdn/x.png", "filename": "x.png", "mimeType": "image/png"}],
            "readBy": ["mentor"],
            "createdAt": "2024-03-01T10:00:00Z"
        }"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.id, "m9");
        assert_eq!(msg.conversation_id, "c1");
        assert_eq!(msg.attachments[0].kind, AttachmentKind::Image);
        assert!(msg.is_read_by("mentor"));
    }
}
