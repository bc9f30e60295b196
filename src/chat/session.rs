use super::model::{Attachment, Message, MAX_ATTACHMENTS};
use super::protocol::{ClientEvent, ServerEvent};
use super::store::{InsertOutcome, MessageStore};
use super::typing::TypingTracker;
use super::{ChatError, ChatEvent};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::time::{Duration, Instant};
use tracing::debug;

/// A message as typed by the local user, before it gets an id.
#[derive(Debug, Clone, Default)]
pub struct Draft {
    pub text: String,
    pub attachments: Vec<Attachment>,
}

impl Draft {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attachments: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<(), ChatError> {
        if self.attachments.len() > MAX_ATTACHMENTS {
            return Err(ChatError::TooManyAttachments {
                count: self.attachments.len(),
                max: MAX_ATTACHMENTS,
            });
        }
        if self.text.trim().is_empty() && self.attachments.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        Ok(())
    }
}

/// What a state transition produced: notifications for the UI and frames
/// to write to the channel.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Reaction {
    pub events: Vec<ChatEvent>,
    pub outbound: Vec<ClientEvent>,
}

impl Reaction {
    fn event(mut self, event: ChatEvent) -> Self {
        self.events.push(event);
        self
    }
}

/// Chat state for one conversation, with no I/O of its own.
#[derive(Debug, Clone)]
pub struct ChatSession {
    user_id: String,
    conversation_id: String,
    store: MessageStore,
    typing: TypingTracker,
}

impl ChatSession {
    pub fn new(
        user_id: impl Into<String>,
        conversation_id: impl Into<String>,
        typing_timeout: Duration,
    ) -> Self {
        let user_id = user_id.into();
        Self {
            typing: TypingTracker::new(user_id.clone(), typing_timeout),
            user_id,
            conversation_id: conversation_id.into(),
            store: MessageStore::new(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    pub fn typing_users(&self) -> Vec<String> {
        self.typing.users()
    }

    pub fn handshake(&self) -> Vec<ClientEvent> {
        vec![
            ClientEvent::Authenticate {
                user_id: self.user_id.clone(),
            },
            ClientEvent::JoinChat {
                chat_id: self.conversation_id.clone(),
            },
        ]
    }

    /// Reconciles fetched history and acknowledges anything still unread.
    pub fn load_history(&mut self, history: Vec<Message>) -> Reaction {
        let (mine, foreign): (Vec<Message>, Vec<Message>) = history
            .into_iter()
            .partition(|m| m.conversation_id == self.conversation_id);
        if !foreign.is_empty() {
            debug!(count = foreign.len(), "dropping history from other conversations");
        }
        self.store.reconcile(mine);

        let mut reaction = Reaction::default().event(ChatEvent::HistoryLoaded {
            count: self.store.len(),
        });
        let unread = self.store.unread_for(&self.user_id);
        if !unread.is_empty() {
            self.store.mark_read(&self.user_id, &unread);
            reaction.outbound.push(self.mark_as_read(unread));
        }
        reaction
    }

    pub fn handle(&mut self, event: ServerEvent, now: Instant) -> Reaction {
        match event {
            ServerEvent::NewMessage { chat_id, message } => {
                if chat_id != self.conversation_id {
                    debug!(%chat_id, "ignoring message for inactive conversation");
                    return Reaction::default();
                }
                self.receive(message)
            }
            ServerEvent::UserTyping {
                chat_id,
                user_id,
                is_typing,
            } => {
                if chat_id != self.conversation_id {
                    return Reaction::default();
                }
                let changed = if is_typing {
                    self.typing.started(&user_id, now)
                } else {
                    self.typing.stopped(&user_id)
                };
                let mut reaction = Reaction::default();
                if changed {
                    reaction.events.push(self.typing_changed());
                }
                reaction
            }
            ServerEvent::MessagesRead {
                chat_id,
                user_id,
                message_ids,
            } => {
                if chat_id != self.conversation_id {
                    return Reaction::default();
                }
                let changed = self.store.mark_read(&user_id, &message_ids);
                if changed.is_empty() {
                    return Reaction::default();
                }
                Reaction::default().event(ChatEvent::ReadReceipt {
                    user_id,
                    message_ids: changed,
                })
            }
            ServerEvent::Error { message } => {
                Reaction::default().event(ChatEvent::Error { message })
            }
        }
    }

    fn receive(&mut self, mut message: Message) -> Reaction {
        message.conversation_id = self.conversation_id.clone();
        let id = message.id.clone();
        let sender = message.sender_id.clone();
        let outcome = self.store.insert(message);

        let mut reaction = Reaction::default();
        let mut acknowledged = Vec::new();
        if sender != self.user_id {
            acknowledged = self.store.mark_read(&self.user_id, std::slice::from_ref(&id));
            if self.typing.stopped(&sender) {
                reaction.events.push(self.typing_changed());
            }
        }

        if let Some(stored) = self.store.get(&id).cloned() {
            match outcome {
                InsertOutcome::Inserted => {
                    reaction.events.push(ChatEvent::MessageAdded { message: stored })
                }
                InsertOutcome::Updated => {
                    reaction.events.push(ChatEvent::MessageUpdated { message: stored })
                }
                InsertOutcome::Unchanged if !acknowledged.is_empty() => {
                    reaction.events.push(ChatEvent::MessageUpdated { message: stored })
                }
                InsertOutcome::Unchanged => {}
            }
        }
        if !acknowledged.is_empty() {
            reaction.outbound.push(self.mark_as_read(acknowledged));
        }
        reaction
    }

    /// Appends the draft optimistically and returns the frame that sends it.
    pub fn compose(
        &mut self,
        draft: Draft,
        now: DateTime<Utc>,
    ) -> Result<(Message, ClientEvent), ChatError> {
        draft.validate()?;
        let message = Message {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id: self.conversation_id.clone(),
            sender_id: self.user_id.clone(),
            text: draft.text,
            attachments: draft.attachments,
            read_by: BTreeSet::new(),
            created_at: now,
        };
        self.store.insert(message.clone());
        let frame = ClientEvent::SendMessage {
            chat_id: self.conversation_id.clone(),
            message: message.clone(),
        };
        Ok((message, frame))
    }

    pub fn typing_frame(&self, is_typing: bool) -> ClientEvent {
        ClientEvent::Typing {
            chat_id: self.conversation_id.clone(),
            user_id: self.user_id.clone(),
            is_typing,
        }
    }

    pub fn expire_typing(&mut self, now: Instant) -> Option<ChatEvent> {
        self.typing.expire(now).then(|| self.typing_changed())
    }

    /// Forgets who is typing; used when the channel drops.
    pub fn reset_typing(&mut self) -> Option<ChatEvent> {
        self.typing.clear().then(|| self.typing_changed())
    }

    fn typing_changed(&self) -> ChatEvent {
        ChatEvent::TypingChanged {
            users: self.typing.users(),
        }
    }

    fn mark_as_read(&self, message_ids: Vec<String>) -> ClientEvent {
        ClientEvent::MarkAsRead {
            chat_id: self.conversation_id.clone(),
            user_id: self.user_id.clone(),
            message_ids,
        }
    }
}
