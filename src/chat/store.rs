use super::model::Message;
use chrono::{FixedOffset, NaiveDate};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    Updated,
    Unchanged,
}

/// Messages of one calendar day, in display order.
#[derive(Debug, Clone, Serialize)]
pub struct DateGroup {
    pub date: NaiveDate,
    pub messages: Vec<Message>,
}

/// Ordered message list for the active conversation.
///
/// Order is non-decreasing by `created_at`; messages with equal timestamps
/// keep their arrival order. Read-by sets are only ever unioned.
#[derive(Debug, Default, Clone)]
pub struct MessageStore {
    messages: Vec<Message>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn get(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.messages.iter().position(|m| m.id == id)
    }

    pub fn insert(&mut self, message: Message) -> InsertOutcome {
        if let Some(idx) = self.position(&message.id) {
            return if self.messages[idx].merge(&message) {
                InsertOutcome::Updated
            } else {
                InsertOutcome::Unchanged
            };
        }
        let at = self
            .messages
            .partition_point(|m| m.created_at <= message.created_at);
        self.messages.insert(at, message);
        InsertOutcome::Inserted
    }

    /// Merges a server-fetched history into the local list. Local messages
    /// missing from `history` (optimistic sends) are kept.
    pub fn reconcile(&mut self, history: Vec<Message>) {
        let mut by_id: HashMap<String, Message> = HashMap::with_capacity(history.len());
        let mut order = Vec::with_capacity(history.len() + self.messages.len());
        for msg in history {
            match by_id.get_mut(&msg.id) {
                Some(existing) => {
                    existing.merge(&msg);
                }
                None => {
                    order.push(msg.id.clone());
                    by_id.insert(msg.id.clone(), msg);
                }
            }
        }
        for local in self.messages.drain(..) {
            match by_id.get_mut(&local.id) {
                Some(existing) => {
                    existing.merge(&local);
                }
                None => {
                    order.push(local.id.clone());
                    by_id.insert(local.id.clone(), local);
                }
            }
        }
        let mut merged: Vec<Message> = order
            .into_iter()
            .filter_map(|id| by_id.remove(&id))
            .collect();
        // stable: ties keep server order, then local order
        merged.sort_by_key(|m| m.created_at);
        self.messages = merged;
    }

    /// Records that `user` has read `ids`. An empty `ids` slice covers every
    /// message not sent by `user`. Returns the ids whose read-by set grew.
    pub fn mark_read(&mut self, user: &str, ids: &[String]) -> Vec<String> {
        let mut changed = Vec::new();
        for msg in self.messages.iter_mut() {
            let targeted = if ids.is_empty() {
                msg.sender_id != user
            } else {
                ids.iter().any(|id| id == &msg.id)
            };
            if targeted && msg.mark_read_by(user) {
                changed.push(msg.id.clone());
            }
        }
        changed
    }

    /// Ids of messages from other senders that `user` has not read.
    pub fn unread_for(&self, user: &str) -> Vec<String> {
        self.messages
            .iter()
            .filter(|m| m.sender_id != user && !m.is_read_by(user))
            .map(|m| m.id.clone())
            .collect()
    }

    pub fn group_by_date(&self, offset: FixedOffset) -> Vec<DateGroup> {
        group_by_date(&self.messages, offset)
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

/// Splits an ordered message list into calendar days at the given UTC
/// offset. Every message lands in exactly one group.
pub fn group_by_date(messages: &[Message], offset: FixedOffset) -> Vec<DateGroup> {
    let mut groups: Vec<DateGroup> = Vec::new();
    for msg in messages {
        let date = msg.created_at.with_timezone(&offset).date_naive();
        match groups.last_mut() {
            Some(group) if group.date == date => group.messages.push(msg.clone()),
            _ => groups.push(DateGroup {
                date,
                messages: vec![msg.clone()],
            }),
        }
    }
    groups
}
