//! Immutable text posts scoped to a team.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// A persisted message. Once appended, no field ever changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
  pub message_id: Uuid,
  pub team_id:    Uuid,
  pub sender_id:  String,
  pub content:    String,
  /// Store-assigned; strictly increasing within one store.
  pub sent_at:    DateTime<Utc>,
}

impl Message {
  /// Whether `user_id` sent this message. Used to tell sent from received.
  pub fn is_from(&self, user_id: &str) -> bool { self.sender_id == user_id }

  /// Channel order: ascending `sent_at`, ties broken by id.
  pub fn chronological(a: &Self, b: &Self) -> Ordering {
    a.sent_at
      .cmp(&b.sent_at)
      .then_with(|| a.message_id.cmp(&b.message_id))
  }
}

/// Sort `messages` into channel order.
pub fn order_chronologically(messages: &mut [Message]) {
  messages.sort_by(Message::chronological);
}

/// Input to [`crate::store::RecordStore::append_message`].
/// The id and `sent_at` are always assigned by the store.
#[derive(Debug, Clone)]
pub struct NewMessage {
  pub team_id:   Uuid,
  pub sender_id: String,
  pub content:   String,
}

impl NewMessage {
  /// Build a message input, rejecting content that is blank after trimming.
  /// The content itself is kept exactly as typed.
  pub fn new(
    team_id: Uuid,
    sender_id: impl Into<String>,
    content: impl Into<String>,
  ) -> Result<Self> {
    let content = content.into();
    if content.trim().is_empty() {
      return Err(Error::EmptyMessage);
    }
    Ok(Self {
      team_id,
      sender_id: sender_id.into(),
      content,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn msg(secs: i64, content: &str) -> Message {
    Message {
      message_id: Uuid::new_v4(),
      team_id:    Uuid::nil(),
      sender_id:  "u1".into(),
      content:    content.into(),
      sent_at:    DateTime::from_timestamp(secs, 0).unwrap(),
    }
  }

  #[test]
  fn blank_content_is_rejected() {
    assert_eq!(
      NewMessage::new(Uuid::nil(), "u1", "   \n\t").unwrap_err(),
      Error::EmptyMessage
    );
    assert!(NewMessage::new(Uuid::nil(), "u1", "").is_err());
  }

  #[test]
  fn content_is_not_trimmed() {
    let m = NewMessage::new(Uuid::nil(), "u1", "  hi ").unwrap();
    assert_eq!(m.content, "  hi ");
  }

  #[test]
  fn ordering_is_by_timestamp() {
    let mut list = vec![msg(30, "c"), msg(10, "a"), msg(20, "b")];
    order_chronologically(&mut list);
    let contents: Vec<_> = list.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, ["a", "b", "c"]);
  }
}
