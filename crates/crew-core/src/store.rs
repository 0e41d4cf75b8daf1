//! The `RecordStore` trait and the live-query handle for messages.
//!
//! The trait is implemented by storage backends (e.g. `crew-store-sqlite`).
//! `crew-client` depends on this abstraction, not on any concrete backend.

use std::future::Future;

use tokio::sync::broadcast::{self, error::RecvError};
use uuid::Uuid;

use crate::{
  message::{Message, NewMessage},
  profile::UserProfile,
  team::Team,
};

// ─── Live query ──────────────────────────────────────────────────────────────

/// Change notifications for one team's messages.
///
/// Obtained from [`RecordStore::watch_messages`] *before* reading the current
/// messages, so no append can slip between the read and the watch.
pub struct MessageWatch {
  team_id: Uuid,
  rx:      broadcast::Receiver<Message>,
}

impl MessageWatch {
  pub fn new(team_id: Uuid, rx: broadcast::Receiver<Message>) -> Self {
    Self { team_id, rx }
  }

  pub fn team_id(&self) -> Uuid { self.team_id }

  /// Wait until the team's message set may have changed.
  ///
  /// Returns `false` once the store's change feed is gone. A lagged receiver
  /// reports a change: the caller re-reads the full set anyway.
  pub async fn changed(&mut self) -> bool {
    loop {
      match self.rx.recv().await {
        Ok(message) if message.team_id == self.team_id => return true,
        Ok(_) => continue,
        Err(RecvError::Lagged(_)) => return true,
        Err(RecvError::Closed) => return false,
      }
    }
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the structured record store backing the client.
///
/// Profiles, teams and messages are flat collections keyed by their ids.
/// Messages are append-only. Every method may suspend for as long as the
/// backend takes; nothing here imposes a timeout.
pub trait RecordStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Profiles ──────────────────────────────────────────────────────────

  /// Retrieve a profile by principal id. Returns `None` if not found.
  fn get_profile<'a>(
    &'a self,
    id: &'a str,
  ) -> impl Future<Output = Result<Option<UserProfile>, Self::Error>> + Send + 'a;

  /// Write a profile under its id, replacing any existing record.
  fn put_profile(
    &self,
    profile: UserProfile,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Every known profile, ordered by name.
  fn list_profiles(
    &self,
  ) -> impl Future<Output = Result<Vec<UserProfile>, Self::Error>> + Send + '_;

  // ── Teams ─────────────────────────────────────────────────────────────

  /// Every team in the store, oldest first.
  fn list_teams(
    &self,
  ) -> impl Future<Output = Result<Vec<Team>, Self::Error>> + Send + '_;

  /// Write a team under its id.
  fn put_team(
    &self,
    team: Team,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Messages ──────────────────────────────────────────────────────────

  /// Append a message. The store assigns the id and a `sent_at` strictly
  /// later than any message it has stored before.
  fn append_message(
    &self,
    input: NewMessage,
  ) -> impl Future<Output = Result<Message, Self::Error>> + Send + '_;

  /// All messages for `team_id`, ascending by `sent_at`.
  fn list_messages(
    &self,
    team_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Message>, Self::Error>> + Send + '_;

  /// Start watching for messages appended to `team_id`.
  fn watch_messages(
    &self,
    team_id: Uuid,
  ) -> impl Future<Output = Result<MessageWatch, Self::Error>> + Send + '_;
}

#[cfg(test)]
mod tests {
  use chrono::Utc;

  use super::*;

  fn message_for(team_id: Uuid) -> Message {
    Message {
      message_id: Uuid::new_v4(),
      team_id,
      sender_id: "u1".into(),
      content: "hello".into(),
      sent_at: Utc::now(),
    }
  }

  #[tokio::test]
  async fn watch_ignores_other_teams() {
    let (tx, rx) = broadcast::channel(8);
    let team = Uuid::new_v4();
    let mut watch = MessageWatch::new(team, rx);

    tx.send(message_for(Uuid::new_v4())).unwrap();
    tx.send(message_for(team)).unwrap();
    assert!(watch.changed().await);

    drop(tx);
    assert!(!watch.changed().await);
  }

  #[tokio::test]
  async fn lagged_watch_reports_change() {
    let (tx, rx) = broadcast::channel(1);
    let team = Uuid::new_v4();
    let mut watch = MessageWatch::new(team, rx);

    tx.send(message_for(Uuid::new_v4())).unwrap();
    tx.send(message_for(Uuid::new_v4())).unwrap();
    assert!(watch.changed().await);
  }
}
