//! Encoding and decoding helpers between Rust domain types and the plain
//! representations stored in SQLite columns.
//!
//! Team timestamps are stored as RFC 3339 strings; message timestamps as
//! integer microseconds so the store can order and compare them directly.
//! Member lists are compact JSON. UUIDs are hyphenated lowercase strings.

use chrono::{DateTime, SecondsFormat, Utc};
use crew_core::{message::Message, profile::UserProfile, team::Team};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

/// Fixed-width so that string order matches time order in `ORDER BY`.
pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn decode_micros(us: i64) -> Result<DateTime<Utc>> {
  DateTime::from_timestamp_micros(us).ok_or(Error::TimestampRange(us))
}

// ─── Members ─────────────────────────────────────────────────────────────────

pub fn encode_members(members: &[String]) -> Result<String> {
  Ok(serde_json::to_string(members)?)
}

pub fn decode_members(s: &str) -> Result<Vec<String>> {
  Ok(serde_json::from_str(s)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `profiles` row.
pub struct RawProfile {
  pub id:    String,
  pub name:  String,
  pub email: String,
  pub phone: String,
}

impl RawProfile {
  pub fn into_profile(self) -> UserProfile {
    UserProfile {
      id:    self.id,
      name:  self.name,
      email: self.email,
      phone: self.phone,
    }
  }
}

/// Raw values read directly from a `teams` row.
pub struct RawTeam {
  pub team_id:    String,
  pub name:       String,
  pub members:    String,
  pub created_by: String,
  pub created_at: String,
}

impl RawTeam {
  pub fn into_team(self) -> Result<Team> {
    Ok(Team {
      team_id:    decode_uuid(&self.team_id)?,
      name:       self.name,
      members:    decode_members(&self.members)?,
      created_by: self.created_by,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from a `messages` row.
pub struct RawMessage {
  pub message_id: String,
  pub team_id:    String,
  pub sender_id:  String,
  pub content:    String,
  pub sent_at:    i64,
}

impl RawMessage {
  pub fn into_message(self) -> Result<Message> {
    Ok(Message {
      message_id: decode_uuid(&self.message_id)?,
      team_id:    decode_uuid(&self.team_id)?,
      sender_id:  self.sender_id,
      content:    self.content,
      sent_at:    decode_micros(self.sent_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn micros_keep_ordering() {
    let a = decode_micros(1_700_000_000_000_001).unwrap();
    let b = decode_micros(1_700_000_000_000_002).unwrap();
    assert!(a < b);
    assert_eq!(b.timestamp_micros(), 1_700_000_000_000_002);
  }

  #[test]
  fn members_roundtrip_preserves_order() {
    let members = vec!["u2".to_owned(), "u3".to_owned(), "u1".to_owned()];
    let encoded = encode_members(&members).unwrap();
    assert_eq!(encoded, r#"["u2","u3","u1"]"#);
    assert_eq!(decode_members(&encoded).unwrap(), members);
  }
}
