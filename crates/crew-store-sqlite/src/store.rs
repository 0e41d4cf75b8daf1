//! [`SqliteStore`], the SQLite implementation of [`RecordStore`].

use std::{
  path::Path,
  sync::{
    Arc,
    atomic::{AtomicI64, Ordering},
  },
  time::Duration,
};

use chrono::Utc;
use rusqlite::{OptionalExtension as _, TransactionBehavior};
use tokio::{
  sync::broadcast,
  task::JoinHandle,
  time::MissedTickBehavior,
};
use tracing::warn;
use uuid::Uuid;

use crew_core::{
  message::{Message, NewMessage},
  profile::UserProfile,
  store::{MessageWatch, RecordStore},
  team::Team,
};

use crate::{
  encode::{
    RawMessage, RawProfile, RawTeam, decode_micros, encode_dt, encode_members,
    encode_uuid,
  },
  schema::SCHEMA,
  Result,
};

/// Buffered notifications per watcher before it is reported as lagged.
const CHANGE_FEED_CAPACITY: usize = 256;

/// How often the store checks for appends committed by other connections.
const EXTERNAL_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// How long a write waits for another connection's lock before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SELECT_MESSAGE: &str =
  "SELECT message_id, team_id, sender_id, content, sent_at FROM messages";

fn message_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawMessage> {
  Ok(RawMessage {
    message_id: row.get(0)?,
    team_id:    row.get(1)?,
    sender_id:  row.get(2)?,
    content:    row.get(3)?,
    sent_at:    row.get(4)?,
  })
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Crew record store backed by a single SQLite file.
///
/// Cloning is cheap: the inner connection and the change feed are
/// reference-counted, and clones share both.
///
/// The change feed carries appends made through this store and, while anyone
/// is watching, appends committed to the same file by other connections. The
/// latter are picked up by a background follower every
/// [`EXTERNAL_POLL_INTERVAL`], which stops when the last clone is dropped.
#[derive(Clone)]
pub struct SqliteStore {
  conn:      tokio_rusqlite::Connection,
  changes:   broadcast::Sender<Message>,
  /// Highest `sent_at` already announced on the feed.
  watermark: Arc<AtomicI64>,
  _follower: Arc<AbortOnDrop>,
}

struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
  fn drop(&mut self) { self.0.abort(); }
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::with_connection(conn).await
  }

  /// Open an in-memory store for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::with_connection(conn).await
  }

  async fn with_connection(conn: tokio_rusqlite::Connection) -> Result<Self> {
    let (last_sent_at, data_version) = Self::init_schema(&conn).await?;
    let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
    let watermark = Arc::new(AtomicI64::new(last_sent_at));

    let follower = tokio::spawn(follow_external_appends(
      conn.clone(),
      changes.clone(),
      watermark.clone(),
      data_version,
    ));

    Ok(Self {
      conn,
      changes,
      watermark,
      _follower: Arc::new(AbortOnDrop(follower)),
    })
  }

  /// Runs the schema and returns the latest message stamp together with the
  /// connection's current `data_version`, read in the same call.
  async fn init_schema(conn: &tokio_rusqlite::Connection) -> Result<(i64, i64)> {
    let state = conn
      .call(|conn| {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;
        let last: Option<i64> =
          conn.query_row("SELECT MAX(sent_at) FROM messages", [], |r| r.get(0))?;
        let version: i64 =
          conn.query_row("PRAGMA data_version", [], |r| r.get(0))?;
        Ok((last.unwrap_or(i64::MIN), version))
      })
      .await?;
    Ok(state)
  }
}

// ─── External appends ────────────────────────────────────────────────────────

/// Announces messages committed to the file by other connections.
///
/// `PRAGMA data_version` only moves when another connection commits, so the
/// message query runs only then. Stamps are strictly increasing across
/// connections, so everything new lies above the watermark. A message may be
/// announced twice; watchers only treat it as a hint to re-read.
async fn follow_external_appends(
  conn: tokio_rusqlite::Connection,
  changes: broadcast::Sender<Message>,
  watermark: Arc<AtomicI64>,
  mut seen_version: i64,
) {
  let mut ticker = tokio::time::interval(EXTERNAL_POLL_INTERVAL);
  ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

  loop {
    ticker.tick().await;
    if changes.receiver_count() == 0 {
      continue;
    }

    let since = watermark.load(Ordering::SeqCst);
    let last_version = seen_version;
    let polled = conn
      .call(move |conn| {
        let version: i64 =
          conn.query_row("PRAGMA data_version", [], |r| r.get(0))?;
        if version == last_version {
          return Ok((version, Vec::new()));
        }
        let mut stmt = conn.prepare(&format!(
          "{SELECT_MESSAGE} WHERE sent_at > ?1 ORDER BY sent_at, message_id"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![since], message_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok((version, rows))
      })
      .await;

    let (version, raws) = match polled {
      Ok(polled) => polled,
      Err(tokio_rusqlite::Error::ConnectionClosed) => return,
      Err(e) => {
        warn!(error = %e, "checking for external appends failed");
        continue;
      }
    };
    seen_version = version;

    for raw in raws {
      let sent_at = raw.sent_at;
      match raw.into_message() {
        Ok(message) => {
          let _ = changes.send(message);
        }
        Err(e) => warn!(error = %e, sent_at, "skipping undecodable message"),
      }
      watermark.fetch_max(sent_at, Ordering::SeqCst);
    }
  }
}

// ─── RecordStore impl ────────────────────────────────────────────────────────

impl RecordStore for SqliteStore {
  type Error = crate::Error;

  // ── Profiles ──────────────────────────────────────────────────────────────

  async fn get_profile(&self, id: &str) -> Result<Option<UserProfile>> {
    let id = id.to_owned();

    let raw: Option<RawProfile> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT id, name, email, phone FROM profiles WHERE id = ?1",
            rusqlite::params![id],
            |row| {
              Ok(RawProfile {
                id:    row.get(0)?,
                name:  row.get(1)?,
                email: row.get(2)?,
                phone: row.get(3)?,
              })
            },
          )
          .optional()?)
      })
      .await?;

    Ok(raw.map(RawProfile::into_profile))
  }

  async fn put_profile(&self, profile: UserProfile) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR REPLACE INTO profiles (id, name, email, phone)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![profile.id, profile.name, profile.email, profile.phone],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn list_profiles(&self) -> Result<Vec<UserProfile>> {
    let raws: Vec<RawProfile> = self
      .conn
      .call(|conn| {
        let mut stmt = conn
          .prepare("SELECT id, name, email, phone FROM profiles ORDER BY name, id")?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawProfile {
              id:    row.get(0)?,
              name:  row.get(1)?,
              email: row.get(2)?,
              phone: row.get(3)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(raws.into_iter().map(RawProfile::into_profile).collect())
  }

  // ── Teams ─────────────────────────────────────────────────────────────────

  async fn list_teams(&self) -> Result<Vec<Team>> {
    let raws: Vec<RawTeam> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT team_id, name, members, created_by, created_at
           FROM teams ORDER BY created_at, team_id",
        )?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawTeam {
              team_id:    row.get(0)?,
              name:       row.get(1)?,
              members:    row.get(2)?,
              created_by: row.get(3)?,
              created_at: row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawTeam::into_team).collect()
  }

  async fn put_team(&self, team: Team) -> Result<()> {
    let id_str      = encode_uuid(team.team_id);
    let members_str = encode_members(&team.members)?;
    let at_str      = encode_dt(team.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR REPLACE INTO teams (team_id, name, members, created_by, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, team.name, members_str, team.created_by, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Messages ──────────────────────────────────────────────────────────────

  async fn append_message(&self, input: NewMessage) -> Result<Message> {
    let message_id = Uuid::new_v4();
    let id_str     = encode_uuid(message_id);
    let team_str   = encode_uuid(input.team_id);
    let sender     = input.sender_id.clone();
    let content    = input.content.clone();

    // The latest stamp is read and the row inserted under the write lock, so
    // stamps are strictly increasing across every connection to the file.
    let sent_at_us: i64 = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let now_us = Utc::now().timestamp_micros();
        let last: Option<i64> =
          tx.query_row("SELECT MAX(sent_at) FROM messages", [], |r| r.get(0))?;
        let sent_at = last.map_or(now_us, |last| now_us.max(last + 1));

        tx.execute(
          "INSERT INTO messages (message_id, team_id, sender_id, content, sent_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, team_str, sender, content, sent_at],
        )?;
        tx.commit()?;
        Ok(sent_at)
      })
      .await?;
    self.watermark.fetch_max(sent_at_us, Ordering::SeqCst);

    let message = Message {
      message_id,
      team_id: input.team_id,
      sender_id: input.sender_id,
      content: input.content,
      sent_at: decode_micros(sent_at_us)?,
    };

    // No receivers is not an error: nobody is watching.
    let _ = self.changes.send(message.clone());
    Ok(message)
  }

  async fn list_messages(&self, team_id: Uuid) -> Result<Vec<Message>> {
    let team_str = encode_uuid(team_id);

    let raws: Vec<RawMessage> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "{SELECT_MESSAGE} WHERE team_id = ?1 ORDER BY sent_at, message_id"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![team_str], message_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawMessage::into_message).collect()
  }

  async fn watch_messages(&self, team_id: Uuid) -> Result<MessageWatch> {
    Ok(MessageWatch::new(team_id, self.changes.subscribe()))
  }
}
