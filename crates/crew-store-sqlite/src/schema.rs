//! SQL schema for the Crew SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS profiles (
    id     TEXT PRIMARY KEY,   -- principal id from the identity provider
    name   TEXT NOT NULL,
    email  TEXT NOT NULL,
    phone  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS teams (
    team_id     TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    members     TEXT NOT NULL,   -- JSON array of profile ids
    created_by  TEXT NOT NULL,
    created_at  TEXT NOT NULL    -- ISO 8601 UTC
);

-- Messages are strictly append-only.
-- No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS messages (
    message_id  TEXT PRIMARY KEY,
    team_id     TEXT NOT NULL,
    sender_id   TEXT NOT NULL,
    content     TEXT NOT NULL,
    sent_at     INTEGER NOT NULL  -- microseconds since the Unix epoch; store-assigned
);

CREATE INDEX IF NOT EXISTS messages_team_idx ON messages(team_id, sent_at);
CREATE INDEX IF NOT EXISTS messages_sent_idx ON messages(sent_at);
CREATE INDEX IF NOT EXISTS teams_created_idx ON teams(created_at);

PRAGMA user_version = 1;
";
