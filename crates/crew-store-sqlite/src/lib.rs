//! SQLite backend for the Crew record store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Appended messages are announced on an
//! in-process broadcast feed, which backs the live message query. Appends
//! committed to the same file by other connections are announced there too.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
