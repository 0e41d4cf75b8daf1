//! Core types and trait definitions for the Crew team-messaging client.
//!
//! This crate is deliberately free of database and UI dependencies. The
//! backing store lives behind [`store::RecordStore`]; the services that
//! coordinate profiles, teams and channels live in `crew-client`.

pub mod error;
pub mod message;
pub mod profile;
pub mod store;
pub mod team;

pub use error::{Error, Result};
