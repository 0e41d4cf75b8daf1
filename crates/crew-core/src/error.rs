//! Error types for `crew-core`.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
  #[error("team name must not be empty")]
  EmptyTeamName,

  #[error("at least one member must be selected")]
  NoMembersSelected,

  #[error("team creator id must not be empty")]
  MissingCreator,

  #[error("message content must not be empty")]
  EmptyMessage,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
