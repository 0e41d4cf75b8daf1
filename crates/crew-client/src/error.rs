//! Error taxonomy surfaced to the presentation layer.

use thiserror::Error;

/// A boxed backend error, as carried by the store-facing variants.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
  #[error("no profile found for principal {0}")]
  ProfileNotFound(String),

  /// Rejected before anything was written.
  #[error("invalid input: {0}")]
  Validation(#[from] crew_core::Error),

  #[error("team creation failed: {0}")]
  TeamCreateFailed(#[source] BoxError),

  #[error("message send failed: {0}")]
  MessageSendFailed(#[source] BoxError),

  #[error("store unavailable: {0}")]
  StoreUnavailable(#[source] BoxError),

  #[error("not signed in")]
  NotSignedIn,

  #[error("no team selected")]
  NoActiveTeam,
}

impl Error {
  pub(crate) fn unavailable<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::StoreUnavailable(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
