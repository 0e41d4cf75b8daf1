//! The authenticated-principal feed and the profile resolver.
//!
//! The identity provider itself is external. It pushes the current principal
//! (or `None` once signed out) through an [`IdentitySource`]; the session
//! consumes the paired [`IdentityFeed`]. Tests drive the source directly.

use std::sync::Arc;

use crew_core::{profile::UserProfile, store::RecordStore};
use tokio::sync::watch;

use crate::{Error, Result};

/// An authenticated identity handle issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
  pub id: String,
}

impl Principal {
  pub fn new(id: impl Into<String>) -> Self { Self { id: id.into() } }
}

// ─── Feed ────────────────────────────────────────────────────────────────────

/// The provider side: publishes auth-state changes.
pub struct IdentitySource {
  tx: watch::Sender<Option<Principal>>,
}

impl IdentitySource {
  pub fn sign_in(&self, id: impl Into<String>) {
    self.tx.send_replace(Some(Principal::new(id)));
  }

  pub fn sign_out(&self) { self.tx.send_replace(None); }

  pub fn current(&self) -> Option<Principal> { self.tx.borrow().clone() }
}

/// The consumer side: yields the current principal, then every change.
pub struct IdentityFeed {
  rx:              watch::Receiver<Option<Principal>>,
  initial_pending: bool,
}

impl IdentityFeed {
  /// Wait for the next auth state. The first call returns the state current
  /// at subscription time without waiting. Returns `None` once the source
  /// has been dropped.
  pub async fn next(&mut self) -> Option<Option<Principal>> {
    if self.initial_pending {
      self.initial_pending = false;
      return Some(self.rx.borrow_and_update().clone());
    }
    self.rx.changed().await.ok()?;
    Some(self.rx.borrow_and_update().clone())
  }
}

/// Create a connected source/feed pair starting at `initial`.
pub fn identity_channel(
  initial: Option<Principal>,
) -> (IdentitySource, IdentityFeed) {
  let (tx, rx) = watch::channel(initial);
  let feed = IdentityFeed { rx, initial_pending: true };
  (IdentitySource { tx }, feed)
}

// ─── Resolver ────────────────────────────────────────────────────────────────

/// Maps a principal to its profile record.
pub struct IdentityResolver<S> {
  store: Arc<S>,
}

impl<S: RecordStore> IdentityResolver<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  /// Look up the profile keyed by `principal.id`.
  ///
  /// A missing record is [`Error::ProfileNotFound`]; the caller decides
  /// whether that is fatal.
  pub async fn resolve(&self, principal: &Principal) -> Result<UserProfile> {
    self
      .store
      .get_profile(&principal.id)
      .await
      .map_err(Error::unavailable)?
      .ok_or_else(|| Error::ProfileNotFound(principal.id.clone()))
  }
}
