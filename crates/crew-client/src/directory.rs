//! The user directory: a bulk snapshot of every known profile.

use std::sync::Arc;

use crew_core::{profile::UserProfile, store::RecordStore};

use crate::{Error, Result};

/// A point-in-time copy of all profiles. Later changes in the store are not
/// reflected until the next [`DirectoryService::list_all`].
#[derive(Debug, Clone, Default)]
pub struct Directory {
  profiles: Vec<UserProfile>,
}

impl Directory {
  pub fn new(profiles: Vec<UserProfile>) -> Self { Self { profiles } }

  pub fn profiles(&self) -> &[UserProfile] { &self.profiles }

  pub fn get(&self, id: &str) -> Option<&UserProfile> {
    self.profiles.iter().find(|p| p.id == id)
  }

  /// The profile name for `id`, or `id` itself when no profile matches.
  pub fn display_name<'a>(&'a self, id: &'a str) -> &'a str {
    self.get(id).map_or(id, |p| p.name.as_str())
  }

  pub fn len(&self) -> usize { self.profiles.len() }

  pub fn is_empty(&self) -> bool { self.profiles.is_empty() }
}

pub struct DirectoryService<S> {
  store: Arc<S>,
}

impl<S: RecordStore> DirectoryService<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  /// Load every profile in one read.
  pub async fn list_all(&self) -> Result<Directory> {
    let profiles = self
      .store
      .list_profiles()
      .await
      .map_err(Error::unavailable)?;
    Ok(Directory::new(profiles))
  }
}
