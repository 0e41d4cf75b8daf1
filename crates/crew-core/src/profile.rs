//! User profiles: the application-level record keyed by principal id.

use serde::{Deserialize, Serialize};

/// A user's profile. The `id` equals the id of the authenticated principal
/// the profile belongs to.
///
/// Profiles are created at sign-up, outside the client core, and are treated
/// as immutable from here on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
  pub id:    String,
  pub name:  String,
  pub email: String,
  pub phone: String,
}
