//! Teams: named sets of users with one designated creator.
//!
//! A team is written once and never mutated by the client. Membership is a
//! plain list of profile ids; the creator is always part of it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Team ────────────────────────────────────────────────────────────────────

/// A persisted team.
///
/// Invariants: `members` is non-empty, has no duplicates and contains
/// `created_by`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
  pub team_id:    Uuid,
  pub name:       String,
  /// Profile ids in selection order, creator last unless selected earlier.
  pub members:    Vec<String>,
  pub created_by: String,
  pub created_at: DateTime<Utc>,
}

impl Team {
  /// Whether `user_id` belongs to this team, either as a member or as its
  /// creator.
  pub fn includes(&self, user_id: &str) -> bool {
    self.created_by == user_id || self.members.iter().any(|m| m == user_id)
  }
}

// ─── NewTeam ─────────────────────────────────────────────────────────────────

/// Input to team creation. Validated before anything is written.
#[derive(Debug, Clone)]
pub struct NewTeam {
  pub name:       String,
  pub created_by: String,
  pub selected:   Vec<String>,
}

impl NewTeam {
  pub fn new(
    name: impl Into<String>,
    created_by: impl Into<String>,
    selected: impl IntoIterator<Item = impl Into<String>>,
  ) -> Self {
    Self {
      name:       name.into(),
      created_by: created_by.into(),
      selected:   selected.into_iter().map(Into::into).collect(),
    }
  }

  /// Check the creation preconditions without building anything.
  pub fn validate(&self) -> Result<()> {
    if self.name.trim().is_empty() {
      return Err(Error::EmptyTeamName);
    }
    if self.created_by.is_empty() {
      return Err(Error::MissingCreator);
    }
    if !self.selected.iter().any(|id| !id.is_empty()) {
      return Err(Error::NoMembersSelected);
    }
    Ok(())
  }

  /// Validate and build the [`Team`] record with a fresh random id.
  ///
  /// `members` is the selection with duplicates and empty ids removed, plus
  /// the creator.
  pub fn into_team(self) -> Result<Team> {
    self.validate()?;

    let mut members: Vec<String> = Vec::with_capacity(self.selected.len() + 1);
    for id in self.selected.into_iter().chain([self.created_by.clone()]) {
      if !id.is_empty() && !members.contains(&id) {
        members.push(id);
      }
    }

    Ok(Team {
      team_id: Uuid::new_v4(),
      name: self.name.trim().to_owned(),
      members,
      created_by: self.created_by,
      created_at: Utc::now(),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn creator_is_added_to_members() {
    let team = NewTeam::new("Eng", "u1", ["u2", "u3"]).into_team().unwrap();
    assert_eq!(team.members, vec!["u2", "u3", "u1"]);
    assert_eq!(team.created_by, "u1");
    assert_eq!(team.name, "Eng");
  }

  #[test]
  fn duplicate_selection_collapses() {
    let team = NewTeam::new("Ops", "u1", ["u2", "u1", "u2"])
      .into_team()
      .unwrap();
    assert_eq!(team.members, vec!["u2", "u1"]);
  }

  #[test]
  fn ids_are_unique_across_rapid_creation() {
    let a = NewTeam::new("A", "u1", ["u2"]).into_team().unwrap();
    let b = NewTeam::new("A", "u1", ["u2"]).into_team().unwrap();
    assert_ne!(a.team_id, b.team_id);
  }

  #[test]
  fn validation_failures() {
    assert_eq!(
      NewTeam::new("  ", "u1", ["u2"]).validate(),
      Err(Error::EmptyTeamName)
    );
    assert_eq!(
      NewTeam::new("Eng", "u1", Vec::<String>::new()).validate(),
      Err(Error::NoMembersSelected)
    );
    assert_eq!(
      NewTeam::new("Eng", "", ["u2"]).validate(),
      Err(Error::MissingCreator)
    );
  }

  #[test]
  fn includes_members_and_creator() {
    let mut team = NewTeam::new("Eng", "u1", ["u2"]).into_team().unwrap();
    assert!(team.includes("u1"));
    assert!(team.includes("u2"));
    assert!(!team.includes("u3"));

    // A record written by another client may omit the creator.
    team.members.retain(|m| m != "u1");
    assert!(team.includes("u1"));
  }
}
