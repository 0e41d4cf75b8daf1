//! Team creation, membership listing and member-name resolution.

use std::sync::Arc;

use crew_core::{
  store::RecordStore,
  team::{NewTeam, Team},
};
use tracing::{info, warn};

use crate::{Error, Result, directory::Directory};

pub struct TeamRegistry<S> {
  store: Arc<S>,
}

impl<S: RecordStore> TeamRegistry<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  /// Teams where `user_id` is a member or the creator.
  ///
  /// Reads the whole collection and filters locally, so the cost grows with
  /// the total number of teams.
  pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<Team>> {
    let teams = self.store.list_teams().await.map_err(Error::unavailable)?;
    Ok(teams.into_iter().filter(|t| t.includes(user_id)).collect())
  }

  /// Validate, build and write a new team.
  ///
  /// Nothing is written when validation fails. The returned team exists in
  /// the store; on error the caller must assume it does not.
  pub async fn create(
    &self,
    name: &str,
    creator_id: &str,
    selected: &[String],
  ) -> Result<Team> {
    let team = NewTeam::new(name, creator_id, selected.iter().cloned()).into_team()?;

    if let Err(e) = self.store.put_team(team.clone()).await {
      warn!(error = %e, team = %team.name, "team write failed");
      return Err(Error::TeamCreateFailed(Box::new(e)));
    }

    info!(team_id = %team.team_id, team = %team.name, members = team.members.len(), "team created");
    Ok(team)
  }

  /// Member display names in membership order; unknown ids render as-is.
  pub fn resolve_member_names(team: &Team, directory: &Directory) -> Vec<String> {
    team
      .members
      .iter()
      .map(|id| directory.display_name(id).to_owned())
      .collect()
  }

  pub fn creator_name(team: &Team, directory: &Directory) -> String {
    directory.display_name(&team.created_by).to_owned()
  }
}

// ─── Draft ───────────────────────────────────────────────────────────────────

/// Form state for a team being composed: a name and a toggled selection.
#[derive(Debug, Clone, Default)]
pub struct TeamDraft {
  pub name: String,
  selected: Vec<String>,
}

impl TeamDraft {
  /// Select `user_id`, or deselect it if already selected.
  pub fn toggle(&mut self, user_id: &str) {
    if let Some(pos) = self.selected.iter().position(|id| id == user_id) {
      self.selected.remove(pos);
    } else {
      self.selected.push(user_id.to_owned());
    }
  }

  pub fn is_selected(&self, user_id: &str) -> bool {
    self.selected.iter().any(|id| id == user_id)
  }

  pub fn selected(&self) -> &[String] { &self.selected }

  pub fn clear(&mut self) {
    self.name.clear();
    self.selected.clear();
  }
}
