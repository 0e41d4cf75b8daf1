//! The session orchestrator.
//!
//! [`Session`] ties the identity feed, directory, team registry and message
//! channel together on one logical thread. The presentation layer awaits
//! [`Session::next_event`] in its loop, calls the action methods in response
//! to user gestures, and renders [`Session::state`].
//!
//! At most one channel subscription is live per session. Switching teams
//! releases the old handle before subscribing again, and every snapshot is
//! tagged with the generation it was requested under; snapshots from an older
//! generation are discarded on arrival.

use std::sync::Arc;

use crew_core::{message::Message, profile::UserProfile, store::RecordStore, team::Team};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
  Error, Result,
  channel::{ChannelState, MessageChannel, SubscriptionHandle},
  directory::{Directory, DirectoryService},
  identity::{IdentityFeed, IdentityResolver, Principal},
  registry::{TeamDraft, TeamRegistry},
};

// ─── State ───────────────────────────────────────────────────────────────────

/// Everything the presentation layer renders. Cleared on sign-out.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
  pub profile:     Option<UserProfile>,
  pub directory:   Directory,
  /// Teams the signed-in user belongs to.
  pub teams:       Vec<Team>,
  pub active_team: Option<Uuid>,
  /// The latest snapshot for `active_team`, chronologically ordered.
  pub messages:    Vec<Message>,
}

/// What changed as a result of one [`Session::next_event`] step.
#[derive(Debug)]
pub enum SessionEvent {
  /// Profile resolved; directory and teams loaded where possible.
  SignedIn(UserProfile),
  /// The principal has no profile record. State has been cleared.
  ProfileMissing(String),
  /// Resolving the profile failed for another reason.
  SignInFailed(Error),
  SignedOut,
  /// A fresh snapshot for the active team.
  MessagesUpdated { team_id: Uuid, count: usize },
}

/// A snapshot as produced by a subscription callback.
struct Update {
  generation: u64,
  team_id:    Uuid,
  messages:   Vec<Message>,
}

enum Trigger {
  Identity(Option<Principal>),
  Snapshot(Update),
  FeedClosed,
}

// ─── Session ─────────────────────────────────────────────────────────────────

pub struct Session<S> {
  resolver:     IdentityResolver<S>,
  directory:    DirectoryService<S>,
  registry:     TeamRegistry<S>,
  channel:      MessageChannel<S>,
  feed:         IdentityFeed,
  state:        SessionState,
  subscription: Option<SubscriptionHandle>,
  generation:   u64,
  updates_tx:   mpsc::UnboundedSender<Update>,
  updates_rx:   mpsc::UnboundedReceiver<Update>,
}

impl<S: RecordStore + 'static> Session<S> {
  /// Build a session over `store`, subscribed to `feed` for its lifetime.
  pub fn new(store: Arc<S>, feed: IdentityFeed) -> Self {
    let (updates_tx, updates_rx) = mpsc::unbounded_channel();
    Self {
      resolver: IdentityResolver::new(Arc::clone(&store)),
      directory: DirectoryService::new(Arc::clone(&store)),
      registry: TeamRegistry::new(Arc::clone(&store)),
      channel: MessageChannel::new(store),
      feed,
      state: SessionState::default(),
      subscription: None,
      generation: 0,
      updates_tx,
      updates_rx,
    }
  }

  pub fn state(&self) -> &SessionState { &self.state }

  /// State of the live subscription, if a team is selected.
  pub fn channel_state(&self) -> Option<ChannelState> {
    self.subscription.as_ref().map(SubscriptionHandle::state)
  }

  /// Number of unreleased channel subscriptions; never more than one.
  pub fn live_subscriptions(&self) -> usize { self.channel.live_subscriptions() }

  // ── Event loop ────────────────────────────────────────────────────────────

  /// Wait for the next auth change or snapshot and apply it.
  ///
  /// Stale snapshots are swallowed without producing an event. Returns
  /// `None` once the identity feed has closed.
  pub async fn next_event(&mut self) -> Option<SessionEvent> {
    loop {
      let trigger = tokio::select! {
        biased;
        principal = self.feed.next() => match principal {
          Some(principal) => Trigger::Identity(principal),
          None => Trigger::FeedClosed,
        },
        Some(update) = self.updates_rx.recv() => Trigger::Snapshot(update),
      };

      match trigger {
        Trigger::Identity(principal) => return Some(self.apply_identity(principal).await),
        Trigger::Snapshot(update) => {
          if let Some(event) = self.apply_snapshot(update) {
            return Some(event);
          }
        }
        Trigger::FeedClosed => {
          debug!("identity feed closed");
          return None;
        }
      }
    }
  }

  async fn apply_identity(&mut self, principal: Option<Principal>) -> SessionEvent {
    let Some(principal) = principal else {
      self.sign_out();
      return SessionEvent::SignedOut;
    };

    // Another identity's data must never leak into this one.
    if self.state.profile.as_ref().is_some_and(|p| p.id != principal.id) {
      self.sign_out();
    }

    match self.resolver.resolve(&principal).await {
      Ok(profile) => {
        info!(user = %profile.id, "signed in");
        self.state.profile = Some(profile.clone());
        self.refresh().await;
        SessionEvent::SignedIn(profile)
      }
      Err(Error::ProfileNotFound(id)) => {
        warn!(principal = %id, "no profile for principal");
        self.sign_out();
        SessionEvent::ProfileMissing(id)
      }
      Err(e) => {
        warn!(error = %e, principal = %principal.id, "profile lookup failed");
        SessionEvent::SignInFailed(e)
      }
    }
  }

  fn apply_snapshot(&mut self, update: Update) -> Option<SessionEvent> {
    if update.generation != self.generation
      || self.state.active_team != Some(update.team_id)
    {
      debug!(team_id = %update.team_id, generation = update.generation, "discarding stale snapshot");
      return None;
    }
    let count = update.messages.len();
    self.state.messages = update.messages;
    Some(SessionEvent::MessagesUpdated {
      team_id: update.team_id,
      count,
    })
  }

  // ── Loading ───────────────────────────────────────────────────────────────

  /// Reload the directory and the user's teams. A failed read keeps the
  /// previous snapshot.
  pub async fn refresh(&mut self) {
    match self.directory.list_all().await {
      Ok(directory) => self.state.directory = directory,
      Err(e) => warn!(error = %e, "directory load failed; keeping previous snapshot"),
    }
    self.refresh_teams().await;
  }

  async fn refresh_teams(&mut self) {
    let Some(user_id) = self.state.profile.as_ref().map(|p| p.id.clone()) else {
      return;
    };
    match self.registry.list_for_user(&user_id).await {
      Ok(teams) => self.state.teams = teams,
      Err(e) => warn!(error = %e, "team listing failed; keeping previous snapshot"),
    }
  }

  // ── Actions ───────────────────────────────────────────────────────────────

  /// Make `team_id` the active team and follow its channel.
  ///
  /// Selecting the already-active team is a no-op.
  pub fn select_team(&mut self, team_id: Uuid) -> Result<()> {
    if self.state.profile.is_none() {
      return Err(Error::NotSignedIn);
    }
    if self.state.active_team == Some(team_id) && self.subscription.is_some() {
      return Ok(());
    }

    self.close_channel();
    self.state.active_team = Some(team_id);

    let generation = self.generation;
    let tx = self.updates_tx.clone();
    let handle = self.channel.subscribe(team_id, move |messages| {
      // The receiver only goes away with the session itself.
      let _ = tx.send(Update {
        generation,
        team_id,
        messages,
      });
    });
    self.subscription = Some(handle);
    Ok(())
  }

  /// Leave the active team's channel.
  pub fn deselect_team(&mut self) {
    self.close_channel();
    self.state.active_team = None;
  }

  /// Create a team with the signed-in user as creator, then reload the
  /// team listing.
  pub async fn create_team(&mut self, name: &str, selected: &[String]) -> Result<Team> {
    let creator = self.state.profile.as_ref().ok_or(Error::NotSignedIn)?.id.clone();
    let team = self.registry.create(name, &creator, selected).await?;
    self.refresh_teams().await;
    Ok(team)
  }

  /// [`Session::create_team`] from form state. The draft is cleared only if
  /// the team was created.
  pub async fn create_team_from_draft(&mut self, draft: &mut TeamDraft) -> Result<Team> {
    let team = self.create_team(&draft.name, draft.selected()).await?;
    draft.clear();
    Ok(team)
  }

  /// Send `draft` to the active team as the signed-in user.
  ///
  /// The draft is cleared only after the store confirms the append; on
  /// failure it is left intact for a retry. Blank drafts send nothing.
  pub async fn send(&mut self, draft: &mut String) -> Result<Option<Message>> {
    self.state.profile.as_ref().ok_or(Error::NotSignedIn)?;
    let team_id = self.state.active_team.ok_or(Error::NoActiveTeam)?;
    self.send_to(team_id, draft).await
  }

  /// Send `draft` to `team_id` without selecting it, so no subscription is
  /// opened. Draft handling is the same as [`Session::send`].
  pub async fn send_to(&mut self, team_id: Uuid, draft: &mut String) -> Result<Option<Message>> {
    let sender = self.state.profile.as_ref().ok_or(Error::NotSignedIn)?.id.clone();

    let sent = self.channel.send(team_id, &sender, draft.as_str()).await?;
    if sent.is_some() {
      draft.clear();
    }
    Ok(sent)
  }

  /// Release the channel and forget every piece of per-user state.
  pub fn sign_out(&mut self) {
    self.close_channel();
    if let Some(profile) = self.state.profile.take() {
      info!(user = %profile.id, "signed out");
    }
    self.state = SessionState::default();
  }

  /// Release the channel and drop the identity feed subscription.
  pub fn shutdown(mut self) { self.close_channel(); }

  fn close_channel(&mut self) {
    if let Some(handle) = self.subscription.take() {
      handle.release();
    }
    // Anything still queued from the old subscription is now stale.
    self.generation += 1;
    self.state.messages.clear();
  }
}

#[cfg(test)]
impl<S> Session<S> {
  pub(crate) fn generation(&self) -> u64 { self.generation }

  /// Queue a snapshot as if a subscription from `generation` produced it.
  pub(crate) fn inject_snapshot(&self, generation: u64, team_id: Uuid, messages: Vec<Message>) {
    let _ = self.updates_tx.send(Update {
      generation,
      team_id,
      messages,
    });
  }
}
