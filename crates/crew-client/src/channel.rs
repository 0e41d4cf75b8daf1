//! Live, ordered message streams scoped to one team.
//!
//! A subscription runs as a background task. It registers a
//! [`MessageWatch`](crew_core::store::MessageWatch) first, reads the team's
//! full message set, and then re-reads on every change. Each read is sorted
//! and handed to the subscriber whole; consumers never merge diffs.
//!
//! Delivery and release serialise on the subscription's slot lock. Once
//! [`SubscriptionHandle::release`] returns, the callback has been dropped and
//! will not run again, even if a read was in flight.

use std::sync::{
  Arc, Mutex, MutexGuard, PoisonError,
  atomic::{AtomicU64, AtomicUsize, Ordering},
};

use crew_core::{
  message::{Message, NewMessage, order_chronologically},
  store::RecordStore,
};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{Error, Result};

/// Lifecycle of a single subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
  /// Requested; no snapshot delivered yet.
  Subscribing,
  /// At least one snapshot delivered; following the store.
  Open,
  /// Released. Terminal.
  Closed,
}

type UpdateFn = Box<dyn FnMut(Vec<Message>) + Send>;

struct Slot {
  state:     ChannelState,
  on_update: Option<UpdateFn>,
}

fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
  slot.lock().unwrap_or_else(PoisonError::into_inner)
}

// ─── Handle ──────────────────────────────────────────────────────────────────

/// Owns one subscription. Dropping the handle releases it.
pub struct SubscriptionHandle {
  id:      u64,
  team_id: Uuid,
  slot:    Arc<Mutex<Slot>>,
  live:    Arc<AtomicUsize>,
  task:    JoinHandle<()>,
}

impl SubscriptionHandle {
  pub fn id(&self) -> u64 { self.id }

  pub fn team_id(&self) -> Uuid { self.team_id }

  pub fn state(&self) -> ChannelState { lock(&self.slot).state }

  /// Stop deliveries. Idempotent.
  ///
  /// Waits for a delivery already running to finish. This is brief as long
  /// as the callback keeps the contract on [`MessageChannel::subscribe`].
  /// Must not be called from inside the subscriber callback.
  pub fn release(&self) {
    let mut slot = lock(&self.slot);
    slot.state = ChannelState::Closed;
    if slot.on_update.take().is_some() {
      self.live.fetch_sub(1, Ordering::AcqRel);
      debug!(subscription = self.id, team_id = %self.team_id, "subscription released");
    }
    drop(slot);
    self.task.abort();
  }
}

impl Drop for SubscriptionHandle {
  fn drop(&mut self) { self.release(); }
}

// ─── Channel ─────────────────────────────────────────────────────────────────

pub struct MessageChannel<S> {
  store:   Arc<S>,
  next_id: AtomicU64,
  live:    Arc<AtomicUsize>,
}

impl<S: RecordStore + 'static> MessageChannel<S> {
  pub fn new(store: Arc<S>) -> Self {
    Self {
      store,
      next_id: AtomicU64::new(1),
      live: Arc::new(AtomicUsize::new(0)),
    }
  }

  /// Follow `team_id`'s messages.
  ///
  /// `on_update` receives the complete, chronologically ordered message set
  /// once promptly and again after every append.
  ///
  /// # Callback contract
  ///
  /// `on_update` runs on a runtime worker while holding the subscription's
  /// slot lock, and [`SubscriptionHandle::release`] waits on that lock. The
  /// callback therefore must not block (no blocking I/O, no waiting on other
  /// tasks) and must not release its own handle, which would deadlock. Hand
  /// the snapshot off, for example into an unbounded `mpsc` sender, and do
  /// the work elsewhere.
  pub fn subscribe<F>(&self, team_id: Uuid, on_update: F) -> SubscriptionHandle
  where
    F: FnMut(Vec<Message>) + Send + 'static,
  {
    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
    let slot = Arc::new(Mutex::new(Slot {
      state:     ChannelState::Subscribing,
      on_update: Some(Box::new(on_update)),
    }));
    self.live.fetch_add(1, Ordering::AcqRel);
    debug!(subscription = id, %team_id, "subscribing");

    let task = tokio::spawn(follow(
      Arc::clone(&self.store),
      team_id,
      id,
      Arc::clone(&slot),
    ));

    SubscriptionHandle {
      id,
      team_id,
      slot,
      live: Arc::clone(&self.live),
      task,
    }
  }

  /// Same as [`SubscriptionHandle::release`].
  pub fn release(&self, handle: &SubscriptionHandle) { handle.release(); }

  /// Subscriptions created by this channel and not yet released.
  pub fn live_subscriptions(&self) -> usize { self.live.load(Ordering::Acquire) }

  /// Append a message to `team_id`.
  ///
  /// Content that is blank after trimming is dropped without error and
  /// returns `Ok(None)`; nothing reaches the store.
  pub async fn send(
    &self,
    team_id: Uuid,
    sender_id: &str,
    content: &str,
  ) -> Result<Option<Message>> {
    let Ok(input) = NewMessage::new(team_id, sender_id, content) else {
      debug!(%team_id, "blank message not sent");
      return Ok(None);
    };

    match self.store.append_message(input).await {
      Ok(message) => Ok(Some(message)),
      Err(e) => {
        warn!(error = %e, %team_id, "message send failed");
        Err(Error::MessageSendFailed(Box::new(e)))
      }
    }
  }
}

// ─── Subscription task ───────────────────────────────────────────────────────

async fn follow<S: RecordStore>(
  store: Arc<S>,
  team_id: Uuid,
  id: u64,
  slot: Arc<Mutex<Slot>>,
) {
  let mut watch = match store.watch_messages(team_id).await {
    Ok(watch) => watch,
    Err(e) => {
      warn!(error = %e, subscription = id, %team_id, "could not open live query");
      return;
    }
  };

  loop {
    match store.list_messages(team_id).await {
      Ok(mut messages) => {
        order_chronologically(&mut messages);
        if !deliver(&slot, messages) {
          return;
        }
      }
      Err(e) => {
        warn!(error = %e, subscription = id, %team_id, "message read failed; keeping previous snapshot");
      }
    }

    if !watch.changed().await {
      debug!(subscription = id, %team_id, "change feed closed");
      return;
    }
  }
}

/// Hand `messages` to the subscriber. Returns `false` once released.
fn deliver(slot: &Mutex<Slot>, messages: Vec<Message>) -> bool {
  let mut guard = lock(slot);
  let slot = &mut *guard;
  let Some(on_update) = slot.on_update.as_mut() else {
    return false;
  };
  slot.state = ChannelState::Open;
  on_update(messages);
  true
}
