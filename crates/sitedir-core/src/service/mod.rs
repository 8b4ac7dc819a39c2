//! Managers that own the engagement aggregates.
//!
//! Each manager follows the same sequence: validate the caller's input, run a
//! single atomic store call that writes the source row together with its
//! counters, then hand a [`NotificationEvent`](crate::notification::NotificationEvent)
//! to the [`Dispatcher`]. Identity is always an explicit `user_id` argument;
//! nothing here knows who is "logged in".

mod comments;
mod counters;
mod follows;
mod notify;
mod ratings;
mod retry;

use std::sync::Arc;

use serde::Deserialize;

pub use comments::CommentThreads;
pub use counters::EngagementCounters;
pub use follows::FollowGraph;
pub use notify::{Dispatcher, Inbox};
pub use ratings::RatingAggregator;
pub use retry::RetryPolicy;

use crate::{
  Error, Result,
  notification::{NotificationEvent, NotificationType},
  store::EngagementStore,
  user::UserProfile,
};

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
  /// Deliver on a spawned task rather than before the operation returns.
  pub background: bool,
}

impl Default for NotificationConfig {
  fn default() -> Self { Self { background: true } }
}

/// Tunables shared by every manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  pub retry:         RetryPolicy,
  pub notifications: NotificationConfig,
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// All managers wired to one store.
pub struct Engine<S> {
  store:          Arc<S>,
  retry:          RetryPolicy,
  pub follows:    FollowGraph<S>,
  pub counters:   EngagementCounters<S>,
  pub ratings:    RatingAggregator<S>,
  pub comments:   CommentThreads<S>,
  pub dispatcher: Dispatcher<S>,
  pub inbox:      Inbox<S>,
}

impl<S> Engine<S>
where
  S: EngagementStore + 'static,
{
  pub fn new(store: Arc<S>, config: EngineConfig) -> Self {
    let dispatcher = Dispatcher::new(Arc::clone(&store))
      .in_background(config.notifications.background);
    let retry = config.retry;
    Self {
      follows: FollowGraph::new(Arc::clone(&store), retry, dispatcher.clone()),
      counters: EngagementCounters::new(Arc::clone(&store), retry, dispatcher.clone()),
      ratings: RatingAggregator::new(Arc::clone(&store), retry, dispatcher.clone()),
      comments: CommentThreads::new(Arc::clone(&store), retry, dispatcher.clone()),
      inbox: Inbox::new(Arc::clone(&store), retry),
      dispatcher,
      store,
      retry,
    }
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  /// Record what the user directory knows about a user.
  pub async fn put_user_profile(&self, profile: UserProfile) -> Result<()> {
    require_id("user id", &profile.user_id)?;
    if profile.display_name.trim().is_empty() {
      return Err(Error::InvalidInput("display name must not be empty".into()));
    }
    self
      .retry
      .run("put_user_profile", || self.store.put_user_profile(profile.clone()))
      .await
      .map_err(Error::from_store)
  }

  pub async fn user_profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
    self
      .retry
      .run("get_user_profile", || self.store.get_user_profile(user_id))
      .await
      .map_err(Error::from_store)
  }
}

/// Reject blank identifiers before they reach the store.
pub(crate) fn require_id(field: &str, value: &str) -> Result<()> {
  if value.trim().is_empty() {
    Err(Error::InvalidInput(format!("{field} must not be empty")))
  } else {
    Ok(())
  }
}

/// Event addressed to the owner of `target_id`, for use after a committed
/// write. A failed lookup is logged and yields `None`.
pub(crate) async fn owner_event<S: EngagementStore>(
  store: &S,
  target_id: &str,
  kind: NotificationType,
  sender_id: &str,
) -> Option<NotificationEvent> {
  match store.get_target(target_id).await {
    Ok(Some(target)) => Some(
      NotificationEvent::new(kind, target.owner_id)
        .from_sender(sender_id)
        .on_target(target.target_id, Some(target.title)),
    ),
    Ok(None) => None,
    Err(e) => {
      tracing::warn!(target_id, error = %e, "could not resolve target owner for notification");
      None
    }
  }
}
