//! Like and view counters on targets.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};

use crate::{
  Error, Result,
  engagement::{LikeToggle, NewTarget, Target, ViewerId},
  notification::NotificationType,
  service::{Dispatcher, RetryPolicy, owner_event, require_id},
  store::EngagementStore,
};

pub struct EngagementCounters<S> {
  store:  Arc<S>,
  retry:  RetryPolicy,
  notify: Dispatcher<S>,
}

impl<S> EngagementCounters<S>
where
  S: EngagementStore + 'static,
{
  pub fn new(store: Arc<S>, retry: RetryPolicy, notify: Dispatcher<S>) -> Self {
    Self { store, retry, notify }
  }

  // ── Targets ───────────────────────────────────────────────────────────────

  pub async fn register_target(&self, input: NewTarget) -> Result<Target> {
    require_id("target id", &input.target_id)?;
    require_id("owner id", &input.owner_id)?;
    let target_id = input.target_id.clone();

    let created = self
      .retry
      .run("register_target", || self.store.register_target(input.clone()))
      .await
      .map_err(Error::from_store)?;

    let target = created.ok_or(Error::TargetExists(target_id))?;
    tracing::info!(target_id = %target.target_id, owner_id = %target.owner_id, "target registered");
    Ok(target)
  }

  pub async fn target(&self, target_id: &str) -> Result<Target> {
    self
      .retry
      .run("get_target", || self.store.get_target(target_id))
      .await
      .map_err(Error::from_store)?
      .ok_or_else(|| Error::TargetNotFound(target_id.to_owned()))
  }

  // ── Likes ─────────────────────────────────────────────────────────────────

  /// Like the target if `user_id` has not, otherwise take the like back.
  ///
  /// Not retried: a toggle repeated after a lost acknowledgement would undo
  /// itself.
  pub async fn toggle_like(&self, target_id: &str, user_id: &str) -> Result<LikeToggle> {
    require_id("user id", user_id)?;

    let toggle = self
      .store
      .toggle_like(target_id, user_id)
      .await
      .map_err(Error::from_store)?
      .ok_or_else(|| Error::TargetNotFound(target_id.to_owned()))?;
    tracing::debug!(target_id, user_id, liked = toggle.liked, likes = toggle.new_count, "like toggled");

    if toggle.liked
      && let Some(event) =
        owner_event(self.store.as_ref(), target_id, NotificationType::Like, user_id).await
    {
      self.notify.trigger(event).await;
    }
    Ok(toggle)
  }

  pub async fn has_liked(&self, target_id: &str, user_id: &str) -> Result<bool> {
    self
      .retry
      .run("has_liked", || self.store.has_liked(target_id, user_id))
      .await
      .map_err(Error::from_store)
  }

  // ── Views ─────────────────────────────────────────────────────────────────

  /// Count a view at most once per viewer per UTC calendar day. Returns
  /// whether this call was the one that counted.
  pub async fn record_view(&self, target_id: &str, viewer: &ViewerId) -> Result<bool> {
    self
      .record_view_on(target_id, viewer, Utc::now().date_naive())
      .await
  }

  /// [`record_view`](Self::record_view) for an explicit day.
  pub async fn record_view_on(
    &self,
    target_id: &str,
    viewer: &ViewerId,
    day: NaiveDate,
  ) -> Result<bool> {
    if let ViewerId::User(id) = viewer {
      require_id("viewer id", id)?;
    }
    let key = viewer.dedup_key();

    let counted = self
      .retry
      .run("record_view", || self.store.record_view(target_id, &key, day))
      .await
      .map_err(Error::from_store)?
      .ok_or_else(|| Error::TargetNotFound(target_id.to_owned()))?;

    if counted {
      tracing::debug!(target_id, viewer = %key, %day, "view counted");
    }
    Ok(counted)
  }
}
