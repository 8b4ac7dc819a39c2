//! Notification fan-out and the recipient's inbox.

use std::sync::Arc;

use uuid::Uuid;

use crate::{
  Error, Result,
  notification::{
    NewNotification, Notification, NotificationEvent, NotificationPreferences,
    NotificationQuery,
  },
  service::{RetryPolicy, require_id},
  store::EngagementStore,
};

// ─── Dispatcher ──────────────────────────────────────────────────────────────

/// Persists notifications for state changes that already committed.
///
/// [`Dispatcher::trigger`] never fails: preference-suppressed events are
/// dropped quietly and store errors are logged and swallowed. It never calls
/// back into a manager, so a notification cannot cause another one.
pub struct Dispatcher<S> {
  store:      Arc<S>,
  background: bool,
}

impl<S> Clone for Dispatcher<S> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), background: self.background }
  }
}

impl<S> Dispatcher<S>
where
  S: EngagementStore + 'static,
{
  /// A dispatcher that delivers inline, before `trigger` returns.
  pub fn new(store: Arc<S>) -> Self { Self { store, background: false } }

  /// Deliver on a spawned task instead, so the caller never waits on it.
  pub fn in_background(mut self, background: bool) -> Self {
    self.background = background;
    self
  }

  pub async fn trigger(&self, event: NotificationEvent) {
    if self.background {
      let store = Arc::clone(&self.store);
      tokio::spawn(async move { deliver(store.as_ref(), event).await });
    } else {
      deliver(self.store.as_ref(), event).await;
    }
  }
}

async fn deliver<S: EngagementStore>(store: &S, event: NotificationEvent) {
  match try_deliver(store, &event).await {
    Ok(Some(n)) => tracing::debug!(
      notification_id = %n.notification_id,
      recipient_id = %n.recipient_id,
      kind = n.kind.as_ref(),
      "notification stored"
    ),
    Ok(None) => tracing::debug!(
      recipient_id = %event.recipient_id,
      kind = event.kind.as_ref(),
      "notification suppressed"
    ),
    Err(e) => tracing::warn!(
      recipient_id = %event.recipient_id,
      kind = event.kind.as_ref(),
      error = %e,
      "failed to deliver notification"
    ),
  }
}

async fn try_deliver<S: EngagementStore>(
  store: &S,
  event: &NotificationEvent,
) -> Result<Option<Notification>, S::Error> {
  if event.sender_id.as_deref() == Some(event.recipient_id.as_str()) {
    return Ok(None);
  }

  let prefs = store.notification_preferences(&event.recipient_id).await?;
  if !prefs.allows(event.kind) {
    return Ok(None);
  }

  let sender = match &event.sender_id {
    Some(id) => store.get_user_profile(id).await?,
    None => None,
  };
  let sender_name = sender
    .as_ref()
    .map(|p| p.display_name.as_str())
    .unwrap_or("Someone");
  let (title, message) = event.render(sender_name);

  let notification = store
    .insert_notification(NewNotification {
      kind: event.kind,
      recipient_id: event.recipient_id.clone(),
      sender_id: event.sender_id.clone(),
      sender_name: sender.as_ref().map(|p| p.display_name.clone()),
      sender_photo: sender.and_then(|p| p.photo_url),
      title,
      message,
      payload: event.payload(),
    })
    .await?;
  Ok(Some(notification))
}

// ─── Inbox ───────────────────────────────────────────────────────────────────

/// Reads and recipient-side mutations of stored notifications.
pub struct Inbox<S> {
  store: Arc<S>,
  retry: RetryPolicy,
}

impl<S> Clone for Inbox<S> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), retry: self.retry }
  }
}

impl<S> Inbox<S>
where
  S: EngagementStore + 'static,
{
  pub fn new(store: Arc<S>, retry: RetryPolicy) -> Self { Self { store, retry } }

  pub async fn list(
    &self,
    recipient_id: &str,
    query: &NotificationQuery,
  ) -> Result<Vec<Notification>> {
    require_id("recipient id", recipient_id)?;
    self
      .retry
      .run("list_notifications", || {
        self.store.list_notifications(recipient_id, query)
      })
      .await
      .map_err(Error::from_store)
  }

  pub async fn unread_count(&self, recipient_id: &str) -> Result<u64> {
    self
      .retry
      .run("unread_notification_count", || {
        self.store.unread_notification_count(recipient_id)
      })
      .await
      .map_err(Error::from_store)
  }

  pub async fn mark_read(
    &self,
    notification_id: Uuid,
    recipient_id: &str,
  ) -> Result<()> {
    let found = self
      .retry
      .run("mark_notification_read", || {
        self.store.mark_notification_read(notification_id, recipient_id)
      })
      .await
      .map_err(Error::from_store)?;
    if found {
      Ok(())
    } else {
      Err(Error::NotificationNotFound(notification_id))
    }
  }

  pub async fn mark_all_read(&self, recipient_id: &str) -> Result<u64> {
    self
      .retry
      .run("mark_all_notifications_read", || {
        self.store.mark_all_notifications_read(recipient_id)
      })
      .await
      .map_err(Error::from_store)
  }

  pub async fn delete(&self, notification_id: Uuid, recipient_id: &str) -> Result<()> {
    let found = self
      .retry
      .run("delete_notification", || {
        self.store.delete_notification(notification_id, recipient_id)
      })
      .await
      .map_err(Error::from_store)?;
    if found {
      Ok(())
    } else {
      Err(Error::NotificationNotFound(notification_id))
    }
  }

  pub async fn preferences(&self, user_id: &str) -> Result<NotificationPreferences> {
    self
      .retry
      .run("notification_preferences", || {
        self.store.notification_preferences(user_id)
      })
      .await
      .map_err(Error::from_store)
  }

  pub async fn set_preferences(
    &self,
    user_id: &str,
    prefs: NotificationPreferences,
  ) -> Result<()> {
    require_id("user id", user_id)?;
    self
      .retry
      .run("set_notification_preferences", || {
        self.store.set_notification_preferences(user_id, prefs)
      })
      .await
      .map_err(Error::from_store)
  }
}
