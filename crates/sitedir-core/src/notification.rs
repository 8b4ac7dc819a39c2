//! Notifications and per-user delivery preferences.
//!
//! A notification row is write-once: after creation only `is_read` may flip,
//! and the recipient may delete it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter, EnumString};
use uuid::Uuid;

/// The event that produced a notification. Each type has its own preference
/// flag.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  AsRefStr,
  EnumString,
  EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NotificationType {
  Follow,
  Like,
  Comment,
  Reply,
  CommentLike,
  Rating,
}

// ─── Events ──────────────────────────────────────────────────────────────────

/// Input to [`crate::service::Dispatcher::trigger`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
  #[serde(rename = "type")]
  pub kind:         NotificationType,
  pub recipient_id: String,
  pub sender_id:    Option<String>,
  pub target_id:    Option<String>,
  pub target_title: Option<String>,
  pub comment_id:   Option<Uuid>,
  /// Star value for [`NotificationType::Rating`].
  pub rating:       Option<u8>,
  /// Short quote of the comment text, if any.
  pub excerpt:      Option<String>,
}

impl NotificationEvent {
  pub fn new(kind: NotificationType, recipient_id: impl Into<String>) -> Self {
    Self {
      kind,
      recipient_id: recipient_id.into(),
      sender_id: None,
      target_id: None,
      target_title: None,
      comment_id: None,
      rating: None,
      excerpt: None,
    }
  }

  pub fn from_sender(mut self, sender_id: impl Into<String>) -> Self {
    self.sender_id = Some(sender_id.into());
    self
  }

  pub fn on_target(
    mut self,
    target_id: impl Into<String>,
    title: Option<String>,
  ) -> Self {
    self.target_id = Some(target_id.into());
    self.target_title = title;
    self
  }

  pub fn on_comment(mut self, comment_id: Uuid, excerpt: &str) -> Self {
    self.comment_id = Some(comment_id);
    self.excerpt = Some(excerpt_of(excerpt));
    self
  }

  pub fn with_rating(mut self, rating: u8) -> Self {
    self.rating = Some(rating);
    self
  }

  /// Title and message shown to the recipient.
  pub fn render(&self, sender_name: &str) -> (String, String) {
    let site = self.target_title.as_deref().unwrap_or("your website");
    match self.kind {
      NotificationType::Follow => (
        "New follower".to_owned(),
        format!("{sender_name} started following you"),
      ),
      NotificationType::Like => (
        "New like".to_owned(),
        format!("{sender_name} liked {site}"),
      ),
      NotificationType::Comment => (
        "New comment".to_owned(),
        match &self.excerpt {
          Some(q) => format!("{sender_name} commented on {site}: \"{q}\""),
          None => format!("{sender_name} commented on {site}"),
        },
      ),
      NotificationType::Reply => (
        "New reply".to_owned(),
        match &self.excerpt {
          Some(q) => format!("{sender_name} replied to your comment: \"{q}\""),
          None => format!("{sender_name} replied to your comment"),
        },
      ),
      NotificationType::CommentLike => (
        "Comment liked".to_owned(),
        format!("{sender_name} liked your comment"),
      ),
      NotificationType::Rating => (
        "New rating".to_owned(),
        match self.rating {
          Some(r) => format!("{sender_name} rated {site} {r}/5"),
          None => format!("{sender_name} rated {site}"),
        },
      ),
    }
  }

  /// Structured details persisted alongside the rendered text.
  pub fn payload(&self) -> serde_json::Value {
    let mut payload = serde_json::Map::new();
    if let Some(t) = &self.target_id {
      payload.insert("targetId".into(), t.clone().into());
    }
    if let Some(c) = self.comment_id {
      payload.insert("commentId".into(), c.to_string().into());
    }
    if let Some(r) = self.rating {
      payload.insert("rating".into(), r.into());
    }
    serde_json::Value::Object(payload)
  }
}

const EXCERPT_CHARS: usize = 80;

fn excerpt_of(text: &str) -> String {
  let mut chars = text.chars();
  let head: String = chars.by_ref().take(EXCERPT_CHARS).collect();
  if chars.next().is_some() { format!("{head}…") } else { head }
}

// ─── Rows ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
  pub notification_id: Uuid,
  #[serde(rename = "type")]
  pub kind:            NotificationType,
  pub recipient_id:    String,
  pub sender_id:       Option<String>,
  pub sender_name:     Option<String>,
  pub sender_photo:    Option<String>,
  pub title:           String,
  pub message:         String,
  pub is_read:         bool,
  pub created_at:      DateTime<Utc>,
  pub payload:         serde_json::Value,
}

/// Input to [`crate::store::EngagementStore::insert_notification`].
#[derive(Debug, Clone)]
pub struct NewNotification {
  pub kind:         NotificationType,
  pub recipient_id: String,
  pub sender_id:    Option<String>,
  pub sender_name:  Option<String>,
  pub sender_photo: Option<String>,
  pub title:        String,
  pub message:      String,
  pub payload:      serde_json::Value,
}

/// Parameters for [`crate::store::EngagementStore::list_notifications`].
#[derive(Debug, Clone, Default)]
pub struct NotificationQuery {
  pub unread_only: bool,
  pub limit:       Option<usize>,
}

// ─── Preferences ─────────────────────────────────────────────────────────────

/// One switch per [`NotificationType`]. Everything is on until the user says
/// otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationPreferences {
  pub follow:       bool,
  pub like:         bool,
  pub comment:      bool,
  pub reply:        bool,
  pub comment_like: bool,
  pub rating:       bool,
}

impl Default for NotificationPreferences {
  fn default() -> Self {
    Self {
      follow:       true,
      like:         true,
      comment:      true,
      reply:        true,
      comment_like: true,
      rating:       true,
    }
  }
}

impl NotificationPreferences {
  pub fn allows(&self, kind: NotificationType) -> bool {
    match kind {
      NotificationType::Follow => self.follow,
      NotificationType::Like => self.like,
      NotificationType::Comment => self.comment,
      NotificationType::Reply => self.reply,
      NotificationType::CommentLike => self.comment_like,
      NotificationType::Rating => self.rating,
    }
  }

  pub fn set(&mut self, kind: NotificationType, enabled: bool) {
    let flag = match kind {
      NotificationType::Follow => &mut self.follow,
      NotificationType::Like => &mut self.like,
      NotificationType::Comment => &mut self.comment,
      NotificationType::Reply => &mut self.reply,
      NotificationType::CommentLike => &mut self.comment_like,
      NotificationType::Rating => &mut self.rating,
    };
    *flag = enabled;
  }
}
