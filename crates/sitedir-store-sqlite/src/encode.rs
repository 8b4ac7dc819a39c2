//! Encoding and decoding helpers between sitedir domain types and the
//! plain-text representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings with microsecond precision so that they
//! sort lexically in time order. UUIDs are hyphenated lowercase strings.
//! Counters are `INTEGER` columns read back as `i64` and clamped at zero.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use sitedir_core::{
  comment::Comment,
  engagement::Target,
  follow::{FollowActivity, FollowUser},
  notification::{Notification, NotificationPreferences, NotificationType},
  rating::Rating,
  user::UserProfile,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── Time ────────────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_day(day: NaiveDate) -> String { day.format("%Y-%m-%d").to_string() }

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn count(v: i64) -> u64 { v.max(0) as u64 }

/// A `LIMIT`/`OFFSET` bound. SQLite reads a negative limit as "unbounded",
/// so oversized values saturate instead of wrapping.
pub fn sql_bound(v: usize) -> i64 { i64::try_from(v).unwrap_or(i64::MAX) }

pub fn decode_star(v: i64) -> Result<u8> {
  u8::try_from(v)
    .ok()
    .filter(|s| (1..=5).contains(s))
    .ok_or_else(|| Error::Decode(format!("rating out of range: {v}")))
}

pub fn decode_kind(s: &str) -> Result<NotificationType> {
  s.parse()
    .map_err(|_| Error::Decode(format!("unknown notification type: {s:?}")))
}

/// For use inside a `Connection::call` closure, where errors must already be
/// `tokio_rusqlite::Error`.
pub fn json_in_call(e: serde_json::Error) -> tokio_rusqlite::Error {
  tokio_rusqlite::Error::Other(Box::new(e))
}

pub fn parse_liked_by(s: &str) -> serde_json::Result<BTreeSet<String>> {
  serde_json::from_str(s)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `websites` row.
pub struct RawTarget {
  pub website_id:     String,
  pub owner_id:       String,
  pub title:          String,
  pub url:            String,
  pub likes:          i64,
  pub views:          i64,
  pub comment_count:  i64,
  pub total_ratings:  i64,
  pub average_rating: f64,
  pub created_at:     String,
  pub updated_at:     String,
}

impl RawTarget {
  pub const COLUMNS: &'static str = "website_id, owner_id, title, url, likes, views, \
     comment_count, total_ratings, average_rating, created_at, updated_at";

  pub fn from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      website_id:     r.get(0)?,
      owner_id:       r.get(1)?,
      title:          r.get(2)?,
      url:            r.get(3)?,
      likes:          r.get(4)?,
      views:          r.get(5)?,
      comment_count:  r.get(6)?,
      total_ratings:  r.get(7)?,
      average_rating: r.get(8)?,
      created_at:     r.get(9)?,
      updated_at:     r.get(10)?,
    })
  }

  pub fn into_target(self) -> Result<Target> {
    Ok(Target {
      target_id:      self.website_id,
      owner_id:       self.owner_id,
      title:          self.title,
      url:            self.url,
      likes:          count(self.likes),
      views:          count(self.views),
      comment_count:  count(self.comment_count),
      total_ratings:  count(self.total_ratings),
      average_rating: self.average_rating,
      created_at:     decode_dt(&self.created_at)?,
      updated_at:     decode_dt(&self.updated_at)?,
    })
  }
}

/// A `follows` edge joined with the other party's `users` row.
pub struct RawFollowUser {
  pub user_id:      String,
  pub display_name: Option<String>,
  pub photo_url:    Option<String>,
  pub followed_at:  String,
}

impl RawFollowUser {
  pub fn into_follow_user(self) -> Result<FollowUser> {
    Ok(FollowUser {
      user_id:      self.user_id,
      display_name: self.display_name,
      photo_url:    self.photo_url,
      followed_at:  decode_dt(&self.followed_at)?,
    })
  }
}

pub struct RawFollowActivity {
  pub activity_id:  String,
  pub user_id:      String,
  pub following_id: String,
  pub created_at:   String,
}

impl RawFollowActivity {
  pub fn into_activity(self) -> Result<FollowActivity> {
    Ok(FollowActivity {
      activity_id:  decode_uuid(&self.activity_id)?,
      user_id:      self.user_id,
      following_id: self.following_id,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawRating {
  pub rating_id:  String,
  pub website_id: String,
  pub user_id:    String,
  pub rating:     i64,
  pub review:     Option<String>,
  pub created_at: String,
  pub updated_at: String,
}

impl RawRating {
  pub const COLUMNS: &'static str =
    "rating_id, website_id, user_id, rating, review, created_at, updated_at";

  pub fn from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      rating_id:  r.get(0)?,
      website_id: r.get(1)?,
      user_id:    r.get(2)?,
      rating:     r.get(3)?,
      review:     r.get(4)?,
      created_at: r.get(5)?,
      updated_at: r.get(6)?,
    })
  }

  pub fn into_rating(self) -> Result<Rating> {
    Ok(Rating {
      rating_id:  decode_uuid(&self.rating_id)?,
      target_id:  self.website_id,
      user_id:    self.user_id,
      rating:     decode_star(self.rating)?,
      review:     self.review,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw values read directly from a `comments` row.
pub struct RawComment {
  pub comment_id:  String,
  pub website_id:  String,
  pub parent_id:   Option<String>,
  pub user_id:     String,
  pub user_name:   Option<String>,
  pub user_photo:  Option<String>,
  pub content:     String,
  pub likes:       i64,
  pub liked_by:    String,
  pub is_approved: bool,
  pub is_deleted:  bool,
  pub created_at:  String,
  pub updated_at:  String,
}

impl RawComment {
  pub const COLUMNS: &'static str = "comment_id, website_id, parent_id, user_id, user_name, \
     user_photo, content, likes, liked_by, is_approved, is_deleted, created_at, updated_at";

  pub fn from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      comment_id:  r.get(0)?,
      website_id:  r.get(1)?,
      parent_id:   r.get(2)?,
      user_id:     r.get(3)?,
      user_name:   r.get(4)?,
      user_photo:  r.get(5)?,
      content:     r.get(6)?,
      likes:       r.get(7)?,
      liked_by:    r.get(8)?,
      is_approved: r.get(9)?,
      is_deleted:  r.get(10)?,
      created_at:  r.get(11)?,
      updated_at:  r.get(12)?,
    })
  }

  pub fn into_comment(self) -> Result<Comment> {
    Ok(Comment {
      comment_id:  decode_uuid(&self.comment_id)?,
      target_id:   self.website_id,
      parent_id:   self.parent_id.as_deref().map(decode_uuid).transpose()?,
      user_id:     self.user_id,
      user_name:   self.user_name,
      user_photo:  self.user_photo,
      content:     self.content,
      likes:       count(self.likes),
      liked_by:    parse_liked_by(&self.liked_by)?,
      is_approved: self.is_approved,
      is_deleted:  self.is_deleted,
      created_at:  decode_dt(&self.created_at)?,
      updated_at:  decode_dt(&self.updated_at)?,
    })
  }
}

pub struct RawNotification {
  pub notification_id: String,
  pub kind:            String,
  pub recipient_id:    String,
  pub sender_id:       Option<String>,
  pub sender_name:     Option<String>,
  pub sender_photo:    Option<String>,
  pub title:           String,
  pub message:         String,
  pub is_read:         bool,
  pub created_at:      String,
  pub payload:         String,
}

impl RawNotification {
  pub const COLUMNS: &'static str = "notification_id, kind, recipient_id, sender_id, \
     sender_name, sender_photo, title, message, is_read, created_at, payload";

  pub fn from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      notification_id: r.get(0)?,
      kind:            r.get(1)?,
      recipient_id:    r.get(2)?,
      sender_id:       r.get(3)?,
      sender_name:     r.get(4)?,
      sender_photo:    r.get(5)?,
      title:           r.get(6)?,
      message:         r.get(7)?,
      is_read:         r.get(8)?,
      created_at:      r.get(9)?,
      payload:         r.get(10)?,
    })
  }

  pub fn into_notification(self) -> Result<Notification> {
    Ok(Notification {
      notification_id: decode_uuid(&self.notification_id)?,
      kind:            decode_kind(&self.kind)?,
      recipient_id:    self.recipient_id,
      sender_id:       self.sender_id,
      sender_name:     self.sender_name,
      sender_photo:    self.sender_photo,
      title:           self.title,
      message:         self.message,
      is_read:         self.is_read,
      created_at:      decode_dt(&self.created_at)?,
      payload:         serde_json::from_str(&self.payload)?,
    })
  }
}

pub fn profile_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<UserProfile> {
  Ok(UserProfile {
    user_id:      r.get(0)?,
    display_name: r.get(1)?,
    photo_url:    r.get(2)?,
  })
}

pub fn preferences_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<NotificationPreferences> {
  Ok(NotificationPreferences {
    follow:       r.get(0)?,
    like:         r.get(1)?,
    comment:      r.get(2)?,
    reply:        r.get(3)?,
    comment_like: r.get(4)?,
    rating:       r.get(5)?,
  })
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn timestamps_sort_lexically() {
    let a = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
    let b = a + chrono::Duration::microseconds(1);
    let c = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
    assert!(encode_dt(a) < encode_dt(b));
    assert!(encode_dt(b) < encode_dt(c));
    assert_eq!(decode_dt(&encode_dt(b)).unwrap(), b);
  }

  #[test]
  fn star_outside_range_is_a_decode_error() {
    assert_eq!(decode_star(4).unwrap(), 4);
    assert!(matches!(decode_star(0), Err(Error::Decode(_))));
    assert!(matches!(decode_star(6), Err(Error::Decode(_))));
  }

  #[test]
  fn notification_kind_uses_snake_case() {
    assert_eq!(decode_kind("comment_like").unwrap(), NotificationType::CommentLike);
    assert!(decode_kind("commentLike").is_err());
  }

  #[test]
  fn negative_counter_reads_as_zero() {
    assert_eq!(count(-3), 0);
    assert_eq!(count(7), 7);
  }

  #[test]
  fn oversized_bound_saturates() {
    assert_eq!(sql_bound(20), 20);
    assert_eq!(sql_bound(usize::MAX), i64::MAX);
  }
}
