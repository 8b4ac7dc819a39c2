//! Follow graph types.
//!
//! Edges are directed: `follower_id` follows `following_id`. The per-user
//! [`FollowStats`] counters are denormalized from the edge set and are only
//! ever adjusted in the same transaction that inserts or deletes an edge.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A directed follow relationship. At most one edge exists per ordered pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowEdge {
  pub follower_id:  String,
  pub following_id: String,
  pub created_at:   DateTime<Utc>,
}

/// Cached follower/following counters for one user.
///
/// A user with no stats row reads as all-zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowStats {
  pub user_id:         String,
  pub followers_count: u64,
  pub following_count: u64,
  pub updated_at:      Option<DateTime<Utc>>,
}

impl FollowStats {
  pub fn empty(user_id: impl Into<String>) -> Self {
    Self {
      user_id:         user_id.into(),
      followers_count: 0,
      following_count: 0,
      updated_at:      None,
    }
  }
}

/// Relationship between two users as seen from `a`.
///
/// Built from two independent existence checks, so it is not a consistent
/// snapshot with respect to a concurrent follow or unfollow by either party.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowStatus {
  /// `a` follows `b`.
  pub is_following:   bool,
  /// `b` follows `a`.
  pub is_followed_by: bool,
  pub mutual_follow:  bool,
}

impl FollowStatus {
  pub fn new(is_following: bool, is_followed_by: bool) -> Self {
    Self {
      is_following,
      is_followed_by,
      mutual_follow: is_following && is_followed_by,
    }
  }
}

/// A follower or followee, joined with whatever the user directory knows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUser {
  pub user_id:      String,
  pub display_name: Option<String>,
  pub photo_url:    Option<String>,
  pub followed_at:  DateTime<Utc>,
}

/// Append-only activity entry written alongside every new edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowActivity {
  pub activity_id:  Uuid,
  pub user_id:      String,
  pub following_id: String,
  pub created_at:   DateTime<Utc>,
}

/// Outcome of [`crate::store::EngagementStore::insert_follow`].
#[derive(Debug, Clone)]
pub enum FollowWrite {
  Created(FollowEdge),
  AlreadyFollowing,
}
