//! Targets and their like/view engagement.
//!
//! A target is a submitted website. It carries the cached aggregates
//! (`likes`, `views`, `comment_count`, rating totals) that the managers keep
//! in step with the underlying rows.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Target ──────────────────────────────────────────────────────────────────

/// The aggregate document for a submitted website.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
  pub target_id:      String,
  pub owner_id:       String,
  pub title:          String,
  pub url:            String,
  pub likes:          u64,
  pub views:          u64,
  pub comment_count:  u64,
  /// Mirrors [`crate::rating::RatingStats::total_ratings`].
  pub total_ratings:  u64,
  /// Mirrors [`crate::rating::RatingStats::average_rating`].
  pub average_rating: f64,
  pub created_at:     DateTime<Utc>,
  pub updated_at:     DateTime<Utc>,
}

/// Input to [`crate::store::EngagementStore::register_target`]. All counters
/// start at zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTarget {
  pub target_id: String,
  pub owner_id:  String,
  pub title:     String,
  pub url:       String,
}

// ─── Likes ───────────────────────────────────────────────────────────────────

/// Result of a like toggle on a target or a comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeToggle {
  /// State after the toggle.
  pub liked:     bool,
  pub new_count: u64,
}

// ─── Views ───────────────────────────────────────────────────────────────────

/// Who viewed a target. Signed-in users are keyed by their user id; everybody
/// else by a random per-session token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ViewerId {
  User(String),
  Session(SessionToken),
}

impl ViewerId {
  /// Key stored in the dedup row. Prefixed so that a session token can never
  /// collide with a user id.
  pub fn dedup_key(&self) -> String {
    match self {
      Self::User(id) => format!("user:{id}"),
      Self::Session(token) => format!("anon:{}", token.as_str()),
    }
  }
}

impl fmt::Display for ViewerId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.dedup_key())
  }
}

/// An opaque anonymous-session identifier.
///
/// Generated once per browsing session by the caller and replayed on every
/// view; never derived from network addresses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionToken(String);

impl SessionToken {
  const PREFIX: &'static str = "anon_";

  pub fn generate() -> Self {
    Self(format!("{}{}", Self::PREFIX, Uuid::new_v4().simple()))
  }

  /// Accept a token previously issued by [`SessionToken::generate`].
  pub fn parse(raw: &str) -> Result<Self> {
    let body = raw
      .strip_prefix(Self::PREFIX)
      .ok_or_else(|| Error::InvalidInput(format!("malformed session token: {raw:?}")))?;
    if body.len() != 32 || !body.bytes().all(|b| b.is_ascii_hexdigit()) {
      return Err(Error::InvalidInput(format!(
        "malformed session token: {raw:?}"
      )));
    }
    Ok(Self(raw.to_owned()))
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl TryFrom<String> for SessionToken {
  type Error = Error;

  fn try_from(value: String) -> Result<Self> { Self::parse(&value) }
}

impl From<SessionToken> for String {
  fn from(token: SessionToken) -> Self { token.0 }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn generated_tokens_parse_back() {
    let token = SessionToken::generate();
    let parsed = SessionToken::parse(token.as_str()).unwrap();
    assert_eq!(parsed, token);
  }

  #[test]
  fn generated_tokens_are_distinct() {
    assert_ne!(SessionToken::generate(), SessionToken::generate());
  }

  #[test]
  fn malformed_tokens_are_rejected() {
    assert!(SessionToken::parse("203.0.113.7").is_err());
    assert!(SessionToken::parse("anon_xyz").is_err());
  }

  #[test]
  fn user_and_session_keys_do_not_collide() {
    let token = SessionToken::generate();
    let user = ViewerId::User(token.as_str().to_owned());
    assert_ne!(user.dedup_key(), ViewerId::Session(token).dedup_key());
  }
}
