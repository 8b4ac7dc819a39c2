//! Error types for `sitedir-core`.

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::store::StoreError;

/// Coarse classification of an [`Error`], used by outer layers to decide how a
/// rejected action is surfaced (HTTP status, retry, user message).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
  /// Bad input shape or range.
  Validation,
  /// The action collides with existing state.
  Conflict,
  /// A referenced document does not exist.
  NotFound,
  /// The caller may not perform the action.
  Authorization,
  /// The store could not be reached (after retries, where allowed).
  DependencyUnavailable,
  /// Anything else: corrupt rows, encoding failures, programming errors.
  Internal,
}

#[derive(Debug, Error)]
pub enum Error {
  // ── Validation ──────────────────────────────────────────────────────────
  #[error("a user cannot follow themselves")]
  SelfFollow,

  #[error("rating must be between 1 and 5, got {0}")]
  InvalidRating(i64),

  #[error("comment is too short ({actual} characters, minimum {min})")]
  ContentTooShort { min: usize, actual: usize },

  #[error("comment is too long ({actual} characters, maximum {max})")]
  ContentTooLong { max: usize, actual: usize },

  #[error("invalid input: {0}")]
  InvalidInput(String),

  // ── Conflict ────────────────────────────────────────────────────────────
  #[error("{follower} already follows {following}")]
  AlreadyFollowing { follower: String, following: String },

  #[error("target {0} is already registered")]
  TargetExists(String),

  // ── Not found ───────────────────────────────────────────────────────────
  #[error("{follower} does not follow {following}")]
  NotFollowing { follower: String, following: String },

  #[error("target not found: {0}")]
  TargetNotFound(String),

  #[error("rating not found: {0}")]
  RatingNotFound(Uuid),

  #[error("parent comment {0} not found on this target")]
  ParentNotFound(Uuid),

  #[error("comment not found: {0}")]
  CommentNotFound(Uuid),

  #[error("notification not found: {0}")]
  NotificationNotFound(Uuid),

  #[error("user not found: {0}")]
  UserNotFound(String),

  // ── Authorization ───────────────────────────────────────────────────────
  #[error("rating {0} does not belong to the requesting user")]
  NotOwner(Uuid),

  #[error("not authorized to modify comment {0}")]
  NotAuthorized(Uuid),

  // ── Dependencies ────────────────────────────────────────────────────────
  #[error("store unavailable: {0}")]
  Unavailable(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  /// Wrap a backend error, preserving whether it was transient.
  pub fn from_store<E: StoreError>(e: E) -> Self {
    if e.is_unavailable() {
      Self::Unavailable(Box::new(e))
    } else {
      Self::Store(Box::new(e))
    }
  }

  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::SelfFollow
      | Self::InvalidRating(_)
      | Self::ContentTooShort { .. }
      | Self::ContentTooLong { .. }
      | Self::InvalidInput(_) => ErrorKind::Validation,
      Self::AlreadyFollowing { .. } | Self::TargetExists(_) => {
        ErrorKind::Conflict
      }
      Self::NotFollowing { .. }
      | Self::TargetNotFound(_)
      | Self::RatingNotFound(_)
      | Self::ParentNotFound(_)
      | Self::CommentNotFound(_)
      | Self::NotificationNotFound(_)
      | Self::UserNotFound(_) => ErrorKind::NotFound,
      Self::NotOwner(_) | Self::NotAuthorized(_) => ErrorKind::Authorization,
      Self::Unavailable(_) => ErrorKind::DependencyUnavailable,
      Self::Store(_) | Self::Serialization(_) => ErrorKind::Internal,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
