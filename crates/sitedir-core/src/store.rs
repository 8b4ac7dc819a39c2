//! The `EngagementStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `sitedir-store-sqlite`).
//! The managers in [`crate::service`] depend on this abstraction, not on any
//! concrete backend.
//!
//! Every mutating method is one atomic unit: the source row and every
//! aggregate it justifies are written together or not at all. Methods report
//! expected rejections (duplicate edge, missing parent, wrong owner) through
//! their return value and reserve `Err` for backend failures.

use std::future::Future;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::{
  comment::{Comment, CommentDelete, CommentEdit, CommentWrite, NewComment},
  engagement::{LikeToggle, NewTarget, Target},
  follow::{FollowActivity, FollowStats, FollowUser, FollowWrite},
  notification::{
    NewNotification, Notification, NotificationPreferences, NotificationQuery,
  },
  rating::{NewRating, Rating, RatingDelete, RatingQuery, RatingStats, RatingWrite},
  user::UserProfile,
};

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Implemented by backend error types so the service layer can tell a
/// transient outage from a permanent failure.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  /// The store could not be reached or was too busy to answer. Retrying the
  /// same idempotent call later may succeed.
  fn is_unavailable(&self) -> bool;
}

// ─── Query types ─────────────────────────────────────────────────────────────

/// Offset pagination for list reads.
#[derive(Debug, Clone, Copy, Default)]
pub struct Page {
  pub limit:  Option<usize>,
  pub offset: Option<usize>,
}

impl Page {
  pub const DEFAULT_LIMIT: usize = 50;

  pub fn limit(&self) -> usize { self.limit.unwrap_or(Self::DEFAULT_LIMIT) }

  pub fn offset(&self) -> usize { self.offset.unwrap_or(0) }
}

/// Result of a like toggle on a comment, with the row after the write.
#[derive(Debug, Clone)]
pub struct CommentLikeWrite {
  pub toggle:  LikeToggle,
  pub comment: Comment,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a sitedir document store.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait EngagementStore: Send + Sync {
  type Error: StoreError;

  // ── Targets ───────────────────────────────────────────────────────────

  /// Persist a new target with zeroed counters. Returns `None` if the id is
  /// already taken.
  fn register_target(
    &self,
    target: NewTarget,
  ) -> impl Future<Output = Result<Option<Target>, Self::Error>> + Send + '_;

  fn get_target<'a>(
    &'a self,
    target_id: &'a str,
  ) -> impl Future<Output = Result<Option<Target>, Self::Error>> + Send + 'a;

  // ── User directory ────────────────────────────────────────────────────

  fn put_user_profile(
    &self,
    profile: UserProfile,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn get_user_profile<'a>(
    &'a self,
    user_id: &'a str,
  ) -> impl Future<Output = Result<Option<UserProfile>, Self::Error>> + Send + 'a;

  // ── Follow graph ──────────────────────────────────────────────────────

  /// Insert the edge, bump both counters and append an activity entry.
  fn insert_follow<'a>(
    &'a self,
    follower_id: &'a str,
    following_id: &'a str,
  ) -> impl Future<Output = Result<FollowWrite, Self::Error>> + Send + 'a;

  /// Delete the edge and decrement both counters. Returns `false` if there
  /// was no edge.
  fn delete_follow<'a>(
    &'a self,
    follower_id: &'a str,
    following_id: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  fn follow_exists<'a>(
    &'a self,
    follower_id: &'a str,
    following_id: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Cached counters; all-zero for a user without a stats row.
  fn follow_stats<'a>(
    &'a self,
    user_id: &'a str,
  ) -> impl Future<Output = Result<FollowStats, Self::Error>> + Send + 'a;

  /// Users following `user_id`, newest edge first.
  fn list_followers<'a>(
    &'a self,
    user_id: &'a str,
    page: Page,
  ) -> impl Future<Output = Result<Vec<FollowUser>, Self::Error>> + Send + 'a;

  /// Users `user_id` follows, newest edge first.
  fn list_following<'a>(
    &'a self,
    user_id: &'a str,
    page: Page,
  ) -> impl Future<Output = Result<Vec<FollowUser>, Self::Error>> + Send + 'a;

  fn list_follow_activity<'a>(
    &'a self,
    user_id: &'a str,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<FollowActivity>, Self::Error>> + Send + 'a;

  // ── Likes and views ───────────────────────────────────────────────────

  /// Flip the like row for `(target_id, user_id)` and adjust `likes`.
  /// Returns `None` if the target does not exist.
  fn toggle_like<'a>(
    &'a self,
    target_id: &'a str,
    user_id: &'a str,
  ) -> impl Future<Output = Result<Option<LikeToggle>, Self::Error>> + Send + 'a;

  fn has_liked<'a>(
    &'a self,
    target_id: &'a str,
    user_id: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Insert the `(target_id, viewer_key, day)` dedup row and, only if it was
  /// new, bump `views`. Returns `None` if the target does not exist, otherwise
  /// whether the view was counted.
  fn record_view<'a>(
    &'a self,
    target_id: &'a str,
    viewer_key: &'a str,
    day: NaiveDate,
  ) -> impl Future<Output = Result<Option<bool>, Self::Error>> + Send + 'a;

  // ── Ratings ───────────────────────────────────────────────────────────

  /// Create or update the caller's rating and rewrite the target's stats in
  /// the same transaction. Returns `None` if the target does not exist.
  fn upsert_rating(
    &self,
    input: NewRating,
  ) -> impl Future<Output = Result<Option<RatingWrite>, Self::Error>> + Send + '_;

  fn delete_rating<'a>(
    &'a self,
    rating_id: Uuid,
    target_id: &'a str,
    user_id: &'a str,
  ) -> impl Future<Output = Result<RatingDelete, Self::Error>> + Send + 'a;

  /// Empty stats for a target nobody has rated.
  fn rating_stats<'a>(
    &'a self,
    target_id: &'a str,
  ) -> impl Future<Output = Result<RatingStats, Self::Error>> + Send + 'a;

  fn user_rating<'a>(
    &'a self,
    target_id: &'a str,
    user_id: &'a str,
  ) -> impl Future<Output = Result<Option<Rating>, Self::Error>> + Send + 'a;

  fn list_ratings<'a>(
    &'a self,
    target_id: &'a str,
    query: &'a RatingQuery,
  ) -> impl Future<Output = Result<Vec<Rating>, Self::Error>> + Send + 'a;

  // ── Comments ──────────────────────────────────────────────────────────

  /// Insert the comment and bump the target's `comment_count`. The parent, if
  /// any, must exist on the same target.
  fn insert_comment(
    &self,
    input: NewComment,
  ) -> impl Future<Output = Result<CommentWrite, Self::Error>> + Send + '_;

  fn get_comment(
    &self,
    comment_id: Uuid,
  ) -> impl Future<Output = Result<Option<Comment>, Self::Error>> + Send + '_;

  /// Approved comments (tombstones included) on a target, oldest first.
  fn list_comments<'a>(
    &'a self,
    target_id: &'a str,
  ) -> impl Future<Output = Result<Vec<Comment>, Self::Error>> + Send + 'a;

  /// Flip `user_id` in the comment's `liked_by` set and adjust `likes`.
  /// Returns `None` if the comment does not exist or is a tombstone.
  fn toggle_comment_like<'a>(
    &'a self,
    comment_id: Uuid,
    user_id: &'a str,
  ) -> impl Future<Output = Result<Option<CommentLikeWrite>, Self::Error>> + Send + 'a;

  /// Replace the content of a comment owned by `user_id`.
  fn update_comment_content<'a>(
    &'a self,
    comment_id: Uuid,
    user_id: &'a str,
    content: String,
  ) -> impl Future<Output = Result<CommentEdit, Self::Error>> + Send + 'a;

  /// Remove a comment (or tombstone it when it has replies) and decrement the
  /// target's `comment_count`.
  fn delete_comment<'a>(
    &'a self,
    comment_id: Uuid,
    requester_id: &'a str,
    is_moderator: bool,
  ) -> impl Future<Output = Result<CommentDelete, Self::Error>> + Send + 'a;

  // ── Notifications ─────────────────────────────────────────────────────

  /// Stored flags, or the all-enabled default.
  fn notification_preferences<'a>(
    &'a self,
    user_id: &'a str,
  ) -> impl Future<Output = Result<NotificationPreferences, Self::Error>> + Send + 'a;

  fn set_notification_preferences<'a>(
    &'a self,
    user_id: &'a str,
    prefs: NotificationPreferences,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn insert_notification(
    &self,
    input: NewNotification,
  ) -> impl Future<Output = Result<Notification, Self::Error>> + Send + '_;

  /// Newest first.
  fn list_notifications<'a>(
    &'a self,
    recipient_id: &'a str,
    query: &'a NotificationQuery,
  ) -> impl Future<Output = Result<Vec<Notification>, Self::Error>> + Send + 'a;

  fn unread_notification_count<'a>(
    &'a self,
    recipient_id: &'a str,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + 'a;

  /// Returns `false` if no such notification belongs to `recipient_id`.
  fn mark_notification_read<'a>(
    &'a self,
    notification_id: Uuid,
    recipient_id: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Returns how many notifications flipped.
  fn mark_all_notifications_read<'a>(
    &'a self,
    recipient_id: &'a str,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + 'a;

  /// Returns `false` if no such notification belongs to `recipient_id`.
  fn delete_notification<'a>(
    &'a self,
    notification_id: Uuid,
    recipient_id: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;
}
