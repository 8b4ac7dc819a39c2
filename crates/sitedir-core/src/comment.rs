//! Comments and reply-thread reconstruction.
//!
//! Comments are stored flat: each row optionally names its parent. The tree
//! is rebuilt on read by [`build_threads`], which never touches the store.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

pub const MIN_CONTENT_CHARS: usize = 3;
pub const MAX_CONTENT_CHARS: usize = 1000;

/// Nesting levels shown to readers. Storage depth is unbounded.
pub const MAX_VISIBLE_DEPTH: usize = 3;

/// Trim `content` and check its length in characters.
pub fn validate_content(content: &str) -> Result<String> {
  let trimmed = content.trim();
  let actual = trimmed.chars().count();
  if actual < MIN_CONTENT_CHARS {
    return Err(Error::ContentTooShort { min: MIN_CONTENT_CHARS, actual });
  }
  if actual > MAX_CONTENT_CHARS {
    return Err(Error::ContentTooLong { max: MAX_CONTENT_CHARS, actual });
  }
  Ok(trimmed.to_owned())
}

// ─── Rows ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
  pub comment_id:  Uuid,
  pub target_id:   String,
  pub parent_id:   Option<Uuid>,
  pub user_id:     String,
  /// Author display name, copied from the user directory at write time.
  pub user_name:   Option<String>,
  pub user_photo:  Option<String>,
  pub content:     String,
  pub likes:       u64,
  pub liked_by:    BTreeSet<String>,
  pub is_approved: bool,
  /// Tombstone left behind when a comment with replies is deleted.
  pub is_deleted:  bool,
  pub created_at:  DateTime<Utc>,
  pub updated_at:  DateTime<Utc>,
}

/// Input to [`crate::store::EngagementStore::insert_comment`]. `content` has
/// already been validated and trimmed.
#[derive(Debug, Clone)]
pub struct NewComment {
  pub target_id:  String,
  pub parent_id:  Option<Uuid>,
  pub user_id:    String,
  pub user_name:  Option<String>,
  pub user_photo: Option<String>,
  pub content:    String,
}

/// Returned by [`crate::store::EngagementStore::insert_comment`].
#[derive(Debug, Clone)]
pub enum CommentWrite {
  Created(Comment),
  TargetNotFound,
  ParentNotFound,
}

/// Returned by [`crate::store::EngagementStore::delete_comment`].
#[derive(Debug, Clone)]
pub enum CommentDelete {
  /// Row removed outright.
  Removed(Comment),
  /// Row kept as a tombstone because other comments reply to it.
  Tombstoned(Comment),
  NotFound,
  NotAuthorized,
}

/// Returned by [`crate::store::EngagementStore::update_comment_content`].
#[derive(Debug, Clone)]
pub enum CommentEdit {
  Updated(Comment),
  NotFound,
  NotAuthorized,
}

// ─── Threads ─────────────────────────────────────────────────────────────────

/// A comment with its nested replies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentThread {
  #[serde(flatten)]
  pub comment:     Comment,
  pub replies:     Vec<CommentThread>,
  /// Always `replies.len()`.
  pub reply_count: usize,
  /// Zero for root comments.
  pub depth:       usize,
}

/// Rebuild the reply tree from a flat list of comments.
///
/// Runs in O(n): one pass indexes every comment by id, a second attaches each
/// comment to its parent. Root comments keep their input order, as do the
/// replies under each parent. A comment whose parent is not in `comments` is
/// logged and dropped, together with anything replying to it.
pub fn build_threads(comments: Vec<Comment>) -> Vec<CommentThread> {
  let n = comments.len();

  // Pass 1: id → index.
  let mut index: HashMap<Uuid, usize> = HashMap::with_capacity(n);
  for (i, c) in comments.iter().enumerate() {
    if index.insert(c.comment_id, i).is_some() {
      tracing::warn!(comment_id = %c.comment_id, "duplicate comment id in thread input");
    }
  }

  // Pass 2: attach to parents.
  let mut roots: Vec<usize> = Vec::new();
  let mut children: Vec<Vec<usize>> = vec![Vec::new(); n];
  for (i, c) in comments.iter().enumerate() {
    if index.get(&c.comment_id) != Some(&i) {
      continue;
    }
    match c.parent_id {
      None => roots.push(i),
      Some(parent) => match index.get(&parent) {
        Some(&p) => children[p].push(i),
        None => tracing::warn!(
          comment_id = %c.comment_id,
          parent_id = %parent,
          "dropping orphaned comment"
        ),
      },
    }
  }

  // Pre-order walk from the roots to assign depths. Anything unreachable
  // (parent cycles) is never visited.
  let mut depth = vec![0usize; n];
  let mut order: Vec<usize> = Vec::with_capacity(n);
  let mut stack: Vec<usize> = roots.iter().rev().copied().collect();
  while let Some(i) = stack.pop() {
    order.push(i);
    for &c in children[i].iter().rev() {
      depth[c] = depth[i] + 1;
      stack.push(c);
    }
  }
  let dropped = n - order.len();
  if dropped > 0 {
    tracing::debug!(dropped, "comments not reachable from any root");
  }

  // Build bottom-up so every child is finished before its parent.
  let mut slots: Vec<Option<Comment>> = comments.into_iter().map(Some).collect();
  let mut built: Vec<Option<CommentThread>> = (0..n).map(|_| None).collect();
  for &i in order.iter().rev() {
    let replies: Vec<CommentThread> = children[i]
      .iter()
      .filter_map(|&c| built[c].take())
      .collect();
    if let Some(comment) = slots[i].take() {
      built[i] = Some(CommentThread {
        comment,
        reply_count: replies.len(),
        replies,
        depth: depth[i],
      });
    }
  }

  roots.into_iter().filter_map(|r| built[r].take()).collect()
}

/// Cap visible nesting at `max_depth` levels.
///
/// Replies that would sit deeper are hoisted, in reading order, into the
/// replies of their deepest visible ancestor.
pub fn flatten_below(
  threads: Vec<CommentThread>,
  max_depth: usize,
) -> Vec<CommentThread> {
  let max_depth = max_depth.max(2);
  threads.into_iter().map(|t| clamp(t, max_depth)).collect()
}

fn clamp(mut thread: CommentThread, max_depth: usize) -> CommentThread {
  if thread.depth + 2 >= max_depth {
    let mut flat = Vec::new();
    let mut stack: Vec<CommentThread> = thread.replies.into_iter().rev().collect();
    while let Some(mut node) = stack.pop() {
      let nested = std::mem::take(&mut node.replies);
      stack.extend(nested.into_iter().rev());
      node.depth = thread.depth + 1;
      node.reply_count = 0;
      flat.push(node);
    }
    thread.reply_count = flat.len();
    thread.replies = flat;
  } else {
    thread.replies = thread
      .replies
      .into_iter()
      .map(|r| clamp(r, max_depth))
      .collect();
  }
  thread
}
