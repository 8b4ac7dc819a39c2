//! Follow graph manager.

use std::sync::Arc;

use chrono::Utc;

use crate::{
  Error, Result,
  follow::{FollowActivity, FollowEdge, FollowStats, FollowStatus, FollowUser, FollowWrite},
  notification::{NotificationEvent, NotificationType},
  service::{Dispatcher, RetryPolicy, require_id},
  store::{EngagementStore, Page},
};

pub struct FollowGraph<S> {
  store:  Arc<S>,
  retry:  RetryPolicy,
  notify: Dispatcher<S>,
}

impl<S> FollowGraph<S>
where
  S: EngagementStore + 'static,
{
  pub fn new(store: Arc<S>, retry: RetryPolicy, notify: Dispatcher<S>) -> Self {
    Self { store, retry, notify }
  }

  /// Create the edge `follower_id → following_id` and bump both counters.
  ///
  /// Retrying is safe: a repeat after a lost acknowledgement finds the edge
  /// instead of counting twice. An edge found by a retry is the one the
  /// earlier attempt wrote, so it is reported as created.
  pub async fn follow(
    &self,
    follower_id: &str,
    following_id: &str,
  ) -> Result<FollowEdge> {
    require_id("follower id", follower_id)?;
    require_id("following id", following_id)?;
    if follower_id == following_id {
      return Err(Error::SelfFollow);
    }

    let mut attempts = 0u32;
    let write = self
      .retry
      .run("insert_follow", || {
        attempts += 1;
        self.store.insert_follow(follower_id, following_id)
      })
      .await
      .map_err(Error::from_store)?;

    let edge = settle_follow(write, attempts, follower_id, following_id)?;
    tracing::info!(follower_id, following_id, "follow created");

    self
      .notify
      .trigger(
        NotificationEvent::new(NotificationType::Follow, following_id)
          .from_sender(follower_id),
      )
      .await;
    Ok(edge)
  }

  /// Remove the edge and decrement both counters.
  pub async fn unfollow(&self, follower_id: &str, following_id: &str) -> Result<()> {
    require_id("follower id", follower_id)?;
    require_id("following id", following_id)?;

    let removed = self
      .retry
      .run("delete_follow", || self.store.delete_follow(follower_id, following_id))
      .await
      .map_err(Error::from_store)?;

    if !removed {
      return Err(Error::NotFollowing {
        follower:  follower_id.to_owned(),
        following: following_id.to_owned(),
      });
    }
    tracing::info!(follower_id, following_id, "follow removed");
    Ok(())
  }

  /// Relationship between `a` and `b`, from `a`'s side.
  ///
  /// The two directions are read independently, so a follow or unfollow
  /// racing with this call may be reflected in one half only.
  pub async fn status(&self, a: &str, b: &str) -> Result<FollowStatus> {
    let (forward, backward) = tokio::join!(
      self.retry.run("follow_exists", || self.store.follow_exists(a, b)),
      self.retry.run("follow_exists", || self.store.follow_exists(b, a)),
    );
    Ok(FollowStatus::new(
      forward.map_err(Error::from_store)?,
      backward.map_err(Error::from_store)?,
    ))
  }

  pub async fn stats(&self, user_id: &str) -> Result<FollowStats> {
    self
      .retry
      .run("follow_stats", || self.store.follow_stats(user_id))
      .await
      .map_err(Error::from_store)
  }

  pub async fn followers(&self, user_id: &str, page: Page) -> Result<Vec<FollowUser>> {
    self
      .retry
      .run("list_followers", || self.store.list_followers(user_id, page))
      .await
      .map_err(Error::from_store)
  }

  pub async fn following(&self, user_id: &str, page: Page) -> Result<Vec<FollowUser>> {
    self
      .retry
      .run("list_following", || self.store.list_following(user_id, page))
      .await
      .map_err(Error::from_store)
  }

  pub async fn activity(&self, user_id: &str, limit: usize) -> Result<Vec<FollowActivity>> {
    self
      .retry
      .run("list_follow_activity", || {
        self.store.list_follow_activity(user_id, limit)
      })
      .await
      .map_err(Error::from_store)
  }
}

/// Interpret an insert result. `AlreadyFollowing` only means a conflict when
/// it came back from the first attempt.
fn settle_follow(
  write: FollowWrite,
  attempts: u32,
  follower_id: &str,
  following_id: &str,
) -> Result<FollowEdge> {
  match write {
    FollowWrite::Created(edge) => Ok(edge),
    FollowWrite::AlreadyFollowing if attempts > 1 => {
      tracing::debug!(follower_id, following_id, attempts, "edge written by an earlier attempt");
      Ok(FollowEdge {
        follower_id:  follower_id.to_owned(),
        following_id: following_id.to_owned(),
        created_at:   Utc::now(),
      })
    }
    FollowWrite::AlreadyFollowing => Err(Error::AlreadyFollowing {
      follower:  follower_id.to_owned(),
      following: following_id.to_owned(),
    }),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn existing_edge_is_a_conflict_on_first_attempt() {
    let out = settle_follow(FollowWrite::AlreadyFollowing, 1, "a", "b");
    assert!(matches!(out, Err(Error::AlreadyFollowing { .. })));
  }

  #[test]
  fn existing_edge_after_retry_is_the_earlier_write() {
    let edge = settle_follow(FollowWrite::AlreadyFollowing, 2, "a", "b").unwrap();
    assert_eq!(edge.follower_id, "a");
    assert_eq!(edge.following_id, "b");
  }

  #[test]
  fn created_edge_passes_through() {
    let edge = FollowEdge {
      follower_id:  "a".into(),
      following_id: "b".into(),
      created_at:   Utc::now(),
    };
    let out = settle_follow(FollowWrite::Created(edge.clone()), 3, "a", "b").unwrap();
    assert_eq!(out, edge);
  }
}
