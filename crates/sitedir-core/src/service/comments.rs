//! Comment thread manager.

use std::sync::Arc;

use uuid::Uuid;

use crate::{
  Error, Result,
  comment::{
    Comment, CommentDelete, CommentEdit, CommentThread, CommentWrite, MAX_VISIBLE_DEPTH,
    NewComment, build_threads, flatten_below, validate_content,
  },
  engagement::LikeToggle,
  notification::{NotificationEvent, NotificationType},
  service::{Dispatcher, RetryPolicy, owner_event, require_id},
  store::EngagementStore,
};

pub struct CommentThreads<S> {
  store:  Arc<S>,
  retry:  RetryPolicy,
  notify: Dispatcher<S>,
}

impl<S> CommentThreads<S>
where
  S: EngagementStore + 'static,
{
  pub fn new(store: Arc<S>, retry: RetryPolicy, notify: Dispatcher<S>) -> Self {
    Self { store, retry, notify }
  }

  /// Post a comment (or a reply when `parent_id` is set) and bump the
  /// target's comment count.
  ///
  /// Not retried: there is no dedup key, so a repeat would post twice.
  pub async fn add(
    &self,
    target_id: &str,
    user_id: &str,
    content: &str,
    parent_id: Option<Uuid>,
  ) -> Result<Comment> {
    require_id("user id", user_id)?;
    let content = validate_content(content)?;

    let author = self
      .retry
      .run("get_user_profile", || self.store.get_user_profile(user_id))
      .await
      .map_err(Error::from_store)?;

    let input = NewComment {
      target_id: target_id.to_owned(),
      parent_id,
      user_id: user_id.to_owned(),
      user_name: author.as_ref().map(|a| a.display_name.clone()),
      user_photo: author.and_then(|a| a.photo_url),
      content,
    };
    let comment = match self
      .store
      .insert_comment(input)
      .await
      .map_err(Error::from_store)?
    {
      CommentWrite::Created(c) => c,
      CommentWrite::TargetNotFound => {
        return Err(Error::TargetNotFound(target_id.to_owned()));
      }
      CommentWrite::ParentNotFound => {
        // `parent_id` is necessarily set here.
        return Err(Error::ParentNotFound(parent_id.unwrap_or_default()));
      }
    };
    tracing::info!(comment_id = %comment.comment_id, target_id, user_id, "comment added");

    self.notify_new_comment(&comment).await;
    Ok(comment)
  }

  /// Like or un-like a comment on behalf of `user_id`.
  pub async fn toggle_like(&self, comment_id: Uuid, user_id: &str) -> Result<LikeToggle> {
    require_id("user id", user_id)?;

    let write = self
      .store
      .toggle_comment_like(comment_id, user_id)
      .await
      .map_err(Error::from_store)?
      .ok_or(Error::CommentNotFound(comment_id))?;

    if write.toggle.liked {
      let event = NotificationEvent::new(NotificationType::CommentLike, write.comment.user_id.clone())
        .from_sender(user_id)
        .on_target(write.comment.target_id.clone(), None)
        .on_comment(comment_id, &write.comment.content);
      self.notify.trigger(event).await;
    }
    Ok(write.toggle)
  }

  /// Replace the text of a comment. Only its author may edit it.
  pub async fn edit(&self, comment_id: Uuid, user_id: &str, content: &str) -> Result<Comment> {
    let content = validate_content(content)?;
    let outcome = self
      .retry
      .run("update_comment_content", || {
        self.store.update_comment_content(comment_id, user_id, content.clone())
      })
      .await
      .map_err(Error::from_store)?;

    match outcome {
      CommentEdit::Updated(comment) => Ok(comment),
      CommentEdit::NotFound => Err(Error::CommentNotFound(comment_id)),
      CommentEdit::NotAuthorized => Err(Error::NotAuthorized(comment_id)),
    }
  }

  /// Delete a comment as its author or as a moderator.
  ///
  /// A comment that has replies is kept as a tombstone so the replies stay
  /// attached; either way it stops counting towards the target's total.
  pub async fn delete(
    &self,
    comment_id: Uuid,
    requester_id: &str,
    is_moderator: bool,
  ) -> Result<()> {
    let outcome = self
      .retry
      .run("delete_comment", || {
        self.store.delete_comment(comment_id, requester_id, is_moderator)
      })
      .await
      .map_err(Error::from_store)?;

    match outcome {
      CommentDelete::Removed(c) => {
        tracing::info!(%comment_id, target_id = %c.target_id, requester_id, is_moderator, "comment removed");
        Ok(())
      }
      CommentDelete::Tombstoned(c) => {
        tracing::info!(%comment_id, target_id = %c.target_id, requester_id, is_moderator, "comment tombstoned");
        Ok(())
      }
      CommentDelete::NotFound => Err(Error::CommentNotFound(comment_id)),
      CommentDelete::NotAuthorized => Err(Error::NotAuthorized(comment_id)),
    }
  }

  pub async fn get(&self, comment_id: Uuid) -> Result<Comment> {
    self
      .retry
      .run("get_comment", || self.store.get_comment(comment_id))
      .await
      .map_err(Error::from_store)?
      .ok_or(Error::CommentNotFound(comment_id))
  }

  /// Visible comments on a target, flat and oldest first.
  pub async fn list(&self, target_id: &str) -> Result<Vec<Comment>> {
    self
      .retry
      .run("list_comments", || self.store.list_comments(target_id))
      .await
      .map_err(Error::from_store)
  }

  /// Visible comments on a target as reply trees, capped at the visible
  /// nesting depth.
  pub async fn threads(&self, target_id: &str) -> Result<Vec<CommentThread>> {
    let flat = self.list(target_id).await?;
    Ok(flatten_below(build_threads(flat), MAX_VISIBLE_DEPTH))
  }

  /// Replies go to the parent's author, top-level comments to the target's
  /// owner.
  async fn notify_new_comment(&self, comment: &Comment) {
    let event = match comment.parent_id {
      Some(parent_id) => match self.store.get_comment(parent_id).await {
        Ok(Some(parent)) if !parent.is_deleted => Some(
          NotificationEvent::new(NotificationType::Reply, parent.user_id)
            .from_sender(comment.user_id.clone())
            .on_target(comment.target_id.clone(), None),
        ),
        Ok(_) => None,
        Err(e) => {
          tracing::warn!(%parent_id, error = %e, "could not resolve parent author for notification");
          None
        }
      },
      None => {
        owner_event(
          self.store.as_ref(),
          &comment.target_id,
          NotificationType::Comment,
          &comment.user_id,
        )
        .await
      }
    };

    if let Some(event) = event {
      self
        .notify
        .trigger(event.on_comment(comment.comment_id, &comment.content))
        .await;
    }
  }
}
