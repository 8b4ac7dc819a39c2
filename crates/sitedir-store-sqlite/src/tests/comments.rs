use sitedir_core::{
  Error, ErrorKind,
  comment::MAX_VISIBLE_DEPTH,
  notification::{NotificationQuery, NotificationType},
};
use uuid::Uuid;

use super::{add_site, add_user, assert_consistent, engine};

#[tokio::test]
async fn reply_nests_under_parent() {
  let e = engine().await;
  add_site(&e, "t", "owner").await;

  let a = e.comments.add("t", "u1", "First!", None).await.unwrap();
  let b = e.comments.add("t", "u2", "Replying to you", Some(a.comment_id)).await.unwrap();
  e.comments.add("t", "u3", "Another root", None).await.unwrap();

  let threads = e.comments.threads("t").await.unwrap();
  assert_eq!(threads.len(), 2);
  assert_eq!(threads[0].comment.comment_id, a.comment_id);
  assert_eq!(threads[0].replies.len(), 1);
  assert_eq!(threads[0].replies[0].comment.comment_id, b.comment_id);
  assert_eq!(threads[0].reply_count, 1);

  assert_eq!(e.counters.target("t").await.unwrap().comment_count, 3);
}

#[tokio::test]
async fn content_bounds_are_enforced() {
  let e = engine().await;
  add_site(&e, "t", "owner").await;

  let short = e.comments.add("t", "u", "  hi ", None).await.unwrap_err();
  assert!(matches!(short, Error::ContentTooShort { .. }));
  assert_eq!(short.kind(), ErrorKind::Validation);

  let long = "x".repeat(1001);
  assert!(matches!(
    e.comments.add("t", "u", &long, None).await,
    Err(Error::ContentTooLong { .. })
  ));

  let stored = e.comments.add("t", "u", "  trimmed  ", None).await.unwrap();
  assert_eq!(stored.content, "trimmed");
  assert_eq!(e.counters.target("t").await.unwrap().comment_count, 1);
}

#[tokio::test]
async fn reply_to_missing_parent_is_rejected() {
  let e = engine().await;
  add_site(&e, "t", "owner").await;
  add_site(&e, "other", "owner").await;
  let elsewhere = e.comments.add("other", "u", "On another site", None).await.unwrap();

  assert!(matches!(
    e.comments.add("t", "u", "Hello there", Some(Uuid::new_v4())).await,
    Err(Error::ParentNotFound(_))
  ));
  assert!(matches!(
    e.comments.add("t", "u", "Hello there", Some(elsewhere.comment_id)).await,
    Err(Error::ParentNotFound(_))
  ));
  assert!(matches!(
    e.comments.add("ghost", "u", "Hello there", None).await,
    Err(Error::TargetNotFound(_))
  ));
  assert_eq!(e.counters.target("t").await.unwrap().comment_count, 0);
}

#[tokio::test]
async fn author_profile_is_denormalised() {
  let e = engine().await;
  add_site(&e, "t", "owner").await;
  add_user(&e, "u", "Uma").await;

  let c = e.comments.add("t", "u", "Nice work", None).await.unwrap();
  assert_eq!(c.user_name.as_deref(), Some("Uma"));

  let anonymous = e.comments.add("t", "nobody", "Nice work", None).await.unwrap();
  assert_eq!(anonymous.user_name, None);
}

#[tokio::test]
async fn comment_like_toggles_and_tracks_likers() {
  let e = engine().await;
  add_site(&e, "t", "owner").await;
  let c = e.comments.add("t", "author", "Like me", None).await.unwrap();

  let first = e.comments.toggle_like(c.comment_id, "fan").await.unwrap();
  assert!(first.liked);
  assert_eq!(first.new_count, 1);
  let second = e.comments.toggle_like(c.comment_id, "fan2").await.unwrap();
  assert_eq!(second.new_count, 2);
  let undo = e.comments.toggle_like(c.comment_id, "fan").await.unwrap();
  assert!(!undo.liked);
  assert_eq!(undo.new_count, 1);

  let stored = e.comments.get(c.comment_id).await.unwrap();
  assert_eq!(stored.likes, 1);
  assert!(stored.liked_by.contains("fan2"));
  assert!(!stored.liked_by.contains("fan"));

  assert!(matches!(
    e.comments.toggle_like(Uuid::new_v4(), "fan").await,
    Err(Error::CommentNotFound(_))
  ));
}

#[tokio::test]
async fn concurrent_comment_likes_all_count() {
  let e = engine().await;
  add_site(&e, "t", "owner").await;
  let c = e.comments.add("t", "author", "Popular", None).await.unwrap();

  let (a, b, d) = tokio::join!(
    e.comments.toggle_like(c.comment_id, "a"),
    e.comments.toggle_like(c.comment_id, "b"),
    e.comments.toggle_like(c.comment_id, "d"),
  );
  a.unwrap();
  b.unwrap();
  d.unwrap();

  let stored = e.comments.get(c.comment_id).await.unwrap();
  assert_eq!(stored.likes, 3);
  assert_eq!(stored.liked_by.len(), 3);
}

#[tokio::test]
async fn only_author_may_edit() {
  let e = engine().await;
  add_site(&e, "t", "owner").await;
  let c = e.comments.add("t", "author", "Original", None).await.unwrap();

  let edited = e.comments.edit(c.comment_id, "author", "Revised text").await.unwrap();
  assert_eq!(edited.content, "Revised text");
  assert!(edited.updated_at >= c.updated_at);

  let err = e.comments.edit(c.comment_id, "other", "Hijacked").await.unwrap_err();
  assert!(matches!(err, Error::NotAuthorized(_)));
  assert_eq!(e.comments.get(c.comment_id).await.unwrap().content, "Revised text");
}

#[tokio::test]
async fn delete_requires_author_or_moderator() {
  let e = engine().await;
  add_site(&e, "t", "owner").await;
  let c = e.comments.add("t", "author", "Remove me", None).await.unwrap();

  let err = e.comments.delete(c.comment_id, "stranger", false).await.unwrap_err();
  assert!(matches!(err, Error::NotAuthorized(_)));
  assert_eq!(err.kind(), ErrorKind::Authorization);

  e.comments.delete(c.comment_id, "mod", true).await.unwrap();
  assert!(matches!(e.comments.get(c.comment_id).await, Err(Error::CommentNotFound(_))));
  assert_eq!(e.counters.target("t").await.unwrap().comment_count, 0);

  assert!(matches!(
    e.comments.delete(c.comment_id, "author", false).await,
    Err(Error::CommentNotFound(_))
  ));
}

#[tokio::test]
async fn deleting_a_parent_keeps_its_replies() {
  let e = engine().await;
  add_site(&e, "t", "owner").await;
  let parent = e.comments.add("t", "author", "Parent text", None).await.unwrap();
  e.comments.toggle_like(parent.comment_id, "fan").await.unwrap();
  let reply = e.comments.add("t", "replier", "Child text", Some(parent.comment_id)).await.unwrap();

  e.comments.delete(parent.comment_id, "author", false).await.unwrap();

  let tomb = e.comments.get(parent.comment_id).await.unwrap();
  assert!(tomb.is_deleted);
  assert!(tomb.content.is_empty());
  assert_eq!(tomb.likes, 0);
  assert!(matches!(
    e.comments.toggle_like(parent.comment_id, "fan").await,
    Err(Error::CommentNotFound(_))
  ));

  let threads = e.comments.threads("t").await.unwrap();
  assert_eq!(threads.len(), 1);
  assert_eq!(threads[0].replies[0].comment.comment_id, reply.comment_id);
  assert_eq!(e.counters.target("t").await.unwrap().comment_count, 1);
  assert_consistent(&e).await;

  // With its last reply gone the tombstone goes too.
  e.comments.delete(reply.comment_id, "replier", false).await.unwrap();
  assert!(e.comments.list("t").await.unwrap().is_empty());
  assert_eq!(e.counters.target("t").await.unwrap().comment_count, 0);
  assert_consistent(&e).await;
}

#[tokio::test]
async fn tombstone_accepts_no_new_replies() {
  let e = engine().await;
  add_site(&e, "t", "owner").await;
  let parent = e.comments.add("t", "author", "Parent text", None).await.unwrap();
  e.comments.add("t", "replier", "Child text", Some(parent.comment_id)).await.unwrap();
  e.comments.delete(parent.comment_id, "author", false).await.unwrap();
  assert_eq!(e.counters.target("t").await.unwrap().comment_count, 1);

  let late = e.comments.add("t", "late", "reply to a deleted comment", Some(parent.comment_id)).await;
  assert!(matches!(late, Err(Error::ParentNotFound(id)) if id == parent.comment_id));

  assert_eq!(e.counters.target("t").await.unwrap().comment_count, 1);
  assert_eq!(e.comments.list("t").await.unwrap().len(), 2);
  assert_consistent(&e).await;
}

#[tokio::test]
async fn deep_replies_are_flattened_into_last_visible_level() {
  let e = engine().await;
  add_site(&e, "t", "owner").await;

  let mut parent = None;
  let mut ids = Vec::new();
  for depth in 0..=MAX_VISIBLE_DEPTH + 2 {
    let c = e
      .comments
      .add("t", "u", &format!("Level {depth}"), parent)
      .await
      .unwrap();
    ids.push(c.comment_id);
    parent = Some(c.comment_id);
  }

  let threads = e.comments.threads("t").await.unwrap();
  let mut node = &threads[0];
  while let Some(child) = node.replies.first() {
    assert!(child.depth < MAX_VISIBLE_DEPTH);
    node = child;
  }
  assert_eq!(node.depth, MAX_VISIBLE_DEPTH - 1);

  let mut seen = 0;
  let mut stack = vec![&threads[0]];
  while let Some(t) = stack.pop() {
    seen += 1;
    stack.extend(t.replies.iter());
  }
  assert_eq!(seen, ids.len());
}

#[tokio::test]
async fn comment_notifications_reach_owner_and_parent_author() {
  let e = engine().await;
  add_site(&e, "t", "owner").await;
  add_user(&e, "bo", "Bo").await;

  let root = e.comments.add("t", "author", "Root comment", None).await.unwrap();
  e.comments.add("t", "bo", "A thoughtful reply", Some(root.comment_id)).await.unwrap();
  e.comments.toggle_like(root.comment_id, "bo").await.unwrap();

  let owner = e.inbox.list("owner", &NotificationQuery::default()).await.unwrap();
  assert_eq!(owner.len(), 1);
  assert_eq!(owner[0].kind, NotificationType::Comment);

  let author = e.inbox.list("author", &NotificationQuery::default()).await.unwrap();
  let kinds: Vec<_> = author.iter().map(|n| n.kind).collect();
  assert_eq!(kinds, [NotificationType::CommentLike, NotificationType::Reply]);
  assert_eq!(author[1].message, "Bo replied to your comment: \"A thoughtful reply\"");
}
