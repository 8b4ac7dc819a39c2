use chrono::NaiveDate;
use sitedir_core::{
  Error,
  engagement::{NewTarget, SessionToken, ViewerId},
  notification::{NotificationQuery, NotificationType},
};

use super::{add_site, add_user, assert_consistent, engine};

// ─── Targets ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn registering_twice_is_a_conflict() {
  let e = engine().await;
  add_site(&e, "w1", "owner").await;

  let again = e
    .counters
    .register_target(NewTarget {
      target_id: "w1".into(),
      owner_id:  "someone-else".into(),
      title:     "Copy".into(),
      url:       "https://copy.example".into(),
    })
    .await;
  assert!(matches!(again, Err(Error::TargetExists(id)) if id == "w1"));
  assert_eq!(e.counters.target("w1").await.unwrap().owner_id, "owner");
}

#[tokio::test]
async fn unknown_target_is_not_found() {
  let e = engine().await;
  assert!(matches!(e.counters.target("nope").await, Err(Error::TargetNotFound(_))));
  assert!(matches!(
    e.counters.toggle_like("nope", "u").await,
    Err(Error::TargetNotFound(_))
  ));
}

// ─── Likes ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn toggling_twice_restores_original_state() {
  let e = engine().await;
  add_site(&e, "w1", "owner").await;

  let first = e.counters.toggle_like("w1", "u1").await.unwrap();
  assert!(first.liked);
  assert_eq!(first.new_count, 1);
  assert!(e.counters.has_liked("w1", "u1").await.unwrap());

  let second = e.counters.toggle_like("w1", "u1").await.unwrap();
  assert!(!second.liked);
  assert_eq!(second.new_count, 0);
  assert!(!e.counters.has_liked("w1", "u1").await.unwrap());

  assert_consistent(&e).await;
}

#[tokio::test]
async fn concurrent_likes_from_different_users_both_count() {
  let e = engine().await;
  add_site(&e, "w1", "owner").await;

  let (a, b) = tokio::join!(
    e.counters.toggle_like("w1", "u1"),
    e.counters.toggle_like("w1", "u2"),
  );
  assert!(a.unwrap().liked);
  assert!(b.unwrap().liked);

  assert_eq!(e.counters.target("w1").await.unwrap().likes, 2);
  assert_consistent(&e).await;
}

#[tokio::test]
async fn concurrent_toggles_from_same_user_keep_counter_exact() {
  let e = engine().await;
  add_site(&e, "w1", "owner").await;

  let (a, b, c) = tokio::join!(
    e.counters.toggle_like("w1", "u1"),
    e.counters.toggle_like("w1", "u1"),
    e.counters.toggle_like("w1", "u1"),
  );
  a.unwrap();
  b.unwrap();
  c.unwrap();

  let likes = e.counters.target("w1").await.unwrap().likes;
  let liked = e.counters.has_liked("w1", "u1").await.unwrap();
  assert_eq!(likes, u64::from(liked));
  assert_consistent(&e).await;
}

#[tokio::test]
async fn like_notifies_owner_but_unlike_does_not() {
  let e = engine().await;
  add_site(&e, "w1", "owner").await;
  add_user(&e, "fan", "Fan").await;

  e.counters.toggle_like("w1", "fan").await.unwrap();
  e.counters.toggle_like("w1", "fan").await.unwrap();

  let inbox = e.inbox.list("owner", &NotificationQuery::default()).await.unwrap();
  assert_eq!(inbox.len(), 1);
  assert_eq!(inbox[0].kind, NotificationType::Like);
  assert_eq!(inbox[0].message, "Fan liked Site w1");
  assert_eq!(inbox[0].payload["targetId"], "w1");
}

#[tokio::test]
async fn owner_liking_own_site_is_not_notified() {
  let e = engine().await;
  add_site(&e, "w1", "owner").await;

  e.counters.toggle_like("w1", "owner").await.unwrap();
  assert_eq!(e.inbox.unread_count("owner").await.unwrap(), 0);
}

// ─── Views ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn repeated_views_count_once() {
  let e = engine().await;
  add_site(&e, "w1", "owner").await;
  let viewer = ViewerId::User("u1".into());

  let mut counted = 0;
  for _ in 0..5 {
    if e.counters.record_view("w1", &viewer).await.unwrap() {
      counted += 1;
    }
  }
  assert_eq!(counted, 1);
  assert_eq!(e.counters.target("w1").await.unwrap().views, 1);
}

#[tokio::test]
async fn anonymous_sessions_are_deduplicated_separately() {
  let e = engine().await;
  add_site(&e, "w1", "owner").await;
  let day = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();

  let s1 = ViewerId::Session(SessionToken::generate());
  let s2 = ViewerId::Session(SessionToken::generate());
  assert!(e.counters.record_view_on("w1", &s1, day).await.unwrap());
  assert!(!e.counters.record_view_on("w1", &s1, day).await.unwrap());
  assert!(e.counters.record_view_on("w1", &s2, day).await.unwrap());
  assert!(
    e.counters
      .record_view_on("w1", &s1, day.succ_opt().unwrap())
      .await
      .unwrap()
  );

  assert_eq!(e.counters.target("w1").await.unwrap().views, 3);
  assert_consistent(&e).await;
}

#[tokio::test]
async fn concurrent_views_by_one_viewer_count_once() {
  let e = engine().await;
  add_site(&e, "w1", "owner").await;
  let viewer = ViewerId::User("u1".into());

  let (a, b) = tokio::join!(
    e.counters.record_view("w1", &viewer),
    e.counters.record_view("w1", &viewer),
  );
  assert_eq!(u8::from(a.unwrap()) + u8::from(b.unwrap()), 1);
  assert_eq!(e.counters.target("w1").await.unwrap().views, 1);
}

#[tokio::test]
async fn view_on_missing_target_is_not_found() {
  let e = engine().await;
  let viewer = ViewerId::User("u1".into());
  assert!(matches!(
    e.counters.record_view("nope", &viewer).await,
    Err(Error::TargetNotFound(_))
  ));
}
