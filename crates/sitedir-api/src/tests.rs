//! Router tests against an in-memory SQLite store.

use std::sync::Arc;

use axum::{
  Router,
  body::Body,
  http::{Request, StatusCode},
};
use serde_json::{Value, json};
use sitedir_core::service::{Engine, EngineConfig, NotificationConfig, RetryPolicy};
use sitedir_store_sqlite::SqliteStore;
use tower::ServiceExt;

use crate::{
  api_router,
  caller::{MODERATOR_HEADER, SESSION_HEADER, USER_ID_HEADER},
};

async fn app() -> Router {
  let store = SqliteStore::open_in_memory().await.unwrap();
  let config = EngineConfig {
    retry:         RetryPolicy::once(),
    notifications: NotificationConfig { background: false },
  };
  api_router(Arc::new(Engine::new(Arc::new(store), config)))
}

async fn send(
  app:     &Router,
  method:  &str,
  uri:     &str,
  headers: &[(&str, &str)],
  body:    Option<Value>,
) -> (StatusCode, Value) {
  let mut builder = Request::builder().method(method).uri(uri);
  for (k, v) in headers {
    builder = builder.header(*k, *v);
  }
  let req = match body {
    Some(b) => builder
      .header("content-type", "application/json")
      .body(Body::from(b.to_string()))
      .unwrap(),
    None => builder.body(Body::empty()).unwrap(),
  };
  let resp = app.clone().oneshot(req).await.unwrap();
  let status = resp.status();
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  let json = if bytes.is_empty() {
    Value::Null
  } else {
    serde_json::from_slice(&bytes).unwrap()
  };
  (status, json)
}

fn as_user(user_id: &str) -> [(&str, &str); 1] { [(USER_ID_HEADER, user_id)] }

async fn register(app: &Router, owner: &str, target_id: &str) {
  let (status, _) = send(
    app,
    "POST",
    "/targets",
    &as_user(owner),
    Some(json!({
      "targetId": target_id,
      "title": format!("Site {target_id}"),
      "url": format!("https://{target_id}.example"),
    })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
}

// ── Identity ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn writes_without_identity_are_401() {
  let app = app().await;
  let (status, body) = send(&app, "POST", "/users/b/follow", &[], None).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
  assert_eq!(body["kind"], "unauthenticated");
}

// ── Targets ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn register_then_duplicate_is_409() {
  let app = app().await;
  register(&app, "owner", "w1").await;

  let (status, body) = send(
    &app,
    "POST",
    "/targets",
    &as_user("owner"),
    Some(json!({ "targetId": "w1", "title": "again", "url": "https://x" })),
  )
  .await;
  assert_eq!(status, StatusCode::CONFLICT);
  assert_eq!(body["kind"], "conflict");

  let (status, body) = send(&app, "GET", "/targets/w1", &[], None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["ownerId"], "owner");
  assert_eq!(body["likes"], 0);
}

#[tokio::test]
async fn unknown_target_is_404() {
  let app = app().await;
  let (status, body) = send(&app, "GET", "/targets/nope", &[], None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert_eq!(body["kind"], "not_found");
}

#[tokio::test]
async fn like_toggles_and_reports_state() {
  let app = app().await;
  register(&app, "owner", "w1").await;

  let (_, body) = send(&app, "POST", "/targets/w1/like", &as_user("fan"), None).await;
  assert_eq!(body, json!({ "liked": true, "newCount": 1 }));
  let (_, body) = send(&app, "GET", "/targets/w1/like", &as_user("fan"), None).await;
  assert_eq!(body["liked"], true);

  let (_, body) = send(&app, "POST", "/targets/w1/like", &as_user("fan"), None).await;
  assert_eq!(body, json!({ "liked": false, "newCount": 0 }));
}

#[tokio::test]
async fn anonymous_view_issues_and_honours_session_token() {
  let app = app().await;
  register(&app, "owner", "w1").await;

  let (status, body) = send(&app, "POST", "/targets/w1/views", &[], None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["counted"], true);
  let token = body["sessionToken"].as_str().unwrap().to_owned();

  let (_, body) = send(
    &app,
    "POST",
    "/targets/w1/views",
    &[(SESSION_HEADER, token.as_str())],
    None,
  )
  .await;
  assert_eq!(body["counted"], false);
  assert!(body.get("sessionToken").is_some());

  let (_, body) = send(&app, "POST", "/targets/w1/views", &as_user("u1"), None).await;
  assert_eq!(body["counted"], true);
  assert!(body.get("sessionToken").is_none());

  let (_, target) = send(&app, "GET", "/targets/w1", &[], None).await;
  assert_eq!(target["views"], 2);
}

#[tokio::test]
async fn malformed_session_token_is_400() {
  let app = app().await;
  register(&app, "owner", "w1").await;
  let (status, _) = send(
    &app,
    "POST",
    "/targets/w1/views",
    &[(SESSION_HEADER, "10.0.0.1")],
    None,
  )
  .await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

// ── Follows ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn follow_flow_over_http() {
  let app = app().await;

  let (status, body) = send(&app, "POST", "/users/b/follow", &as_user("a"), None).await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(body["followerId"], "a");
  assert_eq!(body["followingId"], "b");

  let (status, _) = send(&app, "POST", "/users/b/follow", &as_user("a"), None).await;
  assert_eq!(status, StatusCode::CONFLICT);

  let (status, _) = send(&app, "POST", "/users/a/follow", &as_user("a"), None).await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

  let (_, stats) = send(&app, "GET", "/users/b/follow-stats", &[], None).await;
  assert_eq!(stats["followersCount"], 1);

  let (_, status_body) = send(&app, "GET", "/users/a/follow-status/b", &[], None).await;
  assert_eq!(status_body["isFollowing"], true);
  assert_eq!(status_body["isFollowedBy"], false);

  let (_, followers) = send(&app, "GET", "/users/b/followers?limit=10", &[], None).await;
  assert_eq!(followers.as_array().unwrap().len(), 1);

  let (status, _) = send(&app, "DELETE", "/users/b/follow", &as_user("a"), None).await;
  assert_eq!(status, StatusCode::NO_CONTENT);
  let (status, _) = send(&app, "DELETE", "/users/b/follow", &as_user("a"), None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

// ── Ratings ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn rating_submit_replace_and_delete() {
  let app = app().await;
  register(&app, "owner", "w1").await;

  let (status, body) = send(
    &app,
    "PUT",
    "/targets/w1/ratings",
    &as_user("u1"),
    Some(json!({ "rating": 4, "review": "nice" })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(body["stats"]["totalRatings"], 1);
  let rating_id = body["rating"]["ratingId"].as_str().unwrap().to_owned();

  let (status, body) = send(
    &app,
    "PUT",
    "/targets/w1/ratings",
    &as_user("u1"),
    Some(json!({ "rating": 2 })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["isNew"], false);
  assert_eq!(body["stats"]["averageRating"], 2.0);

  let (status, _) = send(
    &app,
    "PUT",
    "/targets/w1/ratings",
    &as_user("u1"),
    Some(json!({ "rating": 6 })),
  )
  .await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

  let (_, mine) = send(&app, "GET", "/targets/w1/ratings/mine", &as_user("u1"), None).await;
  assert_eq!(mine["rating"], 2);

  let uri = format!("/targets/w1/ratings/{rating_id}");
  let (status, _) = send(&app, "DELETE", &uri, &as_user("intruder"), None).await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let (status, stats) = send(&app, "DELETE", &uri, &as_user("u1"), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(stats["totalRatings"], 0);
  assert_eq!(stats["averageRating"], 0.0);
}

#[tokio::test]
async fn rating_list_filters_by_star() {
  let app = app().await;
  register(&app, "owner", "w1").await;
  for (user, value) in [("a", 5), ("b", 3), ("c", 5)] {
    send(
      &app,
      "PUT",
      "/targets/w1/ratings",
      &as_user(user),
      Some(json!({ "rating": value })),
    )
    .await;
  }

  let (_, list) = send(&app, "GET", "/targets/w1/ratings?rating=5&sort=oldest", &[], None).await;
  let users: Vec<_> = list
    .as_array()
    .unwrap()
    .iter()
    .map(|r| r["userId"].as_str().unwrap().to_owned())
    .collect();
  assert_eq!(users, ["a", "c"]);
}

// ── Comments ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn comment_thread_over_http() {
  let app = app().await;
  register(&app, "owner", "w1").await;

  let (status, root) = send(
    &app,
    "POST",
    "/targets/w1/comments",
    &as_user("u1"),
    Some(json!({ "content": "first!" })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  let root_id = root["commentId"].as_str().unwrap().to_owned();

  let (status, _) = send(
    &app,
    "POST",
    "/targets/w1/comments",
    &as_user("u2"),
    Some(json!({ "content": "reply", "parentId": root_id })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);

  let (_, threads) = send(&app, "GET", "/targets/w1/comments", &[], None).await;
  let threads = threads.as_array().unwrap();
  assert_eq!(threads.len(), 1);
  assert_eq!(threads[0]["replyCount"], 1);
  assert_eq!(threads[0]["replies"][0]["depth"], 1);

  let (_, flat) = send(&app, "GET", "/targets/w1/comments?flat=true", &[], None).await;
  assert_eq!(flat.as_array().unwrap().len(), 2);

  let (status, _) = send(
    &app,
    "POST",
    "/targets/w1/comments",
    &as_user("u1"),
    Some(json!({ "content": "" })),
  )
  .await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn comment_edit_and_delete_permissions() {
  let app = app().await;
  register(&app, "owner", "w1").await;
  let (_, c) = send(
    &app,
    "POST",
    "/targets/w1/comments",
    &as_user("author"),
    Some(json!({ "content": "hello" })),
  )
  .await;
  let uri = format!("/comments/{}", c["commentId"].as_str().unwrap());

  let (status, _) = send(
    &app,
    "PATCH",
    &uri,
    &as_user("other"),
    Some(json!({ "content": "hijack" })),
  )
  .await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let (status, body) = send(
    &app,
    "PATCH",
    &uri,
    &as_user("author"),
    Some(json!({ "content": "hello again" })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["content"], "hello again");

  let (status, _) = send(&app, "DELETE", &uri, &as_user("other"), None).await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let (status, _) = send(
    &app,
    "DELETE",
    &uri,
    &[(USER_ID_HEADER, "mod"), (MODERATOR_HEADER, "true")],
    None,
  )
  .await;
  assert_eq!(status, StatusCode::NO_CONTENT);

  let (_, target) = send(&app, "GET", "/targets/w1", &[], None).await;
  assert_eq!(target["commentCount"], 0);
}

// ── Notifications ────────────────────────────────────────────────────────────

#[tokio::test]
async fn inbox_is_scoped_to_the_caller() {
  let app = app().await;
  send(&app, "POST", "/users/b/follow", &as_user("a"), None).await;

  let (_, count) = send(&app, "GET", "/notifications/unread-count", &as_user("b"), None).await;
  assert_eq!(count["count"], 1);
  let (_, other) = send(&app, "GET", "/notifications", &as_user("a"), None).await;
  assert!(other.as_array().unwrap().is_empty());

  let (_, inbox) = send(&app, "GET", "/notifications", &as_user("b"), None).await;
  let id = inbox[0]["notificationId"].as_str().unwrap().to_owned();
  assert_eq!(inbox[0]["type"], "follow");

  let read_uri = format!("/notifications/{id}/read");
  let (status, _) = send(&app, "POST", &read_uri, &as_user("a"), None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  let (status, _) = send(&app, "POST", &read_uri, &as_user("b"), None).await;
  assert_eq!(status, StatusCode::NO_CONTENT);

  let (_, unread) = send(&app, "GET", "/notifications?unreadOnly=true", &as_user("b"), None).await;
  assert!(unread.as_array().unwrap().is_empty());

  let (status, _) = send(&app, "DELETE", &format!("/notifications/{id}"), &as_user("b"), None).await;
  assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn preferences_round_trip_and_suppress() {
  let app = app().await;

  let (_, prefs) = send(&app, "GET", "/notifications/preferences", &as_user("b"), None).await;
  assert_eq!(prefs["follow"], true);

  let (status, _) = send(
    &app,
    "PUT",
    "/notifications/preferences",
    &as_user("b"),
    Some(json!({ "follow": false })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);

  send(&app, "POST", "/users/b/follow", &as_user("a"), None).await;
  let (_, count) = send(&app, "GET", "/notifications/unread-count", &as_user("b"), None).await;
  assert_eq!(count["count"], 0);
}

#[tokio::test]
async fn trigger_uses_caller_as_sender() {
  let app = app().await;
  let (status, _) = send(
    &app,
    "POST",
    "/notifications",
    &as_user("a"),
    Some(json!({ "type": "like", "recipientId": "b", "senderId": "spoofed" })),
  )
  .await;
  assert_eq!(status, StatusCode::ACCEPTED);

  let (_, inbox) = send(&app, "GET", "/notifications", &as_user("b"), None).await;
  assert_eq!(inbox[0]["senderId"], "a");

  let (_, read_all) = send(&app, "POST", "/notifications/read-all", &as_user("b"), None).await;
  assert_eq!(read_all["updated"], 1);
}

#[tokio::test]
async fn trigger_resolves_display_text_server_side() {
  let app = app().await;
  register(&app, "owner", "w1").await;

  let (status, _) = send(
    &app,
    "POST",
    "/notifications",
    &as_user("a"),
    Some(json!({
      "type": "like",
      "recipientId": "b",
      "targetId": "w1",
      "targetTitle": "Claim your prize",
    })),
  )
  .await;
  assert_eq!(status, StatusCode::ACCEPTED);

  let (_, inbox) = send(&app, "GET", "/notifications", &as_user("b"), None).await;
  let message = inbox[0]["message"].as_str().unwrap();
  assert!(message.contains("Site w1"), "message: {message}");
  assert!(!message.contains("prize"), "message: {message}");

  let (status, _) = send(
    &app,
    "POST",
    "/notifications",
    &as_user("a"),
    Some(json!({ "type": "like", "recipientId": "b", "targetId": "nope" })),
  )
  .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

// ── Profiles ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn profile_is_self_service() {
  let app = app().await;
  let body = json!({ "displayName": "Ada" });

  let (status, _) = send(&app, "PUT", "/users/ada/profile", &as_user("eve"), Some(body.clone())).await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let (status, _) = send(&app, "GET", "/users/ada/profile", &[], None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  let (status, _) = send(&app, "PUT", "/users/ada/profile", &as_user("ada"), Some(body)).await;
  assert_eq!(status, StatusCode::OK);
  let (_, profile) = send(&app, "GET", "/users/ada/profile", &[], None).await;
  assert_eq!(profile["displayName"], "Ada");
}
