//! Handlers for the caller's notification inbox.
//!
//! Every route is scoped to the caller; there is no way to read or modify
//! another user's notifications.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/notifications` | `?unreadOnly=true&limit=` |
//! | `POST`   | `/notifications` | Raise an event as the caller; 202 |
//! | `GET`    | `/notifications/unread-count` | |
//! | `POST`   | `/notifications/read-all` | Returns `{"updated": n}` |
//! | `POST`   | `/notifications/{id}/read` | 204 |
//! | `DELETE` | `/notifications/{id}` | 204 |
//! | `GET`    | `/notifications/preferences` | |
//! | `PUT`    | `/notifications/preferences` | Full replacement |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use sitedir_core::{
  notification::{
    Notification, NotificationEvent, NotificationPreferences, NotificationQuery,
    NotificationType,
  },
  rating::validate_rating,
  service::Engine,
  store::EngagementStore,
};
use uuid::Uuid;

use crate::{caller::Caller, error::ApiError};

// ─── Inbox ───────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
  #[serde(default)]
  pub unread_only: bool,
  pub limit:       Option<usize>,
}

/// `GET /notifications`
pub async fn list<S>(
  State(engine): State<Arc<Engine<S>>>,
  caller: Caller,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Notification>>, ApiError>
where
  S: EngagementStore + 'static,
{
  let query = NotificationQuery { unread_only: params.unread_only, limit: params.limit };
  Ok(Json(engine.inbox.list(&caller.user_id, &query).await?))
}

/// `GET /notifications/unread-count`
pub async fn unread_count<S>(
  State(engine): State<Arc<Engine<S>>>,
  caller: Caller,
) -> Result<impl IntoResponse, ApiError>
where
  S: EngagementStore + 'static,
{
  let count = engine.inbox.unread_count(&caller.user_id).await?;
  Ok(Json(json!({ "count": count })))
}

/// `POST /notifications/{id}/read`
pub async fn mark_read<S>(
  State(engine): State<Arc<Engine<S>>>,
  caller: Caller,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: EngagementStore + 'static,
{
  engine.inbox.mark_read(id, &caller.user_id).await?;
  Ok(StatusCode::NO_CONTENT)
}

/// `POST /notifications/read-all`
pub async fn mark_all_read<S>(
  State(engine): State<Arc<Engine<S>>>,
  caller: Caller,
) -> Result<impl IntoResponse, ApiError>
where
  S: EngagementStore + 'static,
{
  let updated = engine.inbox.mark_all_read(&caller.user_id).await?;
  Ok(Json(json!({ "updated": updated })))
}

/// `DELETE /notifications/{id}`
pub async fn delete_one<S>(
  State(engine): State<Arc<Engine<S>>>,
  caller: Caller,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: EngagementStore + 'static,
{
  engine.inbox.delete(id, &caller.user_id).await?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Preferences ─────────────────────────────────────────────────────────────

/// `GET /notifications/preferences`
pub async fn preferences<S>(
  State(engine): State<Arc<Engine<S>>>,
  caller: Caller,
) -> Result<Json<NotificationPreferences>, ApiError>
where
  S: EngagementStore + 'static,
{
  Ok(Json(engine.inbox.preferences(&caller.user_id).await?))
}

/// `PUT /notifications/preferences`
pub async fn set_preferences<S>(
  State(engine): State<Arc<Engine<S>>>,
  caller: Caller,
  Json(prefs): Json<NotificationPreferences>,
) -> Result<Json<NotificationPreferences>, ApiError>
where
  S: EngagementStore + 'static,
{
  engine.inbox.set_preferences(&caller.user_id, prefs).await?;
  Ok(Json(prefs))
}

// ─── Trigger ─────────────────────────────────────────────────────────────────

/// Body of `POST /notifications`. Display text is never taken from the
/// caller: the target title and comment excerpt are looked up by id.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerBody {
  #[serde(rename = "type")]
  pub kind:         NotificationType,
  pub recipient_id: String,
  pub target_id:    Option<String>,
  pub comment_id:   Option<Uuid>,
  pub rating:       Option<u8>,
}

/// `POST /notifications`
///
/// The sender is always the caller. Delivery is best-effort, so the response
/// does not say whether a row was written.
pub async fn trigger<S>(
  State(engine): State<Arc<Engine<S>>>,
  caller: Caller,
  Json(body): Json<TriggerBody>,
) -> Result<StatusCode, ApiError>
where
  S: EngagementStore + 'static,
{
  if body.recipient_id.trim().is_empty() {
    return Err(ApiError::BadRequest("recipientId must not be empty".into()));
  }
  let mut event =
    NotificationEvent::new(body.kind, body.recipient_id).from_sender(caller.user_id);
  if let Some(target_id) = body.target_id {
    let target = engine.counters.target(&target_id).await?;
    event = event.on_target(target.target_id, Some(target.title));
  }
  if let Some(comment_id) = body.comment_id {
    let comment = engine.comments.get(comment_id).await?;
    if comment.is_deleted {
      return Err(sitedir_core::Error::CommentNotFound(comment_id).into());
    }
    event = event.on_comment(comment.comment_id, &comment.content);
  }
  if let Some(rating) = body.rating {
    event = event.with_rating(validate_rating(i64::from(rating))?);
  }
  engine.dispatcher.trigger(event).await;
  Ok(StatusCode::ACCEPTED)
}
