//! Handlers for comment threads.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/targets/{id}/comments` | Reply trees; `?flat=true` for the raw list |
//! | `POST`   | `/targets/{id}/comments` | Body: `{"content","parentId"?}` |
//! | `GET`    | `/comments/{id}` | Includes tombstones |
//! | `PATCH`  | `/comments/{id}` | Author only |
//! | `DELETE` | `/comments/{id}` | Author or moderator |
//! | `POST`   | `/comments/{id}/like` | Toggle |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde::Deserialize;
use sitedir_core::{
  comment::Comment,
  engagement::LikeToggle,
  service::Engine,
  store::EngagementStore,
};
use uuid::Uuid;

use crate::{caller::Caller, error::ApiError};

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  #[serde(default)]
  pub flat: bool,
}

/// `GET /targets/{id}/comments`
pub async fn list<S>(
  State(engine): State<Arc<Engine<S>>>,
  Path(id): Path<String>,
  Query(params): Query<ListParams>,
) -> Result<Response, ApiError>
where
  S: EngagementStore + 'static,
{
  let response = if params.flat {
    Json(engine.comments.list(&id).await?).into_response()
  } else {
    Json(engine.comments.threads(&id).await?).into_response()
  };
  Ok(response)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBody {
  pub content:   String,
  pub parent_id: Option<Uuid>,
}

/// `POST /targets/{id}/comments`
pub async fn create<S>(
  State(engine): State<Arc<Engine<S>>>,
  caller: Caller,
  Path(id): Path<String>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: EngagementStore + 'static,
{
  let comment = engine
    .comments
    .add(&id, &caller.user_id, &body.content, body.parent_id)
    .await?;
  Ok((StatusCode::CREATED, Json(comment)))
}

/// `GET /comments/{id}`
pub async fn get_one<S>(
  State(engine): State<Arc<Engine<S>>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Comment>, ApiError>
where
  S: EngagementStore + 'static,
{
  Ok(Json(engine.comments.get(id).await?))
}

#[derive(Debug, Deserialize)]
pub struct EditBody {
  pub content: String,
}

/// `PATCH /comments/{id}`
pub async fn edit<S>(
  State(engine): State<Arc<Engine<S>>>,
  caller: Caller,
  Path(id): Path<Uuid>,
  Json(body): Json<EditBody>,
) -> Result<Json<Comment>, ApiError>
where
  S: EngagementStore + 'static,
{
  Ok(Json(engine.comments.edit(id, &caller.user_id, &body.content).await?))
}

/// `DELETE /comments/{id}`
pub async fn delete_one<S>(
  State(engine): State<Arc<Engine<S>>>,
  caller: Caller,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: EngagementStore + 'static,
{
  engine
    .comments
    .delete(id, &caller.user_id, caller.is_moderator)
    .await?;
  Ok(StatusCode::NO_CONTENT)
}

/// `POST /comments/{id}/like`
pub async fn toggle_like<S>(
  State(engine): State<Arc<Engine<S>>>,
  caller: Caller,
  Path(id): Path<Uuid>,
) -> Result<Json<LikeToggle>, ApiError>
where
  S: EngagementStore + 'static,
{
  Ok(Json(engine.comments.toggle_like(id, &caller.user_id).await?))
}
