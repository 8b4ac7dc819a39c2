//! Handlers for `/targets` endpoints: registration, likes and views.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/targets` | Body: `{"targetId","title","url"}`; caller becomes owner |
//! | `GET`  | `/targets/{id}` | 404 if not registered |
//! | `POST` | `/targets/{id}/like` | Toggle; returns `{liked, newCount}` |
//! | `GET`  | `/targets/{id}/like` | Whether the caller has liked it |
//! | `POST` | `/targets/{id}/views` | Signed in or with `x-session-token` |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::{HeaderMap, StatusCode},
  response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sitedir_core::{
  engagement::{LikeToggle, NewTarget, SessionToken, Target, ViewerId},
  service::Engine,
  store::EngagementStore,
};

use crate::{
  caller::{Caller, session_token},
  error::ApiError,
};

// ─── Register ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterBody {
  pub target_id: String,
  pub title:     String,
  pub url:       String,
}

/// `POST /targets`
pub async fn register<S>(
  State(engine): State<Arc<Engine<S>>>,
  caller: Caller,
  Json(body): Json<RegisterBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: EngagementStore + 'static,
{
  let target = engine
    .counters
    .register_target(NewTarget {
      target_id: body.target_id,
      owner_id:  caller.user_id,
      title:     body.title,
      url:       body.url,
    })
    .await?;
  Ok((StatusCode::CREATED, Json(target)))
}

/// `GET /targets/{id}`
pub async fn get_one<S>(
  State(engine): State<Arc<Engine<S>>>,
  Path(id): Path<String>,
) -> Result<Json<Target>, ApiError>
where
  S: EngagementStore + 'static,
{
  Ok(Json(engine.counters.target(&id).await?))
}

// ─── Likes ───────────────────────────────────────────────────────────────────

/// `POST /targets/{id}/like`
pub async fn toggle_like<S>(
  State(engine): State<Arc<Engine<S>>>,
  caller: Caller,
  Path(id): Path<String>,
) -> Result<Json<LikeToggle>, ApiError>
where
  S: EngagementStore + 'static,
{
  Ok(Json(engine.counters.toggle_like(&id, &caller.user_id).await?))
}

/// `GET /targets/{id}/like`
pub async fn has_liked<S>(
  State(engine): State<Arc<Engine<S>>>,
  caller: Caller,
  Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
  S: EngagementStore + 'static,
{
  let liked = engine.counters.has_liked(&id, &caller.user_id).await?;
  Ok(Json(json!({ "liked": liked })))
}

// ─── Views ───────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewResponse {
  pub counted:       bool,
  /// Set for anonymous viewers; replay it on later views.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub session_token: Option<SessionToken>,
}

/// `POST /targets/{id}/views`
///
/// A signed-out viewer without a session token is issued a fresh one.
pub async fn record_view<S>(
  State(engine): State<Arc<Engine<S>>>,
  caller: Option<Caller>,
  headers: HeaderMap,
  Path(id): Path<String>,
) -> Result<Json<ViewResponse>, ApiError>
where
  S: EngagementStore + 'static,
{
  let (viewer, session) = match caller {
    Some(c) => (ViewerId::User(c.user_id), None),
    None => {
      let token = session_token(&headers)?.unwrap_or_else(SessionToken::generate);
      (ViewerId::Session(token.clone()), Some(token))
    }
  };
  let counted = engine.counters.record_view(&id, &viewer).await?;
  Ok(Json(ViewResponse { counted, session_token: session }))
}
