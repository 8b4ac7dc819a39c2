//! Handlers for the follow graph under `/users/{id}`.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/users/{id}/follow` | Caller follows `id` |
//! | `DELETE` | `/users/{id}/follow` | Caller unfollows `id` |
//! | `GET`    | `/users/{id}/follow-status/{other}` | Two independent reads |
//! | `GET`    | `/users/{id}/follow-stats` | Cached counters |
//! | `GET`    | `/users/{id}/followers` | `?limit=&offset=` |
//! | `GET`    | `/users/{id}/following` | `?limit=&offset=` |
//! | `GET`    | `/users/{id}/follow-activity` | `?limit=` |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use sitedir_core::{
  follow::{FollowActivity, FollowStats, FollowStatus, FollowUser},
  service::Engine,
  store::{EngagementStore, Page},
};

use crate::{caller::Caller, error::ApiError};

const DEFAULT_ACTIVITY_LIMIT: usize = 20;

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
  pub limit:  Option<usize>,
  pub offset: Option<usize>,
}

impl From<PageParams> for Page {
  fn from(p: PageParams) -> Self { Page { limit: p.limit, offset: p.offset } }
}

/// `POST /users/{id}/follow`
pub async fn follow<S>(
  State(engine): State<Arc<Engine<S>>>,
  caller: Caller,
  Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
  S: EngagementStore + 'static,
{
  let edge = engine.follows.follow(&caller.user_id, &id).await?;
  Ok((StatusCode::CREATED, Json(edge)))
}

/// `DELETE /users/{id}/follow`
pub async fn unfollow<S>(
  State(engine): State<Arc<Engine<S>>>,
  caller: Caller,
  Path(id): Path<String>,
) -> Result<StatusCode, ApiError>
where
  S: EngagementStore + 'static,
{
  engine.follows.unfollow(&caller.user_id, &id).await?;
  Ok(StatusCode::NO_CONTENT)
}

/// `GET /users/{id}/follow-status/{other}`
pub async fn status<S>(
  State(engine): State<Arc<Engine<S>>>,
  Path((id, other)): Path<(String, String)>,
) -> Result<Json<FollowStatus>, ApiError>
where
  S: EngagementStore + 'static,
{
  Ok(Json(engine.follows.status(&id, &other).await?))
}

/// `GET /users/{id}/follow-stats`
pub async fn stats<S>(
  State(engine): State<Arc<Engine<S>>>,
  Path(id): Path<String>,
) -> Result<Json<FollowStats>, ApiError>
where
  S: EngagementStore + 'static,
{
  Ok(Json(engine.follows.stats(&id).await?))
}

/// `GET /users/{id}/followers`
pub async fn followers<S>(
  State(engine): State<Arc<Engine<S>>>,
  Path(id): Path<String>,
  Query(params): Query<PageParams>,
) -> Result<Json<Vec<FollowUser>>, ApiError>
where
  S: EngagementStore + 'static,
{
  Ok(Json(engine.follows.followers(&id, params.into()).await?))
}

/// `GET /users/{id}/following`
pub async fn following<S>(
  State(engine): State<Arc<Engine<S>>>,
  Path(id): Path<String>,
  Query(params): Query<PageParams>,
) -> Result<Json<Vec<FollowUser>>, ApiError>
where
  S: EngagementStore + 'static,
{
  Ok(Json(engine.follows.following(&id, params.into()).await?))
}

/// `GET /users/{id}/follow-activity`
pub async fn activity<S>(
  State(engine): State<Arc<Engine<S>>>,
  Path(id): Path<String>,
  Query(params): Query<PageParams>,
) -> Result<Json<Vec<FollowActivity>>, ApiError>
where
  S: EngagementStore + 'static,
{
  let limit = params.limit.unwrap_or(DEFAULT_ACTIVITY_LIMIT);
  Ok(Json(engine.follows.activity(&id, limit).await?))
}
