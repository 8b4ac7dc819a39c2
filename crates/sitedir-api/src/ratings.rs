//! Handlers for `/targets/{id}/ratings`.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/targets/{id}/ratings` | `?rating=&sort=newest\|oldest\|highest\|lowest&limit=&offset=` |
//! | `PUT`    | `/targets/{id}/ratings` | Body: `{"rating":4,"review":"…"}`; create or replace |
//! | `GET`    | `/targets/{id}/ratings/stats` | Distribution, total, average |
//! | `GET`    | `/targets/{id}/ratings/mine` | `null` if the caller has not rated |
//! | `DELETE` | `/targets/{id}/ratings/{rating_id}` | Author only; returns updated stats |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use sitedir_core::{
  rating::{Rating, RatingQuery, RatingSort, RatingStats},
  service::Engine,
  store::EngagementStore,
};
use uuid::Uuid;

use crate::{caller::Caller, error::ApiError};

// ─── List ────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  pub rating: Option<u8>,
  #[serde(default)]
  pub sort:   RatingSort,
  pub limit:  Option<usize>,
  pub offset: Option<usize>,
}

/// `GET /targets/{id}/ratings`
pub async fn list<S>(
  State(engine): State<Arc<Engine<S>>>,
  Path(id): Path<String>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Rating>>, ApiError>
where
  S: EngagementStore + 'static,
{
  let query = RatingQuery {
    rating: params.rating,
    sort:   params.sort,
    limit:  params.limit,
    offset: params.offset,
  };
  Ok(Json(engine.ratings.list(&id, &query).await?))
}

// ─── Submit ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SubmitBody {
  pub rating: i64,
  pub review: Option<String>,
}

/// `PUT /targets/{id}/ratings`
pub async fn submit<S>(
  State(engine): State<Arc<Engine<S>>>,
  caller: Caller,
  Path(id): Path<String>,
  Json(body): Json<SubmitBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: EngagementStore + 'static,
{
  let write = engine
    .ratings
    .submit(&id, &caller.user_id, body.rating, body.review)
    .await?;
  let status = if write.is_new { StatusCode::CREATED } else { StatusCode::OK };
  Ok((status, Json(write)))
}

// ─── Reads ───────────────────────────────────────────────────────────────────

/// `GET /targets/{id}/ratings/stats`
pub async fn stats<S>(
  State(engine): State<Arc<Engine<S>>>,
  Path(id): Path<String>,
) -> Result<Json<RatingStats>, ApiError>
where
  S: EngagementStore + 'static,
{
  Ok(Json(engine.ratings.stats(&id).await?))
}

/// `GET /targets/{id}/ratings/mine`
pub async fn mine<S>(
  State(engine): State<Arc<Engine<S>>>,
  caller: Caller,
  Path(id): Path<String>,
) -> Result<Json<Option<Rating>>, ApiError>
where
  S: EngagementStore + 'static,
{
  Ok(Json(engine.ratings.user_rating(&id, &caller.user_id).await?))
}

// ─── Delete ──────────────────────────────────────────────────────────────────

/// `DELETE /targets/{id}/ratings/{rating_id}`
pub async fn delete_one<S>(
  State(engine): State<Arc<Engine<S>>>,
  caller: Caller,
  Path((id, rating_id)): Path<(String, Uuid)>,
) -> Result<Json<RatingStats>, ApiError>
where
  S: EngagementStore + 'static,
{
  Ok(Json(engine.ratings.delete(rating_id, &id, &caller.user_id).await?))
}
