//! Handlers for the cached user directory entries.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/users/{id}/profile` | 404 if unknown |
//! | `PUT`  | `/users/{id}/profile` | Body: `{"displayName","photoUrl"?}`; self only |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
};
use serde::Deserialize;
use sitedir_core::{Error, service::Engine, store::EngagementStore, user::UserProfile};

use crate::{caller::Caller, error::ApiError};

/// `GET /users/{id}/profile`
pub async fn get_profile<S>(
  State(engine): State<Arc<Engine<S>>>,
  Path(id): Path<String>,
) -> Result<Json<UserProfile>, ApiError>
where
  S: EngagementStore + 'static,
{
  engine
    .user_profile(&id)
    .await?
    .map(Json)
    .ok_or_else(|| ApiError::Domain(Error::UserNotFound(id)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileBody {
  pub display_name: String,
  pub photo_url:    Option<String>,
}

/// `PUT /users/{id}/profile`
pub async fn put_profile<S>(
  State(engine): State<Arc<Engine<S>>>,
  caller: Caller,
  Path(id): Path<String>,
  Json(body): Json<ProfileBody>,
) -> Result<Json<UserProfile>, ApiError>
where
  S: EngagementStore + 'static,
{
  if caller.user_id != id {
    return Err(ApiError::Forbidden("cannot edit another user's profile".into()));
  }
  let profile = UserProfile {
    user_id:      id,
    display_name: body.display_name,
    photo_url:    body.photo_url,
  };
  engine.put_user_profile(profile.clone()).await?;
  Ok(Json(profile))
}
