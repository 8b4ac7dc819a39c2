//! Caller identity extractor.
//!
//! Authentication happens upstream (a gateway or session middleware); by the
//! time a request reaches this router the verified identity is carried in
//! headers. Handlers receive it as an explicit [`Caller`] and pass the user id
//! down to the managers.

use axum::{
  extract::{FromRequestParts, OptionalFromRequestParts},
  http::{HeaderMap, request::Parts},
};
use sitedir_core::engagement::SessionToken;

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const MODERATOR_HEADER: &str = "x-moderator";
pub const SESSION_HEADER: &str = "x-session-token";

/// The authenticated user making the request.
#[derive(Debug, Clone)]
pub struct Caller {
  pub user_id:      String,
  pub is_moderator: bool,
}

impl Caller {
  fn from_headers(headers: &HeaderMap) -> Result<Option<Self>, ApiError> {
    let Some(raw) = headers.get(USER_ID_HEADER) else { return Ok(None) };
    let user_id = raw
      .to_str()
      .map_err(|_| ApiError::BadRequest(format!("{USER_ID_HEADER} is not valid text")))?
      .trim();
    if user_id.is_empty() {
      return Ok(None);
    }
    let is_moderator = headers
      .get(MODERATOR_HEADER)
      .and_then(|v| v.to_str().ok())
      .is_some_and(|v| v.eq_ignore_ascii_case("true") || v == "1");
    Ok(Some(Self { user_id: user_id.to_owned(), is_moderator }))
  }
}

impl<S> FromRequestParts<S> for Caller
where
  S: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
    Self::from_headers(&parts.headers)?.ok_or(ApiError::Unauthenticated)
  }
}

impl<S> OptionalFromRequestParts<S> for Caller
where
  S: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    _state: &S,
  ) -> Result<Option<Self>, Self::Rejection> {
    Self::from_headers(&parts.headers)
  }
}

/// The anonymous session token sent by a signed-out browser, if any.
pub fn session_token(headers: &HeaderMap) -> Result<Option<SessionToken>, ApiError> {
  let Some(raw) = headers.get(SESSION_HEADER) else { return Ok(None) };
  let raw = raw
    .to_str()
    .map_err(|_| ApiError::BadRequest(format!("{SESSION_HEADER} is not valid text")))?;
  SessionToken::parse(raw).map(Some).map_err(ApiError::from)
}
