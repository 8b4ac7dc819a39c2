//! JSON REST API for the sitedir engagement layer.
//!
//! Exposes an axum [`Router`] backed by an [`Engine`] over any
//! [`EngagementStore`]. Authentication is the caller's responsibility: the
//! router trusts the identity headers described in [`caller`].
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", sitedir_api::api_router(engine.clone()))
//! ```

pub mod caller;
pub mod comments;
pub mod error;
pub mod follows;
pub mod notifications;
pub mod ratings;
pub mod targets;
pub mod users;

use std::sync::Arc;

use axum::{
  Router,
  routing::{delete, get, post},
};
use sitedir_core::{service::Engine, store::EngagementStore};
use tower_http::trace::TraceLayer;

pub use caller::Caller;
pub use error::ApiError;

/// Build a fully-materialised API router for `engine`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(engine: Arc<Engine<S>>) -> Router<()>
where
  S: EngagementStore + 'static,
{
  Router::new()
    // Targets, likes, views
    .route("/targets", post(targets::register::<S>))
    .route("/targets/{id}", get(targets::get_one::<S>))
    .route(
      "/targets/{id}/like",
      get(targets::has_liked::<S>).post(targets::toggle_like::<S>),
    )
    .route("/targets/{id}/views", post(targets::record_view::<S>))
    // Ratings
    .route(
      "/targets/{id}/ratings",
      get(ratings::list::<S>).put(ratings::submit::<S>),
    )
    .route("/targets/{id}/ratings/stats", get(ratings::stats::<S>))
    .route("/targets/{id}/ratings/mine", get(ratings::mine::<S>))
    .route(
      "/targets/{id}/ratings/{rating_id}",
      delete(ratings::delete_one::<S>),
    )
    // Comments
    .route(
      "/targets/{id}/comments",
      get(comments::list::<S>).post(comments::create::<S>),
    )
    .route(
      "/comments/{id}",
      get(comments::get_one::<S>)
        .patch(comments::edit::<S>)
        .delete(comments::delete_one::<S>),
    )
    .route("/comments/{id}/like", post(comments::toggle_like::<S>))
    // Follow graph and profiles
    .route(
      "/users/{id}/follow",
      post(follows::follow::<S>).delete(follows::unfollow::<S>),
    )
    .route("/users/{id}/follow-status/{other}", get(follows::status::<S>))
    .route("/users/{id}/follow-stats", get(follows::stats::<S>))
    .route("/users/{id}/followers", get(follows::followers::<S>))
    .route("/users/{id}/following", get(follows::following::<S>))
    .route("/users/{id}/follow-activity", get(follows::activity::<S>))
    .route(
      "/users/{id}/profile",
      get(users::get_profile::<S>).put(users::put_profile::<S>),
    )
    // Notifications
    .route(
      "/notifications",
      get(notifications::list::<S>).post(notifications::trigger::<S>),
    )
    .route("/notifications/unread-count", get(notifications::unread_count::<S>))
    .route("/notifications/read-all", post(notifications::mark_all_read::<S>))
    .route(
      "/notifications/preferences",
      get(notifications::preferences::<S>).put(notifications::set_preferences::<S>),
    )
    .route("/notifications/{id}", delete(notifications::delete_one::<S>))
    .route("/notifications/{id}/read", post(notifications::mark_read::<S>))
    .with_state(engine)
    .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests;
