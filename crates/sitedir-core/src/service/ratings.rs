//! Rating aggregator.

use std::sync::Arc;

use uuid::Uuid;

use crate::{
  Error, Result,
  notification::NotificationType,
  rating::{NewRating, Rating, RatingDelete, RatingQuery, RatingStats, RatingWrite, validate_rating},
  service::{Dispatcher, RetryPolicy, owner_event, require_id},
  store::EngagementStore,
};

pub const MAX_REVIEW_CHARS: usize = 2000;

pub struct RatingAggregator<S> {
  store:  Arc<S>,
  retry:  RetryPolicy,
  notify: Dispatcher<S>,
}

impl<S> RatingAggregator<S>
where
  S: EngagementStore + 'static,
{
  pub fn new(store: Arc<S>, retry: RetryPolicy, notify: Dispatcher<S>) -> Self {
    Self { store, retry, notify }
  }

  /// Create or replace `user_id`'s rating of `target_id`.
  ///
  /// A resubmission moves the vote to the new bucket instead of adding a
  /// second one, which also makes the call safe to retry.
  pub async fn submit(
    &self,
    target_id: &str,
    user_id: &str,
    value: i64,
    review: Option<String>,
  ) -> Result<RatingWrite> {
    require_id("user id", user_id)?;
    let rating = validate_rating(value)?;
    let review = normalize_review(review)?;

    let input = NewRating {
      target_id: target_id.to_owned(),
      user_id: user_id.to_owned(),
      rating,
      review,
    };
    let write = self
      .retry
      .run("upsert_rating", || self.store.upsert_rating(input.clone()))
      .await
      .map_err(Error::from_store)?
      .ok_or_else(|| Error::TargetNotFound(target_id.to_owned()))?;

    tracing::info!(
      target_id,
      user_id,
      rating,
      is_new = write.is_new,
      average = write.stats.average_rating,
      "rating stored"
    );

    if write.is_new
      && let Some(event) =
        owner_event(self.store.as_ref(), target_id, NotificationType::Rating, user_id).await
    {
      self.notify.trigger(event.with_rating(rating)).await;
    }
    Ok(write)
  }

  /// Delete a rating owned by `user_id` and return the updated stats.
  pub async fn delete(
    &self,
    rating_id: Uuid,
    target_id: &str,
    user_id: &str,
  ) -> Result<RatingStats> {
    let outcome = self
      .retry
      .run("delete_rating", || self.store.delete_rating(rating_id, target_id, user_id))
      .await
      .map_err(Error::from_store)?;

    match outcome {
      RatingDelete::Deleted(stats) => {
        tracing::info!(%rating_id, target_id, user_id, "rating deleted");
        Ok(stats)
      }
      RatingDelete::NotFound => Err(Error::RatingNotFound(rating_id)),
      RatingDelete::NotOwner => Err(Error::NotOwner(rating_id)),
    }
  }

  pub async fn stats(&self, target_id: &str) -> Result<RatingStats> {
    self
      .retry
      .run("rating_stats", || self.store.rating_stats(target_id))
      .await
      .map_err(Error::from_store)
  }

  pub async fn user_rating(&self, target_id: &str, user_id: &str) -> Result<Option<Rating>> {
    self
      .retry
      .run("user_rating", || self.store.user_rating(target_id, user_id))
      .await
      .map_err(Error::from_store)
  }

  pub async fn list(&self, target_id: &str, query: &RatingQuery) -> Result<Vec<Rating>> {
    if let Some(value) = query.rating {
      validate_rating(i64::from(value))?;
    }
    self
      .retry
      .run("list_ratings", || self.store.list_ratings(target_id, query))
      .await
      .map_err(Error::from_store)
  }
}

/// Trim the review; blank becomes `None`.
fn normalize_review(review: Option<String>) -> Result<Option<String>> {
  let Some(text) = review else { return Ok(None) };
  let trimmed = text.trim();
  if trimmed.is_empty() {
    return Ok(None);
  }
  if trimmed.chars().count() > MAX_REVIEW_CHARS {
    return Err(Error::InvalidInput(format!(
      "review must be at most {MAX_REVIEW_CHARS} characters"
    )));
  }
  Ok(Some(trimmed.to_owned()))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn blank_review_becomes_none() {
    assert_eq!(normalize_review(Some("   ".into())).unwrap(), None);
    assert_eq!(normalize_review(None).unwrap(), None);
    assert_eq!(
      normalize_review(Some(" great site ".into())).unwrap().as_deref(),
      Some("great site")
    );
  }

  #[test]
  fn oversized_review_is_rejected() {
    let long = "r".repeat(MAX_REVIEW_CHARS + 1);
    assert!(matches!(normalize_review(Some(long)), Err(Error::InvalidInput(_))));
  }
}
