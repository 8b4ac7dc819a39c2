//! Star ratings and the per-target rating aggregate.
//!
//! [`RatingStats`] holds the logic for adding, moving and removing a vote.
//! Store backends call these methods inside the same transaction that writes
//! the rating row, so the aggregate and the rows never drift apart.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

/// Check that `value` is a whole star count in `1..=5`.
pub fn validate_rating(value: i64) -> Result<u8> {
  if (i64::from(MIN_RATING)..=i64::from(MAX_RATING)).contains(&value) {
    Ok(value as u8)
  } else {
    Err(Error::InvalidRating(value))
  }
}

// ─── Rows ────────────────────────────────────────────────────────────────────

/// One user's rating of one target. Unique per `(target_id, user_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
  pub rating_id:  Uuid,
  pub target_id:  String,
  pub user_id:    String,
  pub rating:     u8,
  pub review:     Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// Input to [`crate::store::EngagementStore::upsert_rating`]. `rating` has
/// already been validated.
#[derive(Debug, Clone)]
pub struct NewRating {
  pub target_id: String,
  pub user_id:   String,
  pub rating:    u8,
  pub review:    Option<String>,
}

// ─── Distribution ────────────────────────────────────────────────────────────

/// Vote counts per star value. Serialised as a map with every key `1..=5`
/// present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "BTreeMap<u8, u64>", into = "BTreeMap<u8, u64>")]
pub struct Distribution([u64; 5]);

impl Distribution {
  pub fn from_counts(counts: [u64; 5]) -> Self { Self(counts) }

  pub fn counts(&self) -> [u64; 5] { self.0 }

  /// Count for a star value; out-of-range values read as zero.
  pub fn get(&self, value: u8) -> u64 {
    Self::slot(value).map_or(0, |i| self.0[i])
  }

  pub fn total(&self) -> u64 { self.0.iter().sum() }

  /// `Σ k · count[k]`.
  pub fn weighted_sum(&self) -> u64 {
    self
      .0
      .iter()
      .zip(MIN_RATING..=MAX_RATING)
      .map(|(count, k)| count * u64::from(k))
      .sum()
  }

  fn increment(&mut self, value: u8) {
    if let Some(i) = Self::slot(value) {
      self.0[i] += 1;
    }
  }

  fn decrement(&mut self, value: u8) {
    if let Some(i) = Self::slot(value) {
      self.0[i] = self.0[i].saturating_sub(1);
    }
  }

  fn slot(value: u8) -> Option<usize> {
    (MIN_RATING..=MAX_RATING)
      .contains(&value)
      .then(|| usize::from(value - MIN_RATING))
  }
}

impl From<BTreeMap<u8, u64>> for Distribution {
  fn from(map: BTreeMap<u8, u64>) -> Self {
    let mut dist = Self::default();
    for (value, count) in map {
      if let Some(i) = Self::slot(value) {
        dist.0[i] = count;
      }
    }
    dist
  }
}

impl From<Distribution> for BTreeMap<u8, u64> {
  fn from(dist: Distribution) -> Self {
    (MIN_RATING..=MAX_RATING).zip(dist.0).collect()
  }
}

// ─── RatingStats ─────────────────────────────────────────────────────────────

/// Running aggregate of every rating on a target.
///
/// `total_ratings` always equals `distribution.total()`, and
/// `average_rating` is the weighted mean (0 for an empty distribution).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingStats {
  pub target_id:      String,
  pub total_ratings:  u64,
  pub average_rating: f64,
  pub distribution:   Distribution,
  pub updated_at:     Option<DateTime<Utc>>,
}

impl RatingStats {
  pub fn empty(target_id: impl Into<String>) -> Self {
    Self {
      target_id:      target_id.into(),
      total_ratings:  0,
      average_rating: 0.0,
      distribution:   Distribution::default(),
      updated_at:     None,
    }
  }

  /// Rebuild stats from stored bucket counts, deriving the total and average.
  pub fn from_distribution(
    target_id: impl Into<String>,
    distribution: Distribution,
    updated_at: Option<DateTime<Utc>>,
  ) -> Self {
    let mut stats = Self {
      target_id: target_id.into(),
      total_ratings: 0,
      average_rating: 0.0,
      distribution,
      updated_at,
    };
    stats.recompute();
    stats
  }

  /// Count a first-time vote.
  pub fn add(&mut self, value: u8) {
    self.distribution.increment(value);
    self.recompute();
  }

  /// Move an existing vote between buckets. `total_ratings` is unchanged.
  pub fn replace(&mut self, old: u8, new: u8) {
    self.distribution.decrement(old);
    self.distribution.increment(new);
    self.recompute();
  }

  /// Drop a vote. Never underflows.
  pub fn remove(&mut self, value: u8) {
    self.distribution.decrement(value);
    self.recompute();
  }

  fn recompute(&mut self) {
    self.total_ratings = self.distribution.total();
    self.average_rating = if self.total_ratings == 0 {
      0.0
    } else {
      self.distribution.weighted_sum() as f64 / self.total_ratings as f64
    };
  }
}

/// Returned by [`crate::store::EngagementStore::upsert_rating`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingWrite {
  pub is_new: bool,
  pub rating: Rating,
  pub stats:  RatingStats,
}

/// Returned by [`crate::store::EngagementStore::delete_rating`].
#[derive(Debug, Clone)]
pub enum RatingDelete {
  Deleted(RatingStats),
  NotFound,
  NotOwner,
}

// ─── Queries ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RatingSort {
  #[default]
  Newest,
  Oldest,
  Highest,
  Lowest,
}

/// Parameters for [`crate::store::EngagementStore::list_ratings`].
#[derive(Debug, Clone, Default)]
pub struct RatingQuery {
  /// Only ratings with exactly this star value.
  pub rating: Option<u8>,
  pub sort:   RatingSort,
  pub limit:  Option<usize>,
  pub offset: Option<usize>,
}
