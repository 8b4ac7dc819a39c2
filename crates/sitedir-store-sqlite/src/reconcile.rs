//! Recount every cached aggregate from its source rows.
//!
//! The transactional write paths keep aggregates exact, so on a healthy
//! database this finds nothing. It exists for databases written by older
//! builds or edited by hand, and doubles as a consistency check in tests.

use chrono::Utc;
use rusqlite::{TransactionBehavior, params};
use serde::Serialize;

use crate::{Result, encode::encode_dt, store::SqliteStore};

/// Number of aggregate rows that disagreed with their source rows and were
/// rewritten.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
  pub follow_stats:   usize,
  pub likes:          usize,
  pub views:          usize,
  pub comment_counts: usize,
  pub rating_stats:   usize,
}

impl ReconcileReport {
  pub fn total(&self) -> usize {
    self.follow_stats + self.likes + self.views + self.comment_counts + self.rating_stats
  }

  pub fn is_clean(&self) -> bool { self.total() == 0 }
}

/// Rows whose `follow_stats` disagree with the `follows` table, including
/// users with edges but no stats row.
const FOLLOW_DRIFT: &str = "
  WITH users_seen AS (
    SELECT follower_id AS user_id FROM follows
    UNION SELECT following_id FROM follows
    UNION SELECT user_id FROM follow_stats
  ),
  actual AS (
    SELECT u.user_id,
           (SELECT COUNT(*) FROM follows f WHERE f.following_id = u.user_id) AS followers,
           (SELECT COUNT(*) FROM follows f WHERE f.follower_id = u.user_id)  AS following
      FROM users_seen u
  )
  SELECT a.user_id, a.followers, a.following
    FROM actual a LEFT JOIN follow_stats s ON s.user_id = a.user_id
   WHERE s.user_id IS NULL AND (a.followers > 0 OR a.following > 0)
      OR s.followers_count != a.followers
      OR s.following_count != a.following";

const RATING_DRIFT: &str = "
  WITH actual AS (
    SELECT w.website_id,
           SUM(r.rating = 1) AS c1, SUM(r.rating = 2) AS c2, SUM(r.rating = 3) AS c3,
           SUM(r.rating = 4) AS c4, SUM(r.rating = 5) AS c5
      FROM websites w LEFT JOIN ratings r ON r.website_id = w.website_id
     GROUP BY w.website_id
  )
  SELECT a.website_id,
         IFNULL(a.c1, 0), IFNULL(a.c2, 0), IFNULL(a.c3, 0), IFNULL(a.c4, 0), IFNULL(a.c5, 0)
    FROM actual a
    LEFT JOIN rating_stats s ON s.website_id = a.website_id
    JOIN websites w ON w.website_id = a.website_id
   WHERE IFNULL(s.count_1, 0) != IFNULL(a.c1, 0)
      OR IFNULL(s.count_2, 0) != IFNULL(a.c2, 0)
      OR IFNULL(s.count_3, 0) != IFNULL(a.c3, 0)
      OR IFNULL(s.count_4, 0) != IFNULL(a.c4, 0)
      OR IFNULL(s.count_5, 0) != IFNULL(a.c5, 0)
      OR w.total_ratings != IFNULL(a.c1 + a.c2 + a.c3 + a.c4 + a.c5, 0)";

impl SqliteStore {
  /// Recompute follow counters, likes, views, comment counts and rating
  /// stats from their source rows, rewriting any that drifted.
  pub async fn reconcile(&self) -> Result<ReconcileReport> {
    let now = encode_dt(Utc::now());

    let report = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut report = ReconcileReport::default();

        let drifted: Vec<(String, i64, i64)> = {
          let mut stmt = tx.prepare(FOLLOW_DRIFT)?;
          stmt
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))?
            .collect::<rusqlite::Result<_>>()?
        };
        for (user_id, followers, following) in &drifted {
          tx.execute(
            "INSERT INTO follow_stats (user_id, followers_count, following_count, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id) DO UPDATE SET
               followers_count = excluded.followers_count,
               following_count = excluded.following_count,
               updated_at = excluded.updated_at",
            params![user_id, followers, following, now],
          )?;
        }
        report.follow_stats = drifted.len();

        report.likes = tx.execute(
          "UPDATE websites
              SET likes = (SELECT COUNT(*) FROM likes l WHERE l.website_id = websites.website_id)
            WHERE likes != (SELECT COUNT(*) FROM likes l WHERE l.website_id = websites.website_id)",
          [],
        )?;

        report.views = tx.execute(
          "UPDATE websites
              SET views = (SELECT COUNT(*) FROM views v WHERE v.website_id = websites.website_id)
            WHERE views != (SELECT COUNT(*) FROM views v WHERE v.website_id = websites.website_id)",
          [],
        )?;

        report.comment_counts = tx.execute(
          "UPDATE websites
              SET comment_count = (
                SELECT COUNT(*) FROM comments c
                 WHERE c.website_id = websites.website_id AND c.is_deleted = 0)
            WHERE comment_count != (
                SELECT COUNT(*) FROM comments c
                 WHERE c.website_id = websites.website_id AND c.is_deleted = 0)",
          [],
        )?;

        let drifted: Vec<(String, [i64; 5])> = {
          let mut stmt = tx.prepare(RATING_DRIFT)?;
          stmt
            .query_map([], |r| {
              Ok((r.get(0)?, [r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?, r.get(5)?]))
            })?
            .collect::<rusqlite::Result<_>>()?
        };
        for (website_id, counts) in &drifted {
          let [c1, c2, c3, c4, c5] = *counts;
          let total = c1 + c2 + c3 + c4 + c5;
          let average = if total == 0 {
            0.0
          } else {
            (c1 + 2 * c2 + 3 * c3 + 4 * c4 + 5 * c5) as f64 / total as f64
          };
          tx.execute(
            "INSERT INTO rating_stats (
               website_id, count_1, count_2, count_3, count_4, count_5,
               total_ratings, average_rating, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(website_id) DO UPDATE SET
               count_1 = excluded.count_1,
               count_2 = excluded.count_2,
               count_3 = excluded.count_3,
               count_4 = excluded.count_4,
               count_5 = excluded.count_5,
               total_ratings = excluded.total_ratings,
               average_rating = excluded.average_rating,
               updated_at = excluded.updated_at",
            params![website_id, c1, c2, c3, c4, c5, total, average, now],
          )?;
          tx.execute(
            "UPDATE websites SET total_ratings = ?2, average_rating = ?3 WHERE website_id = ?1",
            params![website_id, total, average],
          )?;
        }
        report.rating_stats = drifted.len();

        tx.commit()?;
        Ok(report)
      })
      .await?;

    if report.is_clean() {
      tracing::debug!("reconcile found no drift");
    } else {
      tracing::warn!(?report, "reconcile rewrote drifted aggregates");
    }
    Ok(report)
  }
}
