//! [`SqliteStore`], the SQLite implementation of [`EngagementStore`].
//!
//! Every mutating method runs inside one `BEGIN IMMEDIATE` transaction, so the
//! write lock is taken before the first read and concurrent writers queue on
//! SQLite's busy handler instead of reading stale aggregates.

use std::path::Path;

use chrono::{NaiveDate, Utc};
use rusqlite::{OptionalExtension as _, TransactionBehavior, params};
use uuid::Uuid;

use sitedir_core::{
  comment::{Comment, CommentDelete, CommentEdit, CommentWrite, NewComment},
  engagement::{LikeToggle, NewTarget, Target},
  follow::{FollowActivity, FollowEdge, FollowStats, FollowUser, FollowWrite},
  notification::{NewNotification, Notification, NotificationPreferences, NotificationQuery},
  rating::{
    Distribution, NewRating, Rating, RatingDelete, RatingQuery, RatingSort, RatingStats,
    RatingWrite,
  },
  store::{CommentLikeWrite, EngagementStore, Page},
  user::UserProfile,
};

use crate::{
  Result,
  encode::{
    RawComment, RawFollowActivity, RawFollowUser, RawNotification, RawRating, RawTarget, count,
    decode_dt, encode_day, encode_dt, encode_uuid, json_in_call, parse_liked_by,
    preferences_from_row, profile_from_row, sql_bound,
  },
  error::Error,
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A sitedir engagement store backed by a single SQLite file.
///
/// Cloning is cheap: the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    tracing::debug!(path = %path.display(), "sqlite store opened");
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

/// Outcome of an ownership-checked write, decided inside the transaction.
enum Checked<T> {
  Done(T),
  Missing,
  Denied,
}

// ─── Transaction helpers ─────────────────────────────────────────────────────

fn website_exists(conn: &rusqlite::Connection, website_id: &str) -> rusqlite::Result<bool> {
  conn.query_row(
    "SELECT EXISTS(SELECT 1 FROM websites WHERE website_id = ?1)",
    params![website_id],
    |r| r.get(0),
  )
}

fn load_rating_stats(
  conn: &rusqlite::Connection,
  website_id: &str,
) -> rusqlite::Result<Distribution> {
  let counts = conn
    .query_row(
      "SELECT count_1, count_2, count_3, count_4, count_5
         FROM rating_stats WHERE website_id = ?1",
      params![website_id],
      |r| {
        Ok([
          count(r.get(0)?),
          count(r.get(1)?),
          count(r.get(2)?),
          count(r.get(3)?),
          count(r.get(4)?),
        ])
      },
    )
    .optional()?;
  Ok(counts.map(Distribution::from_counts).unwrap_or_default())
}

/// Write the aggregate row and mirror its summary onto the website.
fn write_rating_stats(
  conn: &rusqlite::Connection,
  stats: &RatingStats,
  now: &str,
) -> rusqlite::Result<()> {
  let [c1, c2, c3, c4, c5] = stats.distribution.counts().map(|c| c as i64);
  conn.execute(
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
    params![
      stats.target_id,
      c1,
      c2,
      c3,
      c4,
      c5,
      stats.total_ratings as i64,
      stats.average_rating,
      now,
    ],
  )?;
  conn.execute(
    "UPDATE websites SET total_ratings = ?2, average_rating = ?3, updated_at = ?4
      WHERE website_id = ?1",
    params![stats.target_id, stats.total_ratings as i64, stats.average_rating, now],
  )?;
  Ok(())
}

fn select_comment(
  conn: &rusqlite::Connection,
  comment_id: &str,
) -> rusqlite::Result<Option<RawComment>> {
  conn
    .query_row(
      &format!("SELECT {} FROM comments WHERE comment_id = ?1", RawComment::COLUMNS),
      params![comment_id],
      RawComment::from_row,
    )
    .optional()
}

fn has_replies(conn: &rusqlite::Connection, comment_id: &str) -> rusqlite::Result<bool> {
  conn.query_row(
    "SELECT EXISTS(SELECT 1 FROM comments WHERE parent_id = ?1)",
    params![comment_id],
    |r| r.get(0),
  )
}

// ─── EngagementStore impl ────────────────────────────────────────────────────

impl EngagementStore for SqliteStore {
  type Error = Error;

  // ── Targets ───────────────────────────────────────────────────────────────

  async fn register_target(&self, target: NewTarget) -> Result<Option<Target>> {
    let now = encode_dt(Utc::now());

    let raw = self
      .conn
      .call(move |conn| {
        let inserted = conn.execute(
          "INSERT OR IGNORE INTO websites (
             website_id, owner_id, title, url, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
          params![target.target_id, target.owner_id, target.title, target.url, now],
        )?;
        if inserted == 0 {
          return Ok(None);
        }
        let raw = conn.query_row(
          &format!("SELECT {} FROM websites WHERE website_id = ?1", RawTarget::COLUMNS),
          params![target.target_id],
          RawTarget::from_row,
        )?;
        Ok(Some(raw))
      })
      .await?;

    raw.map(RawTarget::into_target).transpose()
  }

  async fn get_target(&self, target_id: &str) -> Result<Option<Target>> {
    let id = target_id.to_owned();

    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {} FROM websites WHERE website_id = ?1", RawTarget::COLUMNS),
              params![id],
              RawTarget::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawTarget::into_target).transpose()
  }

  // ── User directory ────────────────────────────────────────────────────────

  async fn put_user_profile(&self, profile: UserProfile) -> Result<()> {
    let now = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO users (user_id, display_name, photo_url, updated_at)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT(user_id) DO UPDATE SET
             display_name = excluded.display_name,
             photo_url = excluded.photo_url,
             updated_at = excluded.updated_at",
          params![profile.user_id, profile.display_name, profile.photo_url, now],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn get_user_profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
    let id = user_id.to_owned();

    let profile = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT user_id, display_name, photo_url FROM users WHERE user_id = ?1",
              params![id],
              profile_from_row,
            )
            .optional()?,
        )
      })
      .await?;
    Ok(profile)
  }

  // ── Follow graph ──────────────────────────────────────────────────────────

  async fn insert_follow(&self, follower_id: &str, following_id: &str) -> Result<FollowWrite> {
    let edge = FollowEdge {
      follower_id:  follower_id.to_owned(),
      following_id: following_id.to_owned(),
      created_at:   Utc::now(),
    };
    let now = encode_dt(edge.created_at);
    let activity_id = encode_uuid(Uuid::new_v4());

    let created = self
      .conn
      .call({
        let (follower, following) = (edge.follower_id.clone(), edge.following_id.clone());
        move |conn| {
          let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
          let inserted = tx.execute(
            "INSERT OR IGNORE INTO follows (follower_id, following_id, created_at)
             VALUES (?1, ?2, ?3)",
            params![follower, following, now],
          )?;
          if inserted == 0 {
            return Ok(false);
          }
          tx.execute(
            "INSERT INTO follow_stats (user_id, followers_count, following_count, updated_at)
             VALUES (?1, 0, 1, ?2)
             ON CONFLICT(user_id) DO UPDATE SET
               following_count = following_count + 1,
               updated_at = excluded.updated_at",
            params![follower, now],
          )?;
          tx.execute(
            "INSERT INTO follow_stats (user_id, followers_count, following_count, updated_at)
             VALUES (?1, 1, 0, ?2)
             ON CONFLICT(user_id) DO UPDATE SET
               followers_count = followers_count + 1,
               updated_at = excluded.updated_at",
            params![following, now],
          )?;
          tx.execute(
            "INSERT INTO follow_activity (activity_id, user_id, following_id, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![activity_id, follower, following, now],
          )?;
          tx.commit()?;
          Ok(true)
        }
      })
      .await?;

    Ok(if created { FollowWrite::Created(edge) } else { FollowWrite::AlreadyFollowing })
  }

  async fn delete_follow(&self, follower_id: &str, following_id: &str) -> Result<bool> {
    let follower = follower_id.to_owned();
    let following = following_id.to_owned();
    let now = encode_dt(Utc::now());

    let deleted = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let deleted = tx.execute(
          "DELETE FROM follows WHERE follower_id = ?1 AND following_id = ?2",
          params![follower, following],
        )?;
        if deleted == 0 {
          return Ok(false);
        }
        tx.execute(
          "UPDATE follow_stats
              SET following_count = MAX(following_count - 1, 0), updated_at = ?2
            WHERE user_id = ?1",
          params![follower, now],
        )?;
        tx.execute(
          "UPDATE follow_stats
              SET followers_count = MAX(followers_count - 1, 0), updated_at = ?2
            WHERE user_id = ?1",
          params![following, now],
        )?;
        tx.commit()?;
        Ok(true)
      })
      .await?;
    Ok(deleted)
  }

  async fn follow_exists(&self, follower_id: &str, following_id: &str) -> Result<bool> {
    let follower = follower_id.to_owned();
    let following = following_id.to_owned();

    let exists = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT EXISTS(
             SELECT 1 FROM follows WHERE follower_id = ?1 AND following_id = ?2
           )",
          params![follower, following],
          |r| r.get::<_, bool>(0),
        )?)
      })
      .await?;
    Ok(exists)
  }

  async fn follow_stats(&self, user_id: &str) -> Result<FollowStats> {
    let id = user_id.to_owned();

    let row: Option<(i64, i64, String)> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT followers_count, following_count, updated_at
                 FROM follow_stats WHERE user_id = ?1",
              params![id],
              |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .optional()?,
        )
      })
      .await?;

    match row {
      None => Ok(FollowStats::empty(user_id)),
      Some((followers, following, updated_at)) => Ok(FollowStats {
        user_id:         user_id.to_owned(),
        followers_count: count(followers),
        following_count: count(following),
        updated_at:      Some(decode_dt(&updated_at)?),
      }),
    }
  }

  async fn list_followers(&self, user_id: &str, page: Page) -> Result<Vec<FollowUser>> {
    self
      .list_follow_edges(
        "SELECT f.follower_id, u.display_name, u.photo_url, f.created_at
           FROM follows f LEFT JOIN users u ON u.user_id = f.follower_id
          WHERE f.following_id = ?1
          ORDER BY f.created_at DESC, f.rowid DESC
          LIMIT ?2 OFFSET ?3",
        user_id,
        page,
      )
      .await
  }

  async fn list_following(&self, user_id: &str, page: Page) -> Result<Vec<FollowUser>> {
    self
      .list_follow_edges(
        "SELECT f.following_id, u.display_name, u.photo_url, f.created_at
           FROM follows f LEFT JOIN users u ON u.user_id = f.following_id
          WHERE f.follower_id = ?1
          ORDER BY f.created_at DESC, f.rowid DESC
          LIMIT ?2 OFFSET ?3",
        user_id,
        page,
      )
      .await
  }

  async fn list_follow_activity(
    &self,
    user_id: &str,
    limit: usize,
  ) -> Result<Vec<FollowActivity>> {
    let id = user_id.to_owned();

    let raws: Vec<RawFollowActivity> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT activity_id, user_id, following_id, created_at
             FROM follow_activity WHERE user_id = ?1
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?2",
        )?;
        let rows = stmt
          .query_map(params![id, sql_bound(limit)], |r| {
            Ok(RawFollowActivity {
              activity_id:  r.get(0)?,
              user_id:      r.get(1)?,
              following_id: r.get(2)?,
              created_at:   r.get(3)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawFollowActivity::into_activity).collect()
  }

  // ── Likes and views ───────────────────────────────────────────────────────

  async fn toggle_like(&self, target_id: &str, user_id: &str) -> Result<Option<LikeToggle>> {
    let website = target_id.to_owned();
    let user = user_id.to_owned();
    let now = encode_dt(Utc::now());

    let toggle = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if !website_exists(&tx, &website)? {
          return Ok(None);
        }
        let removed = tx.execute(
          "DELETE FROM likes WHERE website_id = ?1 AND user_id = ?2",
          params![website, user],
        )?;
        let liked = removed == 0;
        if liked {
          tx.execute(
            "INSERT INTO likes (website_id, user_id, created_at) VALUES (?1, ?2, ?3)",
            params![website, user, now],
          )?;
          tx.execute(
            "UPDATE websites SET likes = likes + 1, updated_at = ?2 WHERE website_id = ?1",
            params![website, now],
          )?;
        } else {
          tx.execute(
            "UPDATE websites SET likes = MAX(likes - 1, 0), updated_at = ?2
              WHERE website_id = ?1",
            params![website, now],
          )?;
        }
        let likes: i64 = tx.query_row(
          "SELECT likes FROM websites WHERE website_id = ?1",
          params![website],
          |r| r.get(0),
        )?;
        tx.commit()?;
        Ok(Some(LikeToggle { liked, new_count: count(likes) }))
      })
      .await?;
    Ok(toggle)
  }

  async fn has_liked(&self, target_id: &str, user_id: &str) -> Result<bool> {
    let website = target_id.to_owned();
    let user = user_id.to_owned();

    let liked = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT EXISTS(SELECT 1 FROM likes WHERE website_id = ?1 AND user_id = ?2)",
          params![website, user],
          |r| r.get::<_, bool>(0),
        )?)
      })
      .await?;
    Ok(liked)
  }

  async fn record_view(
    &self,
    target_id: &str,
    viewer_key: &str,
    day: NaiveDate,
  ) -> Result<Option<bool>> {
    let website = target_id.to_owned();
    let viewer = viewer_key.to_owned();
    let day = encode_day(day);
    let now = encode_dt(Utc::now());

    let counted = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if !website_exists(&tx, &website)? {
          return Ok(None);
        }
        let inserted = tx.execute(
          "INSERT OR IGNORE INTO views (website_id, viewer_id, day, created_at)
           VALUES (?1, ?2, ?3, ?4)",
          params![website, viewer, day, now],
        )?;
        if inserted == 1 {
          tx.execute(
            "UPDATE websites SET views = views + 1 WHERE website_id = ?1",
            params![website],
          )?;
        }
        tx.commit()?;
        Ok(Some(inserted == 1))
      })
      .await?;
    Ok(counted)
  }

  // ── Ratings ───────────────────────────────────────────────────────────────

  async fn upsert_rating(&self, input: NewRating) -> Result<Option<RatingWrite>> {
    let now_dt = Utc::now();
    let now = encode_dt(now_dt);
    let fresh_id = encode_uuid(Uuid::new_v4());

    let outcome: Option<(bool, RawRating, RatingStats)> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if !website_exists(&tx, &input.target_id)? {
          return Ok(None);
        }

        let existing: Option<(String, i64, String)> = tx
          .query_row(
            "SELECT rating_id, rating, created_at FROM ratings
              WHERE website_id = ?1 AND user_id = ?2",
            params![input.target_id, input.user_id],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
          )
          .optional()?;

        let mut stats = RatingStats::from_distribution(
          input.target_id.clone(),
          load_rating_stats(&tx, &input.target_id)?,
          Some(now_dt),
        );

        let (is_new, rating_id, created_at) = match existing {
          Some((rating_id, old, created_at)) => {
            tx.execute(
              "UPDATE ratings SET rating = ?2, review = ?3, updated_at = ?4
                WHERE rating_id = ?1",
              params![rating_id, input.rating, input.review, now],
            )?;
            stats.replace(u8::try_from(old).unwrap_or_default(), input.rating);
            (false, rating_id, created_at)
          }
          None => {
            tx.execute(
              "INSERT INTO ratings (
                 rating_id, website_id, user_id, rating, review, created_at, updated_at
               ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
              params![fresh_id, input.target_id, input.user_id, input.rating, input.review, now],
            )?;
            stats.add(input.rating);
            (true, fresh_id, now.clone())
          }
        };

        write_rating_stats(&tx, &stats, &now)?;
        tx.commit()?;

        let raw = RawRating {
          rating_id,
          website_id: input.target_id,
          user_id: input.user_id,
          rating: i64::from(input.rating),
          review: input.review,
          created_at,
          updated_at: now,
        };
        Ok(Some((is_new, raw, stats)))
      })
      .await?;

    let Some((is_new, raw, stats)) = outcome else { return Ok(None) };
    Ok(Some(RatingWrite { is_new, rating: raw.into_rating()?, stats }))
  }

  async fn delete_rating(
    &self,
    rating_id: Uuid,
    target_id: &str,
    user_id: &str,
  ) -> Result<RatingDelete> {
    let id = encode_uuid(rating_id);
    let website = target_id.to_owned();
    let user = user_id.to_owned();
    let now_dt = Utc::now();
    let now = encode_dt(now_dt);

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let row: Option<(String, i64)> = tx
          .query_row(
            "SELECT user_id, rating FROM ratings WHERE rating_id = ?1 AND website_id = ?2",
            params![id, website],
            |r| Ok((r.get(0)?, r.get(1)?)),
          )
          .optional()?;
        let Some((owner, value)) = row else { return Ok(Checked::Missing) };
        if owner != user {
          return Ok(Checked::Denied);
        }

        tx.execute("DELETE FROM ratings WHERE rating_id = ?1", params![id])?;
        let mut stats = RatingStats::from_distribution(
          website.clone(),
          load_rating_stats(&tx, &website)?,
          Some(now_dt),
        );
        stats.remove(u8::try_from(value).unwrap_or_default());
        write_rating_stats(&tx, &stats, &now)?;
        tx.commit()?;
        Ok(Checked::Done(stats))
      })
      .await?;

    Ok(match outcome {
      Checked::Done(stats) => RatingDelete::Deleted(stats),
      Checked::Missing => RatingDelete::NotFound,
      Checked::Denied => RatingDelete::NotOwner,
    })
  }

  async fn rating_stats(&self, target_id: &str) -> Result<RatingStats> {
    let website = target_id.to_owned();

    let row: Option<([i64; 5], String)> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT count_1, count_2, count_3, count_4, count_5, updated_at
                 FROM rating_stats WHERE website_id = ?1",
              params![website],
              |r| Ok(([r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?], r.get(5)?)),
            )
            .optional()?,
        )
      })
      .await?;

    match row {
      None => Ok(RatingStats::empty(target_id)),
      Some((counts, updated_at)) => Ok(RatingStats::from_distribution(
        target_id,
        Distribution::from_counts(counts.map(count)),
        Some(decode_dt(&updated_at)?),
      )),
    }
  }

  async fn user_rating(&self, target_id: &str, user_id: &str) -> Result<Option<Rating>> {
    let website = target_id.to_owned();
    let user = user_id.to_owned();

    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {} FROM ratings WHERE website_id = ?1 AND user_id = ?2",
                RawRating::COLUMNS
              ),
              params![website, user],
              RawRating::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawRating::into_rating).transpose()
  }

  async fn list_ratings(&self, target_id: &str, query: &RatingQuery) -> Result<Vec<Rating>> {
    let website = target_id.to_owned();
    let filter = query.rating.map(i64::from);
    let order = match query.sort {
      RatingSort::Newest => "created_at DESC, rowid DESC",
      RatingSort::Oldest => "created_at ASC, rowid ASC",
      RatingSort::Highest => "rating DESC, created_at DESC",
      RatingSort::Lowest => "rating ASC, created_at DESC",
    };
    let sql = format!(
      "SELECT {} FROM ratings
        WHERE website_id = ?1 AND (?2 IS NULL OR rating = ?2)
        ORDER BY {order}
        LIMIT ?3 OFFSET ?4",
      RawRating::COLUMNS
    );
    let limit = sql_bound(query.limit.unwrap_or(Page::DEFAULT_LIMIT));
    let offset = sql_bound(query.offset.unwrap_or(0));

    let raws: Vec<RawRating> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(params![website, filter, limit, offset], RawRating::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRating::into_rating).collect()
  }

  // ── Comments ──────────────────────────────────────────────────────────────

  async fn insert_comment(&self, input: NewComment) -> Result<CommentWrite> {
    let now = Utc::now();
    let comment = Comment {
      comment_id:  Uuid::new_v4(),
      target_id:   input.target_id,
      parent_id:   input.parent_id,
      user_id:     input.user_id,
      user_name:   input.user_name,
      user_photo:  input.user_photo,
      content:     input.content,
      likes:       0,
      liked_by:    Default::default(),
      is_approved: true,
      is_deleted:  false,
      created_at:  now,
      updated_at:  now,
    };
    let id = encode_uuid(comment.comment_id);
    let parent = comment.parent_id.map(encode_uuid);
    let now = encode_dt(now);

    let write = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if !website_exists(&tx, &comment.target_id)? {
          return Ok(CommentWrite::TargetNotFound);
        }
        if let Some(parent) = &parent {
          // Tombstones keep their replies but accept no new ones.
          let parent_row: Option<(String, bool)> = tx
            .query_row(
              "SELECT website_id, is_deleted FROM comments WHERE comment_id = ?1",
              params![parent],
              |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;
          match parent_row {
            Some((website, false)) if website == comment.target_id => {}
            _ => return Ok(CommentWrite::ParentNotFound),
          }
        }

        tx.execute(
          "INSERT INTO comments (
             comment_id, website_id, parent_id, user_id, user_name, user_photo,
             content, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
          params![
            id,
            comment.target_id,
            parent,
            comment.user_id,
            comment.user_name,
            comment.user_photo,
            comment.content,
            now,
          ],
        )?;
        tx.execute(
          "UPDATE websites SET comment_count = comment_count + 1, updated_at = ?2
            WHERE website_id = ?1",
          params![comment.target_id, now],
        )?;
        tx.commit()?;
        Ok(CommentWrite::Created(comment))
      })
      .await?;
    Ok(write)
  }

  async fn get_comment(&self, comment_id: Uuid) -> Result<Option<Comment>> {
    let id = encode_uuid(comment_id);
    let raw = self
      .conn
      .call(move |conn| Ok(select_comment(conn, &id)?))
      .await?;
    raw.map(RawComment::into_comment).transpose()
  }

  async fn list_comments(&self, target_id: &str) -> Result<Vec<Comment>> {
    let website = target_id.to_owned();

    let raws: Vec<RawComment> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM comments
            WHERE website_id = ?1 AND is_approved = 1
            ORDER BY created_at ASC, rowid ASC",
          RawComment::COLUMNS
        ))?;
        let rows = stmt
          .query_map(params![website], RawComment::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawComment::into_comment).collect()
  }

  async fn toggle_comment_like(
    &self,
    comment_id: Uuid,
    user_id: &str,
  ) -> Result<Option<CommentLikeWrite>> {
    let id = encode_uuid(comment_id);
    let user = user_id.to_owned();

    let outcome: Option<(bool, RawComment)> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let Some(mut raw) = select_comment(&tx, &id)? else { return Ok(None) };
        if raw.is_deleted {
          return Ok(None);
        }

        let mut liked_by = parse_liked_by(&raw.liked_by).map_err(json_in_call)?;
        let liked = if liked_by.remove(&user) {
          false
        } else {
          liked_by.insert(user);
          true
        };
        raw.liked_by = serde_json::to_string(&liked_by).map_err(json_in_call)?;
        raw.likes = liked_by.len() as i64;

        tx.execute(
          "UPDATE comments SET liked_by = ?2, likes = ?3 WHERE comment_id = ?1",
          params![id, raw.liked_by, raw.likes],
        )?;
        tx.commit()?;
        Ok(Some((liked, raw)))
      })
      .await?;

    let Some((liked, raw)) = outcome else { return Ok(None) };
    let comment = raw.into_comment()?;
    Ok(Some(CommentLikeWrite {
      toggle: LikeToggle { liked, new_count: comment.likes },
      comment,
    }))
  }

  async fn update_comment_content(
    &self,
    comment_id: Uuid,
    user_id: &str,
    content: String,
  ) -> Result<CommentEdit> {
    let id = encode_uuid(comment_id);
    let user = user_id.to_owned();
    let now = encode_dt(Utc::now());

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let Some(mut raw) = select_comment(&tx, &id)? else { return Ok(Checked::Missing) };
        if raw.is_deleted {
          return Ok(Checked::Missing);
        }
        if raw.user_id != user {
          return Ok(Checked::Denied);
        }
        tx.execute(
          "UPDATE comments SET content = ?2, updated_at = ?3 WHERE comment_id = ?1",
          params![id, content, now],
        )?;
        tx.commit()?;
        raw.content = content;
        raw.updated_at = now;
        Ok(Checked::Done(raw))
      })
      .await?;

    Ok(match outcome {
      Checked::Done(raw) => CommentEdit::Updated(raw.into_comment()?),
      Checked::Missing => CommentEdit::NotFound,
      Checked::Denied => CommentEdit::NotAuthorized,
    })
  }

  async fn delete_comment(
    &self,
    comment_id: Uuid,
    requester_id: &str,
    is_moderator: bool,
  ) -> Result<CommentDelete> {
    let id = encode_uuid(comment_id);
    let requester = requester_id.to_owned();
    let now = encode_dt(Utc::now());

    let outcome: Checked<(bool, RawComment)> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let Some(mut raw) = select_comment(&tx, &id)? else { return Ok(Checked::Missing) };
        if raw.is_deleted {
          return Ok(Checked::Missing);
        }
        if !is_moderator && raw.user_id != requester {
          return Ok(Checked::Denied);
        }

        let tombstone = has_replies(&tx, &id)?;
        if tombstone {
          tx.execute(
            "UPDATE comments
                SET is_deleted = 1, content = '', likes = 0, liked_by = '[]', updated_at = ?2
              WHERE comment_id = ?1",
            params![id, now],
          )?;
          raw.is_deleted = true;
          raw.content.clear();
          raw.likes = 0;
          raw.liked_by = "[]".to_owned();
          raw.updated_at = now.clone();
        } else {
          tx.execute("DELETE FROM comments WHERE comment_id = ?1", params![id])?;
          // Tombstones left without replies have nothing left to hold up.
          let mut parent = raw.parent_id.clone();
          while let Some(parent_id) = parent.take() {
            let Some(p) = select_comment(&tx, &parent_id)? else { break };
            if !p.is_deleted || has_replies(&tx, &parent_id)? {
              break;
            }
            tx.execute("DELETE FROM comments WHERE comment_id = ?1", params![parent_id])?;
            parent = p.parent_id;
          }
        }

        tx.execute(
          "UPDATE websites SET comment_count = MAX(comment_count - 1, 0), updated_at = ?2
            WHERE website_id = ?1",
          params![raw.website_id, now],
        )?;
        tx.commit()?;
        Ok(Checked::Done((tombstone, raw)))
      })
      .await?;

    Ok(match outcome {
      Checked::Done((true, raw)) => CommentDelete::Tombstoned(raw.into_comment()?),
      Checked::Done((false, raw)) => CommentDelete::Removed(raw.into_comment()?),
      Checked::Missing => CommentDelete::NotFound,
      Checked::Denied => CommentDelete::NotAuthorized,
    })
  }

  // ── Notifications ─────────────────────────────────────────────────────────

  async fn notification_preferences(&self, user_id: &str) -> Result<NotificationPreferences> {
    let id = user_id.to_owned();

    let prefs = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT notify_follow, notify_like, notify_comment, notify_reply,
                      notify_comment_like, notify_rating
                 FROM notification_preferences WHERE user_id = ?1",
              params![id],
              preferences_from_row,
            )
            .optional()?,
        )
      })
      .await?;
    Ok(prefs.unwrap_or_default())
  }

  async fn set_notification_preferences(
    &self,
    user_id: &str,
    prefs: NotificationPreferences,
  ) -> Result<()> {
    let id = user_id.to_owned();
    let now = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO notification_preferences (
             user_id, notify_follow, notify_like, notify_comment, notify_reply,
             notify_comment_like, notify_rating, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
           ON CONFLICT(user_id) DO UPDATE SET
             notify_follow = excluded.notify_follow,
             notify_like = excluded.notify_like,
             notify_comment = excluded.notify_comment,
             notify_reply = excluded.notify_reply,
             notify_comment_like = excluded.notify_comment_like,
             notify_rating = excluded.notify_rating,
             updated_at = excluded.updated_at",
          params![
            id,
            prefs.follow,
            prefs.like,
            prefs.comment,
            prefs.reply,
            prefs.comment_like,
            prefs.rating,
            now,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn insert_notification(&self, input: NewNotification) -> Result<Notification> {
    let notification = Notification {
      notification_id: Uuid::new_v4(),
      kind:            input.kind,
      recipient_id:    input.recipient_id,
      sender_id:       input.sender_id,
      sender_name:     input.sender_name,
      sender_photo:    input.sender_photo,
      title:           input.title,
      message:         input.message,
      is_read:         false,
      created_at:      Utc::now(),
      payload:         input.payload,
    };

    let id = encode_uuid(notification.notification_id);
    let kind = notification.kind.as_ref().to_owned();
    let recipient = notification.recipient_id.clone();
    let sender_id = notification.sender_id.clone();
    let sender_name = notification.sender_name.clone();
    let sender_photo = notification.sender_photo.clone();
    let title = notification.title.clone();
    let message = notification.message.clone();
    let created_at = encode_dt(notification.created_at);
    let payload = notification.payload.to_string();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO notifications (
             notification_id, kind, recipient_id, sender_id, sender_name, sender_photo,
             title, message, created_at, payload
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
          params![
            id,
            kind,
            recipient,
            sender_id,
            sender_name,
            sender_photo,
            title,
            message,
            created_at,
            payload,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(notification)
  }

  async fn list_notifications(
    &self,
    recipient_id: &str,
    query: &NotificationQuery,
  ) -> Result<Vec<Notification>> {
    let recipient = recipient_id.to_owned();
    let unread_only = query.unread_only;
    let limit = sql_bound(query.limit.unwrap_or(Page::DEFAULT_LIMIT));

    let raws: Vec<RawNotification> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM notifications
            WHERE recipient_id = ?1 AND (?2 = 0 OR is_read = 0)
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?3",
          RawNotification::COLUMNS
        ))?;
        let rows = stmt
          .query_map(params![recipient, unread_only, limit], RawNotification::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawNotification::into_notification).collect()
  }

  async fn unread_notification_count(&self, recipient_id: &str) -> Result<u64> {
    let recipient = recipient_id.to_owned();

    let n: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*) FROM notifications WHERE recipient_id = ?1 AND is_read = 0",
          params![recipient],
          |r| r.get(0),
        )?)
      })
      .await?;
    Ok(count(n))
  }

  async fn mark_notification_read(&self, notification_id: Uuid, recipient_id: &str) -> Result<bool> {
    let id = encode_uuid(notification_id);
    let recipient = recipient_id.to_owned();

    let updated = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE notifications SET is_read = 1
            WHERE notification_id = ?1 AND recipient_id = ?2",
          params![id, recipient],
        )?)
      })
      .await?;
    Ok(updated > 0)
  }

  async fn mark_all_notifications_read(&self, recipient_id: &str) -> Result<u64> {
    let recipient = recipient_id.to_owned();

    let updated = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE notifications SET is_read = 1 WHERE recipient_id = ?1 AND is_read = 0",
          params![recipient],
        )?)
      })
      .await?;
    Ok(updated as u64)
  }

  async fn delete_notification(&self, notification_id: Uuid, recipient_id: &str) -> Result<bool> {
    let id = encode_uuid(notification_id);
    let recipient = recipient_id.to_owned();

    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM notifications WHERE notification_id = ?1 AND recipient_id = ?2",
          params![id, recipient],
        )?)
      })
      .await?;
    Ok(deleted > 0)
  }
}

// ─── Private helpers ─────────────────────────────────────────────────────────

impl SqliteStore {
  /// Run one of the follower/following listing queries. `sql` takes the user
  /// id, limit and offset as `?1..?3`.
  async fn list_follow_edges(
    &self,
    sql: &'static str,
    user_id: &str,
    page: Page,
  ) -> Result<Vec<FollowUser>> {
    let id = user_id.to_owned();
    let limit = sql_bound(page.limit());
    let offset = sql_bound(page.offset());

    let raws: Vec<RawFollowUser> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
          .query_map(params![id, limit, offset], |r| {
            Ok(RawFollowUser {
              user_id:      r.get(0)?,
              display_name: r.get(1)?,
              photo_url:    r.get(2)?,
              followed_at:  r.get(3)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawFollowUser::into_follow_user).collect()
  }
}
