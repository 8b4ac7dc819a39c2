//! SQL schema for the sitedir SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.
//!
//! No foreign keys are declared: like the document store this layer stands in
//! for, relationships are upheld by the store's own transactions.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA busy_timeout = 5000;

CREATE TABLE IF NOT EXISTS users (
    user_id      TEXT PRIMARY KEY,
    display_name TEXT NOT NULL,
    photo_url    TEXT,
    updated_at   TEXT NOT NULL
);

-- One row per submitted website; carries every cached aggregate.
CREATE TABLE IF NOT EXISTS websites (
    website_id     TEXT PRIMARY KEY,
    owner_id       TEXT NOT NULL,
    title          TEXT NOT NULL,
    url            TEXT NOT NULL,
    likes          INTEGER NOT NULL DEFAULT 0 CHECK (likes >= 0),
    views          INTEGER NOT NULL DEFAULT 0 CHECK (views >= 0),
    comment_count  INTEGER NOT NULL DEFAULT 0 CHECK (comment_count >= 0),
    total_ratings  INTEGER NOT NULL DEFAULT 0 CHECK (total_ratings >= 0),
    average_rating REAL    NOT NULL DEFAULT 0,
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL
);

-- ── Follow graph ─────────────────────────────────────────────────────────────

CREATE TABLE IF NOT EXISTS follows (
    follower_id  TEXT NOT NULL,
    following_id TEXT NOT NULL,
    created_at   TEXT NOT NULL,
    PRIMARY KEY (follower_id, following_id),
    CHECK (follower_id != following_id)
);

CREATE TABLE IF NOT EXISTS follow_stats (
    user_id         TEXT PRIMARY KEY,
    followers_count INTEGER NOT NULL DEFAULT 0 CHECK (followers_count >= 0),
    following_count INTEGER NOT NULL DEFAULT 0 CHECK (following_count >= 0),
    updated_at      TEXT NOT NULL
);

-- Append-only.
CREATE TABLE IF NOT EXISTS follow_activity (
    activity_id  TEXT PRIMARY KEY,
    user_id      TEXT NOT NULL,
    following_id TEXT NOT NULL,
    created_at   TEXT NOT NULL
);

-- ── Likes and views ──────────────────────────────────────────────────────────

CREATE TABLE IF NOT EXISTS likes (
    website_id TEXT NOT NULL,
    user_id    TEXT NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (website_id, user_id)
);

-- The primary key is the dedup key: one view per viewer per day.
CREATE TABLE IF NOT EXISTS views (
    website_id TEXT NOT NULL,
    viewer_id  TEXT NOT NULL,   -- 'user:<id>' | 'anon:<token>'
    day        TEXT NOT NULL,   -- YYYY-MM-DD, UTC
    created_at TEXT NOT NULL,
    PRIMARY KEY (website_id, viewer_id, day)
);

-- ── Ratings ──────────────────────────────────────────────────────────────────

CREATE TABLE IF NOT EXISTS ratings (
    rating_id  TEXT PRIMARY KEY,
    website_id TEXT NOT NULL,
    user_id    TEXT NOT NULL,
    rating     INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
    review     TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (website_id, user_id)
);

CREATE TABLE IF NOT EXISTS rating_stats (
    website_id     TEXT PRIMARY KEY,
    count_1        INTEGER NOT NULL DEFAULT 0 CHECK (count_1 >= 0),
    count_2        INTEGER NOT NULL DEFAULT 0 CHECK (count_2 >= 0),
    count_3        INTEGER NOT NULL DEFAULT 0 CHECK (count_3 >= 0),
    count_4        INTEGER NOT NULL DEFAULT 0 CHECK (count_4 >= 0),
    count_5        INTEGER NOT NULL DEFAULT 0 CHECK (count_5 >= 0),
    total_ratings  INTEGER NOT NULL DEFAULT 0,
    average_rating REAL    NOT NULL DEFAULT 0,
    updated_at     TEXT NOT NULL
);

-- ── Comments ─────────────────────────────────────────────────────────────────

CREATE TABLE IF NOT EXISTS comments (
    comment_id  TEXT PRIMARY KEY,
    website_id  TEXT NOT NULL,
    parent_id   TEXT,
    user_id     TEXT NOT NULL,
    user_name   TEXT,
    user_photo  TEXT,
    content     TEXT NOT NULL,
    likes       INTEGER NOT NULL DEFAULT 0 CHECK (likes >= 0),
    liked_by    TEXT NOT NULL DEFAULT '[]',   -- JSON array of user ids
    is_approved INTEGER NOT NULL DEFAULT 1,
    is_deleted  INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

-- ── Notifications ────────────────────────────────────────────────────────────

-- Write-once apart from is_read.
CREATE TABLE IF NOT EXISTS notifications (
    notification_id TEXT PRIMARY KEY,
    kind            TEXT NOT NULL,
    recipient_id    TEXT NOT NULL,
    sender_id       TEXT,
    sender_name     TEXT,
    sender_photo    TEXT,
    title           TEXT NOT NULL,
    message         TEXT NOT NULL,
    is_read         INTEGER NOT NULL DEFAULT 0,
    created_at      TEXT NOT NULL,
    payload         TEXT NOT NULL DEFAULT '{}'
);

CREATE TABLE IF NOT EXISTS notification_preferences (
    user_id             TEXT PRIMARY KEY,
    notify_follow       INTEGER NOT NULL DEFAULT 1,
    notify_like         INTEGER NOT NULL DEFAULT 1,
    notify_comment      INTEGER NOT NULL DEFAULT 1,
    notify_reply        INTEGER NOT NULL DEFAULT 1,
    notify_comment_like INTEGER NOT NULL DEFAULT 1,
    notify_rating       INTEGER NOT NULL DEFAULT 1,
    updated_at          TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS follows_following_idx      ON follows(following_id);
CREATE INDEX IF NOT EXISTS follow_activity_user_idx   ON follow_activity(user_id, created_at);
CREATE INDEX IF NOT EXISTS ratings_website_idx        ON ratings(website_id, created_at);
CREATE INDEX IF NOT EXISTS comments_website_idx       ON comments(website_id, created_at);
CREATE INDEX IF NOT EXISTS comments_parent_idx        ON comments(parent_id);
CREATE INDEX IF NOT EXISTS notifications_recipient_idx ON notifications(recipient_id, created_at);

PRAGMA user_version = 1;
";
