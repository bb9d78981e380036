//! v001 -- Initial schema creation.
//!
//! Creates the four core tables: `users`, `posts`, `likes` and `comments`.

use rusqlite::Connection;

const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id            TEXT PRIMARY KEY NOT NULL,
    name          TEXT NOT NULL,
    email         TEXT NOT NULL UNIQUE,
    avatar        TEXT,
    password_hash TEXT NOT NULL,              -- hex BLAKE3(salt || password)
    password_salt TEXT NOT NULL,              -- hex, 16 random bytes
    created_at    TEXT NOT NULL               -- RFC-3339, microseconds, UTC
);

-- ----------------------------------------------------------------
-- Posts
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS posts (
    id         TEXT PRIMARY KEY NOT NULL,
    author_id  TEXT NOT NULL,                 -- FK -> users(id)
    content    TEXT NOT NULL,
    created_at TEXT NOT NULL,

    FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_posts_created ON posts(created_at DESC);

-- ----------------------------------------------------------------
-- Likes: at most one per (post, user)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS likes (
    id         TEXT PRIMARY KEY NOT NULL,
    post_id    TEXT NOT NULL,                 -- FK -> posts(id)
    user_id    TEXT NOT NULL,                 -- FK -> users(id)
    created_at TEXT NOT NULL,

    FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE,
    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_likes_unique ON likes(post_id, user_id);

-- ----------------------------------------------------------------
-- Comments
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS comments (
    id         TEXT PRIMARY KEY NOT NULL,
    post_id    TEXT NOT NULL,                 -- FK -> posts(id)
    author_id  TEXT NOT NULL,                 -- FK -> users(id)
    content    TEXT NOT NULL,
    created_at TEXT NOT NULL,

    FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE,
    FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_id, created_at);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
