use std::collections::HashMap;

use chrono::Utc;
use mural_shared::Like;
use rusqlite::params;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::rows::{encode_ts, new_id};

/// Outcome of a like toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeToggle {
    /// Whether the user likes the post after the toggle.
    pub liked: bool,
    /// Likes on the post after the toggle.
    pub like_count: u64,
}

impl Database {
    /// Add the user's like if absent, remove it if present.
    ///
    /// Runs in one transaction. The `(post_id, user_id)` unique index
    /// guarantees a user never holds two like records on a post, even under
    /// concurrent duplicate requests.
    pub fn toggle_like(&self, post_id: &str, user_id: &str) -> Result<LikeToggle> {
        let tx = self.conn().unchecked_transaction()?;

        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM posts WHERE id = ?1)",
            params![post_id],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(StoreError::NotFound);
        }

        let removed = tx.execute(
            "DELETE FROM likes WHERE post_id = ?1 AND user_id = ?2",
            params![post_id, user_id],
        )?;

        let liked = if removed > 0 {
            false
        } else {
            tx.execute(
                "INSERT OR IGNORE INTO likes (id, post_id, user_id, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![new_id(), post_id, user_id, encode_ts(&Utc::now())],
            )?;
            true
        };

        let like_count: i64 = tx.query_row(
            "SELECT COUNT(*) FROM likes WHERE post_id = ?1",
            params![post_id],
            |row| row.get(0),
        )?;
        let like_count = like_count.max(0) as u64;

        tx.commit()?;

        tracing::debug!(post_id, user_id, liked, like_count, "like toggled");

        Ok(LikeToggle { liked, like_count })
    }

    pub fn likes_for_post(&self, post_id: &str) -> Result<Vec<Like>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, post_id, user_id FROM likes
             WHERE post_id = ?1 ORDER BY created_at ASC, rowid ASC",
        )?;

        let rows = stmt.query_map(params![post_id], row_to_like)?;
        let mut likes = Vec::new();
        for row in rows {
            likes.push(row?);
        }
        Ok(likes)
    }

    /// All likes grouped by post id (batch query for feed listing).
    pub(crate) fn likes_by_post(&self) -> Result<HashMap<String, Vec<Like>>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, post_id, user_id FROM likes ORDER BY created_at ASC, rowid ASC",
        )?;

        let rows = stmt.query_map([], row_to_like)?;
        let mut map: HashMap<String, Vec<Like>> = HashMap::new();
        for row in rows {
            let like = row?;
            map.entry(like.post_id.clone()).or_default().push(like);
        }
        Ok(map)
    }
}

fn row_to_like(row: &rusqlite::Row<'_>) -> rusqlite::Result<Like> {
    Ok(Like {
        id: row.get(0)?,
        post_id: row.get(1)?,
        user_id: row.get(2)?,
    })
}
