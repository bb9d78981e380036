//! CRUD operations for posts.
//!
//! Reads return fully populated [`Post`] values: author summary, likes in
//! insertion order, and comments oldest first.

use chrono::{DateTime, Utc};
use mural_shared::Post;
use rusqlite::params;

use crate::database::Database;
use crate::error::{not_found, Result};
use crate::rows::{author_at, decode_ts, encode_ts, new_id};

const SELECT_POST: &str = "SELECT p.id, p.author_id, p.content, p.created_at,
        u.id, u.name, u.email, u.avatar
     FROM posts p
     JOIN users u ON u.id = p.author_id";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a post written by `author_id` and return it, populated.
    pub fn create_post(&self, author_id: &str, content: &str) -> Result<Post> {
        self.insert_post(&new_id(), author_id, content, Utc::now())
    }

    /// Insert a post with an explicit id and timestamp.
    pub fn insert_post(
        &self,
        id: &str,
        author_id: &str,
        content: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Post> {
        self.conn().execute(
            "INSERT INTO posts (id, author_id, content, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![id, author_id, content, encode_ts(&created_at)],
        )?;

        tracing::debug!(post_id = %id, author_id = %author_id, "post created");

        self.get_post(id)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get_post(&self, id: &str) -> Result<Post> {
        let mut post = self
            .conn()
            .query_row(
                &format!("{SELECT_POST} WHERE p.id = ?1"),
                params![id],
                row_to_post,
            )
            .map_err(not_found)?;

        post.likes = self.likes_for_post(id)?;
        post.comments = self.comments_for_post(id)?;
        Ok(post)
    }

    /// Every post, newest first, each with its likes and comments.
    pub fn list_posts(&self) -> Result<Vec<Post>> {
        let mut stmt = self.conn().prepare(&format!(
            "{SELECT_POST} ORDER BY p.created_at DESC, p.rowid DESC"
        ))?;

        let rows = stmt.query_map([], row_to_post)?;
        let mut posts = Vec::new();
        for row in rows {
            posts.push(row?);
        }

        let mut likes = self.likes_by_post()?;
        let mut comments = self.comments_by_post()?;
        for post in &mut posts {
            post.likes = likes.remove(&post.id).unwrap_or_default();
            post.comments = comments.remove(&post.id).unwrap_or_default();
        }

        Ok(posts)
    }
}

fn row_to_post(row: &rusqlite::Row<'_>) -> rusqlite::Result<Post> {
    let ts: String = row.get(3)?;
    Ok(Post {
        id: row.get(0)?,
        author_id: row.get(1)?,
        content: row.get(2)?,
        created_at: decode_ts(3, &ts)?,
        author: author_at(row, 4)?,
        likes: Vec::new(),
        comments: Vec::new(),
    })
}
