//! Comment persistence. Comments are append-only.

use std::collections::HashMap;

use chrono::Utc;
use mural_shared::Comment;
use rusqlite::params;

use crate::database::Database;
use crate::error::{not_found, Result};
use crate::rows::{author_at, decode_ts, encode_ts, new_id};

const SELECT_COMMENT: &str = "SELECT c.id, c.post_id, c.author_id, c.content, c.created_at,
        u.id, u.name, u.email, u.avatar
     FROM comments c
     JOIN users u ON u.id = c.author_id";

impl Database {
    /// Insert a comment and return it with the author summary embedded.
    ///
    /// Unknown `post_id` or `author_id` fail with a foreign-key error.
    pub fn create_comment(&self, post_id: &str, author_id: &str, content: &str) -> Result<Comment> {
        let id = new_id();
        self.conn().execute(
            "INSERT INTO comments (id, post_id, author_id, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, post_id, author_id, content, encode_ts(&Utc::now())],
        )?;

        tracing::debug!(comment_id = %id, post_id, "comment created");

        self.get_comment(&id)
    }

    pub fn get_comment(&self, id: &str) -> Result<Comment> {
        self.conn()
            .query_row(
                &format!("{SELECT_COMMENT} WHERE c.id = ?1"),
                params![id],
                row_to_comment,
            )
            .map_err(not_found)
    }

    /// Comments on one post, oldest first.
    pub fn comments_for_post(&self, post_id: &str) -> Result<Vec<Comment>> {
        let mut stmt = self.conn().prepare(&format!(
            "{SELECT_COMMENT} WHERE c.post_id = ?1 ORDER BY c.created_at ASC, c.rowid ASC"
        ))?;

        let rows = stmt.query_map(params![post_id], row_to_comment)?;
        let mut comments = Vec::new();
        for row in rows {
            comments.push(row?);
        }
        Ok(comments)
    }

    pub(crate) fn comments_by_post(&self) -> Result<HashMap<String, Vec<Comment>>> {
        let mut stmt = self.conn().prepare(&format!(
            "{SELECT_COMMENT} ORDER BY c.created_at ASC, c.rowid ASC"
        ))?;

        let rows = stmt.query_map([], row_to_comment)?;
        let mut map: HashMap<String, Vec<Comment>> = HashMap::new();
        for row in rows {
            let comment = row?;
            map.entry(comment.post_id.clone()).or_default().push(comment);
        }
        Ok(map)
    }
}

fn row_to_comment(row: &rusqlite::Row<'_>) -> rusqlite::Result<Comment> {
    let ts: String = row.get(4)?;
    Ok(Comment {
        id: row.get(0)?,
        post_id: row.get(1)?,
        author_id: row.get(2)?,
        content: row.get(3)?,
        created_at: decode_ts(4, &ts)?,
        author: author_at(row, 5)?,
    })
}
