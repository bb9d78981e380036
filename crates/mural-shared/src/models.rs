//! Feed domain model.
//!
//! These are the shapes the server serializes and the client parses. Field
//! names go over the wire in camelCase; timestamps are RFC 3339.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// An authenticated account as seen by the feed. Owned by the session layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    /// Display name.
    pub name: String,
    pub email: String,
    /// Avatar reference (URL or blob id), if the user set one.
    pub avatar: Option<String>,
}

impl User {
    pub fn summary(&self) -> AuthorSummary {
        AuthorSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            avatar: self.avatar.clone(),
        }
    }
}

/// Author fields embedded in posts and comments.
///
/// Always serialized with exactly `id`, `name`, `email` and `avatar`
/// (`avatar` is `null` rather than omitted).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthorSummary {
    pub id: String,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
}

impl AuthorSummary {
    /// First character of the display name, upper-cased, for avatar badges.
    pub fn initial(&self) -> String {
        self.name
            .chars()
            .next()
            .map(|c| c.to_uppercase().collect())
            .unwrap_or_else(|| "?".to_string())
    }
}

// ---------------------------------------------------------------------------
// Post
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub author_id: String,
    pub author: AuthorSummary,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub likes: Vec<Like>,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

impl Post {
    /// Whether `user_id` has a like on this post.
    pub fn liked_by(&self, user_id: &str) -> bool {
        self.likes.iter().any(|like| like.user_id == user_id)
    }

    /// Number of distinct users who liked the post. Duplicate like records
    /// from one user are counted once.
    pub fn distinct_like_count(&self) -> usize {
        self.likes
            .iter()
            .map(|like| like.user_id.as_str())
            .collect::<HashSet<_>>()
            .len()
    }
}

// ---------------------------------------------------------------------------
// Like
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Like {
    pub id: String,
    pub post_id: String,
    pub user_id: String,
}

// ---------------------------------------------------------------------------
// Comment
// ---------------------------------------------------------------------------

/// A comment on a post. Append-only: there is no edit or delete.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub author_id: String,
    pub author: AuthorSummary,
    pub content: String,
    pub created_at: DateTime<Utc>,
}
