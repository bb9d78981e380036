//! Presentation binding: render models derived from a [`FeedSnapshot`].
//!
//! Everything here is a pure function of the snapshot and the viewer.
//! Renderers subscribe to the controller, rebuild a [`FeedView`] on every
//! snapshot and forward user intents back to the controller.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};

use mural_shared::validate::require_content;
use mural_shared::{Comment, Post, User};

use crate::feed::FeedSnapshot;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentView {
    pub id: String,
    pub author_name: String,
    pub author_initial: String,
    pub content: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostView {
    pub id: String,
    pub author_name: String,
    pub author_initial: String,
    pub content: String,
    pub created_at: String,
    /// Distinct users who liked the post.
    pub like_count: usize,
    pub liked_by_viewer: bool,
    /// False while a like for this post is in flight or nobody is logged in.
    pub like_enabled: bool,
    pub comment_count: usize,
    pub comments: Vec<CommentView>,
    pub draft: String,
    /// The draft is sendable and no comment is pending.
    pub can_comment: bool,
    pub comment_pending: bool,
    /// Failure scoped to this post.
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedView {
    /// First load still running: show a placeholder instead of posts.
    pub loading: bool,
    /// A reload is running over an already rendered list.
    pub refreshing: bool,
    /// Global error banner.
    pub banner: Option<String>,
    pub posts: Vec<PostView>,
}

pub fn feed_view(snapshot: &FeedSnapshot, viewer: Option<&User>) -> FeedView {
    FeedView {
        loading: snapshot.loading && !snapshot.loaded,
        refreshing: snapshot.loading && snapshot.loaded,
        banner: snapshot.last_error.as_ref().map(ToString::to_string),
        posts: snapshot
            .posts
            .iter()
            .map(|post| post_view(snapshot, post, viewer))
            .collect(),
    }
}

fn post_view(snapshot: &FeedSnapshot, post: &Post, viewer: Option<&User>) -> PostView {
    let liking = snapshot.is_liking(&post.id);
    let commenting = snapshot.is_commenting(&post.id);
    let draft = snapshot.draft(&post.id).to_string();

    PostView {
        id: post.id.clone(),
        author_name: post.author.name.clone(),
        author_initial: post.author.initial(),
        content: post.content.clone(),
        created_at: format_time(&post.created_at),
        like_count: post.distinct_like_count(),
        liked_by_viewer: viewer.is_some_and(|u| post.liked_by(&u.id)),
        like_enabled: viewer.is_some() && !liking,
        comment_count: post.comments.len(),
        comments: post.comments.iter().map(comment_view).collect(),
        can_comment: viewer.is_some() && !commenting && require_content("content", &draft).is_ok(),
        draft,
        comment_pending: commenting,
        error: snapshot.post_error(&post.id).map(ToString::to_string),
    }
}

fn comment_view(comment: &Comment) -> CommentView {
    CommentView {
        id: comment.id.clone(),
        author_name: comment.author.name.clone(),
        author_initial: comment.author.initial(),
        content: comment.content.clone(),
        created_at: format_time(&comment.created_at),
    }
}

/// Whether the compose box may be submitted.
pub fn can_publish(compose: &str, creating: bool) -> bool {
    !creating && require_content("content", compose).is_ok()
}

fn format_time(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M UTC").to_string()
}

/// Plain-text rendering for terminals.
pub fn render_feed(view: &FeedView) -> String {
    let mut out = String::new();

    if let Some(banner) = &view.banner {
        let _ = writeln!(out, "! {banner}");
    }
    if view.loading {
        out.push_str("Loading feed...\n");
        return out;
    }
    if view.posts.is_empty() {
        out.push_str("No posts yet.\n");
        return out;
    }

    for post in &view.posts {
        let heart = if post.liked_by_viewer { "♥" } else { "♡" };
        let _ = writeln!(out, "[{}] {} · {}", post.author_initial, post.author_name, post.created_at);
        let _ = writeln!(out, "  {}", post.content);
        let _ = writeln!(
            out,
            "  {heart} {}  💬 {}  (id {})",
            post.like_count, post.comment_count, post.id
        );
        for comment in &post.comments {
            let _ = writeln!(out, "    {}: {}", comment.author_name, comment.content);
        }
        if let Some(error) = &post.error {
            let _ = writeln!(out, "  ! {error}");
        }
        out.push('\n');
    }
    out
}
