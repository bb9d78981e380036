//! # mural-store
//!
//! Relational storage for the Mural feed, backed by SQLite.
//!
//! The crate exposes a synchronous `Database` handle that wraps a
//! `rusqlite::Connection` and provides typed helpers for users, posts,
//! likes and comments. Reads hand back fully populated
//! [`mural_shared::Post`] values so the server can serialize them as-is.

pub mod comments;
pub mod database;
pub mod likes;
pub mod migrations;
pub mod posts;
pub mod users;

mod error;
mod rows;

pub use database::Database;
pub use error::{Result, StoreError};
pub use likes::LikeToggle;
pub use users::{NewUser, UserCredentials};
