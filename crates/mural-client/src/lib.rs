//! # mural-client
//!
//! Client side of the Mural feed.
//!
//! - [`api`]: thin HTTP wrappers around the REST API, one round trip per call
//! - [`storage`] and [`session`]: the persisted login session
//! - [`feed`]: the feed state controller, which owns the post list and
//!   refetches it after every mutation
//! - [`view`]: render models derived from feed snapshots
//!
//! State flows one way. Presentation code calls controller operations and
//! re-renders from the snapshots the controller publishes on a
//! `tokio::sync::watch` channel; it never mutates the snapshot itself.

pub mod api;
pub mod config;
pub mod error;
pub mod feed;
pub mod session;
pub mod storage;
pub mod view;

use tracing_subscriber::{fmt, EnvFilter};

pub use api::{AuthApi, FeedApi, HttpApi};
pub use config::ClientConfig;
pub use error::{ApiError, FeedError, SessionError, StorageError};
pub use feed::{FeedController, FeedSnapshot, PostUiState};
pub use session::{RestoreOutcome, Session, SessionInvalidator, SessionStore};
pub use storage::{MemoryStorage, SessionStorage, SqliteStorage};

/// Install the global tracing subscriber (respects `RUST_LOG`).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("mural_client=info,warn"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .init();
}
