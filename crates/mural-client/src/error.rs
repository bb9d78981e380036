use mural_shared::ValidationError;
use thiserror::Error;

/// Failure of a single API round trip.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Rejected locally; no request was sent.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// An authenticated call was attempted without a session token.
    #[error("Not logged in")]
    NotAuthenticated,

    /// Non-success HTTP status.
    #[error("Request failed ({status}): {message}")]
    RequestFailed { status: u16, message: String },

    /// Connection, timeout or TLS failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The response body did not match the expected shape.
    #[error("Invalid response: {0}")]
    Decode(String),

    #[error("Invalid API URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    /// Message suitable for showing to the user: the server's own text for
    /// HTTP failures, the full description otherwise.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::RequestFailed { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// The server does not accept our credentials, or we have none.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            ApiError::NotAuthenticated | ApiError::RequestFailed { status: 401, .. }
        )
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ApiError::Decode(e.to_string())
        } else {
            ApiError::Transport(e.to_string())
        }
    }
}

/// Persisted client storage failure.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Lock poisoned")]
    Poisoned,
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Could not persist session: {0}")]
    Storage(#[from] StorageError),

    #[error("Could not encode user record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Observable failure of a feed controller operation.
///
/// Global conditions land in `FeedSnapshot::last_error`; per-post ones in
/// that post's `PostUiState::error`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeedError {
    #[error("{0}")]
    Validation(ValidationError),

    #[error("You need to log in first")]
    NotAuthenticated,

    /// The same operation is already in flight; nothing was sent.
    #[error("Already in progress")]
    AlreadyPending,

    #[error("Could not load the feed: {0}")]
    FetchFailed(String),

    #[error("Could not publish the post: {0}")]
    CreateFailed(String),

    #[error("Could not like the post: {message}")]
    LikeFailed { post_id: String, message: String },

    #[error("Could not add the comment: {message}")]
    CommentFailed { post_id: String, message: String },
}
