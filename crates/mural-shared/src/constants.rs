/// Default HTTP API port (server)
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Maximum length of a post or comment, in characters (after trimming)
pub const MAX_CONTENT_CHARS: usize = 5000;

/// REST routes
pub const PATH_HEALTH: &str = "/health";
pub const PATH_REGISTER: &str = "/api/auth/register";
pub const PATH_LOGIN: &str = "/api/auth/login";
pub const PATH_PROFILE: &str = "/api/auth/profile";
pub const PATH_POSTS: &str = "/api/posts";
pub const PATH_COMMENTS: &str = "/api/comments";
/// Like toggle for one post; `{id}` is the post id.
pub const PATH_POST_LIKES: &str = "/api/posts/{id}/likes";

/// Keys of the two persisted client session entries
pub const STORAGE_KEY_TOKEN: &str = "token";
pub const STORAGE_KEY_USER: &str = "user";

/// Error message returned when a comment body is incomplete
pub const COMMENT_FIELDS_REQUIRED: &str = "Content, authorId and postId are required";

/// Error message returned when comment persistence fails
pub const COMMENT_CREATE_FAILED: &str = "Failed to create comment";
