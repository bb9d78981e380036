//! Client configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the REST API.
    /// Env: `MURAL_API_URL`
    /// Default: `http://127.0.0.1:8080`
    pub api_url: String,

    /// Directory holding the persisted session database.
    /// Env: `MURAL_DATA_DIR`
    /// Default: platform data directory, or `./.mural`.
    pub data_dir: PathBuf,

    /// Per-request timeout.
    /// Env: `MURAL_HTTP_TIMEOUT_SECS`
    /// Default: 15 seconds
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let data_dir = ProjectDirs::from("org", "mural", "mural")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".mural"));

        Self {
            api_url: "http://127.0.0.1:8080".to_string(),
            data_dir,
            request_timeout: Duration::from_secs(15),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup("MURAL_API_URL") {
            let url = url.trim().trim_end_matches('/');
            if !url.is_empty() {
                config.api_url = url.to_string();
            }
        }

        if let Some(dir) = lookup("MURAL_DATA_DIR") {
            if !dir.is_empty() {
                config.data_dir = PathBuf::from(dir);
            }
        }

        if let Some(secs) = lookup("MURAL_HTTP_TIMEOUT_SECS") {
            match secs.trim().parse::<u64>() {
                Ok(n) if n > 0 => config.request_timeout = Duration::from_secs(n),
                _ => tracing::warn!(value = %secs, "Invalid MURAL_HTTP_TIMEOUT_SECS, using default"),
            }
        }

        config
    }

    /// Path of the SQLite file holding the persisted session.
    pub fn session_db_path(&self) -> PathBuf {
        self.data_dir.join("session.db")
    }
}
