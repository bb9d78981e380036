//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;

use mural_shared::constants::DEFAULT_HTTP_PORT;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// SQLite database file.
    /// Env: `DATABASE_PATH`
    /// Default: platform data directory (`mural/mural.db`).
    pub database_path: Option<PathBuf>,

    /// Lifetime of an issued bearer token, in seconds.
    /// Env: `SESSION_TTL_SECS`
    /// Default: 7 days
    pub session_ttl_secs: u64,

    /// Maximum accepted request body.
    /// Env: `MAX_BODY_BYTES`
    /// Default: 64 KiB
    pub max_body_bytes: usize,

    /// Sustained writes (posts, likes, comments, sign-ups) per minute for
    /// one caller. Reads are not metered.
    /// Env: `WRITE_RATE_PER_MIN`
    /// Default: 60
    pub write_rate_per_min: f64,

    /// Writes a caller may make back to back before the rate applies.
    /// Env: `WRITE_BURST`
    /// Default: 20
    pub write_burst: f64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            database_path: None,
            session_ttl_secs: 7 * 24 * 3600,
            max_body_bytes: 64 * 1024,
            write_rate_per_min: 60.0,
            write_burst: 20.0,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("HTTP_ADDR") {
            match addr.parse::<SocketAddr>() {
                Ok(parsed) => config.http_addr = parsed,
                Err(_) => tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default"),
            }
        }

        if let Some(path) = lookup("DATABASE_PATH") {
            if !path.is_empty() {
                config.database_path = Some(PathBuf::from(path));
            }
        }

        if let Some(n) = parse_var(&lookup, "SESSION_TTL_SECS") {
            config.session_ttl_secs = n;
        }

        if let Some(n) = parse_var(&lookup, "MAX_BODY_BYTES") {
            config.max_body_bytes = n;
        }

        match parse_var::<f64>(&lookup, "WRITE_RATE_PER_MIN") {
            Some(n) if n > 0.0 => config.write_rate_per_min = n,
            Some(n) => tracing::warn!(value = n, "WRITE_RATE_PER_MIN must be positive, using default"),
            None => {}
        }

        match parse_var::<f64>(&lookup, "WRITE_BURST") {
            Some(n) if n >= 1.0 => config.write_burst = n,
            Some(n) => tracing::warn!(value = n, "WRITE_BURST must be at least 1, using default"),
            None => {}
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Invalid value, using default");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 8080).into());
        assert!(config.database_path.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("HTTP_ADDR", "127.0.0.1:9000"),
            ("DATABASE_PATH", "/tmp/mural.db"),
            ("SESSION_TTL_SECS", "60"),
        ]));
        assert_eq!(config.http_addr, ([127, 0, 0, 1], 9000).into());
        assert_eq!(config.database_path, Some(PathBuf::from("/tmp/mural.db")));
        assert_eq!(config.session_ttl_secs, 60);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("HTTP_ADDR", "not an address"),
            ("MAX_BODY_BYTES", "lots"),
            ("WRITE_BURST", "0"),
        ]));
        let default = ServerConfig::default();
        assert_eq!(config.http_addr, default.http_addr);
        assert_eq!(config.max_body_bytes, default.max_body_bytes);
        assert_eq!(config.write_burst, default.write_burst);
    }
}
