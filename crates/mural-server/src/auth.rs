//! Password hashing and bearer-token sessions.
//!
//! Tokens are opaque random strings held in memory with an expiry, in a
//! `RwLock<HashMap>` behind an `Arc`, purged periodically by a background
//! task. Restarting the server invalidates every token.

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::HeaderMap;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use subtle::ConstantTimeEq;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::ServerError;

// ---------------------------------------------------------------------------
// Passwords
// ---------------------------------------------------------------------------

/// Hash `password` with a fresh random salt. Returns `(hash_hex, salt_hex)`.
pub fn hash_password(password: &str) -> (String, String) {
    let mut salt = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);
    (hex::encode(salted_hash(&salt, password)), hex::encode(salt))
}

/// Check `password` against stored hex hash and salt in constant time.
pub fn verify_password(password: &str, salt_hex: &str, hash_hex: &str) -> bool {
    let (Ok(salt), Ok(expected)) = (hex::decode(salt_hex), hex::decode(hash_hex)) else {
        return false;
    };
    let actual = salted_hash(&salt, password);
    expected.len() == actual.len() && actual.ct_eq(&expected).unwrap_u8() == 1
}

fn salted_hash(salt: &[u8], password: &str) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    *hasher.finalize().as_bytes()
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

/// Ten years; longer lifetimes are clamped.
const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 3600;

#[derive(Debug, Clone)]
struct SessionEntry {
    user_id: String,
    expires_at: DateTime<Utc>,
}

/// Issued bearer tokens and the user each one identifies.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<String, SessionEntry>>>,
    ttl: Duration,
}

impl SessionRegistry {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl: Duration::seconds(ttl_secs.min(MAX_TTL_SECS) as i64),
        }
    }

    /// Issue a new token for `user_id`.
    pub async fn issue(&self, user_id: &str) -> String {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let token = hex::encode(bytes);

        self.sessions.write().await.insert(
            token.clone(),
            SessionEntry {
                user_id: user_id.to_string(),
                expires_at: Utc::now() + self.ttl,
            },
        );

        debug!(user_id, "session issued");
        token
    }

    /// User id behind `token`, if the token is known and unexpired.
    pub async fn resolve(&self, token: &str) -> Option<String> {
        let sessions = self.sessions.read().await;
        sessions
            .get(token)
            .filter(|entry| Utc::now() < entry.expires_at)
            .map(|entry| entry.user_id.clone())
    }

    /// Resolve the `Authorization: Bearer <token>` header to a user id.
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<String, ServerError> {
        let token = bearer_token(headers)
            .ok_or_else(|| ServerError::Unauthorized("Missing bearer token".into()))?;
        self.resolve(token)
            .await
            .ok_or_else(|| ServerError::Unauthorized("Invalid or expired token".into()))
    }

    /// Remove expired sessions.
    pub async fn purge_expired(&self) {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| now < entry.expires_at);
        let removed = before - sessions.len();
        if removed > 0 {
            debug!(removed, "purged expired sessions");
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let auth = headers.get("authorization")?.to_str().ok()?;
    let token = auth.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}
