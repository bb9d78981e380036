//! Session store: the authenticated user and credential token.
//!
//! `SessionStore` is the only writer of the persisted session entries and of
//! the published [`Session`]. Everything else reads through
//! [`SessionStore::subscribe`].

use tokio::sync::watch;
use tracing::{info, warn};

use mural_shared::constants::{STORAGE_KEY_TOKEN, STORAGE_KEY_USER};
use mural_shared::protocol::{AuthResponse, RegisterRequest};
use mural_shared::User;

use crate::api::AuthApi;
use crate::error::{SessionError, StorageError};
use crate::storage::SessionStorage;

/// Published session state. Both fields are `Some` or both are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub user: Option<User>,
    pub token: Option<String>,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some() && self.token.is_some()
    }
}

/// How [`SessionStore::init`] ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// Token and user record were read back intact.
    Restored,
    /// The user record was unreadable; it was re-fetched with the token.
    Refreshed,
    /// Nothing was persisted.
    Empty,
    /// Persisted data was inconsistent or the refresh failed; storage was
    /// wiped and the session is unauthenticated.
    Cleared(String),
}

/// Drops a session the server no longer accepts.
///
/// Implemented by [`SessionStore`]; the feed controller calls it when a
/// request comes back 401.
pub trait SessionInvalidator: Send + Sync {
    fn invalidate(&self);
}

pub struct SessionStore<A, S> {
    api: A,
    storage: S,
    tx: watch::Sender<Session>,
}

impl<A: AuthApi, S: SessionStorage> SessionStore<A, S> {
    /// Create an unauthenticated store. Call [`init`](Self::init) to restore.
    pub fn new(api: A, storage: S) -> Self {
        let (tx, _rx) = watch::channel(Session::default());
        Self { api, storage, tx }
    }

    /// Restore the persisted session.
    ///
    /// Never fails: any inconsistency clears both entries and leaves the
    /// store unauthenticated.
    pub async fn init(&self) -> RestoreOutcome {
        match self.restore().await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "SessionRestoreFailed, clearing persisted session");
                if let Err(e) = self.clear_storage() {
                    warn!(error = %e, "Could not clear persisted session");
                }
                self.tx.send_replace(Session::default());
                RestoreOutcome::Cleared(e.to_string())
            }
        }
    }

    async fn restore(&self) -> Result<RestoreOutcome, RestoreError> {
        let token = self.storage.get(STORAGE_KEY_TOKEN)?;
        let user_json = self.storage.get(STORAGE_KEY_USER)?;

        let (token, user_json) = match (token, user_json) {
            (None, None) => return Ok(RestoreOutcome::Empty),
            (Some(token), Some(user_json)) => (token, user_json),
            _ => return Err(RestoreError::Partial),
        };

        if let Ok(user) = serde_json::from_str::<User>(&user_json) {
            info!(user_id = %user.id, "Session restored");
            self.publish(user, token);
            return Ok(RestoreOutcome::Restored);
        }

        warn!("Persisted user record is corrupt, refreshing profile");
        let user = self
            .api
            .profile(&token)
            .await
            .map_err(|e| RestoreError::Refresh(e.to_string()))?;
        let user_json = serde_json::to_string(&user)?;
        self.storage.set(STORAGE_KEY_USER, &user_json)?;

        info!(user_id = %user.id, "Session refreshed");
        self.publish(user, token);
        Ok(RestoreOutcome::Refreshed)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<User, SessionError> {
        let auth = self.api.login(email, password).await?;
        self.accept(auth)
    }

    pub async fn register(&self, req: &RegisterRequest) -> Result<User, SessionError> {
        let auth = self.api.register(req).await?;
        self.accept(auth)
    }

    /// Drop the session. Storage is cleared before the unauthenticated state
    /// is published.
    pub fn logout(&self) -> Result<(), SessionError> {
        let result = self.clear_storage();
        self.tx.send_replace(Session::default());
        info!("Logged out");
        result.map_err(SessionError::from)
    }

    /// Clear both persisted entries and publish the logged-out session.
    /// Does nothing when already logged out.
    pub fn invalidate(&self) {
        if !self.tx.borrow().is_authenticated() {
            return;
        }
        warn!("Session rejected by the server, logging out");
        if let Err(e) = self.clear_storage() {
            warn!(error = %e, "Could not clear persisted session");
        }
        self.tx.send_replace(Session::default());
    }

    pub fn current_user(&self) -> Option<User> {
        self.tx.borrow().user.clone()
    }

    pub fn token(&self) -> Option<String> {
        self.tx.borrow().token.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.tx.subscribe()
    }

    fn accept(&self, auth: AuthResponse) -> Result<User, SessionError> {
        let user_json = serde_json::to_string(&auth.user)?;
        self.storage.set(STORAGE_KEY_TOKEN, &auth.token)?;
        if let Err(e) = self.storage.set(STORAGE_KEY_USER, &user_json) {
            // Never leave a token without its user.
            let _ = self.storage.remove(STORAGE_KEY_TOKEN);
            return Err(e.into());
        }

        info!(user_id = %auth.user.id, "Logged in");
        self.publish(auth.user.clone(), auth.token);
        Ok(auth.user)
    }

    fn publish(&self, user: User, token: String) {
        self.tx.send_replace(Session {
            user: Some(user),
            token: Some(token),
        });
    }

    fn clear_storage(&self) -> Result<(), StorageError> {
        let token = self.storage.remove(STORAGE_KEY_TOKEN);
        let user = self.storage.remove(STORAGE_KEY_USER);
        token.and(user)
    }
}

impl<A: AuthApi, S: SessionStorage> SessionInvalidator for SessionStore<A, S> {
    fn invalidate(&self) {
        SessionStore::invalidate(self);
    }
}

#[derive(Debug, thiserror::Error)]
enum RestoreError {
    #[error("only one of token and user was persisted")]
    Partial,

    #[error("profile refresh failed: {0}")]
    Refresh(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Encode(#[from] serde_json::Error),
}
