//! CRUD operations for user accounts.

use chrono::{DateTime, Utc};
use mural_shared::User;
use rusqlite::{params, OptionalExtension};

use crate::database::Database;
use crate::error::{not_found, Result, StoreError};
use crate::rows::{encode_ts, new_id};

/// Fields needed to create an account. The caller hashes the password.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Explicit id, or `None` to generate a UUID.
    pub id: Option<String>,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub password_hash: String,
    pub password_salt: String,
}

/// A user together with the stored password material.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
    pub password_salt: String,
}

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new user. Fails with [`StoreError::Conflict`] when the email
    /// is already registered.
    pub fn create_user(&self, new: &NewUser) -> Result<User> {
        self.create_user_at(new, Utc::now())
    }

    pub fn create_user_at(&self, new: &NewUser, created_at: DateTime<Utc>) -> Result<User> {
        if self.get_user_by_email(&new.email)?.is_some() {
            return Err(StoreError::Conflict(format!(
                "email already registered: {}",
                new.email
            )));
        }

        let id = new.id.clone().unwrap_or_else(new_id);
        self.conn().execute(
            "INSERT INTO users (id, name, email, avatar, password_hash, password_salt, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id,
                new.name,
                new.email,
                new.avatar,
                new.password_hash,
                new.password_salt,
                encode_ts(&created_at),
            ],
        )?;

        tracing::debug!(user_id = %id, "user created");

        Ok(User {
            id,
            name: new.name.clone(),
            email: new.email.clone(),
            avatar: new.avatar.clone(),
        })
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get_user(&self, id: &str) -> Result<User> {
        self.conn()
            .query_row(
                "SELECT id, name, email, avatar FROM users WHERE id = ?1",
                params![id],
                row_to_user,
            )
            .map_err(not_found)
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = self
            .conn()
            .query_row(
                "SELECT id, name, email, avatar FROM users WHERE email = ?1",
                params![email],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    /// Look up the stored password material for a login attempt.
    pub fn user_credentials(&self, email: &str) -> Result<UserCredentials> {
        self.conn()
            .query_row(
                "SELECT id, name, email, avatar, password_hash, password_salt
                 FROM users WHERE email = ?1",
                params![email],
                |row| {
                    Ok(UserCredentials {
                        user: row_to_user(row)?,
                        password_hash: row.get(4)?,
                        password_salt: row.get(5)?,
                    })
                },
            )
            .map_err(not_found)
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        avatar: row.get(3)?,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn new_user(id: &str, name: &str) -> NewUser {
        NewUser {
            id: Some(id.to_string()),
            name: name.to_string(),
            email: format!("{id}@example.com"),
            avatar: None,
            password_hash: "00".repeat(32),
            password_salt: "11".repeat(16),
        }
    }

    #[test]
    fn create_and_fetch_user() {
        let db = Database::open_in_memory().unwrap();
        let user = db.create_user(&new_user("u1", "Ana")).unwrap();

        assert_eq!(db.get_user("u1").unwrap(), user);
        assert_eq!(db.get_user_by_email("u1@example.com").unwrap(), Some(user));
        assert!(matches!(db.get_user("nope"), Err(StoreError::NotFound)));
    }

    #[test]
    fn generated_ids_are_unique() {
        let db = Database::open_in_memory().unwrap();
        let mut a = new_user("x", "A");
        a.id = None;
        a.email = "a@example.com".into();
        let mut b = a.clone();
        b.email = "b@example.com".into();

        let a = db.create_user(&a).unwrap();
        let b = db.create_user(&b).unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn duplicate_email_conflicts() {
        let db = Database::open_in_memory().unwrap();
        db.create_user(&new_user("u1", "Ana")).unwrap();

        let mut dup = new_user("u2", "Bea");
        dup.email = "u1@example.com".into();
        assert!(matches!(db.create_user(&dup), Err(StoreError::Conflict(_))));
    }

    #[test]
    fn credentials_lookup() {
        let db = Database::open_in_memory().unwrap();
        db.create_user(&new_user("u1", "Ana")).unwrap();

        let creds = db.user_credentials("u1@example.com").unwrap();
        assert_eq!(creds.user.id, "u1");
        assert_eq!(creds.password_salt, "11".repeat(16));
        assert!(matches!(
            db.user_credentials("missing@example.com"),
            Err(StoreError::NotFound)
        ));
    }
}
