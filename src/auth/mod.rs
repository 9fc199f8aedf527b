//! Bearer token storage in SQLite.
//!
//! The chat backend authenticates requests with a bearer token that the
//! browser client kept in a cookie. Here the token lives in the database
//! alongside settings; issuing and refreshing tokens is the server's
//! business, not ours.

use crate::db::Database;
use chrono::Utc;
use thiserror::Error;

/// Name under which the chat backend token is stored.
pub const CHAT_CREDENTIAL: &str = "chat";

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("No stored credential: {0}. Run with --token to store one.")]
    NotAuthenticated(String),
    #[error("Stored credential has expired. Run with --token to store a fresh one.")]
    Expired,
}

/// A stored bearer credential.
#[derive(Debug, Clone)]
pub struct StoredCredential {
    pub name: String,
    pub token: String,
    pub expires_at: Option<i64>,
    pub updated_at: i64,
}

impl StoredCredential {
    /// Check if the credential is expired.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now().timestamp() >= expires_at,
            None => false,
        }
    }
}

/// Credential storage operations.
pub struct CredentialStore<'a> {
    db: &'a Database,
}

impl<'a> CredentialStore<'a> {
    /// Create a new credential store.
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Save a credential, replacing any previous one with the same name.
    pub fn save(
        &self,
        name: &str,
        token: &str,
        expires_at: Option<i64>,
    ) -> Result<(), CredentialError> {
        self.db.conn().execute(
            "INSERT INTO credentials (name, token, expires_at, updated_at)
             VALUES (?1, ?2, ?3, unixepoch())
             ON CONFLICT(name) DO UPDATE SET
                token = excluded.token,
                expires_at = excluded.expires_at,
                updated_at = excluded.updated_at",
            rusqlite::params![name, token, expires_at],
        )?;
        Ok(())
    }

    /// Load a credential by name.
    pub fn get(&self, name: &str) -> Result<StoredCredential, CredentialError> {
        let result = self.db.conn().query_row(
            "SELECT name, token, expires_at, updated_at FROM credentials WHERE name = ?",
            [name],
            |row| {
                Ok(StoredCredential {
                    name: row.get(0)?,
                    token: row.get(1)?,
                    expires_at: row.get(2)?,
                    updated_at: row.get(3)?,
                })
            },
        );

        match result {
            Ok(cred) => Ok(cred),
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                Err(CredentialError::NotAuthenticated(name.to_string()))
            }
            Err(e) => Err(CredentialError::Database(e)),
        }
    }

    /// Load a credential and fail if it is expired.
    pub fn bearer_token(&self, name: &str) -> Result<String, CredentialError> {
        let cred = self.get(name)?;
        if cred.is_expired() {
            return Err(CredentialError::Expired);
        }
        Ok(cred.token)
    }

    /// Delete a credential.
    pub fn clear(&self, name: &str) -> Result<(), CredentialError> {
        self.db
            .conn()
            .execute("DELETE FROM credentials WHERE name = ?", [name])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_temp_db() -> (TempDir, Database) {
        let temp = TempDir::new().unwrap();
        let db = Database::open_at(temp.path().join("test.db")).unwrap();
        db.migrate().unwrap();
        (temp, db)
    }

    #[test]
    fn test_save_and_get() {
        let (_temp, db) = open_temp_db();
        let store = CredentialStore::new(&db);

        store.save(CHAT_CREDENTIAL, "tok-123", None).unwrap();
        let cred = store.get(CHAT_CREDENTIAL).unwrap();
        assert_eq!(cred.token, "tok-123");
        assert!(cred.expires_at.is_none());
        assert!(!cred.is_expired());
    }

    #[test]
    fn test_missing_credential() {
        let (_temp, db) = open_temp_db();
        let store = CredentialStore::new(&db);

        let err = store.bearer_token("chat").unwrap_err();
        assert!(matches!(err, CredentialError::NotAuthenticated(_)));
    }

    #[test]
    fn test_save_replaces() {
        let (_temp, db) = open_temp_db();
        let store = CredentialStore::new(&db);

        store.save(CHAT_CREDENTIAL, "old", None).unwrap();
        store.save(CHAT_CREDENTIAL, "new", None).unwrap();
        assert_eq!(store.bearer_token(CHAT_CREDENTIAL).unwrap(), "new");
    }

    #[test]
    fn test_expired_token_rejected() {
        let (_temp, db) = open_temp_db();
        let store = CredentialStore::new(&db);

        let past = Utc::now().timestamp() - 60;
        store.save(CHAT_CREDENTIAL, "stale", Some(past)).unwrap();

        let err = store.bearer_token(CHAT_CREDENTIAL).unwrap_err();
        assert!(matches!(err, CredentialError::Expired));
    }

    #[test]
    fn test_future_expiry_accepted() {
        let (_temp, db) = open_temp_db();
        let store = CredentialStore::new(&db);

        let future = Utc::now().timestamp() + 3600;
        store.save(CHAT_CREDENTIAL, "fresh", Some(future)).unwrap();
        assert_eq!(store.bearer_token(CHAT_CREDENTIAL).unwrap(), "fresh");
    }

    #[test]
    fn test_clear() {
        let (_temp, db) = open_temp_db();
        let store = CredentialStore::new(&db);

        store.save(CHAT_CREDENTIAL, "tok", None).unwrap();
        store.clear(CHAT_CREDENTIAL).unwrap();
        assert!(store.get(CHAT_CREDENTIAL).is_err());
    }
}
