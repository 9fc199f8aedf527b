//! Settings management via SQLite.

use crate::classify::Markers;
use crate::db::Database;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Setting not found: {0}")]
    NotFound(String),
}

/// Settings manager backed by SQLite.
pub struct Settings<'a> {
    db: &'a Database,
}

impl<'a> Settings<'a> {
    /// Create a new settings manager.
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Get a setting value.
    pub fn get(&self, key: &str) -> Result<Option<String>, SettingsError> {
        let result: Result<String, _> = self.db.conn().query_row(
            "SELECT value FROM settings WHERE key = ?",
            [key],
            |row| row.get(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(SettingsError::Database(e)),
        }
    }

    /// Get a setting value or return a default.
    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key)
            .ok()
            .flatten()
            .unwrap_or_else(|| default.to_string())
    }

    /// Get an integer setting or return a default.
    pub fn get_u64_or(&self, key: &str, default: u64) -> u64 {
        self.get(key)
            .ok()
            .flatten()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// Set a setting value.
    pub fn set(&self, key: &str, value: &str) -> Result<(), SettingsError> {
        self.db.conn().execute(
            "INSERT INTO settings (key, value, updated_at) VALUES (?, ?, unixepoch())
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            [key, value],
        )?;
        Ok(())
    }

    /// Delete a setting.
    pub fn delete(&self, key: &str) -> Result<(), SettingsError> {
        self.db
            .conn()
            .execute("DELETE FROM settings WHERE key = ?", [key])?;
        Ok(())
    }

    /// List all settings.
    pub fn list(&self) -> Result<Vec<(String, String)>, SettingsError> {
        let mut stmt = self
            .db
            .conn()
            .prepare("SELECT key, value FROM settings ORDER BY key")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut settings = Vec::new();
        for row in rows {
            settings.push(row?);
        }
        Ok(settings)
    }

    // Convenience accessors for common settings

    /// Get the chat backend base URL.
    pub fn server_url(&self) -> String {
        self.get_or("server_url", "http://localhost:8080")
    }

    /// Get the assistant display name.
    pub fn assistant_name(&self) -> String {
        self.get_or("assistant_name", "Assistant")
    }

    /// How long the title-bar alert stays up before reverting, in milliseconds.
    ///
    /// The upstream client shipped with values anywhere from 1s to 10s, so
    /// this is a setting rather than a constant.
    pub fn title_alert_ms(&self) -> u64 {
        self.get_u64_or("title_alert_ms", 5000)
    }

    /// The title shown while an alert is active.
    pub fn title_alert_text(&self) -> String {
        self.get_or("title_alert_text", "🔔 New message")
    }

    /// Build the classifier marker table, honoring any overrides.
    pub fn markers(&self) -> Markers {
        let defaults = Markers::default();
        Markers {
            final_answer: self.get_or("marker.final_answer", &defaults.final_answer),
            thinking_open: self.get_or("marker.thinking_open", &defaults.thinking_open),
            thinking_close: self.get_or("marker.thinking_close", &defaults.thinking_close),
            trace_prefix: self.get_or("marker.trace_prefix", &defaults.trace_prefix),
            embed_open: self.get_or("marker.embed_open", &defaults.embed_open),
            embed_close: self.get_or("marker.embed_close", &defaults.embed_close),
        }
    }
}
