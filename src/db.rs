use anyhow::Context;
use rusqlite::{Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::model::{AppSettings, User};

pub const DB_FILE: &str = "disiplind.sqlite3";
pub const SESSION_KEY: &str = "session.user";
pub const SETTINGS_KEY: &str = "app.settings";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace).with_context(|| {
        format!("failed to create workspace {}", workspace.to_string_lossy())
    })?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(&db_path)
        .with_context(|| format!("failed to open {}", db_path.to_string_lossy()))?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS local_state(
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )?;
    Ok(conn)
}

pub fn state_get_raw(conn: &Connection, key: &str) -> anyhow::Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM local_state WHERE key = ?",
        [key],
        |r| r.get(0),
    )
    .optional()
    .with_context(|| format!("failed to read {key}"))
}

pub fn state_set_raw(conn: &Connection, key: &str, value: &str) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO local_state(key, value) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        (key, value),
    )
    .with_context(|| format!("failed to write {key}"))?;
    Ok(())
}

pub fn state_remove(conn: &Connection, key: &str) -> anyhow::Result<()> {
    conn.execute("DELETE FROM local_state WHERE key = ?", [key])
        .with_context(|| format!("failed to remove {key}"))?;
    Ok(())
}

/// Persisted session user and settings for one workspace folder.
pub struct LocalState {
    path: PathBuf,
    conn: Connection,
}

impl LocalState {
    pub fn open(workspace: &Path) -> anyhow::Result<Self> {
        Ok(Self {
            path: workspace.to_path_buf(),
            conn: open_db(workspace)?,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Unreadable values are dropped from the table and treated as absent.
    fn load_json<T: DeserializeOwned>(&self, key: &str) -> anyhow::Result<Option<T>> {
        let Some(raw) = state_get_raw(&self.conn, key)? else {
            return Ok(None);
        };
        match serde_json::from_str::<T>(&raw) {
            Ok(v) => Ok(Some(v)),
            Err(e) => {
                tracing::warn!(key, error = %e, "discarding malformed local state");
                state_remove(&self.conn, key)?;
                Ok(None)
            }
        }
    }

    fn store_json<T: Serialize>(&self, key: &str, value: &T) -> anyhow::Result<()> {
        let text = serde_json::to_string(value).with_context(|| format!("failed to encode {key}"))?;
        state_set_raw(&self.conn, key, &text)
    }

    pub fn load_session(&self) -> anyhow::Result<Option<User>> {
        self.load_json(SESSION_KEY)
    }

    pub fn save_session(&self, user: Option<&User>) -> anyhow::Result<()> {
        match user {
            Some(u) => self.store_json(SESSION_KEY, u),
            None => state_remove(&self.conn, SESSION_KEY),
        }
    }

    pub fn load_settings(&self) -> anyhow::Result<AppSettings> {
        Ok(self.load_json(SETTINGS_KEY)?.unwrap_or_default())
    }

    pub fn save_settings(&self, settings: &AppSettings) -> anyhow::Result<()> {
        self.store_json(SETTINGS_KEY, settings)
    }
}
