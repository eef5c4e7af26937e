use crate::sources::settings::SettingsReader;
use anyhow::Context;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Persisted key/value settings (active server, source priority, linked
/// accounts). Values are opaque strings, JSON by convention.
pub struct Storage {
    conn: Mutex<Connection>,
}

impl Storage {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create dir {}", parent.display()))?;
        }

        let conn = Connection::open(path).with_context(|| format!("open {}", path.display()))?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        Self::with_connection(Connection::open_in_memory().context("open in-memory db")?)
    }

    fn with_connection(conn: Connection) -> anyhow::Result<Self> {
        conn.execute_batch(
            r#"
CREATE TABLE IF NOT EXISTS kv (
  key TEXT PRIMARY KEY,
  value TEXT NOT NULL,
  updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
);
"#,
        )
        .context("init schema")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get_item(&self, key: &str) -> anyhow::Result<Option<String>> {
        self.conn()
            .query_row("SELECT value FROM kv WHERE key=?1", params![key], |row| {
                row.get(0)
            })
            .optional()
            .with_context(|| format!("read {key}"))
    }

    pub fn set_item(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.conn()
            .execute(
                r#"
INSERT INTO kv(key, value, updated_at)
VALUES(?1, ?2, strftime('%s', 'now'))
ON CONFLICT(key) DO UPDATE SET
  value=excluded.value,
  updated_at=excluded.updated_at
"#,
                params![key, value],
            )
            .with_context(|| format!("write {key}"))?;
        Ok(())
    }

    /// Returns whether the key existed.
    pub fn remove_item(&self, key: &str) -> anyhow::Result<bool> {
        let n = self
            .conn()
            .execute("DELETE FROM kv WHERE key=?1", params![key])
            .with_context(|| format!("remove {key}"))?;
        Ok(n > 0)
    }

    pub fn set_json<T: serde::Serialize>(&self, key: &str, value: &T) -> anyhow::Result<()> {
        let raw = serde_json::to_string(value).with_context(|| format!("encode {key}"))?;
        self.set_item(key, &raw)
    }
}

impl SettingsReader for Storage {
    fn get_item(&self, key: &str) -> anyhow::Result<Option<String>> {
        Storage::get_item(self, key)
    }
}
