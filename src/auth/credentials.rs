// Credential storage backends

use anyhow::{Context, Result};
use dashmap::DashMap;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension};
use std::path::{Path, PathBuf};

/// Key-value store the default token getter reads from and the
/// refresh endpoint strategy writes to
pub trait CredentialStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);

    /// Like `get`, but reports backend failures instead of logging them
    fn try_get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.get(key))
    }

    /// Like `set`, but reports backend failures instead of logging them
    fn try_set(&self, key: &str, value: &str) -> Result<()> {
        self.set(key, value);
        Ok(())
    }
}

/// Process-local store
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with one entry
    pub fn with_entry(key: &str, value: &str) -> Self {
        let store = Self::new();
        store.set(key, value);
        store
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).map(|entry| entry.value().clone())
    }

    fn set(&self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.values.remove(key);
    }
}

/// Persistent store backed by a SQLite `auth_kv` table
pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl SqliteStore {
    /// Open (or create) the database at `path`
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create directory: {}", parent.display())
                })?;
            }
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite database: {}", path.display()))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS auth_kv (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
            [],
        )
        .context("Failed to create auth_kv table")?;

        tracing::debug!("Opened credential store: {}", path.display());

        Ok(Self {
            conn: Mutex::new(conn),
            path: path.to_path_buf(),
        })
    }

    /// Default database location: `<data_dir>/fetchx/credentials.sqlite3`
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join("fetchx").join("credentials.sqlite3"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .lock()
            .query_row("SELECT value FROM auth_kv WHERE key = ?", [key], |row| {
                row.get(0)
            })
            .optional()
            .with_context(|| format!("Failed to read key from SQLite: {}", key))
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .lock()
            .execute(
                "INSERT INTO auth_kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                [key, value],
            )
            .with_context(|| format!("Failed to write key to SQLite: {}", key))?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.conn
            .lock()
            .execute("DELETE FROM auth_kv WHERE key = ?", [key])
            .with_context(|| format!("Failed to delete key from SQLite: {}", key))?;
        Ok(())
    }
}

impl CredentialStore for SqliteStore {
    fn get(&self, key: &str) -> Option<String> {
        self.read(key).unwrap_or_else(|e| {
            tracing::warn!("Credential store read failed: {:#}", e);
            None
        })
    }

    fn set(&self, key: &str, value: &str) {
        if let Err(e) = self.write(key, value) {
            tracing::warn!("Credential store write failed: {:#}", e);
        }
    }

    fn remove(&self, key: &str) {
        if let Err(e) = self.delete(key) {
            tracing::warn!("Credential store delete failed: {:#}", e);
        }
    }

    fn try_get(&self, key: &str) -> Result<Option<String>> {
        self.read(key)
    }

    fn try_set(&self, key: &str, value: &str) -> Result<()> {
        self.write(key, value)
    }
}
