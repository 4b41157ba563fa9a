//! SQLite implementation of the Backend trait.
//!
//! A durable single-node backend. It uses rusqlite with bundled SQLite,
//! wrapped in async via tokio::spawn_blocking. Scalars live in `kv_values`
//! and set members in `kv_sets`.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{Backend, Batch, Command, Query, Reply};

/// SQLite-based backend.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime. Since SQLite has real transactions,
/// each batch is applied inside one.
pub struct SqliteBackend {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteBackend {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Connection(format!("mutex poisoned: {}", e)))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Blocking(e.to_string()))?
    }
}

fn value_exists(conn: &Connection, key: &str) -> Result<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM kv_values WHERE key = ?1)",
        params![key],
        |row| row.get(0),
    )?)
}

fn set_exists(conn: &Connection, key: &str) -> Result<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM kv_sets WHERE key = ?1)",
        params![key],
        |row| row.get(0),
    )?)
}

fn apply(conn: &Connection, command: Command) -> Result<()> {
    match command {
        Command::SetAdd { key, members } => {
            if value_exists(conn, &key)? {
                return Err(StoreError::WrongType(key));
            }
            let mut stmt =
                conn.prepare_cached("INSERT OR IGNORE INTO kv_sets (key, member) VALUES (?1, ?2)")?;
            for member in &members {
                stmt.execute(params![key, member])?;
            }
        }
        Command::SetRemove { key, members } => {
            if value_exists(conn, &key)? {
                return Err(StoreError::WrongType(key));
            }
            let mut stmt =
                conn.prepare_cached("DELETE FROM kv_sets WHERE key = ?1 AND member = ?2")?;
            for member in &members {
                stmt.execute(params![key, member])?;
            }
        }
        Command::Put { key, value } => {
            conn.execute("DELETE FROM kv_sets WHERE key = ?1", params![key])?;
            conn.execute(
                "INSERT OR REPLACE INTO kv_values (key, value) VALUES (?1, ?2)",
                params![key, value.as_ref()],
            )?;
        }
        Command::Delete { keys } => {
            for key in &keys {
                conn.execute("DELETE FROM kv_values WHERE key = ?1", params![key])?;
                conn.execute("DELETE FROM kv_sets WHERE key = ?1", params![key])?;
            }
        }
    }
    Ok(())
}

fn answer(conn: &Connection, query: Query) -> Result<Reply> {
    let reply = match query {
        Query::Members(key) => {
            if value_exists(conn, &key)? {
                return Err(StoreError::WrongType(key));
            }
            let mut stmt =
                conn.prepare_cached("SELECT member FROM kv_sets WHERE key = ?1 ORDER BY member")?;
            let members = stmt
                .query_map(params![key], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<BTreeSet<_>>>()?;
            Reply::Members(members)
        }
        Query::IsMember { key, member } => {
            let found: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM kv_sets WHERE key = ?1 AND member = ?2)",
                params![key, member],
                |row| row.get(0),
            )?;
            Reply::Flag(found)
        }
        Query::Get(key) => {
            if set_exists(conn, &key)? {
                return Err(StoreError::WrongType(key));
            }
            let value: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT value FROM kv_values WHERE key = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()?;
            Reply::Value(value.map(Bytes::from))
        }
        Query::Exists(key) => Reply::Flag(value_exists(conn, &key)? || set_exists(conn, &key)?),
    };
    Ok(reply)
}

#[async_trait]
impl Backend for SqliteBackend {
    async fn execute(&self, batch: Batch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            for command in batch.into_commands() {
                apply(&tx, command)?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn query(&self, queries: Vec<Query>) -> Result<Vec<Reply>> {
        self.blocking(move |conn| queries.into_iter().map(|q| answer(conn, q)).collect())
            .await
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let prefix = prefix.to_string();
        self.blocking(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT key FROM kv_values WHERE substr(key, 1, length(?1)) = ?1
                 UNION
                 SELECT DISTINCT key FROM kv_sets WHERE substr(key, 1, length(?1)) = ?1
                 ORDER BY key",
            )?;
            let keys = stmt
                .query_map(params![prefix], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(keys)
        })
        .await
    }
}
