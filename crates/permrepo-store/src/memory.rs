//! In-memory implementation of the Backend trait.
//!
//! This is primarily for testing. It follows Redis semantics for the
//! primitives the repository uses: empty sets do not exist, and writing a
//! scalar over a set (or the reverse) is a type error.

use std::collections::{BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{Result, StoreError};
use crate::traits::{Backend, Batch, Command, Query, Reply};

/// In-memory backend.
///
/// All data is lost when the backend is dropped. Thread-safe via RwLock.
/// A batch is applied under a single write lock.
pub struct MemoryBackend {
    inner: RwLock<MemoryBackendInner>,
}

#[derive(Default)]
struct MemoryBackendInner {
    /// Scalar keys.
    values: HashMap<String, Bytes>,

    /// Set keys. Never holds an empty set.
    sets: HashMap<String, BTreeSet<String>>,
}

impl MemoryBackend {
    /// Create a new empty in-memory backend.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryBackendInner::default()),
        }
    }

    /// Number of keys of either type.
    pub fn key_count(&self) -> usize {
        self.read()
            .map(|inner| inner.values.len() + inner.sets.len())
            .unwrap_or(0)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryBackendInner>> {
        self.inner.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryBackendInner>> {
        self.inner.write().map_err(|_| StoreError::LockPoisoned)
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackendInner {
    fn apply(&mut self, command: Command) -> Result<()> {
        match command {
            Command::SetAdd { key, members } => {
                if self.values.contains_key(&key) {
                    return Err(StoreError::WrongType(key));
                }
                self.sets.entry(key).or_default().extend(members);
            }
            Command::SetRemove { key, members } => {
                if self.values.contains_key(&key) {
                    return Err(StoreError::WrongType(key));
                }
                if let Some(set) = self.sets.get_mut(&key) {
                    for member in &members {
                        set.remove(member);
                    }
                    if set.is_empty() {
                        self.sets.remove(&key);
                    }
                }
            }
            Command::Put { key, value } => {
                self.sets.remove(&key);
                self.values.insert(key, value);
            }
            Command::Delete { keys } => {
                for key in keys {
                    self.values.remove(&key);
                    self.sets.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn answer(&self, query: Query) -> Result<Reply> {
        let reply = match query {
            Query::Members(key) => {
                if self.values.contains_key(&key) {
                    return Err(StoreError::WrongType(key));
                }
                Reply::Members(self.sets.get(&key).cloned().unwrap_or_default())
            }
            Query::IsMember { key, member } => {
                if self.values.contains_key(&key) {
                    return Err(StoreError::WrongType(key));
                }
                Reply::Flag(self.sets.get(&key).is_some_and(|s| s.contains(&member)))
            }
            Query::Get(key) => {
                if self.sets.contains_key(&key) {
                    return Err(StoreError::WrongType(key));
                }
                Reply::Value(self.values.get(&key).cloned())
            }
            Query::Exists(key) => {
                Reply::Flag(self.values.contains_key(&key) || self.sets.contains_key(&key))
            }
        };
        Ok(reply)
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn execute(&self, batch: Batch) -> Result<()> {
        let mut inner = self.write()?;
        for command in batch.into_commands() {
            inner.apply(command)?;
        }
        Ok(())
    }

    async fn query(&self, queries: Vec<Query>) -> Result<Vec<Reply>> {
        let inner = self.read()?;
        queries.into_iter().map(|q| inner.answer(q)).collect()
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let inner = self.read()?;
        let mut keys: Vec<String> = inner
            .values
            .keys()
            .chain(inner.sets.keys())
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::BackendExt;

    #[tokio::test]
    async fn test_memory_backend_sets() {
        let backend = MemoryBackend::new();
        let mut batch = Batch::new();
        batch.set_add("s", ["a", "b"]);
        backend.execute(batch).await.unwrap();

        assert!(backend.is_member("s", "a").await.unwrap());
        assert!(!backend.is_member("s", "c").await.unwrap());
        assert_eq!(backend.members("s").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_removing_last_member_deletes_key() {
        let backend = MemoryBackend::new();
        let mut batch = Batch::new();
        batch.set_add("s", ["a"]);
        backend.execute(batch).await.unwrap();

        let mut batch = Batch::new();
        batch.set_remove("s", ["a"]);
        backend.execute(batch).await.unwrap();

        assert!(!backend.exists("s").await.unwrap());
        assert_eq!(backend.key_count(), 0);
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let backend = MemoryBackend::new();
        let mut batch = Batch::new();
        batch.put("v", Bytes::from_static(b"hello"));
        backend.execute(batch).await.unwrap();
        assert_eq!(
            backend.get("v").await.unwrap(),
            Some(Bytes::from_static(b"hello"))
        );

        let mut batch = Batch::new();
        batch.delete(["v", "missing"]);
        backend.execute(batch).await.unwrap();
        assert_eq!(backend.get("v").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_wrong_type() {
        let backend = MemoryBackend::new();
        let mut batch = Batch::new();
        batch.put("v", Bytes::from_static(b"1"));
        backend.execute(batch).await.unwrap();

        let mut batch = Batch::new();
        batch.set_add("v", ["a"]);
        assert!(matches!(
            backend.execute(batch).await,
            Err(StoreError::WrongType(k)) if k == "v"
        ));
    }

    #[tokio::test]
    async fn test_query_order_and_scan() {
        let backend = MemoryBackend::new();
        let mut batch = Batch::new();
        batch
            .set_add("ns:set", ["m"])
            .put("ns:val", Bytes::from_static(b"x"))
            .put("other:val", Bytes::from_static(b"y"));
        backend.execute(batch).await.unwrap();

        let replies = backend
            .query(vec![
                Query::Get("ns:val".into()),
                Query::Members("ns:set".into()),
                Query::Exists("nope".into()),
            ])
            .await
            .unwrap();
        assert_eq!(
            replies,
            vec![
                Reply::Value(Some(Bytes::from_static(b"x"))),
                Reply::Members(BTreeSet::from(["m".to_string()])),
                Reply::Flag(false),
            ]
        );

        let keys = backend.scan_prefix("ns:").await.unwrap();
        assert_eq!(keys, vec!["ns:set".to_string(), "ns:val".to_string()]);
    }
}
