//! Backend trait: the narrow key-value interface the repository runs on.
//!
//! A backend holds two kinds of keys: scalar keys holding a byte value, and
//! set keys holding a set of string members. Writes are expressed as a
//! [`Batch`] of [`Command`]s and reads as a list of [`Query`]s; each is sent
//! to the backend as one pipelined round trip.

use std::collections::BTreeSet;
use std::future::Future;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{Result, StoreError};

/// One write inside a [`Batch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Add members to a set, creating it if needed.
    SetAdd { key: String, members: Vec<String> },
    /// Remove members from a set. Removing the last member deletes the key.
    SetRemove { key: String, members: Vec<String> },
    /// Set a scalar key, replacing whatever was there.
    Put { key: String, value: Bytes },
    /// Delete keys of either type. Missing keys are ignored.
    Delete { keys: Vec<String> },
}

impl Command {
    /// Every key this command touches.
    pub fn keys(&self) -> Vec<&str> {
        match self {
            Command::SetAdd { key, .. }
            | Command::SetRemove { key, .. }
            | Command::Put { key, .. } => vec![key.as_str()],
            Command::Delete { keys } => keys.iter().map(String::as_str).collect(),
        }
    }
}

/// An ordered list of writes sent as one pipelined round trip.
///
/// A batch is not a transaction. If the connection drops mid-batch, a
/// prefix of the commands may have been applied. Backends with native
/// transactions may apply the whole batch atomically, but callers must not
/// rely on it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    commands: Vec<Command>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: Command) -> &mut Self {
        self.commands.push(command);
        self
    }

    /// Add members to a set. Empty member lists are dropped.
    pub fn set_add<I, S>(&mut self, key: impl Into<String>, members: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let members: Vec<String> = members.into_iter().map(Into::into).collect();
        if !members.is_empty() {
            self.commands.push(Command::SetAdd {
                key: key.into(),
                members,
            });
        }
        self
    }

    /// Remove members from a set. Empty member lists are dropped.
    pub fn set_remove<I, S>(&mut self, key: impl Into<String>, members: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let members: Vec<String> = members.into_iter().map(Into::into).collect();
        if !members.is_empty() {
            self.commands.push(Command::SetRemove {
                key: key.into(),
                members,
            });
        }
        self
    }

    pub fn put(&mut self, key: impl Into<String>, value: impl Into<Bytes>) -> &mut Self {
        self.commands.push(Command::Put {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    /// Delete keys. An empty key list is dropped.
    pub fn delete<I, S>(&mut self, keys: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        if !keys.is_empty() {
            self.commands.push(Command::Delete { keys });
        }
        self
    }

    /// Append every command of `other`.
    pub fn append(&mut self, other: Batch) -> &mut Self {
        self.commands.extend(other.commands);
        self
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn into_commands(self) -> Vec<Command> {
        self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// One read inside a pipelined query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// Members of a set; a missing key is an empty set.
    Members(String),
    /// Whether `member` is in the set at `key`.
    IsMember { key: String, member: String },
    /// Value of a scalar key.
    Get(String),
    /// Whether a key of either type exists.
    Exists(String),
}

/// Reply to one [`Query`], in the same position as the query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Members(BTreeSet<String>),
    Flag(bool),
    Value(Option<Bytes>),
}

impl Reply {
    pub fn into_members(self) -> Result<BTreeSet<String>> {
        match self {
            Reply::Members(m) => Ok(m),
            other => Err(StoreError::UnexpectedReply(format!(
                "expected set members, got {other:?}"
            ))),
        }
    }

    pub fn into_flag(self) -> Result<bool> {
        match self {
            Reply::Flag(f) => Ok(f),
            other => Err(StoreError::UnexpectedReply(format!(
                "expected flag, got {other:?}"
            ))),
        }
    }

    pub fn into_value(self) -> Result<Option<Bytes>> {
        match self {
            Reply::Value(v) => Ok(v),
            other => Err(StoreError::UnexpectedReply(format!(
                "expected value, got {other:?}"
            ))),
        }
    }
}

/// The Backend trait: async, pipelined key-value primitives.
///
/// # Design Notes
///
/// - **Pipelining**: `execute` and `query` each cost one round trip no matter
///   how many commands or queries they carry.
/// - **Ordering**: replies come back in query order; commands apply in batch order.
/// - **Empty sets**: a set with no members does not exist. Removing the last
///   member deletes the key, as Redis does.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Apply every command in `batch` in one round trip.
    async fn execute(&self, batch: Batch) -> Result<()>;

    /// Run every query in one round trip. Returns one reply per query.
    async fn query(&self, queries: Vec<Query>) -> Result<Vec<Reply>>;

    /// Every key that starts with `prefix`, sorted.
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>>;
}

#[async_trait]
impl<B: Backend + ?Sized> Backend for std::sync::Arc<B> {
    async fn execute(&self, batch: Batch) -> Result<()> {
        (**self).execute(batch).await
    }

    async fn query(&self, queries: Vec<Query>) -> Result<Vec<Reply>> {
        (**self).query(queries).await
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        (**self).scan_prefix(prefix).await
    }
}

/// Extension trait for single-key reads.
pub trait BackendExt: Backend {
    /// Members of one set.
    fn members(&self, key: &str) -> impl Future<Output = Result<BTreeSet<String>>> + Send;

    /// Membership test on one set.
    fn is_member(&self, key: &str, member: &str) -> impl Future<Output = Result<bool>> + Send;

    /// Value of one scalar key.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Bytes>>> + Send;

    /// Whether one key exists.
    fn exists(&self, key: &str) -> impl Future<Output = Result<bool>> + Send;
}

impl<B: Backend + ?Sized> BackendExt for B {
    async fn members(&self, key: &str) -> Result<BTreeSet<String>> {
        single(self, Query::Members(key.to_string()))
            .await?
            .into_members()
    }

    async fn is_member(&self, key: &str, member: &str) -> Result<bool> {
        single(
            self,
            Query::IsMember {
                key: key.to_string(),
                member: member.to_string(),
            },
        )
        .await?
        .into_flag()
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        single(self, Query::Get(key.to_string())).await?.into_value()
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        single(self, Query::Exists(key.to_string())).await?.into_flag()
    }
}

async fn single<B: Backend + ?Sized>(backend: &B, query: Query) -> Result<Reply> {
    backend
        .query(vec![query])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| StoreError::UnexpectedReply("empty reply to single query".into()))
}

/// Check that a backend answered every query.
pub fn expect_replies(queries: usize, replies: &[Reply]) -> Result<()> {
    if queries == replies.len() {
        Ok(())
    } else {
        Err(StoreError::UnexpectedReply(format!(
            "sent {queries} queries, got {} replies",
            replies.len()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_drops_empty_commands() {
        let mut batch = Batch::new();
        batch
            .set_add("k", Vec::<String>::new())
            .set_remove("k", Vec::<String>::new())
            .delete(Vec::<String>::new());
        assert!(batch.is_empty());

        batch.set_add("k", ["a"]).put("v", Bytes::from_static(b"1"));
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn test_command_keys() {
        let cmd = Command::Delete {
            keys: vec!["a".into(), "b".into()],
        };
        assert_eq!(cmd.keys(), vec!["a", "b"]);
    }

    #[test]
    fn test_reply_shape_mismatch() {
        assert!(matches!(
            Reply::Flag(true).into_members(),
            Err(StoreError::UnexpectedReply(_))
        ));
        assert_eq!(Reply::Value(None).into_value().unwrap(), None);
    }
}
