//! Redis implementation of the Backend trait.
//!
//! Batches and queries are each sent as one `redis::pipe()` without
//! MULTI/EXEC, so a batch is pipelined but not atomic.

use std::collections::BTreeSet;

use async_trait::async_trait;
use bytes::Bytes;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::traits::{expect_replies, Backend, Batch, Command, Query, Reply};

/// Redis-based backend.
///
/// Cloning the connection manager is cheap; every call works on its own
/// clone, and reconnection is handled by the manager.
#[derive(Clone)]
pub struct RedisBackend {
    conn: ConnectionManager,
}

impl RedisBackend {
    /// Connect to `url` (e.g. `redis://localhost:6379`).
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| StoreError::Connection(format!("invalid redis url: {}", e)))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| StoreError::Connection(format!("failed to connect to redis: {}", e)))?;

        debug!(url, "redis backend connected");
        Ok(Self { conn })
    }

    /// Wrap an existing connection manager.
    pub fn from_manager(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl Backend for RedisBackend {
    async fn execute(&self, batch: Batch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        for command in batch.into_commands() {
            match command {
                Command::SetAdd { key, members } => {
                    pipe.sadd(key, members).ignore();
                }
                Command::SetRemove { key, members } => {
                    pipe.srem(key, members).ignore();
                }
                Command::Put { key, value } => {
                    pipe.set(key, value.to_vec()).ignore();
                }
                Command::Delete { keys } => {
                    pipe.del(keys).ignore();
                }
            }
        }

        let mut conn = self.conn.clone();
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    async fn query(&self, queries: Vec<Query>) -> Result<Vec<Reply>> {
        if queries.is_empty() {
            return Ok(Vec::new());
        }

        let mut pipe = redis::pipe();
        for query in &queries {
            match query {
                Query::Members(key) => pipe.smembers(key),
                Query::IsMember { key, member } => pipe.sismember(key, member),
                Query::Get(key) => pipe.get(key),
                Query::Exists(key) => pipe.exists(key),
            };
        }

        let mut conn = self.conn.clone();
        let values: Vec<redis::Value> = pipe.query_async(&mut conn).await?;

        let replies = queries
            .iter()
            .zip(values.iter())
            .map(|(query, value)| -> Result<Reply> {
                let reply = match query {
                    Query::Members(_) => {
                        Reply::Members(redis::from_redis_value::<BTreeSet<String>>(value)?)
                    }
                    Query::IsMember { .. } | Query::Exists(_) => {
                        Reply::Flag(redis::from_redis_value::<bool>(value)?)
                    }
                    Query::Get(_) => Reply::Value(
                        redis::from_redis_value::<Option<Vec<u8>>>(value)?.map(Bytes::from),
                    ),
                };
                Ok(reply)
            })
            .collect::<Result<Vec<_>>>()?;

        expect_replies(queries.len(), &replies)?;
        Ok(replies)
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        let mut keys = Vec::new();
        {
            let mut iter: redis::AsyncIter<'_, String> =
                conn.scan_match(format!("{}*", prefix)).await?;
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
        }
        // SCAN may return a key more than once.
        keys.sort();
        keys.dedup();
        Ok(keys)
    }
}
