//! # permrepo store
//!
//! Key-value backend abstraction for the permission repository. Provides a
//! trait-based interface over pipelined set and scalar primitives, with
//! in-memory, SQLite and (behind the `redis` feature) Redis implementations.
//!
//! ## Key Types
//!
//! - [`Backend`] - The async trait for all backend operations
//! - [`Batch`] / [`Command`] - Writes sent as one pipelined round trip
//! - [`Query`] / [`Reply`] - Reads sent as one pipelined round trip
//! - [`MemoryBackend`] - In-memory backend for tests
//! - [`SqliteBackend`] - Durable single-node backend
//! - `RedisBackend` - Shared backend for multi-node deployments
//!
//! ## Usage
//!
//! ```rust,no_run
//! use permrepo_store::{Backend, BackendExt, Batch, SqliteBackend};
//!
//! async fn example() {
//!     let backend = SqliteBackend::open("perms.db").unwrap();
//!
//!     let mut batch = Batch::new();
//!     batch.set_add("perms:users", ["alice"]);
//!     backend.execute(batch).await.unwrap();
//!
//!     assert!(backend.is_member("perms:users", "alice").await.unwrap());
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Pipelined, not transactional**: a batch is one round trip; only
//!   backends with native transactions apply it atomically
//! - **Empty sets do not exist**: removing the last member deletes the key
//! - **Typed keys**: a key is either a scalar or a set, never both

pub mod error;
pub mod memory;
pub mod migration;
#[cfg(feature = "redis")]
pub mod redis_backend;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryBackend;
#[cfg(feature = "redis")]
pub use redis_backend::RedisBackend;
pub use sqlite::SqliteBackend;
pub use traits::{expect_replies, Backend, BackendExt, Batch, Command, Query, Reply};
