//! # permrepo
//!
//! A permission repository: per-principal permission sets stored in a
//! key-value backend, with reverse indices for admins and role members.
//!
//! ## Overview
//!
//! - **Permission sets**: everything one principal has been granted, stored
//!   as one compressed blob per resource kind
//! - **Reverse indices**: sets of all principals, of admins, and of each
//!   role's members, kept in step with every write
//! - **Unrestricted principal**: grants held by a distinguished principal
//!   are merged into every other principal on read
//! - **Deadlines**: every operation runs under a timeout measured on an
//!   injectable clock; reads retry transient backend failures
//!
//! ## Usage
//!
//! ```rust,no_run
//! use permrepo::{PermissionRepository, RepositoryConfig};
//! use permrepo::core::{Application, PermissionSet, Role};
//! use permrepo::store::SqliteBackend;
//!
//! async fn example() {
//!     let backend = SqliteBackend::open("perms.db").unwrap();
//!     let repo = PermissionRepository::new(backend, RepositoryConfig::default());
//!
//!     let alice = PermissionSet::new("Alice")
//!         .with_resource(Application::new("billing"))
//!         .with_resource(Role::new("dev"));
//!     repo.put(&alice).await.unwrap();
//!
//!     let stored = repo.get("alice").await.unwrap();
//!     assert!(stored.is_some());
//!
//!     let devs = repo.get_all_by_roles(Some(&["dev".to_string()])).await.unwrap();
//!     assert!(devs.contains_key("alice"));
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `permrepo::core` - Permission sets, resource kinds, codec, key layout
//! - `permrepo::store` - Backend trait and backends

pub mod clock;
pub mod config;
pub mod envelope;
pub mod error;
pub mod index;
pub mod repository;

pub use permrepo_core as core;
pub use permrepo_store as store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::RepositoryConfig;
pub use envelope::{Envelope, RetryPolicy};
pub use error::{RepositoryError, Result};
pub use index::{IndexMaintainer, IndexView};
pub use repository::PermissionRepository;

pub use permrepo_core::{
    Account, Application, Authorization, BuildService, PermissionSet, Permissions, Resource,
    ResourceKind, Role, RoleSource, ServiceAccount, UNRESTRICTED_ID,
};
