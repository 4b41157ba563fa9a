//! # permrepo testkit
//!
//! Testing utilities for permrepo.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Backends**: wrappers that stall or fail backend calls on command
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: a repository over a memory backend and a manual clock,
//!   plus sample permission sets
//!
//! ## Timeouts
//!
//! Hold a call in flight and move the clock past its deadline:
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use permrepo::{ManualClock, PermissionRepository};
//! use permrepo_testkit::{fixtures::test_config, StallingBackend};
//! use permrepo_store::MemoryBackend;
//!
//! let backend = Arc::new(StallingBackend::new(MemoryBackend::new()));
//! let clock = Arc::new(ManualClock::default());
//! let repo = PermissionRepository::with_clock(backend.clone(), clock.clone(), test_config());
//!
//! backend.stall();
//! // spawn repo.get(..), then:
//! backend.wait_until_stalled().await;
//! clock.advance(repo.config().read_timeout);
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use permrepo_testkit::generators::permission_set;
//!
//! proptest! {
//!     #[test]
//!     fn id_is_lowercase(set in permission_set()) {
//!         prop_assert_eq!(set.id(), set.id().to_lowercase());
//!     }
//! }
//! ```

pub mod backends;
pub mod fixtures;
pub mod generators;

pub use backends::{FlakyBackend, StallingBackend};
pub use fixtures::{test_config, TestFixture, TestRepository};
pub use permrepo::ManualClock;
