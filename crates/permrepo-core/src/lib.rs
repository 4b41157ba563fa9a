//! # permrepo core
//!
//! Pure primitives for the permission repository: permission sets, resource
//! kinds, the stored-blob codec, the backend key layout, and the
//! unrestricted-principal merge.
//!
//! This crate contains no I/O, no storage, no networking.
//!
//! ## Key Types
//!
//! - [`PermissionSet`] - Everything one principal has been granted
//! - [`ResourceKind`] - The closed set of grantable resource kinds
//! - [`Resource`] - A stored resource of any kind
//! - [`KeySchema`] - Maps principals, kinds and roles to backend keys
//!
//! ## Codec
//!
//! Each (principal, kind) pair is stored as one length-prefixed zstd blob of
//! JSON. See the [`codec`] module.

pub mod codec;
pub mod error;
pub mod keys;
pub mod kind;
pub mod merge;
pub mod permission;
pub mod resource;

pub use error::{CodecError, CoreError, Result};
pub use keys::{normalize_id, KeySchema};
pub use kind::ResourceKind;
pub use merge::{merge_unrestricted, with_unrestricted};
pub use permission::PermissionSet;
pub use resource::{
    Account, Application, Authorization, BuildService, Permissions, Resource, Role, RoleSource,
    ServiceAccount,
};

/// Id of the principal whose grants apply to everyone.
pub const UNRESTRICTED_ID: &str = "__unrestricted_user__";
