//! Blob codec for stored resource maps.
//!
//! A stored blob is a length-prefixed zstd frame:
//!
//! ```text
//! +------------------------+---------------------------------+
//! | u32 BE raw length      | zstd frame of the JSON document |
//! +------------------------+---------------------------------+
//! ```
//!
//! The JSON document is an object mapping resource name to the kind's
//! concrete record. The kind is not written into the blob; it is implied by
//! the key, and decoding is always done for a known kind.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::CodecError;
use crate::kind::ResourceKind;
use crate::resource::Resource;

/// Bytes taken by the length prefix.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// zstd level used for every blob.
pub const COMPRESSION_LEVEL: i32 = 3;

/// Largest decompressed document accepted (64 MiB).
pub const MAX_BLOB_LEN: usize = 64 * 1024 * 1024;

type Result<T> = std::result::Result<T, CodecError>;

/// Compress `raw` into a length-prefixed frame.
pub fn compress(raw: &[u8]) -> Result<Vec<u8>> {
    if raw.len() > MAX_BLOB_LEN {
        return Err(CodecError::TooLarge(raw.len()));
    }
    let frame = zstd::bulk::compress(raw, COMPRESSION_LEVEL)
        .map_err(|e| CodecError::Compression(e.to_string()))?;

    let mut out = Vec::with_capacity(LENGTH_PREFIX_LEN + frame.len());
    out.extend_from_slice(&(raw.len() as u32).to_be_bytes());
    out.extend_from_slice(&frame);
    Ok(out)
}

/// Inverse of [`compress`].
pub fn decompress(bytes: &[u8]) -> Result<Vec<u8>> {
    if bytes.len() < LENGTH_PREFIX_LEN {
        return Err(CodecError::Truncated(bytes.len()));
    }
    let (prefix, frame) = bytes.split_at(LENGTH_PREFIX_LEN);
    let expected = u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
    if expected > MAX_BLOB_LEN {
        return Err(CodecError::TooLarge(expected));
    }

    let raw = zstd::bulk::decompress(frame, expected)
        .map_err(|e| CodecError::Compression(e.to_string()))?;
    if raw.len() != expected {
        return Err(CodecError::LengthMismatch {
            expected,
            actual: raw.len(),
        });
    }
    Ok(raw)
}

/// Encode every resource of `kind` into a stored blob.
///
/// Fails with [`CodecError::KindMismatch`] if the map holds a resource of a
/// different kind.
pub fn encode(kind: ResourceKind, resources: &BTreeMap<String, Resource>) -> Result<Vec<u8>> {
    let json = match kind {
        ResourceKind::Account => to_json(kind, resources, |r| match r {
            Resource::Account(a) => Some(a),
            _ => None,
        }),
        ResourceKind::Application => to_json(kind, resources, |r| match r {
            Resource::Application(a) => Some(a),
            _ => None,
        }),
        ResourceKind::Role => to_json(kind, resources, |r| match r {
            Resource::Role(a) => Some(a),
            _ => None,
        }),
        ResourceKind::ServiceAccount => to_json(kind, resources, |r| match r {
            Resource::ServiceAccount(a) => Some(a),
            _ => None,
        }),
        ResourceKind::BuildService => to_json(kind, resources, |r| match r {
            Resource::BuildService(a) => Some(a),
            _ => None,
        }),
    }?;
    compress(&json)
}

/// Decode a stored blob for `kind`.
///
/// An absent blob decodes to `None`, not an error.
pub fn decode(
    kind: ResourceKind,
    bytes: Option<&[u8]>,
) -> Result<Option<BTreeMap<String, Resource>>> {
    let Some(bytes) = bytes else {
        return Ok(None);
    };
    let json = decompress(bytes)?;
    let resources = match kind {
        ResourceKind::Account => from_json(&json, Resource::Account),
        ResourceKind::Application => from_json(&json, Resource::Application),
        ResourceKind::Role => from_json(&json, Resource::Role),
        ResourceKind::ServiceAccount => from_json(&json, Resource::ServiceAccount),
        ResourceKind::BuildService => from_json(&json, Resource::BuildService),
    }?;
    Ok(Some(resources))
}

fn to_json<'a, T, F>(
    kind: ResourceKind,
    resources: &'a BTreeMap<String, Resource>,
    pick: F,
) -> Result<Vec<u8>>
where
    T: Serialize + 'a,
    F: Fn(&'a Resource) -> Option<&'a T>,
{
    let mut typed: BTreeMap<&str, &T> = BTreeMap::new();
    for (name, resource) in resources {
        let record = pick(resource).ok_or(CodecError::KindMismatch {
            expected: kind,
            actual: resource.kind(),
        })?;
        typed.insert(name.as_str(), record);
    }
    serde_json::to_vec(&typed).map_err(|e| CodecError::Serialization(e.to_string()))
}

fn from_json<T: DeserializeOwned>(
    json: &[u8],
    wrap: fn(T) -> Resource,
) -> Result<BTreeMap<String, Resource>> {
    let typed: BTreeMap<String, T> =
        serde_json::from_slice(json).map_err(|e| CodecError::Serialization(e.to_string()))?;
    Ok(typed.into_iter().map(|(name, r)| (name, wrap(r))).collect())
}
