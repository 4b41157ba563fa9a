//! Repository configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for a [`PermissionRepository`](crate::PermissionRepository).
///
/// Deserializes from any serde format; durations are written in
/// milliseconds (`read_timeout_ms = 1000`). Missing fields take their
/// defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Namespace prefix for every backend key.
    pub prefix: String,

    /// Id of the principal whose grants apply to everyone.
    pub unrestricted_id: String,

    /// Deadline for single-principal reads.
    #[serde(rename = "read_timeout_ms", with = "millis")]
    pub read_timeout: Duration,

    /// Deadline for reads that scan every principal.
    #[serde(rename = "bulk_read_timeout_ms", with = "millis")]
    pub bulk_read_timeout: Duration,

    /// Deadline for each write batch.
    #[serde(rename = "write_timeout_ms", with = "millis")]
    pub write_timeout: Duration,

    /// Extra attempts for a failed read round trip. Writes are never retried.
    pub read_retries: u32,

    /// Pause between read attempts.
    #[serde(rename = "retry_backoff_ms", with = "millis")]
    pub retry_backoff: Duration,

    /// Principals per pipelined round trip in bulk operations.
    pub bulk_batch_size: usize,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            prefix: "permrepo".to_string(),
            unrestricted_id: permrepo_core::UNRESTRICTED_ID.to_string(),
            read_timeout: Duration::from_secs(1),
            bulk_read_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(5),
            read_retries: 2,
            retry_backoff: Duration::from_millis(25),
            bulk_batch_size: 500,
        }
    }
}

impl RepositoryConfig {
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_unrestricted_id(mut self, id: impl Into<String>) -> Self {
        self.unrestricted_id = id.into();
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_bulk_read_timeout(mut self, timeout: Duration) -> Self {
        self.bulk_read_timeout = timeout;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn with_read_retries(mut self, retries: u32, backoff: Duration) -> Self {
        self.read_retries = retries;
        self.retry_backoff = backoff;
        self
    }

    /// Set the bulk chunk size. Zero is treated as one.
    pub fn with_bulk_batch_size(mut self, size: usize) -> Self {
        self.bulk_batch_size = size.max(1);
        self
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: RepositoryConfig =
            serde_json::from_str(r#"{"prefix": "spin", "read_timeout_ms": 250}"#).unwrap();
        assert_eq!(config.prefix, "spin");
        assert_eq!(config.read_timeout, Duration::from_millis(250));
        assert_eq!(config.write_timeout, Duration::from_secs(5));
        assert_eq!(config.unrestricted_id, "__unrestricted_user__");
    }

    #[test]
    fn test_serializes_millis() {
        let json = serde_json::to_value(RepositoryConfig::default()).unwrap();
        assert_eq!(json["write_timeout_ms"], 5000);
        assert_eq!(json["retry_backoff_ms"], 25);
    }

    #[test]
    fn test_zero_batch_size_clamped() {
        let config = RepositoryConfig::default().with_bulk_batch_size(0);
        assert_eq!(config.bulk_batch_size, 1);
    }
}
