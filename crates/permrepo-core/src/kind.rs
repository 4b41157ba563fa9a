//! The closed set of grantable resource kinds.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// A category of grantable resource.
///
/// The declaration order is the iteration order everywhere in the crate:
/// blob reads, batch construction, and bulk queries all walk [`ResourceKind::ALL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Account,
    Application,
    Role,
    ServiceAccount,
    BuildService,
}

impl ResourceKind {
    /// Every kind, in storage order.
    pub const ALL: [ResourceKind; 5] = [
        ResourceKind::Account,
        ResourceKind::Application,
        ResourceKind::Role,
        ResourceKind::ServiceAccount,
        ResourceKind::BuildService,
    ];

    /// The key segment used for this kind's blob.
    pub const fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Account => "account",
            ResourceKind::Application => "application",
            ResourceKind::Role => "role",
            ResourceKind::ServiceAccount => "service_account",
            ResourceKind::BuildService => "build_service",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| CoreError::UnknownKind(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_str_roundtrip() {
        for kind in ResourceKind::ALL {
            assert_eq!(kind.as_str().parse::<ResourceKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_unknown_kind() {
        assert!(matches!(
            "pipeline".parse::<ResourceKind>(),
            Err(CoreError::UnknownKind(s)) if s == "pipeline"
        ));
    }

    #[test]
    fn test_serde_matches_key_segment() {
        let json = serde_json::to_string(&ResourceKind::ServiceAccount).unwrap();
        assert_eq!(json, "\"service_account\"");
    }
}
