//! Backend key layout.
//!
//! | Key                                      | Holds                       |
//! |------------------------------------------|-----------------------------|
//! | `<prefix>:users`                         | set of every principal id   |
//! | `<prefix>:permissions:admin`             | set of admin principal ids  |
//! | `<prefix>:roles:<role>`                  | set of principals in a role |
//! | `<prefix>:permissions-v2:<id>:<kind>`    | blob for one resource kind  |
//! | `<prefix>:last_modified:<unrestricted>`  | epoch millis of last write  |
//!
//! Principal ids and role names are lower-cased before they become part of a
//! key or a set member.

use crate::kind::ResourceKind;

/// Lower-case a principal id or role name.
pub fn normalize_id(id: &str) -> String {
    id.to_lowercase()
}

/// Builds every key under one namespace prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySchema {
    prefix: String,
}

impl KeySchema {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Prefix shared by every key this schema produces.
    pub fn namespace(&self) -> String {
        format!("{}:", self.prefix)
    }

    pub fn all_principals(&self) -> String {
        format!("{}:users", self.prefix)
    }

    pub fn admin(&self) -> String {
        format!("{}:permissions:admin", self.prefix)
    }

    pub fn role(&self, role: &str) -> String {
        format!("{}:roles:{}", self.prefix, normalize_id(role))
    }

    pub fn resources(&self, id: &str, kind: ResourceKind) -> String {
        format!(
            "{}:permissions-v2:{}:{}",
            self.prefix,
            normalize_id(id),
            kind.as_str()
        )
    }

    pub fn last_modified(&self, unrestricted_id: &str) -> String {
        format!("{}:last_modified:{}", self.prefix, normalize_id(unrestricted_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let keys = KeySchema::new("fiat");
        assert_eq!(keys.all_principals(), "fiat:users");
        assert_eq!(keys.admin(), "fiat:permissions:admin");
        assert_eq!(keys.role("Ops"), "fiat:roles:ops");
        assert_eq!(
            keys.resources("TestUser", ResourceKind::ServiceAccount),
            "fiat:permissions-v2:testuser:service_account"
        );
        assert_eq!(
            keys.last_modified("__unrestricted_user__"),
            "fiat:last_modified:__unrestricted_user__"
        );
    }

    #[test]
    fn test_every_key_under_namespace() {
        let keys = KeySchema::new("ns");
        let namespace = keys.namespace();
        let mut all = vec![keys.all_principals(), keys.admin(), keys.role("r")];
        all.extend(ResourceKind::ALL.iter().map(|k| keys.resources("id", *k)));
        assert!(all.iter().all(|k| k.starts_with(&namespace)));
    }
}
