//! Folding the unrestricted principal's grants into a read result.
//!
//! The unrestricted principal's resources are granted to everyone. Rather
//! than storing them on every record, they are merged in on read.

use crate::kind::ResourceKind;
use crate::permission::PermissionSet;

/// Union `unrestricted`'s resources into `principal`, kind by kind.
///
/// A name present in both keeps the principal's own entry; authorization
/// sets are never combined. The admin flag is untouched. Merging a set into
/// itself (same id) is a no-op.
pub fn merge_unrestricted(principal: &mut PermissionSet, unrestricted: &PermissionSet) {
    if principal.id() == unrestricted.id() {
        return;
    }

    for kind in ResourceKind::ALL {
        let Some(shared) = unrestricted.resources(kind) else {
            continue;
        };
        if shared.is_empty() {
            continue;
        }
        let own = principal.resources_mut(kind);
        for (name, resource) in shared {
            own.entry(name.clone()).or_insert_with(|| resource.clone());
        }
    }
}

/// Like [`merge_unrestricted`], but takes an optional unrestricted record.
pub fn with_unrestricted(
    mut principal: PermissionSet,
    unrestricted: Option<&PermissionSet>,
) -> PermissionSet {
    if let Some(unrestricted) = unrestricted {
        merge_unrestricted(&mut principal, unrestricted);
    }
    principal
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{Account, Application, Authorization, Permissions, Resource};

    const UNRESTRICTED: &str = "__unrestricted_user__";

    #[test]
    fn test_merge_adds_missing() {
        let unrestricted = PermissionSet::new(UNRESTRICTED).with_resource(Account::new("acct1"));
        let mut x = PermissionSet::new("x");

        merge_unrestricted(&mut x, &unrestricted);
        assert!(x.resource(ResourceKind::Account, "acct1").is_some());
        assert_eq!(x.id(), "x");
    }

    #[test]
    fn test_own_entry_wins() {
        let shared = Application::new("app")
            .with_permissions(Permissions::new().grant(Authorization::Read, ["everyone"]));
        let own = Application::new("app")
            .with_permissions(Permissions::new().grant(Authorization::Write, ["ops"]));

        let unrestricted = PermissionSet::new(UNRESTRICTED).with_resource(shared);
        let mut x = PermissionSet::new("x").with_resource(own.clone());

        merge_unrestricted(&mut x, &unrestricted);
        assert_eq!(
            x.resource(ResourceKind::Application, "app"),
            Some(&Resource::from(own))
        );
    }

    #[test]
    fn test_no_self_merge() {
        let unrestricted = PermissionSet::new(UNRESTRICTED).with_resource(Account::new("acct1"));
        let mut copy = unrestricted.clone();
        merge_unrestricted(&mut copy, &unrestricted);
        assert_eq!(copy, unrestricted);
    }

    #[test]
    fn test_admin_not_inherited() {
        let unrestricted = PermissionSet::new(UNRESTRICTED).with_admin(true);
        let x = with_unrestricted(PermissionSet::new("x"), Some(&unrestricted));
        assert!(!x.is_admin());
        assert!(x.is_empty());
    }

    #[test]
    fn test_without_unrestricted() {
        let x = PermissionSet::new("x").with_resource(Account::new("a"));
        assert_eq!(with_unrestricted(x.clone(), None), x);
    }
}
