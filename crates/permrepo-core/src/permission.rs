//! The aggregate permission record for one principal.

use std::collections::{BTreeMap, BTreeSet};

use crate::keys::normalize_id;
use crate::kind::ResourceKind;
use crate::resource::Resource;

/// Everything one principal has been granted.
///
/// The id is lower-cased on construction so that `TestUser` and `testuser`
/// address the same record. Resources are keyed by kind, then by name, so a
/// name is unique within a kind. Kinds with no resources are never stored
/// as empty maps.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PermissionSet {
    id: String,
    admin: bool,
    resources: BTreeMap<ResourceKind, BTreeMap<String, Resource>>,
}

impl PermissionSet {
    /// Create an empty, non-admin permission set.
    pub fn new(id: impl AsRef<str>) -> Self {
        Self {
            id: normalize_id(id.as_ref()),
            admin: false,
            resources: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_admin(&self) -> bool {
        self.admin
    }

    pub fn set_admin(&mut self, admin: bool) {
        self.admin = admin;
    }

    pub fn with_admin(mut self, admin: bool) -> Self {
        self.admin = admin;
        self
    }

    /// Add a resource, replacing any existing resource of the same kind and name.
    pub fn add_resource(&mut self, resource: impl Into<Resource>) -> Option<Resource> {
        let resource = resource.into();
        self.resources
            .entry(resource.kind())
            .or_default()
            .insert(resource.name().to_string(), resource)
    }

    pub fn with_resource(mut self, resource: impl Into<Resource>) -> Self {
        self.add_resource(resource);
        self
    }

    pub fn add_resources<I, R>(&mut self, resources: I)
    where
        I: IntoIterator<Item = R>,
        R: Into<Resource>,
    {
        for resource in resources {
            self.add_resource(resource);
        }
    }

    /// Replace every resource of `kind`. An empty map clears the kind.
    pub fn set_resources(&mut self, kind: ResourceKind, resources: BTreeMap<String, Resource>) {
        if resources.is_empty() {
            self.resources.remove(&kind);
        } else {
            self.resources.insert(kind, resources);
        }
    }

    /// Resources of `kind`, or `None` if the principal has none.
    pub fn resources(&self, kind: ResourceKind) -> Option<&BTreeMap<String, Resource>> {
        self.resources.get(&kind)
    }

    pub(crate) fn resources_mut(&mut self, kind: ResourceKind) -> &mut BTreeMap<String, Resource> {
        self.resources.entry(kind).or_default()
    }

    pub fn resource(&self, kind: ResourceKind, name: &str) -> Option<&Resource> {
        self.resources.get(&kind).and_then(|m| m.get(name))
    }

    /// Names of every role the principal holds.
    pub fn role_names(&self) -> BTreeSet<String> {
        self.resources
            .get(&ResourceKind::Role)
            .map(|roles| roles.keys().map(|name| name.to_lowercase()).collect())
            .unwrap_or_default()
    }

    /// Kinds with at least one resource.
    pub fn kinds(&self) -> impl Iterator<Item = ResourceKind> + '_ {
        self.resources
            .iter()
            .filter(|(_, m)| !m.is_empty())
            .map(|(kind, _)| *kind)
    }

    pub fn resource_count(&self) -> usize {
        self.resources.values().map(BTreeMap::len).sum()
    }

    /// True if the principal holds no resources of any kind.
    pub fn is_empty(&self) -> bool {
        self.resource_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{Account, Application, Role};

    #[test]
    fn test_id_lowercased() {
        let set = PermissionSet::new("TestUser");
        assert_eq!(set.id(), "testuser");
    }

    #[test]
    fn test_add_resource_replaces_same_name() {
        let mut set = PermissionSet::new("alice");
        assert!(set.add_resource(Account::new("prod")).is_none());
        let previous = set.add_resource(Account::new("prod").with_cloud_provider("aws"));
        assert!(previous.is_some());
        assert_eq!(set.resource_count(), 1);
    }

    #[test]
    fn test_set_resources_empty_clears_kind() {
        let mut set = PermissionSet::new("alice").with_resource(Application::new("app"));
        assert_eq!(set.kinds().collect::<Vec<_>>(), vec![ResourceKind::Application]);

        set.set_resources(ResourceKind::Application, BTreeMap::new());
        assert!(set.resources(ResourceKind::Application).is_none());
        assert!(set.is_empty());
    }

    #[test]
    fn test_role_names() {
        let set = PermissionSet::new("alice")
            .with_resource(Role::new("Ops"))
            .with_resource(Role::new("dev"));
        assert_eq!(
            set.role_names(),
            BTreeSet::from(["dev".to_string(), "ops".to_string()])
        );
    }
}
