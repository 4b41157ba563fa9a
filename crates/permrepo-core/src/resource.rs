//! Resource records: the things a principal can be granted.
//!
//! Each kind has its own concrete record type. [`Resource`] is the closed
//! union over them, used wherever the engine handles kinds generically.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::kind::ResourceKind;

/// An action a group may be authorized to perform on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Authorization {
    Read,
    Write,
    Execute,
    Create,
}

/// Which groups hold which authorization on a resource.
///
/// Group names are lower-cased on insert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permissions(BTreeMap<Authorization, BTreeSet<String>>);

impl Permissions {
    /// Create an empty permission map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant `authorization` to each of `groups`.
    pub fn grant<I, S>(mut self, authorization: Authorization, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entry = self.0.entry(authorization).or_default();
        entry.extend(groups.into_iter().map(|g| g.as_ref().to_lowercase()));
        self
    }

    /// Groups holding `authorization`, if any.
    pub fn groups(&self, authorization: Authorization) -> Option<&BTreeSet<String>> {
        self.0.get(&authorization)
    }

    /// Authorizations held by at least one of `groups`.
    pub fn authorizations_for<S: AsRef<str>>(&self, groups: &[S]) -> BTreeSet<Authorization> {
        self.0
            .iter()
            .filter(|(_, holders)| {
                groups
                    .iter()
                    .any(|g| holders.contains(&g.as_ref().to_lowercase()))
            })
            .map(|(authorization, _)| *authorization)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(BTreeSet::is_empty)
    }
}

/// A cloud account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_provider: Option<String>,
    #[serde(default)]
    pub permissions: Permissions,
}

impl Account {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cloud_provider: None,
            permissions: Permissions::new(),
        }
    }

    pub fn with_cloud_provider(mut self, provider: impl Into<String>) -> Self {
        self.cloud_provider = Some(provider.into());
        self
    }

    pub fn with_permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = permissions;
        self
    }
}

/// A deployable application.
///
/// `details` carries free-form attributes (owner email, repo, ...) that the
/// repository stores opaquely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub name: String,
    #[serde(default)]
    pub permissions: Permissions,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, serde_json::Value>,
}

impl Application {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            permissions: Permissions::new(),
            details: BTreeMap::new(),
        }
    }

    pub fn with_permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.details.insert(key.into(), value);
        self
    }
}

/// Where a role assignment came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleSource {
    Ldap,
    File,
    GoogleGroups,
    GithubTeams,
    External,
}

/// Membership in a named role.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<RoleSource>,
}

impl Role {
    /// Create a role. The name is lower-cased.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            name: name.as_ref().to_lowercase(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: RoleSource) -> Self {
        self.source = Some(source);
        self
    }
}

/// A non-human principal and the roles it acts as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAccount {
    pub name: String,
    #[serde(default)]
    pub member_of: BTreeSet<String>,
}

impl ServiceAccount {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            member_of: BTreeSet::new(),
        }
    }

    pub fn member_of<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.member_of
            .extend(roles.into_iter().map(|r| r.as_ref().to_lowercase()));
        self
    }
}

/// A CI build master or similar build service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildService {
    pub name: String,
    #[serde(default)]
    pub permissions: Permissions,
}

impl BuildService {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            permissions: Permissions::new(),
        }
    }

    pub fn with_permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = permissions;
        self
    }
}

/// Any stored resource.
#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
    Account(Account),
    Application(Application),
    Role(Role),
    ServiceAccount(ServiceAccount),
    BuildService(BuildService),
}

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::Account(_) => ResourceKind::Account,
            Resource::Application(_) => ResourceKind::Application,
            Resource::Role(_) => ResourceKind::Role,
            Resource::ServiceAccount(_) => ResourceKind::ServiceAccount,
            Resource::BuildService(_) => ResourceKind::BuildService,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Resource::Account(r) => &r.name,
            Resource::Application(r) => &r.name,
            Resource::Role(r) => &r.name,
            Resource::ServiceAccount(r) => &r.name,
            Resource::BuildService(r) => &r.name,
        }
    }

    /// Group-level permissions, for kinds that carry them.
    pub fn permissions(&self) -> Option<&Permissions> {
        match self {
            Resource::Account(r) => Some(&r.permissions),
            Resource::Application(r) => Some(&r.permissions),
            Resource::BuildService(r) => Some(&r.permissions),
            Resource::Role(_) | Resource::ServiceAccount(_) => None,
        }
    }
}

impl From<Account> for Resource {
    fn from(r: Account) -> Self {
        Resource::Account(r)
    }
}

impl From<Application> for Resource {
    fn from(r: Application) -> Self {
        Resource::Application(r)
    }
}

impl From<Role> for Resource {
    fn from(r: Role) -> Self {
        Resource::Role(r)
    }
}

impl From<ServiceAccount> for Resource {
    fn from(r: ServiceAccount) -> Self {
        Resource::ServiceAccount(r)
    }
}

impl From<BuildService> for Resource {
    fn from(r: BuildService) -> Self {
        Resource::BuildService(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permissions_lowercase_groups() {
        let perms = Permissions::new().grant(Authorization::Read, ["Ops", "dev"]);
        let groups = perms.groups(Authorization::Read).unwrap();
        assert!(groups.contains("ops"));
        assert!(groups.contains("dev"));
        assert!(perms.groups(Authorization::Write).is_none());
    }

    #[test]
    fn test_authorizations_for_groups() {
        let perms = Permissions::new()
            .grant(Authorization::Read, ["ops", "dev"])
            .grant(Authorization::Write, ["ops"]);

        let dev = perms.authorizations_for(&["DEV"]);
        assert_eq!(dev, BTreeSet::from([Authorization::Read]));

        let ops = perms.authorizations_for(&["ops"]);
        assert_eq!(ops, BTreeSet::from([Authorization::Read, Authorization::Write]));

        assert!(perms.authorizations_for(&["qa"]).is_empty());
    }

    #[test]
    fn test_role_name_lowercased() {
        let role = Role::new("Admins").with_source(RoleSource::Ldap);
        assert_eq!(role.name, "admins");
        assert_eq!(Resource::from(role).kind(), ResourceKind::Role);
    }

    #[test]
    fn test_account_json_shape() {
        let account = Account::new("prod")
            .with_cloud_provider("aws")
            .with_permissions(Permissions::new().grant(Authorization::Write, ["ops"]));
        let json = serde_json::to_value(&account).unwrap();
        assert_eq!(json["cloudProvider"], "aws");
        assert_eq!(json["permissions"]["WRITE"][0], "ops");
    }
}
