//! Proptest generators for property-based testing.

use proptest::prelude::*;

use permrepo_core::{
    Account, Application, Authorization, BuildService, PermissionSet, Permissions, Role,
    RoleSource, ServiceAccount,
};

/// A lower-case resource or role name.
pub fn name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,11}"
}

/// A principal id. Never collides with the unrestricted id.
pub fn principal_id() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9._]{0,15}"
}

/// Generate an Authorization.
pub fn authorization() -> impl Strategy<Value = Authorization> {
    prop_oneof![
        Just(Authorization::Read),
        Just(Authorization::Write),
        Just(Authorization::Execute),
        Just(Authorization::Create),
    ]
}

/// Generate a permission map with up to four grants.
pub fn permissions() -> impl Strategy<Value = Permissions> {
    prop::collection::vec((authorization(), prop::collection::vec(name(), 1..3)), 0..4).prop_map(
        |grants| {
            grants
                .into_iter()
                .fold(Permissions::new(), |perms, (auth, groups)| {
                    perms.grant(auth, groups)
                })
        },
    )
}

pub fn account() -> impl Strategy<Value = Account> {
    (name(), proptest::option::of("aws|gce|kubernetes"), permissions()).prop_map(
        |(name, provider, permissions)| {
            let account = Account::new(name).with_permissions(permissions);
            match provider {
                Some(provider) => account.with_cloud_provider(provider),
                None => account,
            }
        },
    )
}

pub fn application() -> impl Strategy<Value = Application> {
    (name(), permissions(), proptest::option::of(name())).prop_map(
        |(name, permissions, owner)| {
            let app = Application::new(name).with_permissions(permissions);
            match owner {
                Some(owner) => app.with_detail("owner", serde_json::Value::String(owner)),
                None => app,
            }
        },
    )
}

pub fn role() -> impl Strategy<Value = Role> {
    let source = proptest::option::of(prop_oneof![
        Just(RoleSource::Ldap),
        Just(RoleSource::File),
        Just(RoleSource::GoogleGroups),
        Just(RoleSource::GithubTeams),
        Just(RoleSource::External),
    ]);
    (name(), source).prop_map(|(name, source)| {
        let role = Role::new(name);
        match source {
            Some(source) => role.with_source(source),
            None => role,
        }
    })
}

pub fn service_account() -> impl Strategy<Value = ServiceAccount> {
    (name(), prop::collection::vec(name(), 0..3))
        .prop_map(|(name, roles)| ServiceAccount::new(name).member_of(roles))
}

pub fn build_service() -> impl Strategy<Value = BuildService> {
    (name(), permissions()).prop_map(|(name, permissions)| {
        BuildService::new(name).with_permissions(permissions)
    })
}

/// Generate a permission set with a few resources of every kind.
pub fn permission_set() -> impl Strategy<Value = PermissionSet> {
    (
        principal_id(),
        any::<bool>(),
        prop::collection::vec(account(), 0..3),
        prop::collection::vec(application(), 0..3),
        prop::collection::vec(role(), 0..3),
        prop::collection::vec(service_account(), 0..2),
        prop::collection::vec(build_service(), 0..2),
    )
        .prop_map(
            |(id, admin, accounts, applications, roles, service_accounts, build_services)| {
                let mut set = PermissionSet::new(id).with_admin(admin);
                set.add_resources(accounts);
                set.add_resources(applications);
                set.add_resources(roles);
                set.add_resources(service_accounts);
                set.add_resources(build_services);
                set
            },
        )
}
