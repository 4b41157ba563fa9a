//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::Arc;
use std::time::Duration;

use permrepo::{ManualClock, PermissionRepository, RepositoryConfig};
use permrepo_core::{
    Account, Application, Authorization, PermissionSet, Permissions, Role, ServiceAccount,
    UNRESTRICTED_ID,
};
use permrepo_store::{Backend, MemoryBackend, Result};

/// Wall time the fixture clock starts at.
pub const START_MILLIS: i64 = 1_700_000_000_000;

/// A repository over an in-memory backend and a manual clock.
pub type TestRepository = PermissionRepository<Arc<MemoryBackend>, Arc<ManualClock>>;

/// A test fixture with a memory backend, a manual clock and a repository
/// over both.
pub struct TestFixture {
    pub backend: Arc<MemoryBackend>,
    pub clock: Arc<ManualClock>,
    pub repo: TestRepository,
}

impl TestFixture {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: RepositoryConfig) -> Self {
        let backend = Arc::new(MemoryBackend::new());
        let clock = Arc::new(ManualClock::new(START_MILLIS));
        let repo = PermissionRepository::with_clock(backend.clone(), clock.clone(), config);
        Self {
            backend,
            clock,
            repo,
        }
    }

    /// Every backend key under the repository's prefix.
    pub async fn keys(&self) -> Result<Vec<String>> {
        self.backend
            .scan_prefix(&self.repo.keys().namespace())
            .await
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration used by fixtures: a `test` prefix and retries without
/// backoff, so a manual clock never has to be advanced for a retry.
pub fn test_config() -> RepositoryConfig {
    RepositoryConfig::default()
        .with_prefix("test")
        .with_read_retries(2, Duration::ZERO)
}

/// Read and write access for each group.
pub fn read_write(groups: &[&str]) -> Permissions {
    Permissions::new()
        .grant(Authorization::Read, groups)
        .grant(Authorization::Write, groups)
}

/// A principal holding one account, one application and the given roles.
pub fn user(id: &str, roles: &[&str]) -> PermissionSet {
    let mut set = PermissionSet::new(id)
        .with_resource(
            Account::new(format!("{id}-account"))
                .with_cloud_provider("aws")
                .with_permissions(read_write(roles)),
        )
        .with_resource(
            Application::new(format!("{id}-app"))
                .with_permissions(read_write(roles))
                .with_detail("email", serde_json::json!(format!("{id}@example.com"))),
        );
    set.add_resources(roles.iter().map(|r| Role::new(r)));
    set
}

/// The unrestricted principal holding the given accounts.
pub fn unrestricted(accounts: &[&str]) -> PermissionSet {
    let mut set = PermissionSet::new(UNRESTRICTED_ID);
    set.add_resources(accounts.iter().map(|a| Account::new(*a)));
    set
}

/// A service account principal acting as `roles`.
pub fn service_account(id: &str, roles: &[&str]) -> PermissionSet {
    let mut set = PermissionSet::new(id)
        .with_resource(ServiceAccount::new(id).member_of(roles.iter().copied()));
    set.add_resources(roles.iter().map(|r| Role::new(r)));
    set
}
