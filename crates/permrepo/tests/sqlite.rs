//! The repository over a durable SQLite backend.

use std::sync::Arc;

use permrepo::store::{Backend, BackendExt, SqliteBackend};
use permrepo::{ManualClock, PermissionRepository, UNRESTRICTED_ID};
use permrepo_testkit::fixtures::{self, test_config, user};

fn open(path: &std::path::Path) -> PermissionRepository<SqliteBackend, Arc<ManualClock>> {
    PermissionRepository::with_clock(
        SqliteBackend::open(path).expect("open sqlite"),
        Arc::new(ManualClock::new(fixtures::START_MILLIS)),
        test_config(),
    )
}

#[tokio::test]
async fn test_round_trip_survives_reopen() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("perms.db");
    let alice = user("alice", &["dev"]).with_admin(true);

    {
        let repo = open(&path);
        repo.put(&alice).await?;
        repo.put(&fixtures::unrestricted(&["acct1"])).await?;
    }

    let repo = open(&path);
    let stored = repo.get("alice").await?.expect("alice persisted");
    assert!(stored.is_admin());
    assert_eq!(stored.role_names(), alice.role_names());
    assert_eq!(stored.resource_count(), alice.resource_count() + 1);
    assert_eq!(
        repo.unrestricted_last_modified().await?,
        Some(fixtures::START_MILLIS)
    );
    assert!(repo.principal_ids().await?.contains(UNRESTRICTED_ID));
    Ok(())
}

#[tokio::test]
async fn test_remove_leaves_no_keys() -> anyhow::Result<()> {
    let repo = PermissionRepository::with_clock(
        SqliteBackend::open_memory()?,
        Arc::new(ManualClock::default()),
        test_config(),
    );
    repo.put(&user("alice", &["dev", "ops"]).with_admin(true))
        .await?;
    repo.remove("alice").await?;

    let namespace = repo.keys().namespace();
    assert!(repo.backend().scan_prefix(&namespace).await?.is_empty());
    assert!(!repo.backend().exists(&repo.keys().admin()).await?);
    Ok(())
}
