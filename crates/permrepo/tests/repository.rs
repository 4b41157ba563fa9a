//! End-to-end behavior of the repository over the in-memory backend.

use std::collections::{BTreeMap, BTreeSet};

use permrepo::core::{Account, Application, PermissionSet, Resource, ResourceKind, Role};
use permrepo::store::BackendExt;
use permrepo::UNRESTRICTED_ID;
use permrepo_testkit::fixtures::{self, user, TestFixture};

fn ids(map: &BTreeMap<String, PermissionSet>) -> BTreeSet<&str> {
    map.keys().map(String::as_str).collect()
}

#[tokio::test]
async fn test_round_trip() -> anyhow::Result<()> {
    let fx = TestFixture::new();
    let alice = user("alice", &["dev", "ops"]).with_admin(true);

    fx.repo.put(&alice).await?;
    assert_eq!(fx.repo.get("alice").await?, Some(alice));
    Ok(())
}

#[tokio::test]
async fn test_role_and_admin_indices_follow_writes() -> anyhow::Result<()> {
    let fx = TestFixture::new();
    let keys = fx.repo.keys().clone();

    fx.repo
        .put(&user("p", &["r1", "r2"]).with_admin(true))
        .await?;
    assert!(fx.backend.is_member(&keys.role("r1"), "p").await?);
    assert!(fx.backend.is_member(&keys.role("r2"), "p").await?);
    assert!(fx.backend.is_member(&keys.admin(), "p").await?);

    fx.repo.put(&user("p", &[])).await?;
    assert!(!fx.backend.is_member(&keys.role("r1"), "p").await?);
    assert!(!fx.backend.is_member(&keys.role("r2"), "p").await?);
    assert!(!fx.backend.is_member(&keys.admin(), "p").await?);
    assert!(!fx.backend.exists(&keys.role("r1")).await?);
    assert!(fx.backend.is_member(&keys.all_principals(), "p").await?);
    Ok(())
}

#[tokio::test]
async fn test_role_shared_by_two_principals_survives_one_leaving() -> anyhow::Result<()> {
    let fx = TestFixture::new();
    let role_key = fx.repo.keys().role("dev");

    fx.repo.put(&user("alice", &["dev"])).await?;
    fx.repo.put(&user("bob", &["dev"])).await?;
    fx.repo.put(&user("alice", &[])).await?;

    assert_eq!(
        fx.backend.members(&role_key).await?,
        BTreeSet::from(["bob".to_string()])
    );
    Ok(())
}

#[tokio::test]
async fn test_unrestricted_merge() -> anyhow::Result<()> {
    let fx = TestFixture::new();
    let shared = fixtures::unrestricted(&["acct1"]);

    fx.repo.put(&shared).await?;
    fx.repo.put(&PermissionSet::new("x")).await?;

    let x = fx.repo.get("x").await?.expect("x exists");
    assert!(x.resource(ResourceKind::Account, "acct1").is_some());
    assert!(!x.is_admin());

    let own = fx.repo.get(UNRESTRICTED_ID).await?.expect("unrestricted exists");
    assert_eq!(own, shared);
    Ok(())
}

#[tokio::test]
async fn test_own_entry_wins_on_name_clash() -> anyhow::Result<()> {
    let fx = TestFixture::new();
    fx.repo
        .put(&fixtures::unrestricted(&["shared"]))
        .await?;

    let mine = Account::new("shared")
        .with_cloud_provider("gce")
        .with_permissions(fixtures::read_write(&["team"]));
    fx.repo
        .put(&PermissionSet::new("x").with_resource(mine.clone()))
        .await?;

    let x = fx.repo.get("x").await?.expect("x exists");
    assert_eq!(
        x.resource(ResourceKind::Account, "shared"),
        Some(&Resource::from(mine))
    );
    Ok(())
}

#[tokio::test]
async fn test_remove_leaves_no_keys() -> anyhow::Result<()> {
    let fx = TestFixture::new();
    let set = PermissionSet::new("alice")
        .with_admin(true)
        .with_resource(Account::new("prod"))
        .with_resource(Application::new("billing"))
        .with_resource(Role::new("dev"));

    fx.repo.put(&set).await?;
    assert!(!fx.keys().await?.is_empty());

    fx.repo.remove("alice").await?;
    assert_eq!(fx.keys().await?, Vec::<String>::new());
    assert_eq!(fx.repo.get("alice").await?, None);
    Ok(())
}

#[tokio::test]
async fn test_remove_unknown_is_ok() -> anyhow::Result<()> {
    let fx = TestFixture::new();
    fx.repo.remove("ghost").await?;
    assert!(fx.keys().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_get_all_by_roles() -> anyhow::Result<()> {
    let fx = TestFixture::new();
    fx.repo.put(&fixtures::unrestricted(&["acct1"])).await?;
    fx.repo.put(&user("alice", &["dev"])).await?;
    fx.repo.put(&user("bob", &["ops"])).await?;
    fx.repo.put(&user("carol", &["dev", "ops"])).await?;

    let everyone = fx.repo.get_all_by_roles(None).await?;
    assert_eq!(
        ids(&everyone),
        BTreeSet::from(["alice", "bob", "carol", UNRESTRICTED_ID])
    );
    assert!(everyone["bob"]
        .resource(ResourceKind::Account, "acct1")
        .is_some());

    let nobody: &[String] = &[];
    let only_shared = fx.repo.get_all_by_roles(Some(nobody)).await?;
    assert_eq!(ids(&only_shared), BTreeSet::from([UNRESTRICTED_ID]));
    assert_eq!(
        only_shared[UNRESTRICTED_ID],
        fixtures::unrestricted(&["acct1"])
    );

    let devs = fx
        .repo
        .get_all_by_roles(Some(&["DEV".to_string()]))
        .await?;
    assert_eq!(ids(&devs), BTreeSet::from(["alice", "carol", UNRESTRICTED_ID]));
    assert!(devs["alice"]
        .resource(ResourceKind::Account, "acct1")
        .is_some());

    let unknown = fx
        .repo
        .get_all_by_roles(Some(&["nope".to_string()]))
        .await?;
    assert_eq!(ids(&unknown), BTreeSet::from([UNRESTRICTED_ID]));
    Ok(())
}

#[tokio::test]
async fn test_get_all_by_roles_without_unrestricted() -> anyhow::Result<()> {
    let fx = TestFixture::new();
    fx.repo.put(&user("alice", &["dev"])).await?;

    let nobody: &[String] = &[];
    assert!(fx.repo.get_all_by_roles(Some(nobody)).await?.is_empty());
    assert_eq!(
        ids(&fx.repo.get_all_by_roles(None).await?),
        BTreeSet::from(["alice"])
    );
    Ok(())
}

#[tokio::test]
async fn test_ids_are_case_insensitive() -> anyhow::Result<()> {
    let fx = TestFixture::new();
    fx.repo
        .put(&PermissionSet::new("TestUser").with_resource(Role::new("Dev")))
        .await?;

    let stored = fx.repo.get("testuser").await?.expect("stored");
    assert_eq!(stored.id(), "testuser");
    assert_eq!(fx.repo.get("TESTUSER").await?, Some(stored));
    assert!(fx
        .backend
        .is_member(&fx.repo.keys().role("dev"), "testuser")
        .await?);
    Ok(())
}

#[tokio::test]
async fn test_bulk_write_and_read() -> anyhow::Result<()> {
    let fx = TestFixture::with_config(fixtures::test_config().with_bulk_batch_size(2));
    let sets: BTreeMap<String, PermissionSet> = ["a", "b", "c", "d", "e"]
        .into_iter()
        .map(|id| (id.to_string(), user(id, &["dev"])))
        .collect();

    fx.repo.put_all_by_id(&sets).await?;

    let all = fx.repo.get_all_by_id().await?;
    assert_eq!(all, sets);
    assert_eq!(
        fx.repo.principal_ids().await?,
        sets.keys().cloned().collect::<BTreeSet<_>>()
    );
    assert_eq!(
        fx.backend.members(&fx.repo.keys().role("dev")).await?.len(),
        5
    );
    Ok(())
}

#[tokio::test]
async fn test_bulk_write_moves_roles() -> anyhow::Result<()> {
    let fx = TestFixture::new();
    fx.repo.put(&user("a", &["old"])).await?;

    let sets = BTreeMap::from([("a".to_string(), user("a", &["new"]))]);
    fx.repo.put_all_by_id(&sets).await?;

    assert!(!fx.backend.exists(&fx.repo.keys().role("old")).await?);
    assert!(fx.backend.is_member(&fx.repo.keys().role("new"), "a").await?);
    Ok(())
}

#[tokio::test]
async fn test_roles_by_id_and_last_modified() -> anyhow::Result<()> {
    let fx = TestFixture::new();
    fx.repo.put(&fixtures::service_account("ci", &["deploy"])).await?;
    fx.repo.put(&fixtures::unrestricted(&["acct1"])).await?;

    let roles = fx.repo.get_all_roles_by_id().await?;
    assert_eq!(roles["ci"], vec![Role::new("deploy")]);
    assert!(roles[UNRESTRICTED_ID].is_empty());

    assert_eq!(
        fx.repo.unrestricted_last_modified().await?,
        Some(fixtures::START_MILLIS)
    );
    fx.clock.advance(std::time::Duration::from_secs(3));
    fx.repo.remove(UNRESTRICTED_ID).await?;
    assert_eq!(
        fx.repo.unrestricted_last_modified().await?,
        Some(fixtures::START_MILLIS + 3_000)
    );
    Ok(())
}

#[tokio::test]
async fn test_bulk_write_rejects_ids_that_differ_only_in_case() -> anyhow::Result<()> {
    let fx = TestFixture::new();
    let sets = BTreeMap::from([
        ("Alice".to_string(), user("alice", &["dev"])),
        ("alice".to_string(), user("alice", &["ops"])),
    ]);

    let err = fx.repo.put_all_by_id(&sets).await.unwrap_err();
    assert!(matches!(err, permrepo::RepositoryError::InvalidPrincipal(_)));

    assert!(fx.keys().await?.is_empty());
    assert!(fx
        .repo
        .get_all_by_roles(Some(&["dev".to_string()]))
        .await?
        .is_empty());
    Ok(())
}
