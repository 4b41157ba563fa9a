//! The permission repository: reads and writes permission sets.
//!
//! Each principal is stored as one blob per resource kind, plus entries in
//! the reverse indices (all principals, admins, role members). Writes send
//! the blobs and the index delta as one pipelined batch. Reads fetch
//! everything they need for one principal in a single round trip.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use permrepo_core::{
    codec, merge_unrestricted, normalize_id, with_unrestricted, CodecError, KeySchema,
    PermissionSet, Resource, ResourceKind, Role,
};
use permrepo_store::{expect_replies, Backend, Batch, Query, Reply, StoreError};
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::RepositoryConfig;
use crate::envelope::{Envelope, RetryPolicy};
use crate::error::{RepositoryError, Result};
use crate::index::{IndexMaintainer, IndexView};

/// Per-principal permission storage over a [`Backend`].
///
/// Holds no cached state: every call goes to the backend. All public
/// operations run under a deadline measured on the injected [`Clock`].
pub struct PermissionRepository<B: Backend, C: Clock = SystemClock> {
    /// The backend.
    backend: Arc<B>,
    /// Deadlines and read retries.
    envelope: Envelope<C>,
    /// Key layout for the configured prefix.
    keys: KeySchema,
    /// Reverse index planner.
    index: IndexMaintainer,
    /// Normalized id of the unrestricted principal.
    unrestricted_id: String,
    /// Configuration.
    config: RepositoryConfig,
}

impl<B: Backend> PermissionRepository<B, SystemClock> {
    /// Create a repository on the system clock.
    pub fn new(backend: B, config: RepositoryConfig) -> Self {
        Self::with_clock(backend, SystemClock, config)
    }
}

impl<B: Backend, C: Clock> PermissionRepository<B, C> {
    /// Create a repository on an explicit clock.
    pub fn with_clock(backend: B, clock: C, config: RepositoryConfig) -> Self {
        let keys = KeySchema::new(config.prefix.clone());
        let retry = RetryPolicy {
            max_retries: config.read_retries,
            backoff: config.retry_backoff,
        };
        Self {
            backend: Arc::new(backend),
            envelope: Envelope::new(clock, retry),
            index: IndexMaintainer::new(keys.clone(), &config.unrestricted_id),
            unrestricted_id: normalize_id(&config.unrestricted_id),
            keys,
            config,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    pub fn keys(&self) -> &KeySchema {
        &self.keys
    }

    pub fn unrestricted_id(&self) -> &str {
        &self.unrestricted_id
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Writes
    // ─────────────────────────────────────────────────────────────────────────

    /// Replace everything stored for `set`'s principal.
    ///
    /// Kinds absent from `set` are deleted. The reverse indices are moved
    /// from their current state to what `set` implies; if the current state
    /// cannot be read cleanly the write is treated as a create.
    pub async fn put(&self, set: &PermissionSet) -> Result<()> {
        let id = validate_id(set.id())?;
        let before = self
            .envelope
            .within("put", self.config.read_timeout, self.read_index_views(&[id.clone()]))
            .await?
            .remove(&id)
            .unwrap_or_default();

        let batch = self.put_batch(&id, set, &before)?;
        debug!(principal = %id, commands = batch.len(), "writing permission set");
        self.execute("put", batch).await
    }

    /// [`put`](Self::put) every entry, in chunks of `bulk_batch_size`.
    ///
    /// Each map key must name the record it holds, and no two keys may name
    /// the same principal once lower-cased. A failed chunk does not stop
    /// later chunks; the returned [`RepositoryError::BulkWrite`] lists every
    /// principal whose chunk failed.
    pub async fn put_all_by_id(&self, sets: &BTreeMap<String, PermissionSet>) -> Result<()> {
        let mut records = Vec::with_capacity(sets.len());
        let mut seen = BTreeSet::new();
        for (key, set) in sets {
            let id = validate_id(set.id())?;
            if normalize_id(key) != id {
                return Err(RepositoryError::InvalidPrincipal(format!(
                    "key {key} holds the record for {id}"
                )));
            }
            if !seen.insert(id.clone()) {
                return Err(RepositoryError::InvalidPrincipal(format!(
                    "more than one record for {id}"
                )));
            }
            records.push((id, set));
        }

        let mut failed = Vec::new();
        let mut first_error = None;
        for chunk in records.chunks(self.config.bulk_batch_size.max(1)) {
            if let Err(error) = self.put_chunk(chunk).await {
                warn!(principals = chunk.len(), %error, "bulk write chunk failed");
                failed.extend(chunk.iter().map(|(id, _)| id.clone()));
                first_error.get_or_insert(error);
            }
        }

        match first_error {
            None => {
                debug!(principals = records.len(), "bulk write complete");
                Ok(())
            }
            Some(source) => Err(RepositoryError::BulkWrite {
                failed,
                source: Box::new(source),
            }),
        }
    }

    async fn put_chunk(&self, chunk: &[(String, &PermissionSet)]) -> Result<()> {
        let ids: Vec<String> = chunk.iter().map(|(id, _)| id.clone()).collect();
        let mut before = self
            .envelope
            .within("put_all_by_id", self.config.read_timeout, self.read_index_views(&ids))
            .await?;

        let mut batch = Batch::new();
        for (id, set) in chunk {
            let view = before.remove(id).unwrap_or_default();
            batch.append(self.put_batch(id, set, &view)?);
        }
        self.execute("put_all_by_id", batch).await
    }

    /// Delete every blob and index entry for `id`. Removing an unknown
    /// principal succeeds.
    pub async fn remove(&self, id: &str) -> Result<()> {
        let id = validate_id(id)?;
        let before = self
            .envelope
            .within("remove", self.config.read_timeout, self.read_index_views(&[id.clone()]))
            .await?
            .remove(&id)
            .unwrap_or_default();

        let mut batch = Batch::new();
        batch.delete(ResourceKind::ALL.map(|kind| self.keys.resources(&id, kind)));
        batch.append(
            self.index
                .plan(&id, &before, None, self.envelope.clock().epoch_millis()),
        );
        debug!(principal = %id, existed = before.listed, "removing permission set");
        self.execute("remove", batch).await
    }

    fn put_batch(&self, id: &str, set: &PermissionSet, before: &IndexView) -> Result<Batch> {
        let mut batch = Batch::new();
        let mut cleared = Vec::new();
        for kind in ResourceKind::ALL {
            let key = self.keys.resources(id, kind);
            match set.resources(kind) {
                Some(resources) if !resources.is_empty() => {
                    let blob = codec::encode(kind, resources).map_err(RepositoryError::Encoding)?;
                    batch.put(key, blob);
                }
                _ => cleared.push(key),
            }
        }
        batch.delete(cleared);
        batch.append(self.index.plan(
            id,
            before,
            Some(&IndexView::of(set)),
            self.envelope.clock().epoch_millis(),
        ));
        Ok(batch)
    }

    async fn execute(&self, operation: &'static str, batch: Batch) -> Result<()> {
        self.envelope
            .within(
                operation,
                self.config.write_timeout,
                self.envelope.write(self.backend.execute(batch)),
            )
            .await
    }

    /// Current index entries for each id, in pipelined chunks.
    ///
    /// A role blob that fails to decode leaves that principal's role list
    /// empty, so stale role entries are not cleaned up by the write.
    async fn read_index_views(&self, ids: &[String]) -> Result<BTreeMap<String, IndexView>> {
        let mut views = BTreeMap::new();
        for chunk in ids.chunks(self.config.bulk_batch_size.max(1)) {
            let mut queries = Vec::with_capacity(chunk.len() * 3);
            for id in chunk {
                queries.push(Query::IsMember {
                    key: self.keys.all_principals(),
                    member: id.clone(),
                });
                queries.push(Query::IsMember {
                    key: self.keys.admin(),
                    member: id.clone(),
                });
                queries.push(Query::Get(self.keys.resources(id, ResourceKind::Role)));
            }

            let mut replies = self.query("read_index", queries).await?.into_iter();
            for id in chunk {
                let listed = next_reply(&mut replies)?.into_flag()?;
                let admin = next_reply(&mut replies)?.into_flag()?;
                let blob = next_reply(&mut replies)?.into_value()?;
                let roles = match codec::decode(ResourceKind::Role, blob.as_deref()) {
                    Ok(roles) => roles
                        .map(|r| r.keys().map(|name| normalize_id(name)).collect())
                        .unwrap_or_default(),
                    Err(error) => {
                        warn!(principal = %id, %error, "unreadable role blob, treating write as create");
                        BTreeSet::new()
                    }
                };
                views.insert(
                    id.clone(),
                    IndexView {
                        listed,
                        admin,
                        roles,
                    },
                );
            }
        }
        Ok(views)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────

    /// Load one principal, with the unrestricted principal's grants merged
    /// in. Returns `None` if the principal is not known.
    pub async fn get(&self, id: &str) -> Result<Option<PermissionSet>> {
        let id = validate_id(id)?;
        self.envelope
            .within("get", self.config.read_timeout, self.load_one(&id))
            .await
    }

    async fn load_one(&self, id: &str) -> Result<Option<PermissionSet>> {
        let merge = id != self.unrestricted_id;
        let mut queries = self.principal_queries(id);
        if merge {
            queries.extend(self.principal_queries(&self.unrestricted_id));
        }

        let mut replies = self.query("get", queries).await?.into_iter();
        let Some(set) = assemble(id, &mut replies)? else {
            return Ok(None);
        };
        let shared = if merge {
            assemble(&self.unrestricted_id, &mut replies)?
        } else {
            None
        };
        Ok(Some(with_unrestricted(set, shared.as_ref())))
    }

    /// Load every known principal, each merged with the unrestricted
    /// principal's grants.
    pub async fn get_all_by_id(&self) -> Result<BTreeMap<String, PermissionSet>> {
        self.envelope
            .within(
                "get_all_by_id",
                self.config.bulk_read_timeout,
                self.load_all("get_all_by_id"),
            )
            .await
    }

    async fn load_all(&self, operation: &'static str) -> Result<BTreeMap<String, PermissionSet>> {
        let queries = vec![
            Query::Members(self.keys.all_principals()),
            Query::Members(self.keys.admin()),
        ];
        let mut replies = self.query(operation, queries).await?.into_iter();
        let users = next_reply(&mut replies)?.into_members()?;
        let admins = next_reply(&mut replies)?.into_members()?;
        self.load_many(operation, users, &admins).await
    }

    /// Load the members of any of `roles`, plus the unrestricted principal.
    ///
    /// `None` loads every principal. `Some(&[])` loads only the unrestricted
    /// principal. Every principal but the unrestricted one is merged.
    pub async fn get_all_by_roles(
        &self,
        roles: Option<&[String]>,
    ) -> Result<BTreeMap<String, PermissionSet>> {
        let Some(roles) = roles else {
            return self.get_all_by_id().await;
        };
        self.envelope
            .within(
                "get_all_by_roles",
                self.config.bulk_read_timeout,
                self.load_roles(roles),
            )
            .await
    }

    async fn load_roles(&self, roles: &[String]) -> Result<BTreeMap<String, PermissionSet>> {
        let role_keys: BTreeSet<String> = roles.iter().map(|r| self.keys.role(r)).collect();
        let mut queries = vec![
            Query::Members(self.keys.all_principals()),
            Query::Members(self.keys.admin()),
        ];
        queries.extend(role_keys.into_iter().map(Query::Members));

        let mut replies = self.query("get_all_by_roles", queries).await?.into_iter();
        let users = next_reply(&mut replies)?.into_members()?;
        let admins = next_reply(&mut replies)?.into_members()?;

        let mut candidates = BTreeSet::from([self.unrestricted_id.clone()]);
        for reply in replies {
            candidates.extend(reply.into_members()?);
        }
        candidates.retain(|id| users.contains(id));

        debug!(
            roles = roles.len(),
            principals = candidates.len(),
            "loading principals by role"
        );
        self.load_many("get_all_by_roles", candidates, &admins).await
    }

    /// Every known principal's own roles. No unrestricted merge.
    pub async fn get_all_roles_by_id(&self) -> Result<BTreeMap<String, Vec<Role>>> {
        self.envelope
            .within(
                "get_all_roles_by_id",
                self.config.bulk_read_timeout,
                self.load_all_roles(),
            )
            .await
    }

    async fn load_all_roles(&self) -> Result<BTreeMap<String, Vec<Role>>> {
        let ids: Vec<String> = self.load_principal_ids().await?.into_iter().collect();

        let mut roles = BTreeMap::new();
        for chunk in ids.chunks(self.config.bulk_batch_size.max(1)) {
            let queries = chunk
                .iter()
                .map(|id| Query::Get(self.keys.resources(id, ResourceKind::Role)))
                .collect();
            let replies = self.query("get_all_roles_by_id", queries).await?;
            for (id, reply) in chunk.iter().zip(replies) {
                let held = codec::decode(ResourceKind::Role, reply.into_value()?.as_deref())?
                    .unwrap_or_default()
                    .into_values()
                    .filter_map(|resource| match resource {
                        Resource::Role(role) => Some(role),
                        _ => None,
                    })
                    .collect();
                roles.insert(id.clone(), held);
            }
        }
        Ok(roles)
    }

    /// Epoch millis of the last write to the unrestricted principal, if any.
    pub async fn unrestricted_last_modified(&self) -> Result<Option<i64>> {
        self.envelope
            .within(
                "unrestricted_last_modified",
                self.config.read_timeout,
                self.load_last_modified(),
            )
            .await
    }

    async fn load_last_modified(&self) -> Result<Option<i64>> {
        let key = self.keys.last_modified(&self.unrestricted_id);
        let mut replies = self
            .query("unrestricted_last_modified", vec![Query::Get(key.clone())])
            .await?
            .into_iter();
        let Some(bytes) = next_reply(&mut replies)?.into_value()? else {
            return Ok(None);
        };
        std::str::from_utf8(&bytes)
            .ok()
            .and_then(|s| s.trim().parse::<i64>().ok())
            .map(Some)
            .ok_or_else(|| {
                CodecError::Malformed(format!("{key} does not hold a timestamp")).into()
            })
    }

    /// Ids of every known principal.
    pub async fn principal_ids(&self) -> Result<BTreeSet<String>> {
        self.envelope
            .within(
                "principal_ids",
                self.config.read_timeout,
                self.load_principal_ids(),
            )
            .await
    }

    async fn load_principal_ids(&self) -> Result<BTreeSet<String>> {
        let mut replies = self
            .query(
                "principal_ids",
                vec![Query::Members(self.keys.all_principals())],
            )
            .await?
            .into_iter();
        Ok(next_reply(&mut replies)?.into_members()?)
    }

    /// Read the given principals kind by kind, then merge.
    async fn load_many(
        &self,
        operation: &'static str,
        ids: BTreeSet<String>,
        admins: &BTreeSet<String>,
    ) -> Result<BTreeMap<String, PermissionSet>> {
        let ids: Vec<String> = ids.into_iter().collect();
        let mut sets: BTreeMap<String, PermissionSet> = ids
            .iter()
            .map(|id| {
                (
                    id.clone(),
                    PermissionSet::new(id).with_admin(admins.contains(id)),
                )
            })
            .collect();

        for kind in ResourceKind::ALL {
            for chunk in ids.chunks(self.config.bulk_batch_size.max(1)) {
                let queries = chunk
                    .iter()
                    .map(|id| Query::Get(self.keys.resources(id, kind)))
                    .collect();
                let replies = self.query(operation, queries).await?;
                for (id, reply) in chunk.iter().zip(replies) {
                    let Some(resources) = codec::decode(kind, reply.into_value()?.as_deref())?
                    else {
                        continue;
                    };
                    if let Some(set) = sets.get_mut(id) {
                        set.set_resources(kind, resources);
                    }
                }
            }
        }

        if let Some(shared) = sets.get(&self.unrestricted_id).cloned() {
            for set in sets.values_mut() {
                merge_unrestricted(set, &shared);
            }
        }
        debug!(operation, principals = sets.len(), "loaded permission sets");
        Ok(sets)
    }

    /// Queries that `assemble` turns back into one principal.
    fn principal_queries(&self, id: &str) -> Vec<Query> {
        let mut queries = vec![
            Query::IsMember {
                key: self.keys.all_principals(),
                member: id.to_string(),
            },
            Query::IsMember {
                key: self.keys.admin(),
                member: id.to_string(),
            },
        ];
        queries.extend(
            ResourceKind::ALL
                .iter()
                .map(|kind| Query::Get(self.keys.resources(id, *kind))),
        );
        queries
    }

    /// One pipelined read round trip, retried on backend failure.
    async fn query(&self, operation: &'static str, queries: Vec<Query>) -> Result<Vec<Reply>> {
        if queries.is_empty() {
            return Ok(Vec::new());
        }
        let expected = queries.len();
        let replies = self
            .envelope
            .read(operation, || self.backend.query(queries.clone()))
            .await?;
        expect_replies(expected, &replies)?;
        Ok(replies)
    }
}

fn validate_id(id: &str) -> Result<String> {
    if id.trim().is_empty() {
        return Err(RepositoryError::InvalidPrincipal(
            "principal id must not be empty".to_string(),
        ));
    }
    Ok(normalize_id(id))
}

fn next_reply(replies: &mut impl Iterator<Item = Reply>) -> Result<Reply> {
    replies
        .next()
        .ok_or_else(|| StoreError::UnexpectedReply("missing reply".to_string()).into())
}

/// Rebuild one principal from the replies to `principal_queries`.
///
/// Always consumes every reply for the principal, even when it is unknown.
fn assemble(
    id: &str,
    replies: &mut impl Iterator<Item = Reply>,
) -> Result<Option<PermissionSet>> {
    let listed = next_reply(replies)?.into_flag()?;
    let admin = next_reply(replies)?.into_flag()?;
    let mut set = PermissionSet::new(id).with_admin(admin);
    for kind in ResourceKind::ALL {
        let blob = next_reply(replies)?.into_value()?;
        if let Some(resources) = codec::decode(kind, blob.as_deref())? {
            set.set_resources(kind, resources);
        }
    }
    Ok(listed.then_some(set))
}
