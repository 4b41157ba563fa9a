//! Reverse index maintenance.
//!
//! Three kinds of set keys index the per-principal blobs: the all-principals
//! set, the admin set, and one set per role. On every write the maintainer
//! compares what the indices say about a principal before the write with
//! what they must say after it, and emits only the set commands that differ.

use std::collections::BTreeSet;

use permrepo_core::{normalize_id, KeySchema, PermissionSet};
use permrepo_store::Batch;

/// What the reverse indices record about one principal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexView {
    /// Member of the all-principals set.
    pub listed: bool,
    /// Member of the admin set.
    pub admin: bool,
    /// Roles whose set contains the principal.
    pub roles: BTreeSet<String>,
}

impl IndexView {
    /// The view a stored permission set must leave behind.
    pub fn of(set: &PermissionSet) -> Self {
        Self {
            listed: true,
            admin: set.is_admin(),
            roles: set.role_names(),
        }
    }

    /// True if no index mentions the principal.
    pub fn is_absent(&self) -> bool {
        !self.listed && !self.admin && self.roles.is_empty()
    }
}

/// Plans index updates for one namespace.
#[derive(Debug, Clone)]
pub struct IndexMaintainer {
    keys: KeySchema,
    unrestricted_id: String,
}

impl IndexMaintainer {
    pub fn new(keys: KeySchema, unrestricted_id: &str) -> Self {
        Self {
            keys,
            unrestricted_id: normalize_id(unrestricted_id),
        }
    }

    pub fn is_unrestricted(&self, id: &str) -> bool {
        normalize_id(id) == self.unrestricted_id
    }

    /// Commands that move the indices for `id` from `before` to `after`.
    ///
    /// An absent `after` removes the principal from every index. Writes to
    /// the unrestricted principal also stamp its last-modified key with
    /// `now_millis`.
    pub fn plan(
        &self,
        id: &str,
        before: &IndexView,
        after: Option<&IndexView>,
        now_millis: i64,
    ) -> Batch {
        let id = normalize_id(id);
        let gone = IndexView::default();
        let after = after.unwrap_or(&gone);
        let mut batch = Batch::new();

        if after.listed && !before.listed {
            batch.set_add(self.keys.all_principals(), [id.as_str()]);
        } else if !after.listed && before.listed {
            batch.set_remove(self.keys.all_principals(), [id.as_str()]);
        }

        if after.admin && !before.admin {
            batch.set_add(self.keys.admin(), [id.as_str()]);
        } else if !after.admin && before.admin {
            batch.set_remove(self.keys.admin(), [id.as_str()]);
        }

        for role in after.roles.difference(&before.roles) {
            batch.set_add(self.keys.role(role), [id.as_str()]);
        }
        for role in before.roles.difference(&after.roles) {
            batch.set_remove(self.keys.role(role), [id.as_str()]);
        }

        if id == self.unrestricted_id {
            batch.put(
                self.keys.last_modified(&self.unrestricted_id),
                now_millis.to_string().into_bytes(),
            );
        }

        batch
    }
}
