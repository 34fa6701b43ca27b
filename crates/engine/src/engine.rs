use logbook_storage::{CatalogStore, RecordStore};

use crate::approval::{ApprovalAuthority, CredentialStore};

/// The experience engine: record lifecycle, approval protocol, and progress
/// aggregation over a record store, a catalog, and a credential store.
///
/// The engine holds no mutable state of its own. Every operation reads from
/// and writes to the stores, so one engine can serve concurrent requests.
/// Operations are split across `impl` blocks in `lifecycle`, `bulk`, and
/// `progress`.
#[derive(Debug, Clone)]
pub struct ExperienceEngine<R, C, K> {
    pub(crate) records: R,
    pub(crate) catalog: C,
    pub(crate) authority: ApprovalAuthority<K>,
}

impl<R, C, K> ExperienceEngine<R, C, K>
where
    R: RecordStore,
    C: CatalogStore,
    K: CredentialStore,
{
    pub fn new(records: R, catalog: C, credentials: K) -> Self {
        Self {
            records,
            catalog,
            authority: ApprovalAuthority::new(credentials),
        }
    }

    pub fn records(&self) -> &R {
        &self.records
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn authority(&self) -> &ApprovalAuthority<K> {
        &self.authority
    }
}
