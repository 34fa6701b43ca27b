//! JSON seed documents: the catalog, approver credentials, and existing
//! records used to populate the in-memory stores.
//!
//! ```json
//! {
//!   "books": [ { "id": "...", "title": "...", "courses": [ ... ] } ],
//!   "credentials": [
//!     { "role": "APPROVER_IN", "name": "Dr. Alice", "pin_sha256": "03ac67..." }
//!   ],
//!   "records": [ ... ]
//! }
//! ```
//!
//! Credentials carry PIN digests only; `logbook hash-pin` prints them.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use logbook_engine::{parse_hex_digest, ExperienceEngine, MemoryCredentials};
use logbook_storage::{ApproverRole, Book, ExperienceRecord, MemoryCatalog, MemoryRecordStore};
use serde::Deserialize;

/// The engine over in-memory stores, as served by `logbook serve`.
pub(crate) type MemoryEngine = ExperienceEngine<MemoryRecordStore, MemoryCatalog, MemoryCredentials>;

#[derive(Debug, thiserror::Error)]
pub(crate) enum SeedError {
    #[error("could not read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("could not parse '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("credential for '{name}' has an invalid pin_sha256: {reason}")]
    InvalidDigest { name: String, reason: String },

    #[error("record {record_id} references unknown book '{book_id}'")]
    UnknownBook { record_id: String, book_id: String },

    #[error("duplicate {kind} id '{id}'")]
    Duplicate { kind: &'static str, id: String },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct SeedDocument {
    #[serde(default)]
    pub(crate) books: Vec<Book>,
    #[serde(default)]
    pub(crate) credentials: Vec<SeedCredential>,
    #[serde(default)]
    pub(crate) records: Vec<ExperienceRecord>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct SeedCredential {
    pub(crate) role: ApproverRole,
    pub(crate) name: String,
    pub(crate) pin_sha256: String,
}

impl SeedDocument {
    pub(crate) fn read(path: &Path) -> Result<Self, SeedError> {
        let content = std::fs::read_to_string(path).map_err(|source| SeedError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| SeedError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Validate the document and build an engine over it.
    pub(crate) fn into_engine(self) -> Result<MemoryEngine, SeedError> {
        let mut book_ids = HashSet::new();
        for book in &self.books {
            if !book_ids.insert(book.id.as_str()) {
                return Err(SeedError::Duplicate {
                    kind: "book",
                    id: book.id.clone(),
                });
            }
        }

        let mut record_ids = HashSet::new();
        for record in &self.records {
            if !book_ids.contains(record.book_id.as_str()) {
                return Err(SeedError::UnknownBook {
                    record_id: record.id.clone(),
                    book_id: record.book_id.clone(),
                });
            }
            if !record_ids.insert(record.id.as_str()) {
                return Err(SeedError::Duplicate {
                    kind: "record",
                    id: record.id.clone(),
                });
            }
        }

        let mut credentials = MemoryCredentials::new();
        for cred in &self.credentials {
            let digest = parse_hex_digest(&cred.pin_sha256).map_err(|reason| {
                SeedError::InvalidDigest {
                    name: cred.name.clone(),
                    reason,
                }
            })?;
            credentials = credentials.with_digest(cred.role, &cred.name, digest);
        }

        tracing::debug!(
            books = self.books.len(),
            credentials = credentials.len(),
            records = self.records.len(),
            "seed loaded"
        );
        Ok(ExperienceEngine::new(
            MemoryRecordStore::with_records(self.records),
            MemoryCatalog::new(self.books),
            credentials,
        ))
    }
}

/// Read `path` into an engine, or an empty engine when no seed is given.
pub(crate) fn load_engine(path: Option<&Path>) -> Result<MemoryEngine, SeedError> {
    match path {
        Some(p) => SeedDocument::read(p)?.into_engine(),
        None => SeedDocument::default().into_engine(),
    }
}
