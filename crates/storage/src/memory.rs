//! In-memory store backends.
//!
//! Both backends are cheap to clone; clones share the same underlying data.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::catalog::Book;
use crate::error::StorageError;
use crate::record::{
    timestamp_now, ExperienceRecord, ExperienceStatus, RecordDetails, RecordFilter,
};
use crate::traits::{CatalogStore, RecordStore};

/// `RecordStore` backed by a map behind a `tokio::sync::RwLock`.
///
/// Conditional writes hold the write lock across check and set, which makes
/// them atomic with respect to each other.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordStore {
    records: Arc<RwLock<BTreeMap<String, ExperienceRecord>>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated with `records`. Later duplicates replace
    /// earlier ones.
    pub fn with_records(records: Vec<ExperienceRecord>) -> Self {
        let map = records.into_iter().map(|r| (r.id.clone(), r)).collect();
        Self {
            records: Arc::new(RwLock::new(map)),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

fn not_found(record_id: &str) -> StorageError {
    StorageError::RecordNotFound {
        record_id: record_id.to_string(),
    }
}

/// Oldest first, ties broken by ID so output is deterministic.
fn sorted(mut records: Vec<ExperienceRecord>) -> Vec<ExperienceRecord> {
    records.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
    records
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn insert(&self, record: ExperienceRecord) -> Result<(), StorageError> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.id) {
            return Err(StorageError::AlreadyExists {
                record_id: record.id,
            });
        }
        records.insert(record.id.clone(), record);
        Ok(())
    }

    async fn conditional_update_status(
        &self,
        record_id: &str,
        expected: ExperienceStatus,
        new_status: ExperienceStatus,
    ) -> Result<bool, StorageError> {
        let mut records = self.records.write().await;
        let record = records.get_mut(record_id).ok_or_else(|| not_found(record_id))?;
        if record.status != expected {
            return Ok(false);
        }
        record.status = new_status;
        record.updated_at = timestamp_now();
        Ok(true)
    }

    async fn conditional_update_details(
        &self,
        record_id: &str,
        expected: ExperienceStatus,
        details: RecordDetails,
    ) -> Result<bool, StorageError> {
        let mut records = self.records.write().await;
        let record = records.get_mut(record_id).ok_or_else(|| not_found(record_id))?;
        if record.status != expected {
            return Ok(false);
        }
        record.subject = details.subject;
        record.fields = details.fields;
        record.approver_role = details.approver_role;
        record.approver_name = details.approver_name;
        record.updated_at = timestamp_now();
        Ok(true)
    }

    async fn conditional_delete(
        &self,
        record_id: &str,
        expected: ExperienceStatus,
    ) -> Result<bool, StorageError> {
        let mut records = self.records.write().await;
        let status = records
            .get(record_id)
            .map(|r| r.status)
            .ok_or_else(|| not_found(record_id))?;
        if status != expected {
            return Ok(false);
        }
        records.remove(record_id);
        Ok(true)
    }

    async fn get(&self, record_id: &str) -> Result<ExperienceRecord, StorageError> {
        self.records
            .read()
            .await
            .get(record_id)
            .cloned()
            .ok_or_else(|| not_found(record_id))
    }

    async fn get_many(&self, record_ids: &[String]) -> Result<Vec<ExperienceRecord>, StorageError> {
        let records = self.records.read().await;
        Ok(record_ids
            .iter()
            .filter_map(|id| records.get(id).cloned())
            .collect())
    }

    async fn list(&self, filter: &RecordFilter) -> Result<Vec<ExperienceRecord>, StorageError> {
        let records = self.records.read().await;
        Ok(sorted(
            records.values().filter(|r| filter.matches(r)).cloned().collect(),
        ))
    }

    async fn find_confirmed_by_student_and_book(
        &self,
        student_id: &str,
        book_id: &str,
    ) -> Result<Vec<ExperienceRecord>, StorageError> {
        self.list(&RecordFilter {
            student_id: Some(student_id.to_string()),
            book_id: Some(book_id.to_string()),
            status: Some(ExperienceStatus::Confirmed),
            approver_name: None,
        })
        .await
    }

    async fn find_confirmed_by_book(
        &self,
        book_id: &str,
    ) -> Result<Vec<ExperienceRecord>, StorageError> {
        self.list(&RecordFilter {
            book_id: Some(book_id.to_string()),
            status: Some(ExperienceStatus::Confirmed),
            ..RecordFilter::default()
        })
        .await
    }
}

/// Immutable in-memory catalog.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    books: Arc<Vec<Book>>,
}

impl MemoryCatalog {
    pub fn new(books: Vec<Book>) -> Self {
        Self {
            books: Arc::new(books),
        }
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalog {
    async fn list_books(&self) -> Result<Vec<Book>, StorageError> {
        Ok(self.books.as_ref().clone())
    }

    async fn get_book(&self, book_id: &str) -> Result<Book, StorageError> {
        self.books
            .iter()
            .find(|b| b.id == book_id)
            .cloned()
            .ok_or_else(|| StorageError::BookNotFound {
                book_id: book_id.to_string(),
            })
    }
}
