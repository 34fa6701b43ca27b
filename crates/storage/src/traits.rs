use async_trait::async_trait;

use crate::catalog::{Book, SubCourseRequirement};
use crate::error::StorageError;
use crate::record::{ExperienceRecord, ExperienceStatus, RecordDetails, RecordFilter};

/// The storage trait for experience records.
///
/// ## Conditional writes
///
/// Every mutation of an existing record is a guard-then-write keyed on the
/// record's expected current status: `UPDATE ... WHERE id = ? AND status = ?`.
/// If the record exists but is in another status, the write does not happen
/// and the method returns `Ok(false)`. Two callers racing on the same
/// `PENDING` record therefore see exactly one `Ok(true)`.
///
/// Unknown record IDs are reported as `Err(StorageError::RecordNotFound)`.
///
/// ## Read consistency
///
/// Each query method is a single read against one consistent view of the
/// store. A record confirmed concurrently is either wholly in or wholly out
/// of the returned set.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` to be used in axum
/// application state and across async task boundaries.
#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    // ── Writes ────────────────────────────────────────────────────────────────

    /// Insert a new record.
    ///
    /// Returns `Err(StorageError::AlreadyExists)` if the ID is taken.
    async fn insert(&self, record: ExperienceRecord) -> Result<(), StorageError>;

    /// Set `status` to `new_status` if and only if it currently equals
    /// `expected`. Also refreshes `updated_at`.
    async fn conditional_update_status(
        &self,
        record_id: &str,
        expected: ExperienceStatus,
        new_status: ExperienceStatus,
    ) -> Result<bool, StorageError>;

    /// Replace the owner-editable details if the status equals `expected`.
    async fn conditional_update_details(
        &self,
        record_id: &str,
        expected: ExperienceStatus,
        details: RecordDetails,
    ) -> Result<bool, StorageError>;

    /// Remove the record if its status equals `expected`.
    async fn conditional_delete(
        &self,
        record_id: &str,
        expected: ExperienceStatus,
    ) -> Result<bool, StorageError>;

    // ── Queries ───────────────────────────────────────────────────────────────

    /// Read a record by ID.
    ///
    /// Returns `Err(StorageError::RecordNotFound)` if it does not exist.
    async fn get(&self, record_id: &str) -> Result<ExperienceRecord, StorageError>;

    /// Read every record among `record_ids` that exists, in one read.
    /// Missing IDs are silently absent from the result.
    async fn get_many(&self, record_ids: &[String]) -> Result<Vec<ExperienceRecord>, StorageError>;

    /// List records matching `filter`, oldest first.
    async fn list(&self, filter: &RecordFilter) -> Result<Vec<ExperienceRecord>, StorageError>;

    /// All `CONFIRMED` records of one student in one book.
    async fn find_confirmed_by_student_and_book(
        &self,
        student_id: &str,
        book_id: &str,
    ) -> Result<Vec<ExperienceRecord>, StorageError>;

    /// All `CONFIRMED` records in one book, across students.
    async fn find_confirmed_by_book(
        &self,
        book_id: &str,
    ) -> Result<Vec<ExperienceRecord>, StorageError>;

    /// The record if it exists and is still `PENDING`.
    async fn find_pending(&self, record_id: &str) -> Result<Option<ExperienceRecord>, StorageError> {
        match self.get(record_id).await {
            Ok(rec) if rec.status == ExperienceStatus::Pending => Ok(Some(rec)),
            Ok(_) | Err(StorageError::RecordNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Read-only access to the curriculum catalog.
#[async_trait]
pub trait CatalogStore: Send + Sync + 'static {
    async fn list_books(&self) -> Result<Vec<Book>, StorageError>;

    /// Returns `Err(StorageError::BookNotFound)` if the book does not exist.
    async fn get_book(&self, book_id: &str) -> Result<Book, StorageError>;

    /// Flattened requirements of every sub-course in the book.
    async fn get_sub_courses(
        &self,
        book_id: &str,
    ) -> Result<Vec<SubCourseRequirement>, StorageError> {
        Ok(self.get_book(book_id).await?.sub_course_requirements())
    }
}
