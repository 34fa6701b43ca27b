/// All errors that can be returned by a `RecordStore` or `CatalogStore`
/// implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// No experience record with the given identifier.
    #[error("experience record not found: {record_id}")]
    RecordNotFound { record_id: String },

    /// A record with this identifier already exists.
    #[error("experience record already exists: {record_id}")]
    AlreadyExists { record_id: String },

    /// No book with the given identifier in the catalog.
    #[error("book not found: {book_id}")]
    BookNotFound { book_id: String },

    /// A backend-specific storage error (DB connection, serialization, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}
