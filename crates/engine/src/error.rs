use logbook_storage::{ExperienceStatus, StorageError};

/// Errors returned by engine operations.
///
/// Every variant is a per-call outcome; none of them is fatal to the process.
/// Per-record failures inside a bulk transition are not errors, see
/// [`crate::BulkFailureReason`].
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// The record is not in a status that allows the requested action.
    #[error("experience {record_id} is {status}; action not allowed in this status")]
    InvalidState {
        record_id: String,
        status: ExperienceStatus,
    },

    /// PIN mismatch or unknown approver. One message for both causes.
    #[error("approver credentials rejected")]
    Unauthorized,

    /// The actor lacks the capability for this action on this record.
    #[error("not permitted to perform this action on experience {record_id}")]
    Forbidden { record_id: String },

    /// Bulk batch spans records declared under different approvers.
    #[error("batch spans more than one approver; split it per approver")]
    MixedApprover,

    #[error("batch contains no records")]
    EmptyBatch,

    #[error("experience not found: {record_id}")]
    NotFound { record_id: String },

    /// A book, course, or sub-course reference does not resolve.
    #[error("unknown {kind}: {id}")]
    UnknownReference { kind: &'static str, id: String },

    #[error("student {student_id} is not admitted to book {book_id}")]
    StudentNotAdmitted { student_id: String, book_id: String },

    #[error("invalid subject for sub-course {sub_course_id}: {reason}")]
    InvalidSubject {
        sub_course_id: String,
        reason: String,
    },

    #[error("invalid submission: {0}")]
    InvalidSubmission(String),

    #[error(transparent)]
    Storage(StorageError),
}

impl LifecycleError {
    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            LifecycleError::InvalidState { .. } => "invalid_state",
            LifecycleError::Unauthorized => "unauthorized",
            LifecycleError::Forbidden { .. } => "forbidden",
            LifecycleError::MixedApprover => "mixed_approver",
            LifecycleError::EmptyBatch => "empty_batch",
            LifecycleError::NotFound { .. } => "not_found",
            LifecycleError::UnknownReference { .. } => "unknown_reference",
            LifecycleError::StudentNotAdmitted { .. } => "student_not_admitted",
            LifecycleError::InvalidSubject { .. } => "invalid_subject",
            LifecycleError::InvalidSubmission(_) => "invalid_submission",
            LifecycleError::Storage(_) => "storage",
        }
    }
}

impl From<StorageError> for LifecycleError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::RecordNotFound { record_id } => LifecycleError::NotFound { record_id },
            StorageError::BookNotFound { book_id } => LifecycleError::UnknownReference {
                kind: "book",
                id: book_id,
            },
            other => LifecycleError::Storage(other),
        }
    }
}
