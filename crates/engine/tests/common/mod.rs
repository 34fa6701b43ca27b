//! Shared fixtures for engine integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use logbook_engine::{CredentialStore, ExperienceEngine, MemoryCredentials, NewExperience, PinDigest};
use logbook_storage::{
    ApproverRole, Book, Course, ExperienceRecord, ExperienceStatus, MemoryCatalog,
    MemoryRecordStore, RecordDetails, RecordFilter, RecordStore, StorageError, SubCourse,
};

pub const BOOK: &str = "book-1";
pub const STUDENT: &str = "6400001";
pub const OTHER_STUDENT: &str = "6400002";
pub const ALICE: &str = "Dr. Alice";
pub const ALICE_PIN: &str = "1234";
pub const BOB: &str = "Dr. Bob";
pub const BOB_PIN: &str = "4321";

pub type Engine<R = MemoryRecordStore, K = MemoryCredentials> =
    ExperienceEngine<R, MemoryCatalog, K>;

fn sub_course(id: &str, always: u32, in_subject: Option<u32>) -> SubCourse {
    SubCourse {
        id: id.to_string(),
        name: id.to_string(),
        always_required: always,
        in_subject_required: in_subject,
        is_subject_freeform: false,
        subjects: vec![],
    }
}

/// One book for students prefixed `64`:
///
/// - `core/history`: 3 overall, 1 per listed subject (medicine, surgery)
/// - `core/procedure`: 2 overall, 1 in-subject, freeform subjects
/// - `elective/observation`: no requirement in either mode
pub fn book() -> Book {
    let mut history = sub_course("history", 3, Some(1));
    history.subjects = vec!["medicine".to_string(), "surgery".to_string()];
    let mut procedure = sub_course("procedure", 2, Some(1));
    procedure.is_subject_freeform = true;

    Book {
        id: BOOK.to_string(),
        title: "Clinical Logbook".to_string(),
        student_id_prefixes: vec!["64".to_string()],
        courses: vec![
            Course {
                id: "core".to_string(),
                name: "Core".to_string(),
                sub_courses: vec![history, procedure],
            },
            Course {
                id: "elective".to_string(),
                name: "Elective".to_string(),
                sub_courses: vec![sub_course("observation", 0, None)],
            },
        ],
    }
}

pub fn credentials() -> MemoryCredentials {
    MemoryCredentials::new()
        .with_pin(ApproverRole::ApproverIn, ALICE, ALICE_PIN)
        .with_pin(ApproverRole::ApproverOut, BOB, BOB_PIN)
}

pub fn engine() -> Engine {
    ExperienceEngine::new(MemoryRecordStore::new(), MemoryCatalog::new(vec![book()]), credentials())
}

pub fn engine_with<R: RecordStore, K: CredentialStore>(records: R, credentials: K) -> Engine<R, K> {
    ExperienceEngine::new(records, MemoryCatalog::new(vec![book()]), credentials)
}

pub fn history(student_id: &str, subject: &str) -> NewExperience {
    NewExperience {
        student_id: student_id.to_string(),
        book_id: BOOK.to_string(),
        course_id: "core".to_string(),
        sub_course_id: "history".to_string(),
        subject: Some(subject.to_string()),
        fields: BTreeMap::from([("patient_hn".to_string(), "HN-001".to_string())]),
        approver_role: ApproverRole::ApproverIn,
        approver_name: ALICE.to_string(),
    }
}

pub fn procedure(student_id: &str, subject: &str) -> NewExperience {
    NewExperience {
        sub_course_id: "procedure".to_string(),
        ..history(student_id, subject)
    }
}

/// Submit `new` and return the record ID.
pub async fn submit<R: RecordStore, K: CredentialStore>(
    engine: &Engine<R, K>,
    new: NewExperience,
) -> String {
    engine.submit_experience(new).await.unwrap().id
}

pub async fn status_of<R: RecordStore, K: CredentialStore>(
    engine: &Engine<R, K>,
    record_id: &str,
) -> ExperienceStatus {
    engine.get_experience(record_id).await.unwrap().status
}

/// Credential store that counts lookups, i.e. PIN verifications.
#[derive(Clone)]
pub struct CountingCredentials {
    inner: MemoryCredentials,
    pub lookups: Arc<AtomicUsize>,
}

impl CountingCredentials {
    pub fn new(inner: MemoryCredentials) -> Self {
        Self {
            inner,
            lookups: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialStore for CountingCredentials {
    async fn pin_digest(
        &self,
        role: ApproverRole,
        name: &str,
    ) -> Result<Option<PinDigest>, StorageError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.pin_digest(role, name).await
    }
}

/// Record store where another approver confirms `contested` just before
/// the caller's own status update on it lands.
#[derive(Clone)]
pub struct RacingStore {
    pub inner: MemoryRecordStore,
    pub contested: String,
}

#[async_trait]
impl RecordStore for RacingStore {
    async fn insert(&self, record: ExperienceRecord) -> Result<(), StorageError> {
        self.inner.insert(record).await
    }

    async fn conditional_update_status(
        &self,
        record_id: &str,
        expected: ExperienceStatus,
        new_status: ExperienceStatus,
    ) -> Result<bool, StorageError> {
        if record_id == self.contested {
            self.inner
                .conditional_update_status(
                    record_id,
                    ExperienceStatus::Pending,
                    ExperienceStatus::Confirmed,
                )
                .await?;
        }
        self.inner
            .conditional_update_status(record_id, expected, new_status)
            .await
    }

    async fn conditional_update_details(
        &self,
        record_id: &str,
        expected: ExperienceStatus,
        details: RecordDetails,
    ) -> Result<bool, StorageError> {
        self.inner
            .conditional_update_details(record_id, expected, details)
            .await
    }

    async fn conditional_delete(
        &self,
        record_id: &str,
        expected: ExperienceStatus,
    ) -> Result<bool, StorageError> {
        self.inner.conditional_delete(record_id, expected).await
    }

    async fn get(&self, record_id: &str) -> Result<ExperienceRecord, StorageError> {
        self.inner.get(record_id).await
    }

    async fn get_many(&self, record_ids: &[String]) -> Result<Vec<ExperienceRecord>, StorageError> {
        self.inner.get_many(record_ids).await
    }

    async fn list(&self, filter: &RecordFilter) -> Result<Vec<ExperienceRecord>, StorageError> {
        self.inner.list(filter).await
    }

    async fn find_confirmed_by_student_and_book(
        &self,
        student_id: &str,
        book_id: &str,
    ) -> Result<Vec<ExperienceRecord>, StorageError> {
        self.inner
            .find_confirmed_by_student_and_book(student_id, book_id)
            .await
    }

    async fn find_confirmed_by_book(
        &self,
        book_id: &str,
    ) -> Result<Vec<ExperienceRecord>, StorageError> {
        self.inner.find_confirmed_by_book(book_id).await
    }
}

/// Deletes a record as soon as it is moved to `CANCEL`, like a cleanup job
/// that runs between the engine's write and any read-back.
#[derive(Clone, Default)]
pub struct PurgingStore {
    pub inner: MemoryRecordStore,
}

#[async_trait]
impl RecordStore for PurgingStore {
    async fn insert(&self, record: ExperienceRecord) -> Result<(), StorageError> {
        self.inner.insert(record).await
    }

    async fn conditional_update_status(
        &self,
        record_id: &str,
        expected: ExperienceStatus,
        new_status: ExperienceStatus,
    ) -> Result<bool, StorageError> {
        let applied = self
            .inner
            .conditional_update_status(record_id, expected, new_status)
            .await?;
        if applied && new_status == ExperienceStatus::Cancel {
            self.inner
                .conditional_delete(record_id, ExperienceStatus::Cancel)
                .await?;
        }
        Ok(applied)
    }

    async fn conditional_update_details(
        &self,
        record_id: &str,
        expected: ExperienceStatus,
        details: RecordDetails,
    ) -> Result<bool, StorageError> {
        self.inner
            .conditional_update_details(record_id, expected, details)
            .await
    }

    async fn conditional_delete(
        &self,
        record_id: &str,
        expected: ExperienceStatus,
    ) -> Result<bool, StorageError> {
        self.inner.conditional_delete(record_id, expected).await
    }

    async fn get(&self, record_id: &str) -> Result<ExperienceRecord, StorageError> {
        self.inner.get(record_id).await
    }

    async fn get_many(&self, record_ids: &[String]) -> Result<Vec<ExperienceRecord>, StorageError> {
        self.inner.get_many(record_ids).await
    }

    async fn list(&self, filter: &RecordFilter) -> Result<Vec<ExperienceRecord>, StorageError> {
        self.inner.list(filter).await
    }

    async fn find_confirmed_by_student_and_book(
        &self,
        student_id: &str,
        book_id: &str,
    ) -> Result<Vec<ExperienceRecord>, StorageError> {
        self.inner
            .find_confirmed_by_student_and_book(student_id, book_id)
            .await
    }

    async fn find_confirmed_by_book(
        &self,
        book_id: &str,
    ) -> Result<Vec<ExperienceRecord>, StorageError> {
        self.inner.find_confirmed_by_book(book_id).await
    }
}
