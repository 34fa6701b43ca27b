//! Conformance test suite for `RecordStore` implementations.
//!
//! This module provides a backend-agnostic test suite that any `RecordStore`
//! implementation can run to verify correctness. The suite covers:
//!
//! - **Create**: insertion, duplicate detection, round-trip of every field
//! - **Status**: conditional status updates keyed on the expected status
//! - **Delete**: conditional deletion
//! - **Query**: filters, confirmed-record lookups, pending lookup
//! - **Error handling**: correct error variants for unknown records
//! - **Concurrency**: racing conditional updates have exactly one winner
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function that
//! creates a fresh, empty storage instance for each test:
//!
//! ```ignore
//! use logbook_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn postgres_conformance() {
//!     let report = run_conformance_suite(|| async {
//!         create_test_postgres_store().await
//!     }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod concurrent;
mod create;
mod delete;
mod error;
mod query;
mod status;

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;

use crate::record::{ApproverRole, ExperienceRecord, ExperienceStatus};
use crate::RecordStore;

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "create", "status", "concurrent").
    pub category: String,
    /// Test name (e.g. "insert_then_get_round_trips").
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn pass(category: &str, name: &str) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: true,
            message: None,
        }
    }

    fn fail(category: &str, name: &str, msg: String) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: false,
            message: Some(msg),
        }
    }

    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self::pass(category, name),
            Err(msg) => Self::fail(category, name, msg),
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a record store backend.
///
/// The `factory` function is called once per test to create a fresh, empty
/// store, ensuring test isolation.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(create::run_create_tests(&factory).await);
    results.extend(status::run_status_tests(&factory).await);
    results.extend(delete::run_delete_tests(&factory).await);
    results.extend(query::run_query_tests(&factory).await);
    results.extend(error::run_error_tests(&factory).await);
    results.extend(concurrent::run_concurrent_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers: record constructors with sensible defaults ──────────────────────

fn make_record(
    id: &str,
    student_id: &str,
    book_id: &str,
    status: ExperienceStatus,
) -> ExperienceRecord {
    let mut fields = BTreeMap::new();
    fields.insert("patient_hn".to_string(), "HN-0001".to_string());
    ExperienceRecord {
        id: id.to_string(),
        student_id: student_id.to_string(),
        book_id: book_id.to_string(),
        course_id: "course-1".to_string(),
        sub_course_id: "sub-1".to_string(),
        subject: None,
        status,
        fields,
        approver_role: ApproverRole::ApproverIn,
        approver_name: "Dr. Alice".to_string(),
        created_at: format!("2025-01-01T00:00:{:02}Z", id.len() % 60),
        updated_at: "2025-01-01T00:00:00Z".to_string(),
    }
}

fn pending(id: &str) -> ExperienceRecord {
    make_record(id, "6400001", "book-1", ExperienceStatus::Pending)
}

/// Insert `record` and map any error to a message.
async fn seed<S: RecordStore>(store: &S, record: ExperienceRecord) -> Result<(), String> {
    let id = record.id.clone();
    store
        .insert(record)
        .await
        .map_err(|e| format!("insert {id}: {e}"))
}

async fn status_of<S: RecordStore>(store: &S, id: &str) -> Result<ExperienceStatus, String> {
    store
        .get(id)
        .await
        .map(|r| r.status)
        .map_err(|e| format!("get {id}: {e}"))
}
