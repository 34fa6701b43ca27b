use std::future::Future;

use super::TestResult;
use crate::record::{ApproverRole, ExperienceStatus, RecordDetails};
use crate::{RecordStore, StorageError};

pub(super) async fn run_error_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "error",
        "get_nonexistent",
        get_nonexistent(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "update_status_nonexistent",
        update_status_nonexistent(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "update_details_nonexistent",
        update_details_nonexistent(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "delete_nonexistent",
        delete_nonexistent(factory).await,
    ));

    results
}

fn expect_not_found<T: std::fmt::Debug>(
    result: Result<T, StorageError>,
    id: &str,
) -> Result<(), String> {
    match result {
        Err(StorageError::RecordNotFound { record_id }) if record_id == id => Ok(()),
        other => Err(format!("expected RecordNotFound({id}), got {:?}", other)),
    }
}

// ── 1. get on empty store returns RecordNotFound ──────────────────────────────

async fn get_nonexistent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    expect_not_found(s.get("exp-404").await, "exp-404")
}

// ── 2. conditional writes on unknown IDs are errors, not Ok(false) ───────────

async fn update_status_nonexistent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let result = s
        .conditional_update_status(
            "exp-404",
            ExperienceStatus::Pending,
            ExperienceStatus::Confirmed,
        )
        .await;
    expect_not_found(result, "exp-404")
}

async fn update_details_nonexistent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let details = RecordDetails {
        subject: None,
        fields: Default::default(),
        approver_role: ApproverRole::ApproverIn,
        approver_name: "Dr. Alice".to_string(),
    };
    let result = s
        .conditional_update_details("exp-404", ExperienceStatus::Pending, details)
        .await;
    expect_not_found(result, "exp-404")
}

async fn delete_nonexistent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let result = s.conditional_delete("exp-404", ExperienceStatus::Cancel).await;
    expect_not_found(result, "exp-404")
}
