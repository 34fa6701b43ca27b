use std::future::Future;

use super::{make_record, pending, seed, TestResult};
use crate::record::ExperienceStatus;
use crate::{RecordStore, StorageError};

pub(super) async fn run_delete_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "delete",
        "delete_removes_record_in_expected_status",
        delete_removes_record_in_expected_status(factory).await,
    ));
    results.push(TestResult::from_result(
        "delete",
        "delete_refused_in_other_status",
        delete_refused_in_other_status(factory).await,
    ));
    results.push(TestResult::from_result(
        "delete",
        "deleted_id_can_be_reused",
        deleted_id_can_be_reused(factory).await,
    ));

    results
}

// ── Test implementations ──────────────────────────────────────────────────────

async fn delete_removes_record_in_expected_status<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(
        &s,
        make_record("exp-1", "6400001", "book-1", ExperienceStatus::Cancel),
    )
    .await?;
    let removed = s
        .conditional_delete("exp-1", ExperienceStatus::Cancel)
        .await
        .map_err(|e| e.to_string())?;
    if !removed {
        return Err("expected delete to apply".to_string());
    }
    match s.get("exp-1").await {
        Err(StorageError::RecordNotFound { .. }) => Ok(()),
        other => Err(format!("expected RecordNotFound after delete, got {:?}", other)),
    }
}

/// Confirmed records survive a delete guarded on CANCEL.
async fn delete_refused_in_other_status<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(
        &s,
        make_record("exp-1", "6400001", "book-1", ExperienceStatus::Confirmed),
    )
    .await?;
    let removed = s
        .conditional_delete("exp-1", ExperienceStatus::Cancel)
        .await
        .map_err(|e| e.to_string())?;
    if removed {
        return Err("confirmed record was deleted".to_string());
    }
    s.get("exp-1")
        .await
        .map(|_| ())
        .map_err(|e| format!("record missing after refused delete: {e}"))
}

async fn deleted_id_can_be_reused<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, pending("exp-1")).await?;
    s.conditional_delete("exp-1", ExperienceStatus::Pending)
        .await
        .map_err(|e| e.to_string())?;
    seed(&s, pending("exp-1")).await
}
