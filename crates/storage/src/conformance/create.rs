use std::future::Future;

use super::{make_record, pending, seed, TestResult};
use crate::record::ExperienceStatus;
use crate::{RecordStore, StorageError};

pub(super) async fn run_create_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "create",
        "insert_then_get_round_trips",
        insert_then_get_round_trips(factory).await,
    ));
    results.push(TestResult::from_result(
        "create",
        "duplicate_insert_returns_already_exists",
        duplicate_insert_returns_already_exists(factory).await,
    ));
    results.push(TestResult::from_result(
        "create",
        "duplicate_insert_keeps_original",
        duplicate_insert_keeps_original(factory).await,
    ));
    results.push(TestResult::from_result(
        "create",
        "inserted_records_are_independent",
        inserted_records_are_independent(factory).await,
    ));

    results
}

// ── Test implementations ──────────────────────────────────────────────────────

/// Every field written by insert must come back unchanged from get.
async fn insert_then_get_round_trips<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut record = pending("exp-1");
    record.subject = Some("appendix".to_string());
    seed(&s, record.clone()).await?;

    let got = s.get("exp-1").await.map_err(|e| e.to_string())?;
    if got != record {
        return Err(format!("round trip mismatch: wrote {record:?}, read {got:?}"));
    }
    Ok(())
}

async fn duplicate_insert_returns_already_exists<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, pending("exp-1")).await?;
    match s.insert(pending("exp-1")).await {
        Err(StorageError::AlreadyExists { record_id }) if record_id == "exp-1" => Ok(()),
        other => Err(format!("expected AlreadyExists(exp-1), got {:?}", other)),
    }
}

/// A rejected duplicate insert must not overwrite the stored record.
async fn duplicate_insert_keeps_original<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, pending("exp-1")).await?;
    let _ = s
        .insert(make_record(
            "exp-1",
            "6400999",
            "book-1",
            ExperienceStatus::Confirmed,
        ))
        .await;

    let got = s.get("exp-1").await.map_err(|e| e.to_string())?;
    if got.student_id != "6400001" || got.status != ExperienceStatus::Pending {
        return Err(format!("original record was overwritten: {got:?}"));
    }
    Ok(())
}

async fn inserted_records_are_independent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, pending("exp-1")).await?;
    seed(&s, pending("exp-2")).await?;

    let updated = s
        .conditional_update_status("exp-1", ExperienceStatus::Pending, ExperienceStatus::Cancel)
        .await
        .map_err(|e| e.to_string())?;
    if !updated {
        return Err("update of exp-1 did not apply".to_string());
    }
    let other = s.get("exp-2").await.map_err(|e| e.to_string())?;
    if other.status != ExperienceStatus::Pending {
        return Err(format!("exp-2 changed to {}", other.status));
    }
    Ok(())
}
