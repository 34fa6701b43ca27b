use std::future::Future;
use std::sync::Arc;

use super::{pending, seed, status_of, TestResult};
use crate::record::ExperienceStatus;
use crate::{RecordStore, StorageError};

/// Number of concurrent tasks to spawn in each test.
const N: usize = 10;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_updates_exactly_one_wins",
        concurrent_updates_exactly_one_wins(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_inserts_exactly_one_wins",
        concurrent_inserts_exactly_one_wins(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_updates_different_records_all_succeed",
        concurrent_updates_different_records_all_succeed(factory).await,
    ));

    results
}

// ── Concurrent update: exactly one wins ─────────────────────────────────────

/// N tasks race to move the same PENDING record, half towards CONFIRMED and
/// half towards CANCEL. Exactly one conditional update applies and the final
/// status is the winner's target.
async fn concurrent_updates_exactly_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    seed(storage.as_ref(), pending("exp-1")).await?;

    let mut handles = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        let target = if i % 2 == 0 {
            ExperienceStatus::Confirmed
        } else {
            ExperienceStatus::Cancel
        };
        handles.push(tokio::spawn(async move {
            let won = s
                .conditional_update_status("exp-1", ExperienceStatus::Pending, target)
                .await?;
            Ok::<_, StorageError>((won, target))
        }));
    }

    let mut winners = Vec::new();
    for handle in handles {
        let (won, target) = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e| format!("storage error: {e}"))?;
        if won {
            winners.push(target);
        }
    }

    if winners.len() != 1 {
        return Err(format!("expected exactly 1 winner, got {}", winners.len()));
    }
    let final_status = status_of(storage.as_ref(), "exp-1").await?;
    if final_status != winners[0] {
        return Err(format!(
            "final status {final_status} does not match winning target {}",
            winners[0]
        ));
    }
    Ok(())
}

// ── Concurrent insert: exactly one wins ─────────────────────────────────────

async fn concurrent_inserts_exactly_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);

    let mut handles = Vec::new();
    for _ in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            match s.insert(pending("exp-1")).await {
                Ok(()) => Ok(true),
                Err(StorageError::AlreadyExists { .. }) => Ok(false),
                Err(e) => Err(e),
            }
        }));
    }

    let mut winners = 0usize;
    for handle in handles {
        let won = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StorageError| format!("storage error: {e}"))?;
        if won {
            winners += 1;
        }
    }

    if winners != 1 {
        return Err(format!("expected exactly 1 winner, got {winners}"));
    }
    Ok(())
}

// ── Concurrent updates to different records: all succeed ────────────────────

/// No false conflicts when there is no contention.
async fn concurrent_updates_different_records_all_succeed<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    for i in 0..N {
        seed(storage.as_ref(), pending(&format!("exp-{i}"))).await?;
    }

    let mut handles = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            s.conditional_update_status(
                &format!("exp-{i}"),
                ExperienceStatus::Pending,
                ExperienceStatus::Confirmed,
            )
            .await
        }));
    }

    for (i, handle) in handles.into_iter().enumerate() {
        let applied = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e| format!("storage error on exp-{i}: {e}"))?;
        if !applied {
            return Err(format!("update of exp-{i} was refused"));
        }
    }
    Ok(())
}
