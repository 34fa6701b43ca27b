use std::future::Future;

use super::{make_record, pending, seed, TestResult};
use crate::record::{ExperienceStatus, RecordFilter};
use crate::RecordStore;

pub(super) async fn run_query_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "query",
        "confirmed_by_student_and_book_excludes_others",
        confirmed_by_student_and_book_excludes_others(factory).await,
    ));
    results.push(TestResult::from_result(
        "query",
        "confirmed_by_book_spans_students",
        confirmed_by_book_spans_students(factory).await,
    ));
    results.push(TestResult::from_result(
        "query",
        "list_applies_every_filter_field",
        list_applies_every_filter_field(factory).await,
    ));
    results.push(TestResult::from_result(
        "query",
        "get_many_skips_missing_ids",
        get_many_skips_missing_ids(factory).await,
    ));
    results.push(TestResult::from_result(
        "query",
        "find_pending_only_returns_pending",
        find_pending_only_returns_pending(factory).await,
    ));

    results
}

/// Two students, two books, mixed statuses.
async fn seed_mixed<S: RecordStore>(s: &S) -> Result<(), String> {
    use ExperienceStatus::*;
    for (id, student, book, status) in [
        ("exp-1", "6400001", "book-1", Confirmed),
        ("exp-2", "6400001", "book-1", Pending),
        ("exp-3", "6400001", "book-2", Confirmed),
        ("exp-4", "6400002", "book-1", Confirmed),
        ("exp-5", "6400002", "book-1", Cancel),
    ] {
        seed(s, make_record(id, student, book, status)).await?;
    }
    Ok(())
}

fn ids(records: &[crate::ExperienceRecord]) -> Vec<String> {
    let mut ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();
    ids.sort();
    ids
}

// ── Test implementations ──────────────────────────────────────────────────────

async fn confirmed_by_student_and_book_excludes_others<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_mixed(&s).await?;
    let got = s
        .find_confirmed_by_student_and_book("6400001", "book-1")
        .await
        .map_err(|e| e.to_string())?;
    if ids(&got) != vec!["exp-1".to_string()] {
        return Err(format!("expected [exp-1], got {:?}", ids(&got)));
    }
    Ok(())
}

async fn confirmed_by_book_spans_students<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_mixed(&s).await?;
    let got = s
        .find_confirmed_by_book("book-1")
        .await
        .map_err(|e| e.to_string())?;
    if ids(&got) != vec!["exp-1".to_string(), "exp-4".to_string()] {
        return Err(format!("expected [exp-1, exp-4], got {:?}", ids(&got)));
    }
    Ok(())
}

async fn list_applies_every_filter_field<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_mixed(&s).await?;

    let all = s
        .list(&RecordFilter::default())
        .await
        .map_err(|e| e.to_string())?;
    if all.len() != 5 {
        return Err(format!("unfiltered list: expected 5, got {}", all.len()));
    }

    let filter = RecordFilter {
        student_id: Some("6400002".to_string()),
        book_id: Some("book-1".to_string()),
        status: Some(ExperienceStatus::Cancel),
        approver_name: Some("Dr. Alice".to_string()),
    };
    let got = s.list(&filter).await.map_err(|e| e.to_string())?;
    if ids(&got) != vec!["exp-5".to_string()] {
        return Err(format!("expected [exp-5], got {:?}", ids(&got)));
    }

    let nobody = RecordFilter {
        approver_name: Some("Dr. Nobody".to_string()),
        ..RecordFilter::default()
    };
    let got = s.list(&nobody).await.map_err(|e| e.to_string())?;
    if !got.is_empty() {
        return Err(format!("expected no records, got {:?}", ids(&got)));
    }
    Ok(())
}

async fn get_many_skips_missing_ids<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_mixed(&s).await?;
    let wanted = vec![
        "exp-2".to_string(),
        "exp-404".to_string(),
        "exp-4".to_string(),
    ];
    let got = s.get_many(&wanted).await.map_err(|e| e.to_string())?;
    if ids(&got) != vec!["exp-2".to_string(), "exp-4".to_string()] {
        return Err(format!("expected [exp-2, exp-4], got {:?}", ids(&got)));
    }
    Ok(())
}

async fn find_pending_only_returns_pending<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, pending("exp-1")).await?;
    seed(
        &s,
        make_record("exp-2", "6400001", "book-1", ExperienceStatus::Confirmed),
    )
    .await?;

    let found = s.find_pending("exp-1").await.map_err(|e| e.to_string())?;
    if found.map(|r| r.id).as_deref() != Some("exp-1") {
        return Err("pending record not found".to_string());
    }
    for id in ["exp-2", "exp-404"] {
        if s.find_pending(id).await.map_err(|e| e.to_string())?.is_some() {
            return Err(format!("find_pending returned {id}"));
        }
    }
    Ok(())
}
