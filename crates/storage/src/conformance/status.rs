use std::future::Future;

use super::{make_record, pending, seed, status_of, TestResult};
use crate::record::{ApproverRole, ExperienceStatus, RecordDetails};
use crate::RecordStore;

pub(super) async fn run_status_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "status",
        "update_applies_when_expected_matches",
        update_applies_when_expected_matches(factory).await,
    ));
    results.push(TestResult::from_result(
        "status",
        "update_refused_when_expected_differs",
        update_refused_when_expected_differs(factory).await,
    ));
    results.push(TestResult::from_result(
        "status",
        "second_update_from_pending_is_refused",
        second_update_from_pending_is_refused(factory).await,
    ));
    results.push(TestResult::from_result(
        "status",
        "details_update_applies_only_in_expected_status",
        details_update_applies_only_in_expected_status(factory).await,
    ));
    results.push(TestResult::from_result(
        "status",
        "details_update_leaves_status_untouched",
        details_update_leaves_status_untouched(factory).await,
    ));

    results
}

fn details(name: &str) -> RecordDetails {
    RecordDetails {
        subject: Some("revised".to_string()),
        fields: [("note".to_string(), "edited".to_string())]
            .into_iter()
            .collect(),
        approver_role: ApproverRole::ApproverOut,
        approver_name: name.to_string(),
    }
}

// ── Test implementations ──────────────────────────────────────────────────────

async fn update_applies_when_expected_matches<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, pending("exp-1")).await?;
    let applied = s
        .conditional_update_status(
            "exp-1",
            ExperienceStatus::Pending,
            ExperienceStatus::Confirmed,
        )
        .await
        .map_err(|e| e.to_string())?;
    if !applied {
        return Err("expected update to apply".to_string());
    }
    match status_of(&s, "exp-1").await? {
        ExperienceStatus::Confirmed => Ok(()),
        other => Err(format!("expected CONFIRMED, got {other}")),
    }
}

/// A guard mismatch returns Ok(false) and writes nothing.
async fn update_refused_when_expected_differs<S, F, Fut>(factory: &F) -> Result<(), String>
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
    let applied = s
        .conditional_update_status(
            "exp-1",
            ExperienceStatus::Pending,
            ExperienceStatus::Confirmed,
        )
        .await
        .map_err(|e| e.to_string())?;
    if applied {
        return Err("update applied despite guard mismatch".to_string());
    }
    match status_of(&s, "exp-1").await? {
        ExperienceStatus::Cancel => Ok(()),
        other => Err(format!("status changed to {other}")),
    }
}

async fn second_update_from_pending_is_refused<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, pending("exp-1")).await?;
    let first = s
        .conditional_update_status("exp-1", ExperienceStatus::Pending, ExperienceStatus::Cancel)
        .await
        .map_err(|e| e.to_string())?;
    let second = s
        .conditional_update_status(
            "exp-1",
            ExperienceStatus::Pending,
            ExperienceStatus::Confirmed,
        )
        .await
        .map_err(|e| e.to_string())?;
    if !first || second {
        return Err(format!("expected (true, false), got ({first}, {second})"));
    }
    match status_of(&s, "exp-1").await? {
        ExperienceStatus::Cancel => Ok(()),
        other => Err(format!("expected CANCEL, got {other}")),
    }
}

async fn details_update_applies_only_in_expected_status<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
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

    let on_pending = s
        .conditional_update_details("exp-1", ExperienceStatus::Pending, details("Dr. Bob"))
        .await
        .map_err(|e| e.to_string())?;
    let on_confirmed = s
        .conditional_update_details("exp-2", ExperienceStatus::Pending, details("Dr. Bob"))
        .await
        .map_err(|e| e.to_string())?;
    if !on_pending || on_confirmed {
        return Err(format!(
            "expected (true, false), got ({on_pending}, {on_confirmed})"
        ));
    }

    let edited = s.get("exp-1").await.map_err(|e| e.to_string())?;
    if edited.approver_name != "Dr. Bob" || edited.subject.as_deref() != Some("revised") {
        return Err(format!("details not applied: {edited:?}"));
    }
    let untouched = s.get("exp-2").await.map_err(|e| e.to_string())?;
    if untouched.approver_name != "Dr. Alice" {
        return Err(format!("confirmed record was edited: {untouched:?}"));
    }
    Ok(())
}

async fn details_update_leaves_status_untouched<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, pending("exp-1")).await?;
    s.conditional_update_details("exp-1", ExperienceStatus::Pending, details("Dr. Bob"))
        .await
        .map_err(|e| e.to_string())?;
    match status_of(&s, "exp-1").await? {
        ExperienceStatus::Pending => Ok(()),
        other => Err(format!("expected PENDING, got {other}")),
    }
}
