//! Bulk approval: one PIN, many records, per-record outcomes.

mod common;

use common::*;
use logbook_engine::{BulkFailure, BulkFailureReason, LifecycleError};
use logbook_storage::{ApproverRole, ExperienceStatus, MemoryRecordStore};

fn ids(v: &[&String]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn bulk_confirm_applies_to_every_pending_record() {
    let engine = engine();
    let r1 = submit(&engine, history(STUDENT, "medicine")).await;
    let r2 = submit(&engine, history(OTHER_STUDENT, "surgery")).await;

    let outcome = engine
        .bulk_confirm(&ids(&[&r1, &r2]), ALICE, ALICE_PIN)
        .await
        .unwrap();
    assert_eq!(outcome.succeeded, vec![r1.clone(), r2.clone()]);
    assert!(outcome.failed.is_empty());
    assert_eq!(status_of(&engine, &r1).await, ExperienceStatus::Confirmed);
    assert_eq!(status_of(&engine, &r2).await, ExperienceStatus::Confirmed);
}

#[tokio::test]
async fn bulk_reject_cancels_records() {
    let engine = engine();
    let r1 = submit(&engine, history(STUDENT, "medicine")).await;

    let outcome = engine.bulk_reject(&ids(&[&r1]), ALICE, ALICE_PIN).await.unwrap();
    assert_eq!(outcome.succeeded, vec![r1.clone()]);
    assert_eq!(status_of(&engine, &r1).await, ExperienceStatus::Cancel);
}

#[tokio::test]
async fn empty_batch_is_rejected() {
    let engine = engine();
    let err = engine.bulk_confirm(&[], ALICE, ALICE_PIN).await.unwrap_err();
    assert!(matches!(err, LifecycleError::EmptyBatch));
}

#[tokio::test]
async fn wrong_pin_rejects_the_whole_batch() {
    let engine = engine();
    let r1 = submit(&engine, history(STUDENT, "medicine")).await;
    let r2 = submit(&engine, history(STUDENT, "surgery")).await;

    let err = engine
        .bulk_confirm(&ids(&[&r1, &r2]), ALICE, "0000")
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::Unauthorized));
    assert_eq!(status_of(&engine, &r1).await, ExperienceStatus::Pending);
    assert_eq!(status_of(&engine, &r2).await, ExperienceStatus::Pending);
}

#[tokio::test]
async fn mixed_approvers_fail_before_any_pin_check() {
    let credentials = CountingCredentials::new(credentials());
    let engine = engine_with(MemoryRecordStore::new(), credentials.clone());
    let r1 = submit(&engine, history(STUDENT, "medicine")).await;
    let mut to_bob = history(STUDENT, "surgery");
    to_bob.approver_role = ApproverRole::ApproverOut;
    to_bob.approver_name = BOB.to_string();
    let r2 = submit(&engine, to_bob).await;

    let err = engine
        .bulk_confirm(&ids(&[&r1, &r2]), ALICE, ALICE_PIN)
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::MixedApprover));
    assert_eq!(credentials.count(), 0);
    assert_eq!(status_of(&engine, &r1).await, ExperienceStatus::Pending);
}

#[tokio::test]
async fn same_name_under_two_roles_is_mixed() {
    let engine = engine();
    let r1 = submit(&engine, history(STUDENT, "medicine")).await;
    let mut other_role = history(STUDENT, "surgery");
    other_role.approver_role = ApproverRole::ApproverOut;
    let r2 = submit(&engine, other_role).await;

    let err = engine
        .bulk_confirm(&ids(&[&r1, &r2]), ALICE, ALICE_PIN)
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::MixedApprover));
}

#[tokio::test]
async fn declared_name_must_match_the_records() {
    let engine = engine();
    let r1 = submit(&engine, history(STUDENT, "medicine")).await;

    let err = engine.bulk_confirm(&ids(&[&r1]), BOB, BOB_PIN).await.unwrap_err();
    assert!(matches!(err, LifecycleError::MixedApprover));
}

#[tokio::test]
async fn one_pin_check_per_batch() {
    let credentials = CountingCredentials::new(credentials());
    let engine = engine_with(MemoryRecordStore::new(), credentials.clone());
    let mut batch = Vec::new();
    for _ in 0..5 {
        batch.push(submit(&engine, history(STUDENT, "medicine")).await);
    }

    let outcome = engine.bulk_confirm(&batch, ALICE, ALICE_PIN).await.unwrap();
    assert_eq!(outcome.succeeded.len(), 5);
    assert_eq!(credentials.count(), 1);
}

#[tokio::test]
async fn terminal_and_missing_records_are_reported_per_record() {
    let engine = engine();
    let r1 = submit(&engine, history(STUDENT, "medicine")).await;
    let done = submit(&engine, history(STUDENT, "surgery")).await;
    engine.confirm(&done, ALICE_PIN).await.unwrap();
    let missing = "exp-0000000000000000".to_string();

    let outcome = engine
        .bulk_confirm(&ids(&[&r1, &done, &missing]), ALICE, ALICE_PIN)
        .await
        .unwrap();
    assert_eq!(outcome.succeeded, vec![r1.clone()]);
    assert_eq!(
        outcome.failed,
        vec![
            BulkFailure {
                id: done.clone(),
                reason: BulkFailureReason::AlreadyTerminal,
            },
            BulkFailure {
                id: missing.clone(),
                reason: BulkFailureReason::NotFound,
            },
        ]
    );
}

#[tokio::test]
async fn record_confirmed_mid_batch_is_already_terminal() {
    let seed_engine = engine();
    let r1 = submit(&seed_engine, history(STUDENT, "medicine")).await;
    let r2 = submit(&seed_engine, history(STUDENT, "surgery")).await;

    let store = RacingStore {
        inner: seed_engine.records().clone(),
        contested: r2.clone(),
    };
    let engine = engine_with(store, credentials());

    let outcome = engine
        .bulk_reject(&ids(&[&r1, &r2]), ALICE, ALICE_PIN)
        .await
        .unwrap();
    assert_eq!(outcome.succeeded, vec![r1.clone()]);
    assert_eq!(
        outcome.failed,
        vec![BulkFailure {
            id: r2.clone(),
            reason: BulkFailureReason::AlreadyTerminal,
        }]
    );
    // The concurrent confirm stands; the batch did not overwrite it.
    assert_eq!(status_of(&engine, &r2).await, ExperienceStatus::Confirmed);
    assert_eq!(status_of(&engine, &r1).await, ExperienceStatus::Cancel);
}

#[tokio::test]
async fn duplicate_ids_are_applied_once() {
    let engine = engine();
    let r1 = submit(&engine, history(STUDENT, "medicine")).await;

    let outcome = engine
        .bulk_confirm(&ids(&[&r1, &r1]), ALICE, ALICE_PIN)
        .await
        .unwrap();
    assert_eq!(outcome.succeeded, vec![r1.clone()]);
    assert!(outcome.failed.is_empty());
}

#[tokio::test]
async fn batch_of_only_unknown_ids_still_checks_the_pin() {
    let credentials = CountingCredentials::new(credentials());
    let engine = engine_with(MemoryRecordStore::new(), credentials.clone());
    let batch = vec!["exp-a".to_string(), "exp-b".to_string()];

    let err = engine.bulk_confirm(&batch, ALICE, "0000").await.unwrap_err();
    assert!(matches!(err, LifecycleError::Unauthorized), "{err:?}");
    assert!(credentials.count() > 0);

    let outcome = engine.bulk_confirm(&batch, ALICE, ALICE_PIN).await.unwrap();
    assert!(outcome.succeeded.is_empty());
    assert_eq!(outcome.failed.len(), 2);
    assert!(outcome
        .failed
        .iter()
        .all(|f| f.reason == BulkFailureReason::NotFound));
}
