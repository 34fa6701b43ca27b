//! Progress over records that went through the real lifecycle.

mod common;

use common::*;
use logbook_engine::{CountingMode, LifecycleError};

#[tokio::test]
async fn only_confirmed_records_count() {
    let engine = engine();
    let confirmed = submit(&engine, history(STUDENT, "medicine")).await;
    engine.confirm(&confirmed, ALICE_PIN).await.unwrap();
    let _pending = submit(&engine, history(STUDENT, "medicine")).await;
    let rejected = submit(&engine, history(STUDENT, "surgery")).await;
    engine.reject(&rejected, ALICE_PIN).await.unwrap();

    let p = engine
        .compute_progress(STUDENT, BOOK, CountingMode::Overall)
        .await
        .unwrap();
    let history = &p.courses[0].sub_courses[0];
    assert_eq!(history.raw_done, 1);
    assert_eq!(history.required, 3);
    // core: history 1/3 + procedure 0/2; elective has no requirement.
    assert_eq!(p.courses[0].percent, 20);
    assert_eq!(p.courses[1].percent, 100);
    assert_eq!(p.overall_percent, 20);
}

#[tokio::test]
async fn by_subject_mode_counts_listed_subjects_separately() {
    let engine = engine();
    for _ in 0..3 {
        let id = submit(&engine, history(STUDENT, "medicine")).await;
        engine.confirm(&id, ALICE_PIN).await.unwrap();
    }
    let id = submit(&engine, procedure(STUDENT, "suturing")).await;
    engine.confirm(&id, ALICE_PIN).await.unwrap();

    let overall = engine
        .compute_progress(STUDENT, BOOK, CountingMode::Overall)
        .await
        .unwrap();
    // history 3/3, procedure 1/2
    assert_eq!(overall.courses[0].done, 4);
    assert_eq!(overall.courses[0].percent, 80);

    let by_subject = engine
        .compute_progress(STUDENT, BOOK, CountingMode::BySubject)
        .await
        .unwrap();
    let history = &by_subject.courses[0].sub_courses[0];
    // medicine 1/1 (capped), surgery 0/1
    assert_eq!(history.required, 2);
    assert_eq!(history.capped_done, 1);
    // procedure 1/1
    assert_eq!(by_subject.courses[0].done, 2);
    assert_eq!(by_subject.courses[0].percent, 67);
}

#[tokio::test]
async fn progress_is_idempotent_without_writes() {
    let engine = engine();
    let id = submit(&engine, history(STUDENT, "surgery")).await;
    engine.confirm(&id, ALICE_PIN).await.unwrap();

    let first = engine
        .compute_progress(STUDENT, BOOK, CountingMode::Overall)
        .await
        .unwrap();
    let second = engine
        .compute_progress(STUDENT, BOOK, CountingMode::Overall)
        .await
        .unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn student_without_records_has_zero_progress() {
    let engine = engine();
    let p = engine
        .compute_progress(OTHER_STUDENT, BOOK, CountingMode::Overall)
        .await
        .unwrap();
    assert_eq!(p.done, 0);
    assert_eq!(p.required, 5);
    assert_eq!(p.overall_percent, 0);
}

#[tokio::test]
async fn unknown_book_is_an_unknown_reference() {
    let engine = engine();
    let err = engine
        .compute_progress(STUDENT, "book-9", CountingMode::Overall)
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::UnknownReference { kind: "book", .. }));
}

#[tokio::test]
async fn cohort_over_explicit_and_derived_students() {
    let engine = engine();
    // STUDENT completes core; OTHER_STUDENT only has a pending record.
    for subject in ["medicine", "surgery", "medicine"] {
        let id = submit(&engine, history(STUDENT, subject)).await;
        engine.confirm(&id, ALICE_PIN).await.unwrap();
    }
    for subject in ["knot", "scrub"] {
        let id = submit(&engine, procedure(STUDENT, subject)).await;
        engine.confirm(&id, ALICE_PIN).await.unwrap();
    }
    submit(&engine, history(OTHER_STUDENT, "medicine")).await;

    let derived = engine
        .compute_cohort_progress(&[], BOOK, CountingMode::Overall)
        .await
        .unwrap();
    assert_eq!(derived.student_count, 2);
    assert_eq!(derived.done_student_count, 1);
    assert_eq!(derived.courses[0].done_student_count, 1);
    assert_eq!(derived.courses[1].done_student_count, 2);

    let explicit = engine
        .compute_cohort_progress(
            &[STUDENT.to_string(), "6400099".to_string()],
            BOOK,
            CountingMode::Overall,
        )
        .await
        .unwrap();
    assert_eq!(explicit.student_count, 2);
    assert_eq!(explicit.done_student_count, 1);
    let history = &explicit.courses[0].sub_courses[0];
    assert_eq!((history.student_count, history.done_student_count), (2, 1));
}
