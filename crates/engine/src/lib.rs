//! Experience-record engine.
//!
//! Owns the record lifecycle (`PENDING` to `CONFIRMED` or `CANCEL`), the
//! PIN-based approval protocol, bulk approval, and capped-sum progress
//! aggregation. Persistence lives behind the `logbook-storage` traits.

mod approval;
mod bulk;
mod engine;
mod error;
mod lifecycle;
mod progress;

pub use approval::{
    digest_pin, digest_to_hex, parse_hex_digest, ApprovalAuthority, CredentialStore,
    MemoryCredentials, PinDigest,
};
pub use bulk::{BulkFailure, BulkFailureReason, BulkOutcome};
pub use engine::ExperienceEngine;
pub use error::LifecycleError;
pub use lifecycle::{Actor, ExperienceEdit, NewExperience};
pub use progress::{
    aggregate, aggregate_cohort, percent, BookProgress, CohortCourseProgress, CohortProgress,
    CohortSubCourseProgress, CountingMode, CourseProgress, SubCourseProgress, SubjectProgress,
};
