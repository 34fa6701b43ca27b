//! Record lifecycle: submission, the single-record state machine, and the
//! owner-side edit/cancel/delete paths.
//!
//! ```text
//! PENDING --(approver confirm, PIN verified)--> CONFIRMED   [terminal]
//! PENDING --(approver reject,  PIN verified)--> CANCEL      [terminal]
//! PENDING --(owner self-cancel)---------------> CANCEL      [terminal]
//! CANCEL  --(owner/admin delete)--------------> (removed)
//! PENDING --(owner cancel-and-delete)---------> (removed)
//! ```
//!
//! Every write is a conditional store update keyed on the status the guard
//! observed, so a concurrent writer can never be silently overwritten.

use std::collections::BTreeMap;

use logbook_storage::{
    timestamp_now, ApproverRole, Book, CatalogStore, ExperienceRecord, ExperienceStatus,
    RecordDetails, RecordFilter, RecordStore, SubCourse,
};
use serde::{Deserialize, Serialize};

use crate::approval::CredentialStore;
use crate::engine::ExperienceEngine;
use crate::error::LifecycleError;

/// The capability a caller acts under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    /// The student who created the record.
    StudentOwner { student_id: String },
    /// The approver declared on the record, proving identity with a PIN.
    Approver { pin: String },
    /// Administrative caller. Only allowed to delete cancelled records.
    Admin,
}

/// Input of [`ExperienceEngine::submit_experience`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewExperience {
    pub student_id: String,
    pub book_id: String,
    pub course_id: String,
    pub sub_course_id: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    pub approver_role: ApproverRole,
    pub approver_name: String,
}

/// Owner edit of a pending record. Replaces the editable details wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperienceEdit {
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    pub approver_role: ApproverRole,
    pub approver_name: String,
}

fn new_record_id() -> String {
    format!("exp-{:016x}", rand::random::<u64>())
}

fn non_empty(value: &str, what: &str) -> Result<String, LifecycleError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LifecycleError::InvalidSubmission(format!(
            "{} must not be empty",
            what
        )));
    }
    Ok(trimmed.to_string())
}

/// Normalize and check a subject against the sub-course's subject rule.
///
/// - freeform: a non-empty label is required
/// - fixed list: the label must be one of the list
/// - neither: the label is optional
fn check_subject(sub: &SubCourse, subject: Option<&str>) -> Result<Option<String>, LifecycleError> {
    let subject = subject.map(str::trim).filter(|s| !s.is_empty());
    let invalid = |reason: &str| LifecycleError::InvalidSubject {
        sub_course_id: sub.id.clone(),
        reason: reason.to_string(),
    };

    if sub.is_subject_freeform {
        return subject
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| invalid("a subject is required"));
    }
    if !sub.subjects.is_empty() {
        return match subject {
            Some(s) if sub.subjects.iter().any(|known| known == s) => Ok(Some(s.to_string())),
            Some(s) => Err(invalid(&format!("'{}' is not one of the listed subjects", s))),
            None => Err(invalid("a subject from the list is required")),
        };
    }
    Ok(subject.map(str::to_string))
}

fn resolve_sub_course<'a>(
    book: &'a Book,
    course_id: &str,
    sub_course_id: &str,
) -> Result<&'a SubCourse, LifecycleError> {
    if book.course(course_id).is_none() {
        return Err(LifecycleError::UnknownReference {
            kind: "course",
            id: course_id.to_string(),
        });
    }
    book.sub_course(course_id, sub_course_id)
        .ok_or_else(|| LifecycleError::UnknownReference {
            kind: "sub-course",
            id: sub_course_id.to_string(),
        })
}

fn ensure_status(record: &ExperienceRecord, expected: ExperienceStatus) -> Result<(), LifecycleError> {
    if record.status != expected {
        return Err(LifecycleError::InvalidState {
            record_id: record.id.clone(),
            status: record.status,
        });
    }
    Ok(())
}

fn ensure_owner(record: &ExperienceRecord, student_id: &str) -> Result<(), LifecycleError> {
    if record.student_id != student_id {
        return Err(LifecycleError::Forbidden {
            record_id: record.id.clone(),
        });
    }
    Ok(())
}

impl<R, C, K> ExperienceEngine<R, C, K>
where
    R: RecordStore,
    C: CatalogStore,
    K: CredentialStore,
{
    // ── Submission ────────────────────────────────────────────────────────────

    /// Create a new record in `PENDING`.
    pub async fn submit_experience(
        &self,
        new: NewExperience,
    ) -> Result<ExperienceRecord, LifecycleError> {
        let student_id = non_empty(&new.student_id, "student_id")?;
        let approver_name = non_empty(&new.approver_name, "approver_name")?;

        let book = self.catalog.get_book(&new.book_id).await?;
        let sub = resolve_sub_course(&book, &new.course_id, &new.sub_course_id)?;
        if !book.admits(&student_id) {
            return Err(LifecycleError::StudentNotAdmitted {
                student_id,
                book_id: book.id.clone(),
            });
        }
        let subject = check_subject(sub, new.subject.as_deref())?;

        let now = timestamp_now();
        let record = ExperienceRecord {
            id: new_record_id(),
            student_id,
            book_id: new.book_id,
            course_id: new.course_id,
            sub_course_id: new.sub_course_id,
            subject,
            status: ExperienceStatus::Pending,
            fields: new.fields,
            approver_role: new.approver_role,
            approver_name,
            created_at: now.clone(),
            updated_at: now,
        };
        self.records.insert(record.clone()).await?;

        tracing::info!(
            record_id = %record.id,
            student_id = %record.student_id,
            sub_course_id = %record.sub_course_id,
            "experience submitted"
        );
        Ok(record)
    }

    // ── State machine ─────────────────────────────────────────────────────────

    /// Move a `PENDING` record to `target` (`CONFIRMED` or `CANCEL`).
    ///
    /// Order of checks: status guard, then capability (PIN verification for
    /// approvers), then the conditional write. A failed check writes nothing.
    pub async fn transition(
        &self,
        record_id: &str,
        target: ExperienceStatus,
        actor: &Actor,
    ) -> Result<ExperienceRecord, LifecycleError> {
        if target == ExperienceStatus::Pending {
            return Err(LifecycleError::InvalidSubmission(
                "PENDING is not a transition target".to_string(),
            ));
        }

        let record = self.records.get(record_id).await?;
        ensure_status(&record, ExperienceStatus::Pending)?;

        match actor {
            Actor::Approver { pin } => {
                let verified = self
                    .authority
                    .verify(record.approver_role, &record.approver_name, pin)
                    .await;
                if !verified {
                    return Err(LifecycleError::Unauthorized);
                }
            }
            Actor::StudentOwner { student_id } => {
                ensure_owner(&record, student_id)?;
                if target != ExperienceStatus::Cancel {
                    return Err(LifecycleError::Forbidden {
                        record_id: record.id,
                    });
                }
            }
            Actor::Admin => {
                return Err(LifecycleError::Forbidden {
                    record_id: record.id,
                })
            }
        }

        self.apply_transition(record, target).await
    }

    /// Conditional `PENDING -> target` write. Losing a race reports the
    /// status the winner left behind. On success the guarded snapshot is
    /// returned with the new status; the record is not read back.
    async fn apply_transition(
        &self,
        mut record: ExperienceRecord,
        target: ExperienceStatus,
    ) -> Result<ExperienceRecord, LifecycleError> {
        let applied = self
            .records
            .conditional_update_status(&record.id, ExperienceStatus::Pending, target)
            .await?;
        if !applied {
            let current = self.records.get(&record.id).await?;
            return Err(LifecycleError::InvalidState {
                record_id: record.id,
                status: current.status,
            });
        }
        tracing::info!(record_id = %record.id, to = %target, "experience transitioned");
        record.status = target;
        record.updated_at = timestamp_now();
        Ok(record)
    }

    pub async fn confirm(&self, record_id: &str, pin: &str) -> Result<ExperienceRecord, LifecycleError> {
        let actor = Actor::Approver {
            pin: pin.to_string(),
        };
        self.transition(record_id, ExperienceStatus::Confirmed, &actor)
            .await
    }

    pub async fn reject(&self, record_id: &str, pin: &str) -> Result<ExperienceRecord, LifecycleError> {
        let actor = Actor::Approver {
            pin: pin.to_string(),
        };
        self.transition(record_id, ExperienceStatus::Cancel, &actor)
            .await
    }

    /// Owner self-cancel. No PIN involved.
    pub async fn cancel_own(
        &self,
        record_id: &str,
        student_id: &str,
    ) -> Result<ExperienceRecord, LifecycleError> {
        let actor = Actor::StudentOwner {
            student_id: student_id.to_string(),
        };
        self.transition(record_id, ExperienceStatus::Cancel, &actor)
            .await
    }

    // ── Owner edits and deletion ──────────────────────────────────────────────

    /// Replace the editable details of the owner's `PENDING` record.
    pub async fn edit_own(
        &self,
        record_id: &str,
        student_id: &str,
        edit: ExperienceEdit,
    ) -> Result<ExperienceRecord, LifecycleError> {
        let record = self.records.get(record_id).await?;
        ensure_owner(&record, student_id)?;
        ensure_status(&record, ExperienceStatus::Pending)?;

        let approver_name = non_empty(&edit.approver_name, "approver_name")?;
        let book = self.catalog.get_book(&record.book_id).await?;
        let sub = resolve_sub_course(&book, &record.course_id, &record.sub_course_id)?;
        let subject = check_subject(sub, edit.subject.as_deref())?;

        let details = RecordDetails {
            subject,
            fields: edit.fields,
            approver_role: edit.approver_role,
            approver_name,
        };
        let applied = self
            .records
            .conditional_update_details(record_id, ExperienceStatus::Pending, details)
            .await?;
        let current = self.records.get(record_id).await?;
        if !applied {
            return Err(LifecycleError::InvalidState {
                record_id: record_id.to_string(),
                status: current.status,
            });
        }
        tracing::info!(record_id, "experience edited");
        Ok(current)
    }

    /// Permanently remove a `CANCEL` record. Owner or admin only.
    pub async fn delete_cancelled(&self, record_id: &str, actor: &Actor) -> Result<(), LifecycleError> {
        let record = self.records.get(record_id).await?;
        match actor {
            Actor::StudentOwner { student_id } => ensure_owner(&record, student_id)?,
            Actor::Admin => {}
            Actor::Approver { .. } => {
                return Err(LifecycleError::Forbidden {
                    record_id: record.id,
                })
            }
        }
        ensure_status(&record, ExperienceStatus::Cancel)?;
        self.conditional_remove(&record.id, ExperienceStatus::Cancel)
            .await
    }

    /// Owner withdraws a `PENDING` record entirely.
    pub async fn cancel_and_delete_own(
        &self,
        record_id: &str,
        student_id: &str,
    ) -> Result<(), LifecycleError> {
        let record = self.records.get(record_id).await?;
        ensure_owner(&record, student_id)?;
        ensure_status(&record, ExperienceStatus::Pending)?;
        self.conditional_remove(&record.id, ExperienceStatus::Pending)
            .await
    }

    async fn conditional_remove(
        &self,
        record_id: &str,
        expected: ExperienceStatus,
    ) -> Result<(), LifecycleError> {
        if self.records.conditional_delete(record_id, expected).await? {
            tracing::info!(record_id, from = %expected, "experience deleted");
            return Ok(());
        }
        let current = self.records.get(record_id).await?;
        Err(LifecycleError::InvalidState {
            record_id: record_id.to_string(),
            status: current.status,
        })
    }

    // ── Reads ─────────────────────────────────────────────────────────────────

    pub async fn get_experience(&self, record_id: &str) -> Result<ExperienceRecord, LifecycleError> {
        Ok(self.records.get(record_id).await?)
    }

    pub async fn list_experiences(
        &self,
        filter: &RecordFilter,
    ) -> Result<Vec<ExperienceRecord>, LifecycleError> {
        Ok(self.records.list(filter).await?)
    }
}
