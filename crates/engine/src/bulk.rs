//! Bulk transition coordinator.
//!
//! One PIN authorizes the approver for a whole batch. Every record still
//! passes its own `PENDING` guard, so records that went terminal since the
//! caller's snapshot are reported per record instead of failing the batch.

use std::collections::{HashMap, HashSet};

use logbook_storage::{
    ApproverRole, CatalogStore, ExperienceRecord, ExperienceStatus, RecordStore, StorageError,
};
use serde::{Deserialize, Serialize};

use crate::approval::CredentialStore;
use crate::engine::ExperienceEngine;
use crate::error::LifecycleError;

/// Why one record of a batch was not transitioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BulkFailureReason {
    /// The record was no longer `PENDING` when its update ran.
    AlreadyTerminal,
    /// No record with this ID (never existed, or deleted meanwhile).
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkFailure {
    pub id: String,
    pub reason: BulkFailureReason,
}

/// Per-record outcome of a bulk transition, in request order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkOutcome {
    pub succeeded: Vec<String>,
    pub failed: Vec<BulkFailure>,
}

impl BulkOutcome {
    fn fail(&mut self, id: &str, reason: BulkFailureReason) {
        self.failed.push(BulkFailure {
            id: id.to_string(),
            reason,
        });
    }
}

/// Drop repeated IDs, keeping the first occurrence.
fn dedupe(record_ids: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    record_ids
        .iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}

/// The single approver every record of the batch is declared under, or
/// `MixedApprover`. `None` when no record was found.
fn batch_approver(
    records: &[ExperienceRecord],
    declared_name: &str,
) -> Result<Option<ApproverRole>, LifecycleError> {
    let mut role = None;
    for record in records {
        if record.approver_name != declared_name {
            return Err(LifecycleError::MixedApprover);
        }
        match role {
            None => role = Some(record.approver_role),
            Some(r) if r != record.approver_role => return Err(LifecycleError::MixedApprover),
            Some(_) => {}
        }
    }
    Ok(role)
}

impl<R, C, K> ExperienceEngine<R, C, K>
where
    R: RecordStore,
    C: CatalogStore,
    K: CredentialStore,
{
    /// Apply `PENDING -> target` to every record in `record_ids` under one
    /// approver authorization.
    ///
    /// Raises only for batch preconditions: `EmptyBatch`, `MixedApprover`
    /// (checked before any PIN verification), and `Unauthorized`. Per-record
    /// failures land in [`BulkOutcome::failed`]. A batch in which no record
    /// exists still verifies the PIN against the declared name.
    pub async fn bulk_transition(
        &self,
        record_ids: &[String],
        target: ExperienceStatus,
        declared_name: &str,
        pin: &str,
    ) -> Result<BulkOutcome, LifecycleError> {
        if target == ExperienceStatus::Pending {
            return Err(LifecycleError::InvalidSubmission(
                "PENDING is not a transition target".to_string(),
            ));
        }
        let ids = dedupe(record_ids);
        if ids.is_empty() {
            return Err(LifecycleError::EmptyBatch);
        }

        let snapshot = self.records.get_many(&ids).await?;
        let role = batch_approver(&snapshot, declared_name)?;

        let mut outcome = BulkOutcome::default();
        let Some(role) = role else {
            // No record names a role; the declared approver must still hold
            // a credential under one of them.
            if !self.verify_any_role(declared_name, pin).await {
                return Err(LifecycleError::Unauthorized);
            }
            for id in &ids {
                outcome.fail(id, BulkFailureReason::NotFound);
            }
            return Ok(outcome);
        };

        if !self.authority.verify(role, declared_name, pin).await {
            return Err(LifecycleError::Unauthorized);
        }

        let by_id: HashMap<&str, &ExperienceRecord> =
            snapshot.iter().map(|r| (r.id.as_str(), r)).collect();

        for id in &ids {
            let Some(record) = by_id.get(id.as_str()) else {
                outcome.fail(id, BulkFailureReason::NotFound);
                continue;
            };
            if record.status != ExperienceStatus::Pending {
                outcome.fail(id, BulkFailureReason::AlreadyTerminal);
                continue;
            }
            match self
                .records
                .conditional_update_status(id, ExperienceStatus::Pending, target)
                .await
            {
                Ok(true) => outcome.succeeded.push(id.clone()),
                Ok(false) => outcome.fail(id, BulkFailureReason::AlreadyTerminal),
                Err(StorageError::RecordNotFound { .. }) => {
                    outcome.fail(id, BulkFailureReason::NotFound)
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::info!(
            to = %target,
            approver_role = %role,
            succeeded = outcome.succeeded.len(),
            failed = outcome.failed.len(),
            "bulk transition applied"
        );
        Ok(outcome)
    }

    async fn verify_any_role(&self, declared_name: &str, pin: &str) -> bool {
        for role in [ApproverRole::ApproverIn, ApproverRole::ApproverOut] {
            if self.authority.verify(role, declared_name, pin).await {
                return true;
            }
        }
        false
    }

    pub async fn bulk_confirm(
        &self,
        record_ids: &[String],
        declared_name: &str,
        pin: &str,
    ) -> Result<BulkOutcome, LifecycleError> {
        self.bulk_transition(record_ids, ExperienceStatus::Confirmed, declared_name, pin)
            .await
    }

    pub async fn bulk_reject(
        &self,
        record_ids: &[String],
        declared_name: &str,
        pin: &str,
    ) -> Result<BulkOutcome, LifecycleError> {
        self.bulk_transition(record_ids, ExperienceStatus::Cancel, declared_name, pin)
            .await
    }
}
