use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle status of an experience record.
///
/// `Confirmed` and `Cancel` are terminal: no transition leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExperienceStatus {
    Pending,
    Confirmed,
    Cancel,
}

impl ExperienceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExperienceStatus::Pending => "PENDING",
            ExperienceStatus::Confirmed => "CONFIRMED",
            ExperienceStatus::Cancel => "CANCEL",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExperienceStatus::Pending)
    }
}

impl fmt::Display for ExperienceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExperienceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(ExperienceStatus::Pending),
            "CONFIRMED" => Ok(ExperienceStatus::Confirmed),
            "CANCEL" => Ok(ExperienceStatus::Cancel),
            other => Err(format!("unknown experience status '{}'", other)),
        }
    }
}

/// Role under which an approver is declared on a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApproverRole {
    /// Supervisor inside the institution.
    ApproverIn,
    /// External supervisor at the placement site.
    ApproverOut,
}

impl ApproverRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApproverRole::ApproverIn => "APPROVER_IN",
            ApproverRole::ApproverOut => "APPROVER_OUT",
        }
    }
}

impl fmt::Display for ApproverRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single experience record as stored in the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperienceRecord {
    pub id: String,
    pub student_id: String,
    pub book_id: String,
    pub course_id: String,
    pub sub_course_id: String,
    /// Subject label: free text on freeform sub-courses, one of the fixed
    /// list otherwise.
    #[serde(default)]
    pub subject: Option<String>,
    pub status: ExperienceStatus,
    /// Opaque field values keyed by field ID. Never inspected here.
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    pub approver_role: ApproverRole,
    pub approver_name: String,
    /// RFC 3339 timestamp string.
    pub created_at: String,
    /// RFC 3339 timestamp string of the last write.
    pub updated_at: String,
}

/// The owner-editable part of a record, replaced wholesale by
/// `RecordStore::conditional_update_details`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordDetails {
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    pub approver_role: ApproverRole,
    pub approver_name: String,
}

/// Filter for `RecordStore::list`. `None` fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFilter {
    #[serde(default)]
    pub student_id: Option<String>,
    #[serde(default)]
    pub book_id: Option<String>,
    #[serde(default)]
    pub status: Option<ExperienceStatus>,
    #[serde(default)]
    pub approver_name: Option<String>,
}

impl RecordFilter {
    pub fn matches(&self, record: &ExperienceRecord) -> bool {
        self.student_id
            .as_deref()
            .map_or(true, |s| record.student_id == s)
            && self.book_id.as_deref().map_or(true, |b| record.book_id == b)
            && self.status.map_or(true, |s| record.status == s)
            && self
                .approver_name
                .as_deref()
                .map_or(true, |n| record.approver_name == n)
    }
}

/// Current UTC time as an RFC 3339 string with second precision.
pub fn timestamp_now() -> String {
    let now = time::OffsetDateTime::now_utc();
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
        now.year(),
        now.month() as u8,
        now.day(),
        now.hour(),
        now.minute(),
        now.second()
    )
}
