use serde::{Deserialize, Serialize};

use taxon_core::model::{
    Dimension, DimensionConstraint, DimensionValue, EntityLevel, Platform, Rule, RuleDetail,
};

/// Every row backing one rule, as loaded from the backend in one pass.
///
/// The caller assembles these into a `taxon_core::RuleBundle`; the storage
/// layer performs no cross-row validation itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleParts {
    pub rule: Rule,
    pub platform: Platform,
    pub levels: Vec<EntityLevel>,
    pub details: Vec<RuleDetail>,
    pub dimensions: Vec<Dimension>,
    pub values: Vec<DimensionValue>,
    pub constraints: Vec<DimensionConstraint>,
}

/// Lifecycle state of a propagation job.
///
/// `Pending -> Processing -> {Completed | Failed | Cancelled}`; the last
/// three are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

/// Execution and audit record of one cascading update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropagationJobRecord {
    pub id: String,
    pub workspace_id: i64,
    pub status: JobStatus,
    pub total_strings: u64,
    pub processed_strings: u64,
    pub failed_strings: u64,
    /// ISO 8601 / RFC 3339 timestamp string.
    pub created_at: String,
    /// ISO 8601 / RFC 3339 timestamp string.
    pub updated_at: String,
}

/// One error row linked to a propagation job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropagationErrorRecord {
    pub id: String,
    pub job_id: String,
    pub string_id: i64,
    pub message: String,
    pub retryable: bool,
}

/// One audit row per changed string in a propagation apply.
///
/// `version` is the string's per-row counter after the change; the
/// `(string_id, version)` pair is unique at the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StringModificationRecord {
    pub id: String,
    pub string_id: i64,
    pub version: i64,
    pub dimension_id: i64,
    pub old_value: String,
    pub new_value: String,
    /// ISO 8601 / RFC 3339 timestamp string.
    pub modified_at: String,
}
