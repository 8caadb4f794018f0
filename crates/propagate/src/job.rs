//! Propagation job state machine.
//!
//! `Pending -> Processing -> {Completed | Failed | Cancelled}`. The three
//! end states are terminal; any transition out of them is an error.

use std::fmt;

use taxon_storage::{JobStatus, PropagationJobRecord};

/// An illegal job status transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobStateError {
    pub job_id: String,
    pub from: JobStatus,
    pub to: JobStatus,
}

impl fmt::Display for JobStateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "job {} cannot transition {:?} -> {:?}",
            self.job_id, self.from, self.to
        )
    }
}

impl std::error::Error for JobStateError {}

/// Whether `from -> to` is a legal transition.
pub fn can_transition(from: JobStatus, to: JobStatus) -> bool {
    matches!(
        (from, to),
        (JobStatus::Pending, JobStatus::Processing)
            | (JobStatus::Processing, JobStatus::Completed)
            | (JobStatus::Processing, JobStatus::Failed)
            | (JobStatus::Processing, JobStatus::Cancelled)
    )
}

/// Apply a status transition to a job record, stamping `updated_at`.
pub fn transition(
    record: &mut PropagationJobRecord,
    to: JobStatus,
    now: &str,
) -> Result<(), JobStateError> {
    if !can_transition(record.status, to) {
        return Err(JobStateError {
            job_id: record.id.clone(),
            from: record.status,
            to,
        });
    }
    record.status = to;
    record.updated_at = now.to_string();
    Ok(())
}
