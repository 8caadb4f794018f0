//! Transactional cascade apply.
//!
//! The apply path runs the impact analysis, then writes every affected
//! string inside ONE storage snapshot: either all value updates, detail
//! upserts, audit rows, and the completed job record land together, or the
//! snapshot aborts and the job is marked failed with its error rows.
//! Partial application is a correctness violation.

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

use taxon_analyze::InheritanceMatrix;
use taxon_core::model::StringDetailRecord;
use taxon_core::RuleBundle;
use taxon_storage::{
    JobStatus, PropagationErrorRecord, PropagationJobRecord, StorageError,
    StringModificationRecord, TaxonStorage,
};

use crate::impact::{
    analyze_impact, Conflict, ConflictKind, DetailUpdate, ImpactError, ImpactReport, UpdateType,
};
use crate::job::{self, JobStateError};
use crate::tree::StringTreeSnapshot;

/// Caller-facing knobs for a propagation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropagationOptions {
    /// When false, only the edit targets themselves are rewritten.
    pub propagate: bool,
    pub max_depth: u32,
    /// When true, analyze and return without writing anything.
    pub dry_run: bool,
}

impl Default for PropagationOptions {
    fn default() -> Self {
        PropagationOptions {
            propagate: true,
            max_depth: 10,
            dry_run: false,
        }
    }
}

/// Result of an apply call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyOutcome {
    /// None on dry runs: no job record is written.
    pub job_id: Option<String>,
    pub report: ImpactReport,
    pub successful_updates: Vec<i64>,
    pub failed_updates: Vec<i64>,
    pub total_affected: usize,
}

/// Infrastructure failure during apply. Conflicts are NOT errors; they are
/// returned in the outcome's report.
#[derive(Debug)]
pub enum ApplyError {
    Impact(ImpactError),
    Storage(StorageError),
    JobState(JobStateError),
}

impl std::fmt::Display for ApplyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApplyError::Impact(e) => write!(f, "impact analysis failed: {}", e),
            ApplyError::Storage(e) => write!(f, "storage error: {}", e),
            ApplyError::JobState(e) => write!(f, "job state error: {}", e),
        }
    }
}

impl std::error::Error for ApplyError {}

impl From<ImpactError> for ApplyError {
    fn from(e: ImpactError) -> Self {
        ApplyError::Impact(e)
    }
}

impl From<StorageError> for ApplyError {
    fn from(e: StorageError) -> Self {
        ApplyError::Storage(e)
    }
}

impl From<JobStateError> for ApplyError {
    fn from(e: JobStateError) -> Self {
        ApplyError::JobState(e)
    }
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

/// Run the impact analysis and, unless `dry_run`, apply the cascade in one
/// all-or-nothing transaction.
pub async fn apply_propagation<S: TaxonStorage>(
    storage: &S,
    bundle: &RuleBundle,
    matrix: &InheritanceMatrix,
    workspace_id: i64,
    updates: &[DetailUpdate],
    options: &PropagationOptions,
) -> Result<ApplyOutcome, ApplyError> {
    let strings = storage.list_strings(workspace_id).await?;
    let details = storage.list_string_details(workspace_id).await?;
    let tree = StringTreeSnapshot::from_rows(strings, details);

    let max_depth = if options.propagate {
        options.max_depth
    } else {
        0
    };
    let report = analyze_impact(&tree, bundle, matrix, updates, max_depth)?;
    let total_affected = report.summary.total_affected;

    if options.dry_run {
        return Ok(ApplyOutcome {
            job_id: None,
            report,
            successful_updates: Vec::new(),
            failed_updates: Vec::new(),
            total_affected,
        });
    }

    let job_id = Uuid::new_v4().to_string();
    let mut job = PropagationJobRecord {
        id: job_id.clone(),
        workspace_id,
        status: JobStatus::Pending,
        total_strings: total_affected as u64,
        processed_strings: 0,
        failed_strings: 0,
        created_at: now_rfc3339(),
        updated_at: now_rfc3339(),
    };
    job::transition(&mut job, JobStatus::Processing, &now_rfc3339())?;

    let mut snapshot = storage.begin_snapshot().await?;
    storage.upsert_propagation_job(&mut snapshot, job.clone()).await?;
    storage.commit_snapshot(snapshot).await?;

    tracing::info!(
        job_id = %job_id,
        workspace_id,
        total_affected,
        conflicts = report.conflicts.len(),
        "propagation job started"
    );

    if report.has_blocking_conflicts() {
        fail_job(storage, &mut job, &report.conflicts, total_affected).await?;
        let failed_updates: Vec<i64> = report.affected.iter().map(|a| a.string_id).collect();
        return Ok(ApplyOutcome {
            job_id: Some(job_id),
            report,
            successful_updates: Vec::new(),
            failed_updates,
            total_affected,
        });
    }

    match write_cascade(storage, &tree, &report, updates, &mut job).await {
        Ok(()) => {
            tracing::info!(job_id = %job_id, total_affected, "propagation job completed");
            let successful_updates: Vec<i64> =
                report.affected.iter().map(|a| a.string_id).collect();
            Ok(ApplyOutcome {
                job_id: Some(job_id),
                report,
                successful_updates,
                failed_updates: Vec::new(),
                total_affected,
            })
        }
        Err(ApplyError::Storage(StorageError::ConcurrentConflict {
            string_id,
            expected_version,
        })) => {
            // The analysis snapshot went stale under us: surface it as the
            // concurrent-edit conflict class, nothing applied.
            let conflict = Conflict {
                kind: ConflictKind::ConcurrentEdit,
                string_id,
                message: format!(
                    "string {} changed after analysis (expected version {})",
                    string_id, expected_version
                ),
            };
            fail_job(storage, &mut job, std::slice::from_ref(&conflict), total_affected)
                .await?;
            tracing::warn!(job_id = %job_id, string_id, "propagation aborted on concurrent edit");

            let mut report = report;
            report.conflicts.push(conflict);
            let failed_updates: Vec<i64> =
                report.affected.iter().map(|a| a.string_id).collect();
            Ok(ApplyOutcome {
                job_id: Some(job_id),
                report,
                successful_updates: Vec::new(),
                failed_updates,
                total_affected,
            })
        }
        Err(e) => {
            // Infra failure: best-effort job bookkeeping, then propagate.
            let conflict = Conflict {
                kind: ConflictKind::Validation,
                string_id: 0,
                message: e.to_string(),
            };
            let _ = fail_job(storage, &mut job, std::slice::from_ref(&conflict), total_affected)
                .await;
            Err(e)
        }
    }
}

/// Write every affected string, its detail updates, and its audit row, plus
/// the completed job record, in one snapshot.
async fn write_cascade<S: TaxonStorage>(
    storage: &S,
    tree: &StringTreeSnapshot,
    report: &ImpactReport,
    updates: &[DetailUpdate],
    job: &mut PropagationJobRecord,
) -> Result<(), ApplyError> {
    let mut snapshot = storage.begin_snapshot().await?;

    for affected in &report.affected {
        let new_version = storage
            .update_string_value(
                &mut snapshot,
                affected.string_id,
                affected.expected_version,
                &affected.new_value,
            )
            .await?;

        if affected.update_type == UpdateType::Direct {
            for update in updates.iter().filter(|u| u.string_id == affected.string_id) {
                let existing_id = tree
                    .detail(update.string_id, update.dimension_id)
                    .map(|d| d.id)
                    .unwrap_or(0);
                let freetext = if update.new_dimension_value_id.is_none() {
                    Some(update.new_value.clone())
                } else {
                    None
                };
                storage
                    .upsert_string_detail(
                        &mut snapshot,
                        StringDetailRecord {
                            id: existing_id,
                            string_id: update.string_id,
                            dimension_id: update.dimension_id,
                            dimension_value_id: update.new_dimension_value_id,
                            freetext_value: freetext,
                        },
                    )
                    .await?;
            }
        }

        storage
            .insert_modification(
                &mut snapshot,
                StringModificationRecord {
                    id: Uuid::new_v4().to_string(),
                    string_id: affected.string_id,
                    version: new_version,
                    dimension_id: affected.trigger_dimension_id,
                    old_value: affected.current_value.clone(),
                    new_value: affected.new_value.clone(),
                    modified_at: now_rfc3339(),
                },
            )
            .await?;
    }

    // The completed job row rides in the same snapshot, but the caller's
    // record only advances once the commit lands: a commit-time conflict
    // must still find the job in Processing to mark it Failed.
    let mut completed = job.clone();
    completed.processed_strings = report.affected.len() as u64;
    job::transition(&mut completed, JobStatus::Completed, &now_rfc3339())?;
    storage.upsert_propagation_job(&mut snapshot, completed.clone()).await?;

    storage.commit_snapshot(snapshot).await?;
    *job = completed;
    Ok(())
}

/// Mark the job failed and record one error row per conflict, in a fresh
/// snapshot (the data snapshot is already gone).
async fn fail_job<S: TaxonStorage>(
    storage: &S,
    job: &mut PropagationJobRecord,
    conflicts: &[Conflict],
    total_affected: usize,
) -> Result<(), ApplyError> {
    job.failed_strings = total_affected as u64;
    job::transition(job, JobStatus::Failed, &now_rfc3339())?;

    let mut snapshot = storage.begin_snapshot().await?;
    storage.upsert_propagation_job(&mut snapshot, job.clone()).await?;
    for conflict in conflicts {
        storage
            .insert_propagation_error(
                &mut snapshot,
                PropagationErrorRecord {
                    id: Uuid::new_v4().to_string(),
                    job_id: job.id.clone(),
                    string_id: conflict.string_id,
                    message: conflict.message.clone(),
                    retryable: conflict.kind == ConflictKind::ConcurrentEdit,
                },
            )
            .await?;
    }
    storage.commit_snapshot(snapshot).await?;
    Ok(())
}
