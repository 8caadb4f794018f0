//! Snapshot isolation conformance tests.
//!
//! Verifies that uncommitted writes are invisible outside a snapshot,
//! committed writes become visible, and aborted snapshots leave no trace.

use std::future::Future;

use super::{make_string, TestResult};
use crate::TaxonStorage;

pub(super) async fn run_snapshot_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: TaxonStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "snapshot",
        "uncommitted_write_invisible",
        uncommitted_write_invisible(factory).await,
    ));
    results.push(TestResult::from_result(
        "snapshot",
        "committed_write_visible",
        committed_write_visible(factory).await,
    ));
    results.push(TestResult::from_result(
        "snapshot",
        "aborted_write_invisible",
        aborted_write_invisible(factory).await,
    ));
    results.push(TestResult::from_result(
        "snapshot",
        "snapshot_reads_its_own_writes",
        snapshot_reads_its_own_writes(factory).await,
    ));

    results
}

// ── Test implementations ──────────────────────────────────────────────────────

/// A write buffered in an open snapshot is invisible to readers.
async fn uncommitted_write_invisible<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TaxonStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.insert_string(&mut snap, make_string(1, "u1", "eu_launch"))
        .await
        .map_err(|e| e.to_string())?;

    if s.get_string(1).await.is_ok() {
        return Err("uncommitted insert visible outside snapshot".to_string());
    }
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;
    Ok(())
}

/// A committed write is visible to subsequent readers.
async fn committed_write_visible<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TaxonStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.insert_string(&mut snap, make_string(1, "u1", "eu_launch"))
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    s.get_string(1).await.map_err(|e| e.to_string())?;
    Ok(())
}

/// An aborted snapshot's writes never become visible.
async fn aborted_write_invisible<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TaxonStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.insert_string(&mut snap, make_string(1, "u1", "eu_launch"))
        .await
        .map_err(|e| e.to_string())?;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;

    if s.get_string(1).await.is_ok() {
        return Err("aborted insert became visible".to_string());
    }
    Ok(())
}

/// Within one snapshot, a buffered insert is visible to later mutations
/// (a detail row can reference it before commit).
async fn snapshot_reads_its_own_writes<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TaxonStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.insert_string(&mut snap, make_string(1, "u1", "eu_launch"))
        .await
        .map_err(|e| e.to_string())?;
    s.upsert_string_detail(&mut snap, super::make_detail(1, 1, 11))
        .await
        .map_err(|e| format!("detail on own uncommitted string failed: {}", e))?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;
    Ok(())
}
