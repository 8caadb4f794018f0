//! Version validation / OCC conformance tests.
//!
//! `update_string_value` is conditional on the expected version; a stale
//! expectation must surface as `ConcurrentConflict` and leave the row
//! untouched.

use std::future::Future;

use super::{make_string, TestResult};
use crate::{StorageError, TaxonStorage};

pub(super) async fn run_version_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: TaxonStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "version",
        "update_increments_version",
        update_increments_version(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "stale_version_conflicts",
        stale_version_conflicts(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "conflict_error_carries_fields",
        conflict_error_carries_fields(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "sequential_updates_chain_versions",
        sequential_updates_chain_versions(factory).await,
    ));

    results
}

async fn seed_one<S: TaxonStorage>(s: &S) -> Result<(), String> {
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.insert_string(&mut snap, make_string(1, "u1", "eu_launch"))
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())
}

// ── Test implementations ──────────────────────────────────────────────────────

/// A successful update returns and persists version + 1.
async fn update_increments_version<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TaxonStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_one(&s).await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let new_version = s
        .update_string_value(&mut snap, 1, 0, "eu_relaunch")
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    if new_version != 1 {
        return Err(format!("expected returned version 1, got {}", new_version));
    }
    let rec = s.get_string(1).await.map_err(|e| e.to_string())?;
    if rec.version != 1 || rec.value != "eu_relaunch" {
        return Err(format!(
            "expected (1, eu_relaunch), got ({}, {})",
            rec.version, rec.value
        ));
    }
    Ok(())
}

/// An update expecting a version the row no longer has must conflict.
async fn stale_version_conflicts<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TaxonStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_one(&s).await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    match s.update_string_value(&mut snap, 1, 7, "eu_relaunch").await {
        Err(StorageError::ConcurrentConflict { .. }) => {}
        Err(e) => return Err(format!("expected ConcurrentConflict, got {}", e)),
        Ok(_) => return Err("expected ConcurrentConflict, got Ok".to_string()),
    }
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;

    let rec = s.get_string(1).await.map_err(|e| e.to_string())?;
    if rec.value != "eu_launch" {
        return Err(format!("conflicting update mutated row: '{}'", rec.value));
    }
    Ok(())
}

/// The conflict error names the string and the expected version.
async fn conflict_error_carries_fields<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TaxonStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_one(&s).await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let result = s.update_string_value(&mut snap, 1, 3, "x").await;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;

    match result {
        Err(StorageError::ConcurrentConflict {
            string_id,
            expected_version,
        }) => {
            if string_id != 1 || expected_version != 3 {
                return Err(format!(
                    "expected (1, 3), got ({}, {})",
                    string_id, expected_version
                ));
            }
            Ok(())
        }
        other => Err(format!("expected ConcurrentConflict, got {:?}", other.err())),
    }
}

/// Updates in consecutive snapshots chain versions 0 -> 1 -> 2.
async fn sequential_updates_chain_versions<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TaxonStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_one(&s).await?;

    for (expected, value) in [(0, "v1"), (1, "v2")] {
        let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
        s.update_string_value(&mut snap, 1, expected, value)
            .await
            .map_err(|e| e.to_string())?;
        s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;
    }

    let rec = s.get_string(1).await.map_err(|e| e.to_string())?;
    if rec.version != 2 || rec.value != "v2" {
        return Err(format!("expected (2, v2), got ({}, {})", rec.version, rec.value));
    }
    Ok(())
}
