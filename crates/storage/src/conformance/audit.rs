//! Audit coupling conformance tests.
//!
//! Every value update carries a modification row in the same snapshot, and
//! the `(string_id, version)` pair is unique.

use std::future::Future;

use super::{make_modification, make_string, TestResult};
use crate::{StorageError, TaxonStorage};

pub(super) async fn run_audit_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: TaxonStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "audit",
        "modification_commits_with_update",
        modification_commits_with_update(factory).await,
    ));
    results.push(TestResult::from_result(
        "audit",
        "duplicate_version_row_rejected",
        duplicate_version_row_rejected(factory).await,
    ));
    results.push(TestResult::from_result(
        "audit",
        "modifications_listed_oldest_first",
        modifications_listed_oldest_first(factory).await,
    ));

    results
}

// ── Test implementations ──────────────────────────────────────────────────────

/// A value update and its audit row land atomically in one snapshot.
async fn modification_commits_with_update<S, F, Fut>(factory: &F) -> Result<(), String>
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

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let new_version = s
        .update_string_value(&mut snap, 1, 0, "eu_relaunch")
        .await
        .map_err(|e| e.to_string())?;
    s.insert_modification(
        &mut snap,
        make_modification("m1", 1, new_version, "eu_launch", "eu_relaunch"),
    )
    .await
    .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let rows = s.list_modifications(1).await.map_err(|e| e.to_string())?;
    if rows.len() != 1 || rows[0].version != 1 {
        return Err(format!("expected one version-1 row, got {:?}", rows));
    }
    Ok(())
}

/// Two audit rows for the same (string, version) must be rejected.
async fn duplicate_version_row_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
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
    s.insert_modification(&mut snap, make_modification("m1", 1, 1, "a", "b"))
        .await
        .map_err(|e| e.to_string())?;
    match s
        .insert_modification(&mut snap, make_modification("m2", 1, 1, "b", "c"))
        .await
    {
        Err(StorageError::UniqueViolation { .. }) => Ok(()),
        Err(e) => Err(format!("expected UniqueViolation, got {}", e)),
        Ok(()) => Err("expected UniqueViolation, got Ok".to_string()),
    }
}

/// list_modifications returns rows ordered by version ascending.
async fn modifications_listed_oldest_first<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TaxonStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.insert_string(&mut snap, make_string(1, "u1", "v0"))
        .await
        .map_err(|e| e.to_string())?;
    s.insert_modification(&mut snap, make_modification("m2", 1, 2, "v1", "v2"))
        .await
        .map_err(|e| e.to_string())?;
    s.insert_modification(&mut snap, make_modification("m1", 1, 1, "v0", "v1"))
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let rows = s.list_modifications(1).await.map_err(|e| e.to_string())?;
    let versions: Vec<i64> = rows.iter().map(|m| m.version).collect();
    if versions != vec![1, 2] {
        return Err(format!("expected [1, 2], got {:?}", versions));
    }
    Ok(())
}
