//! Atomic commit conformance tests.
//!
//! A snapshot containing several mutations must apply all of them or none,
//! including when a late mutation conflicts with a concurrently committed
//! writer.

use std::future::Future;

use super::{make_string, TestResult};
use crate::TaxonStorage;

pub(super) async fn run_commit_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: TaxonStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "commit",
        "multi_record_commit_applies_all",
        multi_record_commit_applies_all(factory).await,
    ));
    results.push(TestResult::from_result(
        "commit",
        "failed_commit_applies_nothing",
        failed_commit_applies_nothing(factory).await,
    ));

    results
}

// ── Test implementations ──────────────────────────────────────────────────────

/// Several inserts and updates in one snapshot all land together.
async fn multi_record_commit_applies_all<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TaxonStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    for id in 1..=5 {
        s.insert_string(
            &mut snap,
            make_string(id, &format!("u{}", id), &format!("eu_launch_{}", id)),
        )
        .await
        .map_err(|e| e.to_string())?;
    }
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let all = s.list_strings(1).await.map_err(|e| e.to_string())?;
    if all.len() != 5 {
        return Err(format!("expected 5 strings, got {}", all.len()));
    }
    Ok(())
}

/// When a snapshot's commit fails on its Nth mutation, the earlier N-1
/// mutations must not be applied either.
async fn failed_commit_applies_nothing<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TaxonStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;

    // Seed a committed string the doomed snapshot will race on.
    let mut seed = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.insert_string(&mut seed, make_string(1, "u1", "eu_launch"))
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(seed).await.map_err(|e| e.to_string())?;

    // Doomed snapshot: two clean inserts plus an update at version 0.
    let mut doomed = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.insert_string(&mut doomed, make_string(2, "u2", "us_launch"))
        .await
        .map_err(|e| e.to_string())?;
    s.insert_string(&mut doomed, make_string(3, "u3", "apac_launch"))
        .await
        .map_err(|e| e.to_string())?;
    s.update_string_value(&mut doomed, 1, 0, "eu_relaunch")
        .await
        .map_err(|e| e.to_string())?;

    // A concurrent writer bumps string 1 to version 1 first.
    let mut racer = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.update_string_value(&mut racer, 1, 0, "eu_raced")
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(racer).await.map_err(|e| e.to_string())?;

    if s.commit_snapshot(doomed).await.is_ok() {
        return Err("expected doomed commit to fail".to_string());
    }

    // Neither of the doomed snapshot's inserts may have landed.
    if s.get_string(2).await.is_ok() || s.get_string(3).await.is_ok() {
        return Err("failed commit left partial writes".to_string());
    }
    let one = s.get_string(1).await.map_err(|e| e.to_string())?;
    if one.value != "eu_raced" {
        return Err(format!("expected racer's value, got '{}'", one.value));
    }
    Ok(())
}
