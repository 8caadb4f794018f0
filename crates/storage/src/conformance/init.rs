use std::future::Future;

use super::{make_child_string, make_detail, make_string, TestResult};
use crate::{StorageError, TaxonStorage};

pub(super) async fn run_init_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: TaxonStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "init",
        "insert_creates_string_at_version_0",
        insert_creates_string_at_version_0(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "inserted_string_readable_by_uuid",
        inserted_string_readable_by_uuid(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "double_insert_returns_already_exists",
        double_insert_returns_already_exists(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "duplicate_uuid_rejected_within_workspace",
        duplicate_uuid_rejected_within_workspace(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "duplicate_value_rejected_within_sibling_group",
        duplicate_value_rejected_within_sibling_group(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "detail_requires_existing_string",
        detail_requires_existing_string(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "unresolved_parent_links_listed",
        unresolved_parent_links_listed(factory).await,
    ));

    results
}

// ── Test implementations ──────────────────────────────────────────────────────

/// After insert + commit, the string version must be 0.
async fn insert_creates_string_at_version_0<S, F, Fut>(factory: &F) -> Result<(), String>
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

    let rec = s.get_string(1).await.map_err(|e| e.to_string())?;
    if rec.version != 0 {
        return Err(format!("expected version 0, got {}", rec.version));
    }
    Ok(())
}

/// A committed string is readable by (workspace, uuid).
async fn inserted_string_readable_by_uuid<S, F, Fut>(factory: &F) -> Result<(), String>
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

    let rec = s
        .get_string_by_uuid(1, "u1")
        .await
        .map_err(|e| e.to_string())?;
    if rec.id != 1 {
        return Err(format!("expected id 1, got {}", rec.id));
    }
    Ok(())
}

/// Inserting the same string id twice must fail with AlreadyExists.
async fn double_insert_returns_already_exists<S, F, Fut>(factory: &F) -> Result<(), String>
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
    match s
        .insert_string(&mut snap, make_string(1, "u2", "us_launch"))
        .await
    {
        Err(StorageError::AlreadyExists { .. }) => Ok(()),
        Err(e) => Err(format!("expected AlreadyExists, got {}", e)),
        Ok(()) => Err("expected AlreadyExists, got Ok".to_string()),
    }
}

/// A second string with the same uuid in the same workspace must be rejected.
async fn duplicate_uuid_rejected_within_workspace<S, F, Fut>(factory: &F) -> Result<(), String>
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
    match s
        .insert_string(&mut snap, make_string(2, "u1", "us_launch"))
        .await
    {
        Err(StorageError::AlreadyExists { .. }) => Ok(()),
        Err(e) => Err(format!("expected AlreadyExists, got {}", e)),
        Ok(()) => Err("expected AlreadyExists, got Ok".to_string()),
    }
}

/// Two siblings resolving to the same final value must be rejected.
async fn duplicate_value_rejected_within_sibling_group<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: TaxonStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.insert_string(&mut snap, make_child_string(1, "c1", "p1", "eu_launch"))
        .await
        .map_err(|e| e.to_string())?;
    match s
        .insert_string(&mut snap, make_child_string(2, "c2", "p1", "eu_launch"))
        .await
    {
        Err(StorageError::UniqueViolation { .. }) => Ok(()),
        Err(e) => Err(format!("expected UniqueViolation, got {}", e)),
        Ok(()) => Err("expected UniqueViolation, got Ok".to_string()),
    }
}

/// A detail row for a missing string must fail with StringNotFound.
async fn detail_requires_existing_string<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TaxonStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    match s.upsert_string_detail(&mut snap, make_detail(9, 1, 11)).await {
        Err(StorageError::StringNotFound { .. }) => Ok(()),
        Err(e) => Err(format!("expected StringNotFound, got {}", e)),
        Ok(()) => Err("expected StringNotFound, got Ok".to_string()),
    }
}

/// Strings with a parent_uuid but no resolved parent_id are listed for
/// reconciliation; resolved ones are not.
async fn unresolved_parent_links_listed<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TaxonStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.insert_string(&mut snap, make_string(1, "p1", "eu_launch"))
        .await
        .map_err(|e| e.to_string())?;
    s.insert_string(&mut snap, make_child_string(2, "c1", "p1", "eu_launch_video"))
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let unresolved = s
        .list_unresolved_parent_links(1)
        .await
        .map_err(|e| e.to_string())?;
    if unresolved.len() != 1 || unresolved[0].id != 2 {
        return Err(format!("expected [string 2], got {:?}", unresolved));
    }

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.update_parent_link(&mut snap, 2, 1)
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let unresolved = s
        .list_unresolved_parent_links(1)
        .await
        .map_err(|e| e.to_string())?;
    if !unresolved.is_empty() {
        return Err(format!("expected no unresolved links, got {:?}", unresolved));
    }
    Ok(())
}
