//! Conformance test suite for `TaxonStorage` implementations.
//!
//! This module provides a backend-agnostic test suite that any `TaxonStorage`
//! implementation can run to verify correctness. The suite covers:
//!
//! - **Initialization**: string insertion, duplicate detection
//! - **Snapshot isolation**: uncommitted writes invisible, committed writes visible
//! - **Atomic commit**: all-or-nothing semantics for multi-record snapshots
//! - **Version validation / OCC**: optimistic concurrency conflict detection
//! - **Audit coupling**: modification rows tied to value updates
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function that
//! creates a fresh, empty storage instance for each test:
//!
//! ```ignore
//! use taxon_storage::conformance::{run_conformance_suite, ConformanceReport};
//!
//! #[tokio::test]
//! async fn postgres_conformance() {
//!     let report = run_conformance_suite(|| async {
//!         create_test_postgres_storage().await
//!     }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod audit;
mod commit;
mod init;
mod snapshot;
mod version;

use std::fmt;
use std::future::Future;

use crate::record::StringModificationRecord;
use crate::TaxonStorage;
use taxon_core::model::{StringDetailRecord, StringRecord};

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "init", "snapshot", "commit").
    pub category: String,
    /// Test name (e.g. "insert_visible_after_commit").
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn pass(category: &str, name: &str) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: true,
            message: None,
        }
    }

    fn fail(category: &str, name: &str, msg: String) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: false,
            message: Some(msg),
        }
    }

    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self::pass(category, name),
            Err(msg) => Self::fail(category, name, msg),
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a storage backend.
///
/// The `factory` function is called once per test to create a fresh, empty
/// storage instance, ensuring test isolation.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: TaxonStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(init::run_init_tests(&factory).await);
    results.extend(snapshot::run_snapshot_tests(&factory).await);
    results.extend(commit::run_commit_tests(&factory).await);
    results.extend(version::run_version_tests(&factory).await);
    results.extend(audit::run_audit_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers: record constructors with sensible defaults ──────────────────────

fn make_string(id: i64, uuid: &str, value: &str) -> StringRecord {
    StringRecord {
        id,
        workspace_id: 1,
        rule_id: 1,
        level_id: 10,
        value: value.to_string(),
        string_uuid: uuid.to_string(),
        parent_uuid: None,
        parent_id: None,
        version: 0,
    }
}

fn make_child_string(id: i64, uuid: &str, parent_uuid: &str, value: &str) -> StringRecord {
    StringRecord {
        id,
        workspace_id: 1,
        rule_id: 1,
        level_id: 20,
        value: value.to_string(),
        string_uuid: uuid.to_string(),
        parent_uuid: Some(parent_uuid.to_string()),
        parent_id: None,
        version: 0,
    }
}

fn make_detail(string_id: i64, dimension_id: i64, value_id: i64) -> StringDetailRecord {
    StringDetailRecord {
        id: string_id * 10 + dimension_id,
        string_id,
        dimension_id,
        dimension_value_id: Some(value_id),
        freetext_value: None,
    }
}

fn make_modification(
    id: &str,
    string_id: i64,
    version: i64,
    old: &str,
    new: &str,
) -> StringModificationRecord {
    StringModificationRecord {
        id: id.to_string(),
        string_id,
        version,
        dimension_id: 1,
        old_value: old.to_string(),
        new_value: new.to_string(),
        modified_at: "2026-01-01T00:00:00Z".to_string(),
    }
}
