//! Structural validation of a rule configuration.
//!
//! Walks the bundle and reports every issue found, never stopping at the
//! first. The scorer consumes these issues; the engine independently
//! re-checks ordering per call since configuration can change between calls.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use crate::bundle::RuleBundle;

/// A structural defect in a rule configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StructureIssue {
    MissingName,
    MissingPlatform,
    MissingWorkspace,
    NoDetails,
    /// dimension_order values for a level are not exactly 1..N.
    OrderingGap { level_id: i64, orders: Vec<u32> },
    /// The same dimension appears twice at one level.
    DuplicateDimension { level_id: i64, dimension_id: i64 },
}

impl fmt::Display for StructureIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StructureIssue::MissingName => write!(f, "rule name is required"),
            StructureIssue::MissingPlatform => write!(f, "rule platform is required"),
            StructureIssue::MissingWorkspace => write!(f, "rule workspace is required"),
            StructureIssue::NoDetails => write!(f, "rule has no details"),
            StructureIssue::OrderingGap { level_id, orders } => {
                write!(
                    f,
                    "level {} dimension orders {:?} are not a contiguous 1..N sequence",
                    level_id, orders
                )
            }
            StructureIssue::DuplicateDimension {
                level_id,
                dimension_id,
            } => {
                write!(
                    f,
                    "dimension {} appears more than once at level {}",
                    dimension_id, level_id
                )
            }
        }
    }
}

/// Whether a sorted-or-unsorted list of 1-based orders is exactly `{1..N}`.
pub fn orders_contiguous(orders: &[u32]) -> bool {
    let mut sorted = orders.to_vec();
    sorted.sort_unstable();
    sorted.iter().enumerate().all(|(i, &o)| o == i as u32 + 1)
}

/// Run every structural check and return all issues found.
pub fn validate_structure(bundle: &RuleBundle) -> Vec<StructureIssue> {
    let mut issues = Vec::new();

    if bundle.rule.name.trim().is_empty() {
        issues.push(StructureIssue::MissingName);
    }
    if bundle.rule.platform_id <= 0 {
        issues.push(StructureIssue::MissingPlatform);
    }
    if bundle.rule.workspace_id <= 0 {
        issues.push(StructureIssue::MissingWorkspace);
    }
    if bundle.details.is_empty() {
        issues.push(StructureIssue::NoDetails);
    }

    for level_id in bundle.level_ids_with_details() {
        let details = bundle.details_for_level(level_id);

        let orders: Vec<u32> = details.iter().map(|d| d.dimension_order).collect();
        if !orders_contiguous(&orders) {
            issues.push(StructureIssue::OrderingGap { level_id, orders });
        }

        let mut seen = BTreeSet::new();
        for detail in &details {
            if !seen.insert(detail.dimension_id) {
                issues.push(StructureIssue::DuplicateDimension {
                    level_id,
                    dimension_id: detail.dimension_id,
                });
            }
        }
    }

    issues
}
