//! RuleReport -- aggregated output from the rule analyses.
//!
//! The report collects the catalog, the inheritance matrix, and the
//! validation summary, and extracts notable findings (issues, warnings)
//! for summary display.

use serde::Serialize;

use crate::catalog::Catalog;
use crate::inheritance::InheritanceMatrix;
use crate::scorer::RuleValidationSummary;

/// Severity level for an analysis finding.
///
/// `Issue` findings block generation; `Warning` findings are informational
/// and returned alongside success, never raised as errors.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FindingSeverity {
    Issue,
    Warning,
}

/// A notable finding from rule analysis.
#[derive(Debug, Clone, Serialize)]
pub struct Finding {
    pub component: String,
    pub severity: FindingSeverity,
    pub message: String,
    pub dimension_id: Option<i64>,
    pub level_id: Option<i64>,
}

/// Aggregated analysis output for one rule.
#[derive(Debug, Clone, Serialize)]
pub struct RuleReport {
    pub rule_id: i64,
    pub catalog: Option<Catalog>,
    pub inheritance: Option<InheritanceMatrix>,
    pub validation: Option<RuleValidationSummary>,
    pub analyses_run: Vec<String>,
    pub findings: Vec<Finding>,
}

impl RuleReport {
    pub fn new(rule_id: i64) -> Self {
        RuleReport {
            rule_id,
            catalog: None,
            inheritance: None,
            validation: None,
            analyses_run: Vec::new(),
            findings: Vec::new(),
        }
    }

    /// Extract findings from populated analysis results.
    pub fn extract_findings(&mut self) {
        self.findings.clear();

        if let Some(ref validation) = self.validation {
            for issue in &validation.issues {
                self.findings.push(Finding {
                    component: "validation".to_string(),
                    severity: FindingSeverity::Issue,
                    message: issue.message.clone(),
                    dimension_id: issue.dimension_id,
                    level_id: issue.level_id,
                });
            }
            for warning in &validation.warnings {
                self.findings.push(Finding {
                    component: "validation".to_string(),
                    severity: FindingSeverity::Warning,
                    message: warning.message.clone(),
                    dimension_id: warning.dimension_id,
                    level_id: warning.level_id,
                });
            }
        }

        if let Some(ref matrix) = self.inheritance {
            for entry in matrix.entries.iter().filter(|e| e.is_inherited) {
                if !entry.inherits_formatting {
                    self.findings.push(Finding {
                        component: "inheritance".to_string(),
                        severity: FindingSeverity::Warning,
                        message: format!(
                            "dimension {} at level {} overrides the formatting inherited from level {}",
                            entry.dimension_id,
                            entry.level,
                            entry.parent_level.unwrap_or(0),
                        ),
                        dimension_id: Some(entry.dimension_id),
                        level_id: Some(entry.level_id),
                    });
                }
            }
        }

        // Sort findings for deterministic output.
        self.findings.sort_by(|a, b| {
            a.component
                .cmp(&b.component)
                .then_with(|| format!("{:?}", a.severity).cmp(&format!("{:?}", b.severity)))
                .then_with(|| a.message.cmp(&b.message))
        });
    }
}
