//! Rule validation scoring -- structural issues, per-level completeness,
//! and the 0-100 quality score.
//!
//! Issues block generation; warnings are informational. The score combines
//! average level completeness with penalty weights per issue and warning.

use serde::{Deserialize, Serialize};

use taxon_core::validate::{validate_structure, StructureIssue};
use taxon_core::RuleBundle;

use crate::catalog::Catalog;

const ISSUE_PENALTY: f64 = 15.0;
const WARNING_PENALTY: f64 = 5.0;
const LOW_COMPLETENESS_THRESHOLD: f64 = 50.0;

// Partial credit per dimension slot, summing to 100.
const CREDIT_HAS_VALUES: f64 = 40.0;
const CREDIT_HAS_ACTIVE_VALUES: f64 = 30.0;
const CREDIT_HAS_FORMATTING: f64 = 30.0;

/// One issue or warning in a validation summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationFinding {
    pub message: String,
    pub dimension_id: Option<i64>,
    pub level_id: Option<i64>,
}

/// Completeness of one level's template, 0-100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelCompleteness {
    pub level_id: i64,
    pub level: u32,
    pub completeness: f64,
}

/// The full validation view of one rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleValidationSummary {
    pub rule_id: i64,
    pub is_valid: bool,
    pub issues: Vec<ValidationFinding>,
    pub warnings: Vec<ValidationFinding>,
    pub level_completeness: Vec<LevelCompleteness>,
    pub avg_completeness: f64,
    pub overall_score: f64,
}

/// Score a rule from its bundle and compiled catalog.
pub fn summarize(bundle: &RuleBundle, catalog: &Catalog) -> RuleValidationSummary {
    let mut issues: Vec<ValidationFinding> = validate_structure(bundle)
        .iter()
        .map(structure_finding)
        .collect();
    let mut warnings = Vec::new();
    let mut level_completeness = Vec::new();

    for template in &catalog.level_templates {
        let mut slot_scores = Vec::new();
        for slot in &template.slots {
            let Some(dim) = catalog.dimensions.get(&slot.dimension_id) else {
                continue;
            };

            // A required dropdown with no active values and no freetext
            // fallback can never produce a string at this level.
            if slot.is_required && dim.is_dropdown && !dim.has_active_values {
                issues.push(ValidationFinding {
                    message: format!(
                        "dimension '{}' at level {} has no active values and no freetext fallback",
                        dim.name, template.level
                    ),
                    dimension_id: Some(dim.id),
                    level_id: Some(template.level_id),
                });
            }

            let mut score = 0.0;
            if dim.allows_freetext || dim.value_count > 0 {
                score += CREDIT_HAS_VALUES;
            }
            if dim.allows_freetext || dim.has_active_values {
                score += CREDIT_HAS_ACTIVE_VALUES;
            }
            if !slot.prefix.is_empty() || !slot.suffix.is_empty() || !slot.delimiter.is_empty() {
                score += CREDIT_HAS_FORMATTING;
            }
            slot_scores.push(score);
        }

        let completeness = if slot_scores.is_empty() {
            0.0
        } else {
            slot_scores.iter().sum::<f64>() / slot_scores.len() as f64
        };

        if completeness < LOW_COMPLETENESS_THRESHOLD {
            warnings.push(ValidationFinding {
                message: format!(
                    "level {} completeness is {:.0}%, below {:.0}%",
                    template.level, completeness, LOW_COMPLETENESS_THRESHOLD
                ),
                dimension_id: None,
                level_id: Some(template.level_id),
            });
        }

        level_completeness.push(LevelCompleteness {
            level_id: template.level_id,
            level: template.level,
            completeness,
        });
    }

    let avg_completeness = if level_completeness.is_empty() {
        0.0
    } else {
        level_completeness.iter().map(|l| l.completeness).sum::<f64>()
            / level_completeness.len() as f64
    };

    let overall_score = (avg_completeness
        - ISSUE_PENALTY * issues.len() as f64
        - WARNING_PENALTY * warnings.len() as f64)
        .clamp(0.0, 100.0);

    RuleValidationSummary {
        rule_id: bundle.rule.id,
        is_valid: issues.is_empty(),
        issues,
        warnings,
        level_completeness,
        avg_completeness,
        overall_score,
    }
}

fn structure_finding(issue: &StructureIssue) -> ValidationFinding {
    let level_id = match issue {
        StructureIssue::OrderingGap { level_id, .. }
        | StructureIssue::DuplicateDimension { level_id, .. } => Some(*level_id),
        _ => None,
    };
    let dimension_id = match issue {
        StructureIssue::DuplicateDimension { dimension_id, .. } => Some(*dimension_id),
        _ => None,
    };
    ValidationFinding {
        message: issue.to_string(),
        dimension_id,
        level_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::build_catalog;
    use taxon_core::model::{
        Dimension, DimensionKind, DimensionValue, EntityLevel, Platform, Rule, RuleDetail,
        RuleStatus,
    };
    use time::macros::date;

    fn fixture(with_values: bool, formatted: bool) -> RuleBundle {
        let mut details = vec![RuleDetail {
            id: 1,
            rule_id: 1,
            level_id: 10,
            dimension_id: 1,
            dimension_order: 1,
            prefix: String::new(),
            suffix: String::new(),
            delimiter: if formatted { "_".to_string() } else { String::new() },
            is_required: true,
        }];
        details.push(RuleDetail {
            id: 2,
            rule_id: 1,
            level_id: 10,
            dimension_id: 2,
            dimension_order: 2,
            prefix: String::new(),
            suffix: String::new(),
            delimiter: String::new(),
            is_required: true,
        });

        let values = if with_values {
            vec![DimensionValue {
                id: 11,
                dimension_id: 1,
                value: "eu".to_string(),
                label: "Europe".to_string(),
                utm: String::new(),
                parent_value_id: None,
                valid_from: None,
                valid_until: None,
                order: 1,
            }]
        } else {
            vec![]
        };

        RuleBundle::assemble(
            Rule {
                id: 1,
                workspace_id: 1,
                platform_id: 1,
                name: "Display".to_string(),
                status: RuleStatus::Active,
                is_default: true,
            },
            Platform {
                id: 1,
                name: "Meta".to_string(),
            },
            vec![EntityLevel {
                id: 10,
                platform_id: 1,
                name: "Campaign".to_string(),
                level: 1,
                next_level_id: None,
            }],
            details,
            vec![
                Dimension {
                    id: 1,
                    workspace_id: 1,
                    name: "Region".to_string(),
                    kind: DimensionKind::List,
                    parent_dimension_id: None,
                    description: String::new(),
                },
                Dimension {
                    id: 2,
                    workspace_id: 1,
                    name: "Note".to_string(),
                    kind: DimensionKind::FreeText,
                    parent_dimension_id: None,
                    description: String::new(),
                },
            ],
            values,
            vec![],
        )
        .unwrap()
    }

    fn score(bundle: &RuleBundle) -> RuleValidationSummary {
        let catalog = build_catalog(bundle, date!(2026 - 01 - 01));
        summarize(bundle, &catalog)
    }

    #[test]
    fn test_healthy_rule_is_valid() {
        let summary = score(&fixture(true, true));
        assert!(summary.is_valid);
        assert!(summary.issues.is_empty());
        // Region: values + active + formatting = 100.
        // Note: freetext counts as having values but has no formatting = 70.
        assert!((summary.avg_completeness - 85.0).abs() < 0.01);
        assert_eq!(summary.overall_score, 85.0);
    }

    #[test]
    fn test_empty_dropdown_blocks_generation() {
        let summary = score(&fixture(false, true));
        assert!(!summary.is_valid);
        assert_eq!(summary.issues.len(), 1);
        assert!(summary.issues[0].message.contains("Region"));
        assert_eq!(summary.issues[0].dimension_id, Some(1));
    }

    #[test]
    fn test_low_completeness_is_warning_not_issue() {
        // No values, no formatting: Region scores 0, Note scores 70;
        // level completeness 35 -> warning.
        let summary = score(&fixture(false, false));
        assert!(summary
            .warnings
            .iter()
            .any(|w| w.message.contains("completeness")));
        // The warning itself does not flip validity; the empty dropdown does.
        assert!(!summary.is_valid);
    }

    #[test]
    fn test_score_penalizes_issues_and_warnings() {
        let summary = score(&fixture(false, false));
        // avg 35, one issue (-15), one warning (-5) = 15.
        assert!((summary.avg_completeness - 35.0).abs() < 0.01);
        assert_eq!(summary.issues.len(), 1);
        assert_eq!(summary.warnings.len(), 1);
        assert!((summary.overall_score - 15.0).abs() < 0.01);
    }

    #[test]
    fn test_score_clamped_at_zero() {
        let mut bundle = fixture(false, false);
        bundle.rule.name = String::new();
        bundle.rule.platform_id = 0;
        let summary = score(&bundle);
        assert!(summary.issues.len() >= 3);
        assert_eq!(summary.overall_score, 0.0);
    }

    #[test]
    fn test_structure_issues_carry_locations() {
        let mut bundle = fixture(true, true);
        // Introduce an ordering gap at level 10.
        bundle.details[1].dimension_order = 3;
        let summary = score(&bundle);
        let gap = summary
            .issues
            .iter()
            .find(|i| i.message.contains("contiguous"))
            .unwrap();
        assert_eq!(gap.level_id, Some(10));
    }
}
