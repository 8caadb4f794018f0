//! Integration tests for the rule analysis suite.
//!
//! These tests assemble a realistic two-level rule bundle, run the full
//! analysis pipeline, and verify the report against known expectations.

use std::collections::BTreeMap;

use taxon_analyze::{analyze_rule, FindingSeverity};
use taxon_core::model::{
    Dimension, DimensionKind, DimensionValue, EntityLevel, Platform, Rule, RuleDetail, RuleStatus,
};
use taxon_core::RuleBundle;
use time::macros::date;

/// A Meta-style rule: Account level carries Region; Campaign level repeats
/// Region (inherited) and adds Market (cascading from Region) and a
/// free-text Campaign name.
fn display_rule() -> RuleBundle {
    let dimension = |id, name: &str, kind, parent| Dimension {
        id,
        workspace_id: 1,
        name: name.to_string(),
        kind,
        parent_dimension_id: parent,
        description: String::new(),
    };
    let value = |id, dim, val: &str, parent, order| DimensionValue {
        id,
        dimension_id: dim,
        value: val.to_string(),
        label: val.to_string(),
        utm: val.to_string(),
        parent_value_id: parent,
        valid_from: None,
        valid_until: None,
        order,
    };
    let detail = |id, level_id, dim, order, delim: &str| RuleDetail {
        id,
        rule_id: 1,
        level_id,
        dimension_id: dim,
        dimension_order: order,
        prefix: String::new(),
        suffix: String::new(),
        delimiter: delim.to_string(),
        is_required: true,
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
        vec![
            EntityLevel {
                id: 10,
                platform_id: 1,
                name: "Account".to_string(),
                level: 1,
                next_level_id: Some(20),
            },
            EntityLevel {
                id: 20,
                platform_id: 1,
                name: "Campaign".to_string(),
                level: 2,
                next_level_id: None,
            },
        ],
        vec![
            detail(1, 10, 1, 1, "_"),
            detail(2, 20, 1, 1, "_"),
            detail(3, 20, 2, 2, "_"),
            detail(4, 20, 3, 3, ""),
        ],
        vec![
            dimension(1, "Region", DimensionKind::List, None),
            dimension(2, "Market", DimensionKind::List, Some(1)),
            dimension(3, "Campaign", DimensionKind::FreeText, None),
        ],
        vec![
            value(11, 1, "eu", None, 1),
            value(12, 1, "us", None, 2),
            value(21, 2, "de", Some(11), 1),
            value(22, 2, "tx", Some(12), 2),
        ],
        vec![],
    )
    .unwrap()
}

#[test]
fn test_full_report_populated() {
    let report = analyze_rule(&display_rule(), date!(2026 - 01 - 01));
    assert!(report.catalog.is_some());
    assert!(report.inheritance.is_some());
    assert!(report.validation.is_some());
    assert_eq!(report.analyses_run.len(), 3);
}

#[test]
fn test_catalog_cross_level_consistency() {
    let report = analyze_rule(&display_rule(), date!(2026 - 01 - 01));
    let catalog = report.catalog.unwrap();

    assert_eq!(catalog.dimensions.len(), 3);
    assert_eq!(catalog.level_templates.len(), 2);
    assert_eq!(catalog.level_templates[0].preview, "[Region]_");
    assert_eq!(
        catalog.level_templates[1].preview,
        "[Region]_[Market]_[Campaign]"
    );
    // Market cascades fully from Region.
    assert_eq!(catalog.cascades.cascade_coverage[&2], 100.0);
}

#[test]
fn test_inheritance_between_levels() {
    let report = analyze_rule(&display_rule(), date!(2026 - 01 - 01));
    let matrix = report.inheritance.unwrap();

    assert!(matrix.is_inherited_at(1, 20));
    assert!(!matrix.is_inherited_at(1, 10));
    assert!(!matrix.is_inherited_at(2, 20));
    assert_eq!(matrix.inherited_dimension_count, 1);
    assert_eq!(matrix.total_dimension_count, 4);
}

#[test]
fn test_valid_rule_scores_high_with_no_issue_findings() {
    let report = analyze_rule(&display_rule(), date!(2026 - 01 - 01));
    let validation = report.validation.unwrap();

    assert!(validation.is_valid);
    assert!(validation.overall_score > 50.0);
    assert!(!report
        .findings
        .iter()
        .any(|f| f.severity == FindingSeverity::Issue));
}

#[test]
fn test_expired_values_surface_as_issue_finding() {
    let mut bundle = display_rule();
    for v in bundle.values.get_mut(&1).unwrap() {
        v.valid_until = Some("2020-01-01".to_string());
    }
    let report = analyze_rule(&bundle, date!(2026 - 01 - 01));

    let validation = report.validation.as_ref().unwrap();
    assert!(!validation.is_valid);
    assert!(report
        .findings
        .iter()
        .any(|f| f.severity == FindingSeverity::Issue && f.message.contains("Region")));
}

#[test]
fn test_formatting_drift_surfaces_as_warning_finding() {
    let mut bundle = display_rule();
    // Campaign-level Region detail drops the delimiter its parent has.
    let detail = bundle
        .details
        .iter_mut()
        .find(|d| d.level_id == 20 && d.dimension_id == 1)
        .unwrap();
    detail.delimiter = "-".to_string();

    let report = analyze_rule(&bundle, date!(2026 - 01 - 01));
    assert!(report
        .findings
        .iter()
        .any(|f| f.component == "inheritance" && f.severity == FindingSeverity::Warning));
}

#[test]
fn test_report_round_trips_through_json() {
    let report = analyze_rule(&display_rule(), date!(2026 - 01 - 01));
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["rule_id"], 1);
    assert!(json["findings"].is_array());
}

#[test]
fn test_analysis_matches_generation_template() {
    // The catalog preview and the live generator agree on segment order.
    let bundle = display_rule();
    let mut values = BTreeMap::new();
    values.insert("Region".to_string(), "eu".to_string());
    values.insert("Market".to_string(), "de".to_string());
    values.insert("Campaign".to_string(), "launch".to_string());

    let generated = taxon_engine::generate(&bundle, 20, &values).unwrap();
    assert_eq!(generated, "eu_de_launch");
}
