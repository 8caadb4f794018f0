//! Integration tests for propagation impact analysis and the transactional
//! apply path, run against the in-memory reference backend.
//!
//! Fixture: a two-level rule (Account carries Region; Campaign repeats
//! Region and adds a free-text Name), one account string, and campaign
//! strings below it. Campaigns without an own Region detail inherit the
//! account's region.

use taxon_analyze::{build_matrix, InheritanceMatrix};
use taxon_core::model::{
    ConstraintKind, Dimension, DimensionConstraint, DimensionKind, DimensionValue, EntityLevel,
    Platform, Rule, RuleDetail, RuleStatus, StringDetailRecord, StringRecord,
};
use taxon_core::RuleBundle;
use taxon_propagate::{
    analyze_impact, apply_propagation, ConflictKind, DetailUpdate, PropagationOptions,
    StringTreeSnapshot, UpdateType,
};
use taxon_storage::{JobStatus, MemoryStorage, TaxonStorage};

const REGION: i64 = 1;
const NAME: i64 = 2;
const ACCOUNT_LEVEL: i64 = 10;
const CAMPAIGN_LEVEL: i64 = 20;

fn bundle() -> RuleBundle {
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
                id: ACCOUNT_LEVEL,
                platform_id: 1,
                name: "Account".to_string(),
                level: 1,
                next_level_id: Some(CAMPAIGN_LEVEL),
            },
            EntityLevel {
                id: CAMPAIGN_LEVEL,
                platform_id: 1,
                name: "Campaign".to_string(),
                level: 2,
                next_level_id: None,
            },
        ],
        vec![
            RuleDetail {
                id: 1,
                rule_id: 1,
                level_id: ACCOUNT_LEVEL,
                dimension_id: REGION,
                dimension_order: 1,
                prefix: String::new(),
                suffix: String::new(),
                delimiter: String::new(),
                is_required: true,
            },
            RuleDetail {
                id: 2,
                rule_id: 1,
                level_id: CAMPAIGN_LEVEL,
                dimension_id: REGION,
                dimension_order: 1,
                prefix: String::new(),
                suffix: String::new(),
                delimiter: "_".to_string(),
                is_required: true,
            },
            RuleDetail {
                id: 3,
                rule_id: 1,
                level_id: CAMPAIGN_LEVEL,
                dimension_id: NAME,
                dimension_order: 2,
                prefix: String::new(),
                suffix: String::new(),
                delimiter: String::new(),
                is_required: true,
            },
        ],
        vec![
            Dimension {
                id: REGION,
                workspace_id: 1,
                name: "Region".to_string(),
                kind: DimensionKind::List,
                parent_dimension_id: None,
                description: String::new(),
            },
            Dimension {
                id: NAME,
                workspace_id: 1,
                name: "Name".to_string(),
                kind: DimensionKind::FreeText,
                parent_dimension_id: None,
                description: String::new(),
            },
        ],
        vec![
            DimensionValue {
                id: 11,
                dimension_id: REGION,
                value: "eu".to_string(),
                label: "Europe".to_string(),
                utm: "eu".to_string(),
                parent_value_id: None,
                valid_from: None,
                valid_until: None,
                order: 1,
            },
            DimensionValue {
                id: 12,
                dimension_id: REGION,
                value: "us".to_string(),
                label: "US".to_string(),
                utm: "us".to_string(),
                parent_value_id: None,
                valid_from: None,
                valid_until: None,
                order: 2,
            },
        ],
        vec![DimensionConstraint {
            id: 1,
            dimension_id: REGION,
            kind: ConstraintKind::Lowercase,
            value: None,
            error_message: None,
            order: 1,
            is_active: true,
        }],
    )
    .unwrap()
}

fn matrix() -> InheritanceMatrix {
    build_matrix(&bundle())
}

fn account(id: i64, uuid: &str, value: &str) -> StringRecord {
    StringRecord {
        id,
        workspace_id: 1,
        rule_id: 1,
        level_id: ACCOUNT_LEVEL,
        value: value.to_string(),
        string_uuid: uuid.to_string(),
        parent_uuid: None,
        parent_id: None,
        version: 0,
    }
}

fn campaign(id: i64, uuid: &str, parent: &str, value: &str) -> StringRecord {
    StringRecord {
        id,
        workspace_id: 1,
        rule_id: 1,
        level_id: CAMPAIGN_LEVEL,
        value: value.to_string(),
        string_uuid: uuid.to_string(),
        parent_uuid: Some(parent.to_string()),
        parent_id: None,
        version: 0,
    }
}

fn region_detail(string_id: i64, value_id: i64) -> StringDetailRecord {
    StringDetailRecord {
        id: string_id * 10 + REGION,
        string_id,
        dimension_id: REGION,
        dimension_value_id: Some(value_id),
        freetext_value: None,
    }
}

fn name_detail(string_id: i64, name: &str) -> StringDetailRecord {
    StringDetailRecord {
        id: string_id * 10 + NAME,
        string_id,
        dimension_id: NAME,
        dimension_value_id: None,
        freetext_value: Some(name.to_string()),
    }
}

/// Account "eu" with two inheriting campaigns and one with its own region.
fn standard_tree() -> StringTreeSnapshot {
    StringTreeSnapshot::from_rows(
        vec![
            account(1, "acct", "eu"),
            campaign(2, "c-launch", "acct", "eu_launch"),
            campaign(3, "c-promo", "acct", "eu_promo"),
            campaign(4, "c-own", "acct", "us_own"),
        ],
        vec![
            region_detail(1, 11),
            name_detail(2, "launch"),
            name_detail(3, "promo"),
            region_detail(4, 12),
            name_detail(4, "own"),
        ],
    )
}

fn region_update(string_id: i64) -> DetailUpdate {
    DetailUpdate {
        string_id,
        dimension_id: REGION,
        new_value: "us".to_string(),
        new_dimension_value_id: Some(12),
        expected_version: Some(0),
    }
}

fn seed_standard(storage: &MemoryStorage) {
    storage.seed_string(account(1, "acct", "eu"));
    storage.seed_string(campaign(2, "c-launch", "acct", "eu_launch"));
    storage.seed_string(campaign(3, "c-promo", "acct", "eu_promo"));
    storage.seed_string(campaign(4, "c-own", "acct", "us_own"));
    storage.seed_string_detail(region_detail(1, 11));
    storage.seed_string_detail(name_detail(2, "launch"));
    storage.seed_string_detail(name_detail(3, "promo"));
    storage.seed_string_detail(region_detail(4, 12));
    storage.seed_string_detail(name_detail(4, "own"));
}

// ──────────────────────────────────────────────
// Impact analysis
// ──────────────────────────────────────────────

#[test]
fn test_inheriting_descendants_are_affected() {
    let report = analyze_impact(&standard_tree(), &bundle(), &matrix(), &[region_update(1)], 10)
        .unwrap();

    assert!(report.conflicts.is_empty());
    assert_eq!(report.summary.direct_updates, 1);
    assert_eq!(report.summary.inheritance_updates, 2);
    assert_eq!(report.summary.total_affected, 3);
    assert_eq!(report.summary.max_depth_reached, 1);

    let target = report.affected.iter().find(|a| a.string_id == 1).unwrap();
    assert_eq!(target.update_type, UpdateType::Direct);
    assert_eq!(target.new_value, "us");

    let launch = report.affected.iter().find(|a| a.string_id == 2).unwrap();
    assert_eq!(launch.update_type, UpdateType::Inherited);
    assert_eq!(launch.new_value, "us_launch");
    assert_eq!(launch.new_values["Region"], "us");
    assert_eq!(launch.new_values["Name"], "launch");

    // Campaign 4 has its own region: untouched.
    assert!(!report.affected.iter().any(|a| a.string_id == 4));
}

#[test]
fn test_own_override_shields_string() {
    // Campaign 4 carries its own region detail, so the account edit never
    // reaches it; campaign 2 without one is pulled in.
    let tree = StringTreeSnapshot::from_rows(
        vec![
            account(1, "acct", "eu"),
            campaign(4, "c-own", "acct", "us_own"),
            campaign(2, "c-launch", "acct", "eu_launch"),
        ],
        vec![
            region_detail(1, 11),
            region_detail(4, 12),
            name_detail(4, "own"),
            name_detail(2, "launch"),
        ],
    );

    let report =
        analyze_impact(&tree, &bundle(), &matrix(), &[region_update(1)], 10).unwrap();
    let ids: Vec<i64> = report.affected.iter().map(|a| a.string_id).collect();
    assert_eq!(ids, vec![1, 2]);
}

#[test]
fn test_max_depth_bounds_traversal() {
    let report =
        analyze_impact(&standard_tree(), &bundle(), &matrix(), &[region_update(1)], 0).unwrap();
    // Only the target itself.
    assert_eq!(report.summary.total_affected, 1);
    assert_eq!(report.summary.inheritance_updates, 0);
}

#[test]
fn test_concurrent_edit_detected_from_version() {
    let mut update = region_update(1);
    update.expected_version = Some(7);
    let report =
        analyze_impact(&standard_tree(), &bundle(), &matrix(), &[update], 10).unwrap();
    assert!(report
        .conflicts
        .iter()
        .any(|c| c.kind == ConflictKind::ConcurrentEdit && c.string_id == 1));
}

#[test]
fn test_constraint_violation_is_validation_conflict() {
    let mut update = region_update(1);
    update.new_value = "US".to_string();
    let report =
        analyze_impact(&standard_tree(), &bundle(), &matrix(), &[update], 10).unwrap();
    let conflict = report
        .conflicts
        .iter()
        .find(|c| c.kind == ConflictKind::Validation)
        .unwrap();
    assert!(conflict.message.contains("lowercase"));
}

#[test]
fn test_circular_ancestry_is_rejected() {
    let mut a = account(1, "acct", "eu");
    a.parent_uuid = Some("c-launch".to_string());
    let tree = StringTreeSnapshot::from_rows(
        vec![a, campaign(2, "c-launch", "acct", "eu_launch")],
        vec![region_detail(1, 11), name_detail(2, "launch")],
    );
    let report = analyze_impact(&tree, &bundle(), &matrix(), &[region_update(1)], 10).unwrap();
    assert!(report
        .conflicts
        .iter()
        .any(|c| c.kind == ConflictKind::CircularInheritance));
    assert!(report.affected.is_empty());
}

#[test]
fn test_duplicate_resulting_value_is_conflict() {
    // Campaign 4 already reads "us_launch"; cascading "us" onto campaign 2
    // would collide with it.
    let tree = StringTreeSnapshot::from_rows(
        vec![
            account(1, "acct", "eu"),
            campaign(2, "c-launch", "acct", "eu_launch"),
            campaign(4, "c-own", "acct", "us_launch"),
        ],
        vec![
            region_detail(1, 11),
            name_detail(2, "launch"),
            region_detail(4, 12),
            name_detail(4, "launch"),
        ],
    );
    let report = analyze_impact(&tree, &bundle(), &matrix(), &[region_update(1)], 10).unwrap();
    let conflict = report
        .conflicts
        .iter()
        .find(|c| c.kind == ConflictKind::DuplicateValue)
        .unwrap();
    assert_eq!(conflict.string_id, 2);
}

#[test]
fn test_two_affected_converging_on_same_value_conflict() {
    // Both campaigns are named "launch": after the cascade they would both
    // read "us_launch".
    let tree = StringTreeSnapshot::from_rows(
        vec![
            account(1, "acct", "eu"),
            campaign(2, "c-a", "acct", "eu_launch"),
            campaign(3, "c-b", "acct", "eu_launch2"),
        ],
        vec![
            region_detail(1, 11),
            name_detail(2, "launch"),
            name_detail(3, "launch"),
        ],
    );
    let report = analyze_impact(&tree, &bundle(), &matrix(), &[region_update(1)], 10).unwrap();
    assert!(report
        .conflicts
        .iter()
        .any(|c| c.kind == ConflictKind::DuplicateValue));
}

#[test]
fn test_unknown_inputs_are_errors() {
    let err = analyze_impact(&standard_tree(), &bundle(), &matrix(), &[region_update(99)], 10)
        .unwrap_err();
    assert!(err.to_string().contains("99"));

    let mut update = region_update(1);
    update.dimension_id = 42;
    let err =
        analyze_impact(&standard_tree(), &bundle(), &matrix(), &[update], 10).unwrap_err();
    assert!(err.to_string().contains("42"));
}

// ──────────────────────────────────────────────
// Apply path
// ──────────────────────────────────────────────

#[tokio::test]
async fn test_apply_rewrites_subtree_atomically() {
    let storage = MemoryStorage::new();
    seed_standard(&storage);

    let outcome = apply_propagation(
        &storage,
        &bundle(),
        &matrix(),
        1,
        &[region_update(1)],
        &PropagationOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(outcome.total_affected, 3);
    assert_eq!(outcome.successful_updates.len(), 3);
    assert!(outcome.failed_updates.is_empty());

    assert_eq!(storage.get_string(1).await.unwrap().value, "us");
    assert_eq!(storage.get_string(2).await.unwrap().value, "us_launch");
    assert_eq!(storage.get_string(3).await.unwrap().value, "us_promo");
    assert_eq!(storage.get_string(4).await.unwrap().value, "us_own");

    // Versions bumped, audit rows written.
    assert_eq!(storage.get_string(1).await.unwrap().version, 1);
    let mods = storage.list_modifications(2).await.unwrap();
    assert_eq!(mods.len(), 1);
    assert_eq!(mods[0].old_value, "eu_launch");
    assert_eq!(mods[0].new_value, "us_launch");
    assert_eq!(mods[0].version, 1);

    // Target's detail row now points at the new dimension value.
    let details = storage.list_string_details(1).await.unwrap();
    let region = details
        .iter()
        .find(|d| d.string_id == 1 && d.dimension_id == REGION)
        .unwrap();
    assert_eq!(region.dimension_value_id, Some(12));

    let job = storage
        .get_propagation_job(outcome.job_id.as_deref().unwrap())
        .await
        .unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.total_strings, 3);
    assert_eq!(job.processed_strings, 3);
    assert_eq!(job.failed_strings, 0);
}

#[tokio::test]
async fn test_dry_run_writes_nothing() {
    let storage = MemoryStorage::new();
    seed_standard(&storage);

    let options = PropagationOptions {
        dry_run: true,
        ..PropagationOptions::default()
    };
    let outcome = apply_propagation(
        &storage,
        &bundle(),
        &matrix(),
        1,
        &[region_update(1)],
        &options,
    )
    .await
    .unwrap();

    assert!(outcome.job_id.is_none());
    assert_eq!(outcome.total_affected, 3);
    assert_eq!(storage.get_string(1).await.unwrap().value, "eu");
    assert_eq!(storage.get_string(1).await.unwrap().version, 0);
    assert!(storage.list_modifications(1).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_conflict_leaves_every_string_unchanged() {
    // Ten campaigns; one of them ("c-dup") already reads "us_launch", so the
    // cascade onto the identically-named campaign collides mid-set.
    let storage = MemoryStorage::new();
    storage.seed_string(account(1, "acct", "eu"));
    storage.seed_string_detail(region_detail(1, 11));
    for i in 0..9i64 {
        let id = 2 + i;
        storage.seed_string(campaign(
            id,
            &format!("c-{}", i),
            "acct",
            &format!("eu_n{}", i),
        ));
        storage.seed_string_detail(name_detail(id, &format!("n{}", i)));
    }
    let mut dup = campaign(11, "c-dup", "acct", "us_n4");
    dup.version = 3;
    storage.seed_string(dup);
    storage.seed_string_detail(region_detail(11, 12));
    storage.seed_string_detail(name_detail(11, "n4"));

    let outcome = apply_propagation(
        &storage,
        &bundle(),
        &matrix(),
        1,
        &[region_update(1)],
        &PropagationOptions::default(),
    )
    .await
    .unwrap();

    assert!(outcome
        .report
        .conflicts
        .iter()
        .any(|c| c.kind == ConflictKind::DuplicateValue));
    assert!(outcome.successful_updates.is_empty());
    assert!(!outcome.failed_updates.is_empty());

    // Every string keeps its pre-apply value and version.
    assert_eq!(storage.get_string(1).await.unwrap().value, "eu");
    for i in 0..9i64 {
        let s = storage.get_string(2 + i).await.unwrap();
        assert_eq!(s.value, format!("eu_n{}", i));
        assert_eq!(s.version, 0);
    }

    let job = storage
        .get_propagation_job(outcome.job_id.as_deref().unwrap())
        .await
        .unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.failed_strings > 0);
}

#[tokio::test]
async fn test_propagate_false_touches_target_only() {
    let storage = MemoryStorage::new();
    seed_standard(&storage);

    let options = PropagationOptions {
        propagate: false,
        ..PropagationOptions::default()
    };
    let outcome = apply_propagation(
        &storage,
        &bundle(),
        &matrix(),
        1,
        &[region_update(1)],
        &options,
    )
    .await
    .unwrap();

    assert_eq!(outcome.total_affected, 1);
    assert_eq!(storage.get_string(1).await.unwrap().value, "us");
    assert_eq!(storage.get_string(2).await.unwrap().value, "eu_launch");
}
