//! Propagation impact analysis.
//!
//! Given proposed edits to string detail values, computes every descendant
//! string whose generated value would change, the values they would take,
//! and the conflicts that make the cascade unsafe. Analysis is pure over a
//! tree snapshot; nothing is written.
//!
//! Affectedness rule: a descendant is affected by a changed dimension iff
//! its value for that dimension resolves from the edited string (it has no
//! own override and no nearer ancestor provides one) AND the dimension is
//! inherited at the descendant's level per the inheritance matrix. This is
//! the single canonical rule; nothing is inferred from substring search.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use taxon_analyze::InheritanceMatrix;
use taxon_core::RuleBundle;
use taxon_engine::generate;

use crate::tree::StringTreeSnapshot;

/// Inheritance chains deeper than this produce a warning.
pub const DEEP_INHERITANCE_THRESHOLD: u32 = 5;
/// Targets with more direct children than this produce a warning.
pub const MANY_CHILDREN_THRESHOLD: usize = 100;

/// One proposed edit to a string's dimension-value assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailUpdate {
    pub string_id: i64,
    pub dimension_id: i64,
    /// The raw token the dimension takes after the edit.
    pub new_value: String,
    /// The dimension value row backing the token, for list dimensions.
    pub new_dimension_value_id: Option<i64>,
    /// The string version the caller last observed. When set, a differing
    /// stored version is reported as a concurrent-edit conflict.
    pub expected_version: Option<i64>,
}

/// How a string is touched by the cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateType {
    /// The string is an edit target itself.
    Direct,
    /// The string picks the change up through inheritance.
    Inherited,
}

/// One string the cascade would rewrite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffectedString {
    pub string_id: i64,
    pub string_uuid: String,
    pub level_id: i64,
    /// Distance from the edit target; 0 for targets.
    pub depth: u32,
    pub update_type: UpdateType,
    pub current_value: String,
    pub new_value: String,
    /// Dimension name -> token after substitution, as fed to the generator.
    pub new_values: BTreeMap<String, String>,
    /// The edited dimension that pulled this string into the cascade.
    pub trigger_dimension_id: i64,
    /// Version the apply path must find for its OCC update.
    pub expected_version: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    CircularInheritance,
    ConcurrentEdit,
    DuplicateValue,
    Validation,
}

/// A blocking problem; any conflict aborts the apply path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub kind: ConflictKind,
    pub string_id: i64,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    DeepInheritance,
    ManyChildren,
}

/// A non-blocking observation returned alongside the analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactWarning {
    pub kind: WarningKind,
    pub string_id: i64,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactSummary {
    pub direct_updates: usize,
    pub inheritance_updates: usize,
    pub total_affected: usize,
    pub max_depth_reached: u32,
}

/// The full dry-run result of a proposed cascade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactReport {
    pub affected: Vec<AffectedString>,
    pub warnings: Vec<ImpactWarning>,
    pub conflicts: Vec<Conflict>,
    pub summary: ImpactSummary,
}

impl ImpactReport {
    pub fn has_blocking_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }
}

/// A caller error: the analysis inputs reference unknown rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImpactError {
    UnknownString { string_id: i64 },
    UnknownDimension { dimension_id: i64 },
}

impl fmt::Display for ImpactError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImpactError::UnknownString { string_id } => {
                write!(f, "unknown string: {}", string_id)
            }
            ImpactError::UnknownDimension { dimension_id } => {
                write!(f, "unknown dimension: {}", dimension_id)
            }
        }
    }
}

impl std::error::Error for ImpactError {}

/// Analyze the impact of proposed detail updates across the string tree.
pub fn analyze_impact(
    tree: &StringTreeSnapshot,
    bundle: &RuleBundle,
    matrix: &InheritanceMatrix,
    updates: &[DetailUpdate],
    max_depth: u32,
) -> Result<ImpactReport, ImpactError> {
    for update in updates {
        if !tree.strings.contains_key(&update.string_id) {
            return Err(ImpactError::UnknownString {
                string_id: update.string_id,
            });
        }
        if !bundle.dimensions.contains_key(&update.dimension_id) {
            return Err(ImpactError::UnknownDimension {
                dimension_id: update.dimension_id,
            });
        }
    }

    let assume_own: BTreeSet<(i64, i64)> = updates
        .iter()
        .map(|u| (u.string_id, u.dimension_id))
        .collect();
    let overrides: BTreeMap<(i64, i64), String> = updates
        .iter()
        .map(|u| ((u.string_id, u.dimension_id), u.new_value.clone()))
        .collect();

    let mut conflicts = Vec::new();
    let mut warnings = Vec::new();
    // string id -> (depth, update type, trigger dimension); Direct and
    // shallower depths win.
    let mut touched: BTreeMap<i64, (u32, UpdateType, i64)> = BTreeMap::new();
    let mut max_depth_reached = 0u32;

    for update in updates {
        let target = &tree.strings[&update.string_id];

        if let Err(loop_id) = tree.ancestry(target.id) {
            conflicts.push(Conflict {
                kind: ConflictKind::CircularInheritance,
                string_id: target.id,
                message: format!(
                    "ancestry of string {} loops back through string {}",
                    target.id, loop_id
                ),
            });
            continue;
        }

        if let Some(expected) = update.expected_version {
            if expected != target.version {
                conflicts.push(Conflict {
                    kind: ConflictKind::ConcurrentEdit,
                    string_id: target.id,
                    message: format!(
                        "string {} is at version {}, caller expected {}",
                        target.id, target.version, expected
                    ),
                });
            }
        }

        let report = bundle.validate_value(update.dimension_id, &update.new_value);
        if !report.is_valid {
            let reasons: Vec<&str> =
                report.errors.iter().map(|e| e.message.as_str()).collect();
            conflicts.push(Conflict {
                kind: ConflictKind::Validation,
                string_id: target.id,
                message: format!(
                    "value '{}' fails constraints: {}",
                    update.new_value,
                    reasons.join("; ")
                ),
            });
        }

        touched
            .entry(target.id)
            .and_modify(|e| {
                e.0 = 0;
                e.1 = UpdateType::Direct;
            })
            .or_insert((0, UpdateType::Direct, update.dimension_id));

        let direct_children = tree.children_of(&target.string_uuid).len();
        if direct_children > MANY_CHILDREN_THRESHOLD {
            warnings.push(ImpactWarning {
                kind: WarningKind::ManyChildren,
                string_id: target.id,
                message: format!(
                    "string {} has {} direct children",
                    target.id, direct_children
                ),
            });
        }

        let mut deepest_affected = 0u32;
        for (descendant_id, depth) in tree.descendants(target.id, max_depth) {
            max_depth_reached = max_depth_reached.max(depth);
            let Some(descendant) = tree.strings.get(&descendant_id) else {
                continue;
            };

            // Hierarchy levels must strictly descend parent -> child.
            if let Some(parent_id) = descendant
                .parent_uuid
                .as_deref()
                .and_then(|uuid| tree.by_uuid.get(uuid))
            {
                if let Some(parent) = tree.strings.get(parent_id) {
                    if bundle.level_number(descendant.level_id)
                        <= bundle.level_number(parent.level_id)
                    {
                        conflicts.push(Conflict {
                            kind: ConflictKind::CircularInheritance,
                            string_id: descendant.id,
                            message: format!(
                                "string {} at level {} is not below its parent's level {}",
                                descendant.id,
                                bundle.level_number(descendant.level_id),
                                bundle.level_number(parent.level_id)
                            ),
                        });
                        continue;
                    }
                }
            }

            let inherited_here =
                matrix.is_inherited_at(update.dimension_id, descendant.level_id);
            let resolves_from_target = tree.resolution_source(
                descendant_id,
                update.dimension_id,
                &assume_own,
            ) == Some(target.id);

            if inherited_here && resolves_from_target {
                deepest_affected = deepest_affected.max(depth);
                touched
                    .entry(descendant_id)
                    .and_modify(|e| e.0 = e.0.min(depth))
                    .or_insert((depth, UpdateType::Inherited, update.dimension_id));
            }
        }

        if deepest_affected > DEEP_INHERITANCE_THRESHOLD {
            warnings.push(ImpactWarning {
                kind: WarningKind::DeepInheritance,
                string_id: target.id,
                message: format!(
                    "cascade from string {} reaches {} levels deep",
                    target.id, deepest_affected
                ),
            });
        }
    }

    // Regenerate every touched string with the proposed values substituted.
    let mut affected = Vec::new();
    for (&string_id, &(depth, update_type, trigger_dimension_id)) in &touched {
        let Some(record) = tree.strings.get(&string_id) else {
            continue;
        };

        let mut new_values = BTreeMap::new();
        let mut unresolved = None;
        for detail in bundle.details_for_level(record.level_id) {
            let Ok(dimension) = bundle.dimension(detail.dimension_id) else {
                continue;
            };
            match tree.resolve_value(bundle, string_id, detail.dimension_id, &overrides) {
                Some(value) => {
                    new_values.insert(dimension.name.clone(), value);
                }
                None if detail.is_required => {
                    unresolved = Some(dimension.name.clone());
                    break;
                }
                None => {
                    new_values.insert(dimension.name.clone(), String::new());
                }
            }
        }
        if let Some(dimension) = unresolved {
            conflicts.push(Conflict {
                kind: ConflictKind::Validation,
                string_id,
                message: format!(
                    "string {} cannot regenerate: no value for dimension '{}'",
                    string_id, dimension
                ),
            });
            continue;
        }

        match generate(bundle, record.level_id, &new_values) {
            Ok(new_value) => affected.push(AffectedString {
                string_id,
                string_uuid: record.string_uuid.clone(),
                level_id: record.level_id,
                depth,
                update_type,
                current_value: record.value.clone(),
                new_value,
                new_values,
                trigger_dimension_id,
                expected_version: record.version,
            }),
            Err(e) => conflicts.push(Conflict {
                kind: ConflictKind::Validation,
                string_id,
                message: format!("string {} cannot regenerate: {}", string_id, e),
            }),
        }
    }

    detect_duplicates(tree, &affected, &mut conflicts);

    let direct_updates = affected
        .iter()
        .filter(|a| a.update_type == UpdateType::Direct)
        .count();
    let inheritance_updates = affected.len() - direct_updates;
    let summary = ImpactSummary {
        direct_updates,
        inheritance_updates,
        total_affected: affected.len(),
        max_depth_reached,
    };

    Ok(ImpactReport {
        affected,
        warnings,
        conflicts,
        summary,
    })
}

/// Two strings resolving to an identical final value under the same parent
/// and level violate the uniqueness invariant.
fn detect_duplicates(
    tree: &StringTreeSnapshot,
    affected: &[AffectedString],
    conflicts: &mut Vec<Conflict>,
) {
    let affected_ids: BTreeSet<i64> = affected.iter().map(|a| a.string_id).collect();

    // (parent_uuid, level_id, value) -> first claimant.
    let mut claimed: BTreeMap<(Option<String>, i64, String), i64> = BTreeMap::new();

    for a in affected {
        let parent_uuid = tree
            .strings
            .get(&a.string_id)
            .and_then(|s| s.parent_uuid.clone());
        let key = (parent_uuid.clone(), a.level_id, a.new_value.clone());
        if let Some(&other) = claimed.get(&key) {
            conflicts.push(Conflict {
                kind: ConflictKind::DuplicateValue,
                string_id: a.string_id,
                message: format!(
                    "strings {} and {} would both become '{}' under the same parent",
                    other, a.string_id, a.new_value
                ),
            });
            continue;
        }
        claimed.insert(key, a.string_id);

        // Compare against untouched siblings keeping their current value.
        let collision = tree.strings.values().find(|s| {
            !affected_ids.contains(&s.id)
                && s.parent_uuid == parent_uuid
                && s.level_id == a.level_id
                && s.value == a.new_value
        });
        if let Some(sibling) = collision {
            conflicts.push(Conflict {
                kind: ConflictKind::DuplicateValue,
                string_id: a.string_id,
                message: format!(
                    "string {} would become '{}', colliding with sibling {}",
                    a.string_id, a.new_value, sibling.id
                ),
            });
        }
    }
}
