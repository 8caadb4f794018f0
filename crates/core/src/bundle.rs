//! The denormalized load unit for one rule.
//!
//! All pure computation (generation, parsing, catalog and inheritance
//! building, scoring, impact analysis) consumes a `RuleBundle` assembled
//! once from storage, keeping I/O at the edge of the system.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::constraint::{self, ConstraintReport};
use crate::error::ConfigError;
use crate::model::{
    Dimension, DimensionConstraint, DimensionValue, EntityLevel, Platform, Rule, RuleDetail,
};

/// A rule plus every row it depends on, with O(1) lookup indexes.
///
/// Assembly sorts details by `(hierarchy level, dimension_order)`, values by
/// `(order, label)`, and constraints by `(order, id)`, and verifies
/// cross-row invariants (workspace consistency, known references, value
/// cascades). Downstream code can therefore iterate without re-sorting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleBundle {
    pub rule: Rule,
    pub platform: Platform,
    pub levels: BTreeMap<i64, EntityLevel>,
    pub details: Vec<RuleDetail>,
    pub dimensions: BTreeMap<i64, Dimension>,
    /// dimension_id -> values, sorted by (order, label).
    pub values: BTreeMap<i64, Vec<DimensionValue>>,
    /// dimension_id -> constraints, sorted by (order, id).
    pub constraints: BTreeMap<i64, Vec<DimensionConstraint>>,
}

impl RuleBundle {
    /// Assemble and cross-check a bundle from loaded rows.
    pub fn assemble(
        rule: Rule,
        platform: Platform,
        levels: Vec<EntityLevel>,
        mut details: Vec<RuleDetail>,
        dimensions: Vec<Dimension>,
        values: Vec<DimensionValue>,
        constraints: Vec<DimensionConstraint>,
    ) -> Result<Self, ConfigError> {
        let levels: BTreeMap<i64, EntityLevel> = levels.into_iter().map(|l| (l.id, l)).collect();
        let dimensions: BTreeMap<i64, Dimension> =
            dimensions.into_iter().map(|d| (d.id, d)).collect();

        for dim in dimensions.values() {
            if dim.workspace_id != rule.workspace_id {
                return Err(ConfigError::WorkspaceMismatch {
                    rule_id: rule.id,
                    kind: "dimension",
                    ref_id: dim.id,
                });
            }
        }
        for detail in &details {
            if !dimensions.contains_key(&detail.dimension_id) {
                return Err(ConfigError::UnknownDimension {
                    dimension_id: detail.dimension_id,
                });
            }
            if !levels.contains_key(&detail.level_id) {
                return Err(ConfigError::UnknownLevel {
                    rule_id: rule.id,
                    level_id: detail.level_id,
                });
            }
        }

        let mut value_map: BTreeMap<i64, Vec<DimensionValue>> = BTreeMap::new();
        for value in values {
            value_map.entry(value.dimension_id).or_default().push(value);
        }
        for list in value_map.values_mut() {
            list.sort_by(|a, b| (a.order, &a.label).cmp(&(b.order, &b.label)));
        }

        // Cascade integrity: a parent value must belong to the dimension's
        // parent dimension.
        let value_owner: BTreeMap<i64, i64> = value_map
            .values()
            .flatten()
            .map(|v| (v.id, v.dimension_id))
            .collect();
        for (dim_id, list) in &value_map {
            let parent_dim = dimensions.get(dim_id).and_then(|d| d.parent_dimension_id);
            for value in list {
                if let Some(parent_value_id) = value.parent_value_id {
                    let owner = value_owner.get(&parent_value_id).copied();
                    if owner.is_none() || owner != parent_dim {
                        return Err(ConfigError::BrokenValueCascade {
                            dimension_id: *dim_id,
                            value_id: value.id,
                            parent_value_id,
                        });
                    }
                }
            }
        }

        let mut constraint_map: BTreeMap<i64, Vec<DimensionConstraint>> = BTreeMap::new();
        for constraint in constraints {
            constraint_map
                .entry(constraint.dimension_id)
                .or_default()
                .push(constraint);
        }
        for list in constraint_map.values_mut() {
            list.sort_by_key(|c| (c.order, c.id));
        }

        details.sort_by_key(|d| {
            let level = levels.get(&d.level_id).map(|l| l.level).unwrap_or(0);
            (level, d.dimension_order)
        });

        Ok(RuleBundle {
            rule,
            platform,
            levels,
            details,
            dimensions,
            values: value_map,
            constraints: constraint_map,
        })
    }

    /// Details for one hierarchy level, in dimension order.
    pub fn details_for_level(&self, level_id: i64) -> Vec<&RuleDetail> {
        self.details
            .iter()
            .filter(|d| d.level_id == level_id)
            .collect()
    }

    pub fn dimension(&self, dimension_id: i64) -> Result<&Dimension, ConfigError> {
        self.dimensions
            .get(&dimension_id)
            .ok_or(ConfigError::UnknownDimension { dimension_id })
    }

    pub fn level(&self, level_id: i64) -> Result<&EntityLevel, ConfigError> {
        self.levels.get(&level_id).ok_or(ConfigError::UnknownLevel {
            rule_id: self.rule.id,
            level_id,
        })
    }

    /// Hierarchy position of a level; 0 for unknown levels.
    pub fn level_number(&self, level_id: i64) -> u32 {
        self.levels.get(&level_id).map(|l| l.level).unwrap_or(0)
    }

    pub fn values_for(&self, dimension_id: i64) -> &[DimensionValue] {
        self.values
            .get(&dimension_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn constraints_for(&self, dimension_id: i64) -> &[DimensionConstraint] {
        self.constraints
            .get(&dimension_id)
            .map(|c| c.as_slice())
            .unwrap_or(&[])
    }

    /// Evaluate every active constraint of a dimension against a candidate value.
    pub fn validate_value(&self, dimension_id: i64, value: &str) -> ConstraintReport {
        constraint::validate_all(value, self.constraints_for(dimension_id))
    }

    /// Level ids that have at least one detail, in hierarchy order.
    pub fn level_ids_with_details(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self
            .levels
            .values()
            .filter(|l| self.details.iter().any(|d| d.level_id == l.id))
            .map(|l| l.id)
            .collect();
        ids.sort_by_key(|id| self.level_number(*id));
        ids
    }
}
