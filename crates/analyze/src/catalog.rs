//! Dimension catalog -- the compiled, O(1)-lookup view of a rule.
//!
//! One canonical shape: ID references between sections, no duplicated
//! nested objects. The builder is pure and deterministic; callers supply
//! the `as_of` date for temporal validity so repeated builds over the same
//! bundle are bit-identical.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::Date;

use taxon_core::model::DimensionKind;
use taxon_core::RuleBundle;

/// Lightweight reference to a dimension value in another section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueRef {
    pub id: i64,
    pub value: String,
    pub label: String,
}

/// One dimension as seen through a rule: formatting is taken from the
/// dimension's first occurrence across the rule's levels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogDimension {
    pub id: i64,
    pub name: String,
    pub kind: DimensionKind,
    pub description: String,
    pub prefix: String,
    pub suffix: String,
    pub delimiter: String,
    pub allows_freetext: bool,
    pub is_dropdown: bool,
    pub parent_dimension_id: Option<i64>,
    pub value_count: usize,
    pub has_active_values: bool,
}

/// One selectable value, carrying its cascade parent when the owning
/// dimension cascades from another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogValue {
    pub id: i64,
    pub value: String,
    pub label: String,
    pub utm: String,
    pub order: u32,
    pub is_active: bool,
    pub parent_value: Option<ValueRef>,
}

/// Value-cascade relationships across the rule's dimensions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CascadeMap {
    /// Parent dimension -> child dimensions that cascade from it.
    pub child_dimensions: BTreeMap<i64, Vec<i64>>,
    /// Parent value id -> child value ids whose parent points to it.
    pub parent_to_children_values: BTreeMap<i64, Vec<i64>>,
    /// Child value id -> its parent value id.
    pub child_to_parent_values: BTreeMap<i64, i64>,
    /// Child dimension -> percentage of its values that have a parent set.
    pub cascade_coverage: BTreeMap<i64, f64>,
}

/// One dimension slot within a level template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateSlot {
    pub dimension_id: i64,
    pub dimension_order: u32,
    pub prefix: String,
    pub suffix: String,
    pub delimiter: String,
    pub is_required: bool,
}

/// The ordered dimension list for one hierarchy level, with a
/// human-readable preview. Previews are display-only: generation always
/// re-derives from live rule details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelTemplate {
    pub level_id: i64,
    pub level: u32,
    pub level_name: String,
    pub slots: Vec<TemplateSlot>,
    pub preview: String,
}

/// The compiled catalog for one rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub rule_id: i64,
    pub dimensions: BTreeMap<i64, CatalogDimension>,
    pub dimension_values: BTreeMap<i64, Vec<CatalogValue>>,
    pub cascades: CascadeMap,
    pub level_templates: Vec<LevelTemplate>,
}

/// Compile the catalog for a rule bundle.
pub fn build_catalog(bundle: &RuleBundle, as_of: Date) -> Catalog {
    let mut dimensions = BTreeMap::new();
    let mut dimension_values = BTreeMap::new();

    let value_index: BTreeMap<i64, ValueRef> = bundle
        .values
        .values()
        .flatten()
        .map(|v| {
            (
                v.id,
                ValueRef {
                    id: v.id,
                    value: v.value.clone(),
                    label: v.label.clone(),
                },
            )
        })
        .collect();

    // First occurrence of each dimension across (level, order)-sorted details
    // determines its effective formatting.
    for detail in &bundle.details {
        let Some(dim) = bundle.dimensions.get(&detail.dimension_id) else {
            continue;
        };
        if dimensions.contains_key(&dim.id) {
            continue;
        }

        let values = bundle.values_for(dim.id);
        let has_active_values = values.iter().any(|v| v.is_active_on(as_of));

        dimensions.insert(
            dim.id,
            CatalogDimension {
                id: dim.id,
                name: dim.name.clone(),
                kind: dim.kind,
                description: dim.description.clone(),
                prefix: detail.prefix.clone(),
                suffix: detail.suffix.clone(),
                delimiter: detail.delimiter.clone(),
                allows_freetext: dim.allows_freetext(),
                is_dropdown: dim.is_dropdown(),
                parent_dimension_id: dim.parent_dimension_id,
                value_count: values.len(),
                has_active_values,
            },
        );

        dimension_values.insert(
            dim.id,
            values
                .iter()
                .map(|v| CatalogValue {
                    id: v.id,
                    value: v.value.clone(),
                    label: v.label.clone(),
                    utm: v.utm.clone(),
                    order: v.order,
                    is_active: v.is_active_on(as_of),
                    parent_value: v
                        .parent_value_id
                        .and_then(|pid| value_index.get(&pid).cloned()),
                })
                .collect::<Vec<_>>(),
        );
    }

    let cascades = build_cascades(bundle, &dimensions);
    let level_templates = build_level_templates(bundle);

    Catalog {
        rule_id: bundle.rule.id,
        dimensions,
        dimension_values,
        cascades,
        level_templates,
    }
}

fn build_cascades(
    bundle: &RuleBundle,
    dimensions: &BTreeMap<i64, CatalogDimension>,
) -> CascadeMap {
    let mut map = CascadeMap::default();

    for dim in dimensions.values() {
        let Some(parent_dim_id) = dim.parent_dimension_id else {
            continue;
        };
        map.child_dimensions
            .entry(parent_dim_id)
            .or_default()
            .push(dim.id);

        let values = bundle.values_for(dim.id);
        let mut with_parent = 0usize;
        for value in values {
            if let Some(parent_value_id) = value.parent_value_id {
                with_parent += 1;
                map.parent_to_children_values
                    .entry(parent_value_id)
                    .or_default()
                    .push(value.id);
                map.child_to_parent_values.insert(value.id, parent_value_id);
            }
        }
        let coverage = if values.is_empty() {
            0.0
        } else {
            with_parent as f64 / values.len() as f64 * 100.0
        };
        map.cascade_coverage.insert(dim.id, coverage);
    }

    map
}

fn build_level_templates(bundle: &RuleBundle) -> Vec<LevelTemplate> {
    let mut templates = Vec::new();
    for level_id in bundle.level_ids_with_details() {
        let Ok(level) = bundle.level(level_id) else {
            continue;
        };
        let details = bundle.details_for_level(level_id);
        let slots = details
            .iter()
            .map(|d| TemplateSlot {
                dimension_id: d.dimension_id,
                dimension_order: d.dimension_order,
                prefix: d.prefix.clone(),
                suffix: d.suffix.clone(),
                delimiter: d.delimiter.clone(),
                is_required: d.is_required,
            })
            .collect();
        let preview = taxon_engine::level_preview(bundle, level_id).unwrap_or_default();
        templates.push(LevelTemplate {
            level_id,
            level: level.level,
            level_name: level.name.clone(),
            slots,
            preview,
        });
    }
    templates
}
