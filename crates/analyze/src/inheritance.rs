//! Inheritance matrix -- which dimensions reappear at later hierarchy
//! levels of the same rule, and where they inherit from.
//!
//! For a detail at level L, the nearest earlier level carrying the same
//! dimension is its immediate parent. `inherits_formatting` flags drift
//! between the two details' prefix/suffix/delimiter; it warns the editor
//! and never changes generation behavior.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use taxon_core::RuleBundle;

/// One (dimension, level) cell of the matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixEntry {
    pub detail_id: i64,
    pub dimension_id: i64,
    pub level_id: i64,
    pub level: u32,
    pub is_inherited: bool,
    /// True when prefix, suffix, and delimiter all match the immediate
    /// parent. Meaningless (false) when not inherited.
    pub inherits_formatting: bool,
    pub parent_level_id: Option<i64>,
    pub parent_level: Option<u32>,
    /// Every earlier level at which the dimension also appears, ascending.
    pub inheritance_chain: Vec<u32>,
}

/// What a level inherits, and from whom.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InheritedSlot {
    pub dimension_id: i64,
    pub from_level_id: i64,
    pub from_level: u32,
}

/// What a level provides to later levels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvidedSlot {
    pub dimension_id: i64,
    pub to_level_id: i64,
    pub to_level: u32,
}

/// The full inheritance view of one rule, with fast lookup tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InheritanceMatrix {
    pub rule_id: i64,
    pub entries: Vec<MatrixEntry>,
    /// Dimension -> hierarchy levels at which it appears, ascending.
    pub by_dimension: BTreeMap<i64, Vec<u32>>,
    /// Level id -> slots it inherits from earlier levels.
    pub by_target_level: BTreeMap<i64, Vec<InheritedSlot>>,
    /// Level id -> slots later levels pick up from it.
    pub by_source_level: BTreeMap<i64, Vec<ProvidedSlot>>,
    pub inherited_dimension_count: usize,
    pub total_dimension_count: usize,
    /// Percentage of (dimension, level) cells that are inherited.
    pub inheritance_coverage: f64,
}

impl InheritanceMatrix {
    /// Whether `dimension_id` is inherited at `level_id`.
    pub fn is_inherited_at(&self, dimension_id: i64, level_id: i64) -> bool {
        self.entries
            .iter()
            .any(|e| e.dimension_id == dimension_id && e.level_id == level_id && e.is_inherited)
    }
}

/// Build the inheritance matrix for a rule bundle.
pub fn build_matrix(bundle: &RuleBundle) -> InheritanceMatrix {
    // (level number, level id, detail) per dimension, in hierarchy order.
    let mut occurrences: BTreeMap<i64, Vec<(u32, i64, i64)>> = BTreeMap::new();
    for detail in &bundle.details {
        occurrences.entry(detail.dimension_id).or_default().push((
            bundle.level_number(detail.level_id),
            detail.level_id,
            detail.id,
        ));
    }
    for list in occurrences.values_mut() {
        list.sort_unstable();
    }

    let mut entries = Vec::new();
    let mut by_dimension: BTreeMap<i64, Vec<u32>> = BTreeMap::new();
    let mut by_target_level: BTreeMap<i64, Vec<InheritedSlot>> = BTreeMap::new();
    let mut by_source_level: BTreeMap<i64, Vec<ProvidedSlot>> = BTreeMap::new();

    for detail in &bundle.details {
        let level = bundle.level_number(detail.level_id);
        let earlier: Vec<(u32, i64, i64)> = occurrences
            .get(&detail.dimension_id)
            .map(|occ| {
                occ.iter()
                    .filter(|(l, _, _)| *l < level)
                    .copied()
                    .collect()
            })
            .unwrap_or_default();

        let parent = earlier.last().copied();
        let inheritance_chain: Vec<u32> = earlier.iter().map(|(l, _, _)| *l).collect();

        let inherits_formatting = match parent {
            Some((_, _, parent_detail_id)) => bundle
                .details
                .iter()
                .find(|d| d.id == parent_detail_id)
                .is_some_and(|p| p.same_formatting(detail)),
            None => false,
        };

        if let Some((parent_level, parent_level_id, _)) = parent {
            by_target_level
                .entry(detail.level_id)
                .or_default()
                .push(InheritedSlot {
                    dimension_id: detail.dimension_id,
                    from_level_id: parent_level_id,
                    from_level: parent_level,
                });
            by_source_level
                .entry(parent_level_id)
                .or_default()
                .push(ProvidedSlot {
                    dimension_id: detail.dimension_id,
                    to_level_id: detail.level_id,
                    to_level: level,
                });
        }

        by_dimension
            .entry(detail.dimension_id)
            .or_default()
            .push(level);

        entries.push(MatrixEntry {
            detail_id: detail.id,
            dimension_id: detail.dimension_id,
            level_id: detail.level_id,
            level,
            is_inherited: parent.is_some(),
            inherits_formatting,
            parent_level_id: parent.map(|(_, id, _)| id),
            parent_level: parent.map(|(l, _, _)| l),
            inheritance_chain,
        });
    }

    for levels in by_dimension.values_mut() {
        levels.sort_unstable();
        levels.dedup();
    }

    let inherited_dimension_count = entries.iter().filter(|e| e.is_inherited).count();
    let total_dimension_count = entries.len();
    let inheritance_coverage = if total_dimension_count == 0 {
        0.0
    } else {
        inherited_dimension_count as f64 / total_dimension_count as f64 * 100.0
    };

    InheritanceMatrix {
        rule_id: bundle.rule.id,
        entries,
        by_dimension,
        by_target_level,
        by_source_level,
        inherited_dimension_count,
        total_dimension_count,
        inheritance_coverage,
    }
}
