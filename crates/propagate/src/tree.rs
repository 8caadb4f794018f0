//! String tree snapshot -- the in-memory view of a workspace's string
//! hierarchy walked by impact analysis.
//!
//! Children are indexed by the parent's `string_uuid` (the stable link),
//! not the resolved `parent_id`, so out-of-order imports whose parent rows
//! arrived later are still walkable.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use taxon_core::model::{StringDetailRecord, StringRecord};
use taxon_core::RuleBundle;

/// Immutable snapshot of a workspace's strings and their detail rows.
#[derive(Debug, Clone, Default)]
pub struct StringTreeSnapshot {
    pub strings: BTreeMap<i64, StringRecord>,
    pub by_uuid: BTreeMap<String, i64>,
    /// Parent string_uuid -> child string ids.
    pub children: BTreeMap<String, Vec<i64>>,
    /// (string_id, dimension_id) -> detail row.
    pub details: BTreeMap<(i64, i64), StringDetailRecord>,
}

impl StringTreeSnapshot {
    pub fn from_rows(strings: Vec<StringRecord>, details: Vec<StringDetailRecord>) -> Self {
        let mut tree = StringTreeSnapshot::default();
        for record in strings {
            tree.by_uuid.insert(record.string_uuid.clone(), record.id);
            if let Some(ref parent_uuid) = record.parent_uuid {
                tree.children
                    .entry(parent_uuid.clone())
                    .or_default()
                    .push(record.id);
            }
            tree.strings.insert(record.id, record);
        }
        for detail in details {
            tree.details
                .insert((detail.string_id, detail.dimension_id), detail);
        }
        tree
    }

    pub fn children_of(&self, string_uuid: &str) -> &[i64] {
        self.children
            .get(string_uuid)
            .map(|c| c.as_slice())
            .unwrap_or(&[])
    }

    pub fn detail(&self, string_id: i64, dimension_id: i64) -> Option<&StringDetailRecord> {
        self.details.get(&(string_id, dimension_id))
    }

    /// Breadth-first descendants of a string up to `max_depth` levels down,
    /// with their depth relative to the root (root itself excluded).
    ///
    /// Nodes already seen are not revisited, so a malformed graph cannot
    /// loop the walk.
    pub fn descendants(&self, root_id: i64, max_depth: u32) -> Vec<(i64, u32)> {
        let mut out = Vec::new();
        let mut seen = BTreeSet::new();
        seen.insert(root_id);
        let mut queue = VecDeque::new();
        queue.push_back((root_id, 0u32));

        while let Some((id, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            let Some(record) = self.strings.get(&id) else {
                continue;
            };
            for &child_id in self.children_of(&record.string_uuid) {
                if seen.insert(child_id) {
                    out.push((child_id, depth + 1));
                    queue.push_back((child_id, depth + 1));
                }
            }
        }
        out
    }

    /// Walk a string's ancestry; returns the id chain (nearest first) or
    /// the offending id when the chain loops back on itself.
    pub fn ancestry(&self, string_id: i64) -> Result<Vec<i64>, i64> {
        let mut chain = Vec::new();
        let mut seen = BTreeSet::new();
        seen.insert(string_id);

        let mut current = string_id;
        loop {
            let Some(record) = self.strings.get(&current) else {
                return Ok(chain);
            };
            let Some(ref parent_uuid) = record.parent_uuid else {
                return Ok(chain);
            };
            let Some(&parent_id) = self.by_uuid.get(parent_uuid) else {
                // Unresolved parent: the chain ends here.
                return Ok(chain);
            };
            if !seen.insert(parent_id) {
                return Err(parent_id);
            }
            chain.push(parent_id);
            current = parent_id;
        }
    }

    /// The string whose own detail supplies `dimension_id` for `string_id`,
    /// searching self first, then ancestors nearest-first.
    ///
    /// `assume_own` forces (string, dimension) pairs to count as own values
    /// regardless of stored details -- the analyzer uses it to model the
    /// proposed update before anything is written.
    pub fn resolution_source(
        &self,
        string_id: i64,
        dimension_id: i64,
        assume_own: &BTreeSet<(i64, i64)>,
    ) -> Option<i64> {
        let mut candidates = vec![string_id];
        match self.ancestry(string_id) {
            Ok(chain) => candidates.extend(chain),
            Err(_) => return None,
        }
        candidates.into_iter().find(|&id| {
            assume_own.contains(&(id, dimension_id))
                || self
                    .detail(id, dimension_id)
                    .is_some_and(|d| d.has_own_value())
        })
    }

    /// Resolve the raw token for `dimension_id` on `string_id`, walking
    /// self-then-ancestors, with `overrides` taking precedence at their
    /// source string.
    pub fn resolve_value(
        &self,
        bundle: &RuleBundle,
        string_id: i64,
        dimension_id: i64,
        overrides: &BTreeMap<(i64, i64), String>,
    ) -> Option<String> {
        let mut candidates = vec![string_id];
        if let Ok(chain) = self.ancestry(string_id) {
            candidates.extend(chain);
        }
        for id in candidates {
            if let Some(value) = overrides.get(&(id, dimension_id)) {
                return Some(value.clone());
            }
            if let Some(detail) = self.detail(id, dimension_id) {
                if let Some(ref text) = detail.freetext_value {
                    if !text.is_empty() {
                        return Some(text.clone());
                    }
                }
                if let Some(value_id) = detail.dimension_value_id {
                    if let Some(value) = bundle
                        .values_for(dimension_id)
                        .iter()
                        .find(|v| v.id == value_id)
                    {
                        return Some(value.value.clone());
                    }
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn string(id: i64, uuid: &str, parent: Option<&str>, level_id: i64) -> StringRecord {
        StringRecord {
            id,
            workspace_id: 1,
            rule_id: 1,
            level_id,
            value: format!("s{}", id),
            string_uuid: uuid.to_string(),
            parent_uuid: parent.map(str::to_string),
            parent_id: None,
            version: 0,
        }
    }

    fn chain_tree() -> StringTreeSnapshot {
        StringTreeSnapshot::from_rows(
            vec![
                string(1, "a", None, 10),
                string(2, "b", Some("a"), 20),
                string(3, "c", Some("b"), 30),
                string(4, "d", Some("a"), 20),
            ],
            vec![],
        )
    }

    #[test]
    fn test_descendants_bounded_by_depth() {
        let tree = chain_tree();
        let one = tree.descendants(1, 1);
        assert_eq!(one, vec![(2, 1), (4, 1)]);

        let all = tree.descendants(1, 10);
        assert_eq!(all, vec![(2, 1), (4, 1), (3, 2)]);

        assert!(tree.descendants(3, 10).is_empty());
    }

    #[test]
    fn test_ancestry_chain() {
        let tree = chain_tree();
        assert_eq!(tree.ancestry(3).unwrap(), vec![2, 1]);
        assert_eq!(tree.ancestry(1).unwrap(), Vec::<i64>::new());
    }

    #[test]
    fn test_ancestry_detects_loop() {
        let tree = StringTreeSnapshot::from_rows(
            vec![
                string(1, "a", Some("b"), 10),
                string(2, "b", Some("a"), 20),
            ],
            vec![],
        );
        assert!(tree.ancestry(1).is_err());
    }

    #[test]
    fn test_unresolved_parent_ends_chain() {
        let tree = StringTreeSnapshot::from_rows(
            vec![string(2, "b", Some("missing"), 20)],
            vec![],
        );
        assert_eq!(tree.ancestry(2).unwrap(), Vec::<i64>::new());
    }

    #[test]
    fn test_resolution_source_prefers_own_then_nearest() {
        let mut tree = chain_tree();
        let detail = |string_id, dim| StringDetailRecord {
            id: string_id * 10 + dim,
            string_id,
            dimension_id: dim,
            dimension_value_id: Some(1),
            freetext_value: None,
        };
        tree.details.insert((1, 7), detail(1, 7));
        tree.details.insert((2, 7), detail(2, 7));

        let none = BTreeSet::new();
        // String 3 has no own value for dim 7: nearest provider is 2.
        assert_eq!(tree.resolution_source(3, 7, &none), Some(2));
        assert_eq!(tree.resolution_source(2, 7, &none), Some(2));
        assert_eq!(tree.resolution_source(4, 7, &none), Some(1));
        assert_eq!(tree.resolution_source(4, 9, &none), None);

        // An assumed own value takes precedence over ancestors.
        let mut assumed = BTreeSet::new();
        assumed.insert((3, 9));
        assert_eq!(tree.resolution_source(3, 9, &assumed), Some(3));
    }
}
