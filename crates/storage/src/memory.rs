//! In-memory reference backend.
//!
//! `MemoryStorage` implements the full snapshot contract: mutations are
//! buffered per snapshot and replayed atomically at commit against the live
//! state, re-validating every check (OCC versions, uniqueness) so that a
//! snapshot racing a committed writer fails as a whole. Dropping a snapshot
//! discards its buffer.
//!
//! `MemoryCache` implements the cache trait with per-key deadlines and
//! lazy expiry.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::error::{CacheError, StorageError};
use crate::record::{
    PropagationErrorRecord, PropagationJobRecord, RuleParts, StringModificationRecord,
};
use crate::traits::{Cache, TaxonStorage};
use taxon_core::model::{StringDetailRecord, StringRecord};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    rules: BTreeMap<i64, RuleParts>,
    strings: BTreeMap<i64, StringRecord>,
    /// Keyed by (string_id, dimension_id).
    details: BTreeMap<(i64, i64), StringDetailRecord>,
    modifications: Vec<StringModificationRecord>,
    jobs: BTreeMap<String, PropagationJobRecord>,
    job_errors: Vec<PropagationErrorRecord>,
}

#[derive(Debug, Clone)]
enum Op {
    InsertString(StringRecord),
    UpsertStringDetail(StringDetailRecord),
    UpdateStringValue {
        string_id: i64,
        expected_version: i64,
        new_value: String,
    },
    UpdateParentLink {
        string_id: i64,
        parent_id: i64,
    },
    InsertModification(StringModificationRecord),
    UpsertJob(PropagationJobRecord),
    InsertJobError(PropagationErrorRecord),
}

/// An in-progress transaction: buffered ops plus a working copy for
/// read-your-writes validation.
pub struct MemorySnapshot {
    ops: Vec<Op>,
    working: MemoryState,
}

/// In-memory storage backend with real snapshot and OCC semantics.
#[derive(Default)]
pub struct MemoryStorage {
    state: Mutex<MemoryState>,
    rule_loads: AtomicU64,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a rule and all its parts, bypassing the snapshot lifecycle.
    pub fn seed_rule(&self, parts: RuleParts) {
        let mut state = self.state.lock().unwrap();
        state.rules.insert(parts.rule.id, parts);
    }

    /// Seed a string row, bypassing the snapshot lifecycle.
    pub fn seed_string(&self, record: StringRecord) {
        let mut state = self.state.lock().unwrap();
        state.strings.insert(record.id, record);
    }

    /// Seed a string detail row, bypassing the snapshot lifecycle.
    pub fn seed_string_detail(&self, record: StringDetailRecord) {
        let mut state = self.state.lock().unwrap();
        state
            .details
            .insert((record.string_id, record.dimension_id), record);
    }

    /// Number of `load_rule_parts` calls served so far.
    ///
    /// Lets tests assert that cached reads do not reach storage.
    pub fn rule_load_count(&self) -> u64 {
        self.rule_loads.load(Ordering::Relaxed)
    }
}

/// Apply one op to a state, re-validating every check.
fn apply_op(state: &mut MemoryState, op: &Op) -> Result<(), StorageError> {
    match op {
        Op::InsertString(record) => {
            if state.strings.contains_key(&record.id) {
                return Err(StorageError::AlreadyExists {
                    kind: "string",
                    id: record.id.to_string(),
                });
            }
            if state.strings.values().any(|s| {
                s.workspace_id == record.workspace_id && s.string_uuid == record.string_uuid
            }) {
                return Err(StorageError::AlreadyExists {
                    kind: "string_uuid",
                    id: record.string_uuid.clone(),
                });
            }
            check_value_unique(state, record, None)?;
            state.strings.insert(record.id, record.clone());
            Ok(())
        }
        Op::UpsertStringDetail(record) => {
            if !state.strings.contains_key(&record.string_id) {
                return Err(StorageError::StringNotFound {
                    string_id: record.string_id,
                });
            }
            state
                .details
                .insert((record.string_id, record.dimension_id), record.clone());
            Ok(())
        }
        Op::UpdateStringValue {
            string_id,
            expected_version,
            new_value,
        } => {
            let current = state
                .strings
                .get(string_id)
                .ok_or(StorageError::StringNotFound {
                    string_id: *string_id,
                })?
                .clone();
            if current.version != *expected_version {
                return Err(StorageError::ConcurrentConflict {
                    string_id: *string_id,
                    expected_version: *expected_version,
                });
            }
            let mut updated = current;
            updated.value = new_value.clone();
            check_value_unique(state, &updated, Some(*string_id))?;
            updated.version += 1;
            state.strings.insert(*string_id, updated);
            Ok(())
        }
        Op::UpdateParentLink {
            string_id,
            parent_id,
        } => {
            let record = state
                .strings
                .get_mut(string_id)
                .ok_or(StorageError::StringNotFound {
                    string_id: *string_id,
                })?;
            record.parent_id = Some(*parent_id);
            Ok(())
        }
        Op::InsertModification(record) => {
            if state
                .modifications
                .iter()
                .any(|m| m.string_id == record.string_id && m.version == record.version)
            {
                return Err(StorageError::UniqueViolation {
                    constraint: format!(
                        "modification ({}, {})",
                        record.string_id, record.version
                    ),
                });
            }
            state.modifications.push(record.clone());
            Ok(())
        }
        Op::UpsertJob(record) => {
            state.jobs.insert(record.id.clone(), record.clone());
            Ok(())
        }
        Op::InsertJobError(record) => {
            state.job_errors.push(record.clone());
            Ok(())
        }
    }
}

/// One final value per (workspace, rule, level, parent_uuid) group.
fn check_value_unique(
    state: &MemoryState,
    candidate: &StringRecord,
    exclude_id: Option<i64>,
) -> Result<(), StorageError> {
    let collision = state.strings.values().any(|s| {
        Some(s.id) != exclude_id
            && s.workspace_id == candidate.workspace_id
            && s.rule_id == candidate.rule_id
            && s.level_id == candidate.level_id
            && s.parent_uuid == candidate.parent_uuid
            && s.value == candidate.value
    });
    if collision {
        return Err(StorageError::UniqueViolation {
            constraint: format!(
                "string value '{}' under parent {:?}",
                candidate.value, candidate.parent_uuid
            ),
        });
    }
    Ok(())
}

impl MemoryStorage {
    fn buffer(
        &self,
        snapshot: &mut MemorySnapshot,
        op: Op,
    ) -> Result<(), StorageError> {
        apply_op(&mut snapshot.working, &op)?;
        snapshot.ops.push(op);
        Ok(())
    }
}

#[async_trait]
impl TaxonStorage for MemoryStorage {
    type Snapshot = MemorySnapshot;

    async fn begin_snapshot(&self) -> Result<MemorySnapshot, StorageError> {
        let state = self.state.lock().unwrap();
        Ok(MemorySnapshot {
            ops: Vec::new(),
            working: state.clone(),
        })
    }

    async fn commit_snapshot(&self, snapshot: MemorySnapshot) -> Result<(), StorageError> {
        let mut state = self.state.lock().unwrap();
        // Replay against the live state so a concurrently committed writer
        // fails this snapshot's version checks. All-or-nothing: apply to a
        // scratch copy, swap in only on full success.
        let mut scratch = state.clone();
        for op in &snapshot.ops {
            apply_op(&mut scratch, op)?;
        }
        *state = scratch;
        Ok(())
    }

    async fn abort_snapshot(&self, _snapshot: MemorySnapshot) -> Result<(), StorageError> {
        Ok(())
    }

    async fn load_rule_parts(&self, rule_id: i64) -> Result<RuleParts, StorageError> {
        self.rule_loads.fetch_add(1, Ordering::Relaxed);
        let state = self.state.lock().unwrap();
        state
            .rules
            .get(&rule_id)
            .cloned()
            .ok_or(StorageError::RuleNotFound { rule_id })
    }

    async fn rules_using_dimension(&self, dimension_id: i64) -> Result<Vec<i64>, StorageError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .rules
            .values()
            .filter(|p| p.details.iter().any(|d| d.dimension_id == dimension_id))
            .map(|p| p.rule.id)
            .collect())
    }

    async fn get_string(&self, string_id: i64) -> Result<StringRecord, StorageError> {
        let state = self.state.lock().unwrap();
        state
            .strings
            .get(&string_id)
            .cloned()
            .ok_or(StorageError::StringNotFound { string_id })
    }

    async fn get_string_by_uuid(
        &self,
        workspace_id: i64,
        string_uuid: &str,
    ) -> Result<StringRecord, StorageError> {
        let state = self.state.lock().unwrap();
        state
            .strings
            .values()
            .find(|s| s.workspace_id == workspace_id && s.string_uuid == string_uuid)
            .cloned()
            .ok_or_else(|| StorageError::StringUuidNotFound {
                workspace_id,
                string_uuid: string_uuid.to_string(),
            })
    }

    async fn list_strings(&self, workspace_id: i64) -> Result<Vec<StringRecord>, StorageError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .strings
            .values()
            .filter(|s| s.workspace_id == workspace_id)
            .cloned()
            .collect())
    }

    async fn list_string_details(
        &self,
        workspace_id: i64,
    ) -> Result<Vec<StringDetailRecord>, StorageError> {
        let state = self.state.lock().unwrap();
        let ids: std::collections::BTreeSet<i64> = state
            .strings
            .values()
            .filter(|s| s.workspace_id == workspace_id)
            .map(|s| s.id)
            .collect();
        Ok(state
            .details
            .values()
            .filter(|d| ids.contains(&d.string_id))
            .cloned()
            .collect())
    }

    async fn list_unresolved_parent_links(
        &self,
        workspace_id: i64,
    ) -> Result<Vec<StringRecord>, StorageError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .strings
            .values()
            .filter(|s| {
                s.workspace_id == workspace_id && s.parent_uuid.is_some() && s.parent_id.is_none()
            })
            .cloned()
            .collect())
    }

    async fn list_modifications(
        &self,
        string_id: i64,
    ) -> Result<Vec<StringModificationRecord>, StorageError> {
        let state = self.state.lock().unwrap();
        let mut rows: Vec<StringModificationRecord> = state
            .modifications
            .iter()
            .filter(|m| m.string_id == string_id)
            .cloned()
            .collect();
        rows.sort_by_key(|m| m.version);
        Ok(rows)
    }

    async fn get_propagation_job(
        &self,
        job_id: &str,
    ) -> Result<PropagationJobRecord, StorageError> {
        let state = self.state.lock().unwrap();
        state
            .jobs
            .get(job_id)
            .cloned()
            .ok_or_else(|| StorageError::JobNotFound {
                job_id: job_id.to_string(),
            })
    }

    async fn insert_string(
        &self,
        snapshot: &mut MemorySnapshot,
        record: StringRecord,
    ) -> Result<(), StorageError> {
        self.buffer(snapshot, Op::InsertString(record))
    }

    async fn upsert_string_detail(
        &self,
        snapshot: &mut MemorySnapshot,
        record: StringDetailRecord,
    ) -> Result<(), StorageError> {
        self.buffer(snapshot, Op::UpsertStringDetail(record))
    }

    async fn update_string_value(
        &self,
        snapshot: &mut MemorySnapshot,
        string_id: i64,
        expected_version: i64,
        new_value: &str,
    ) -> Result<i64, StorageError> {
        self.buffer(
            snapshot,
            Op::UpdateStringValue {
                string_id,
                expected_version,
                new_value: new_value.to_string(),
            },
        )?;
        Ok(expected_version + 1)
    }

    async fn update_parent_link(
        &self,
        snapshot: &mut MemorySnapshot,
        string_id: i64,
        parent_id: i64,
    ) -> Result<(), StorageError> {
        self.buffer(
            snapshot,
            Op::UpdateParentLink {
                string_id,
                parent_id,
            },
        )
    }

    async fn insert_modification(
        &self,
        snapshot: &mut MemorySnapshot,
        record: StringModificationRecord,
    ) -> Result<(), StorageError> {
        self.buffer(snapshot, Op::InsertModification(record))
    }

    async fn upsert_propagation_job(
        &self,
        snapshot: &mut MemorySnapshot,
        record: PropagationJobRecord,
    ) -> Result<(), StorageError> {
        self.buffer(snapshot, Op::UpsertJob(record))
    }

    async fn insert_propagation_error(
        &self,
        snapshot: &mut MemorySnapshot,
        record: PropagationErrorRecord,
    ) -> Result<(), StorageError> {
        self.buffer(snapshot, Op::InsertJobError(record))
    }
}

/// In-memory cache with per-key deadlines and lazy expiry.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<BTreeMap<String, (serde_json::Value, Instant)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .unwrap()
            .values()
            .filter(|(_, deadline)| *deadline > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, CacheError> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some((value, deadline)) if *deadline > Instant::now() => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl_seconds: u64,
    ) -> Result<(), CacheError> {
        let deadline = Instant::now() + Duration::from_secs(ttl_seconds);
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (value, deadline));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }

    async fn delete_many(&self, keys: &[String]) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().unwrap();
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn string(id: i64, uuid: &str, value: &str) -> StringRecord {
        StringRecord {
            id,
            workspace_id: 1,
            rule_id: 1,
            level_id: 10,
            value: value.to_string(),
            string_uuid: uuid.to_string(),
            parent_uuid: None,
            parent_id: None,
            version: 0,
        }
    }

    #[tokio::test]
    async fn test_uncommitted_writes_invisible() {
        let storage = MemoryStorage::new();
        let mut snap = storage.begin_snapshot().await.unwrap();
        storage
            .insert_string(&mut snap, string(1, "u1", "eu_launch"))
            .await
            .unwrap();

        assert!(storage.get_string(1).await.is_err());
        storage.commit_snapshot(snap).await.unwrap();
        assert_eq!(storage.get_string(1).await.unwrap().value, "eu_launch");
    }

    #[tokio::test]
    async fn test_dropped_snapshot_discards_writes() {
        let storage = MemoryStorage::new();
        {
            let mut snap = storage.begin_snapshot().await.unwrap();
            storage
                .insert_string(&mut snap, string(1, "u1", "eu_launch"))
                .await
                .unwrap();
            // dropped without commit
        }
        assert!(storage.get_string(1).await.is_err());
    }

    #[tokio::test]
    async fn test_occ_conflict_between_snapshots() {
        let storage = MemoryStorage::new();
        storage.seed_string(string(1, "u1", "eu_launch"));

        let mut a = storage.begin_snapshot().await.unwrap();
        let mut b = storage.begin_snapshot().await.unwrap();
        storage
            .update_string_value(&mut a, 1, 0, "eu_relaunch")
            .await
            .unwrap();
        storage.commit_snapshot(a).await.unwrap();

        // b validated against its own working copy, but the commit replay
        // sees version 1 and fails.
        storage
            .update_string_value(&mut b, 1, 0, "eu_other")
            .await
            .unwrap();
        let err = storage.commit_snapshot(b).await.unwrap_err();
        assert!(matches!(err, StorageError::ConcurrentConflict { .. }));
        assert_eq!(storage.get_string(1).await.unwrap().value, "eu_relaunch");
    }

    #[tokio::test]
    async fn test_value_uniqueness_within_sibling_group() {
        let storage = MemoryStorage::new();
        storage.seed_string(string(1, "u1", "eu_launch"));

        let mut snap = storage.begin_snapshot().await.unwrap();
        let err = storage
            .insert_string(&mut snap, string(2, "u2", "eu_launch"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_cache_expiry_and_delete_many() {
        let cache = MemoryCache::new();
        cache
            .set("a", serde_json::json!(1), 60)
            .await
            .unwrap();
        cache
            .set("b", serde_json::json!(2), 0)
            .await
            .unwrap();

        assert_eq!(cache.get("a").await.unwrap(), Some(serde_json::json!(1)));
        assert_eq!(cache.get("b").await.unwrap(), None);

        cache
            .delete_many(&["a".to_string(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(cache.get("a").await.unwrap(), None);
    }
}
