use async_trait::async_trait;

use crate::error::{CacheError, StorageError};
use crate::record::{
    PropagationErrorRecord, PropagationJobRecord, RuleParts, StringModificationRecord,
};
use taxon_core::model::{StringDetailRecord, StringRecord};

/// The storage trait for taxon backends.
///
/// A `TaxonStorage` implementation provides durable, transactional storage
/// for rule configuration, naming strings and their per-dimension details,
/// propagation jobs, and modification audit rows.
///
/// ## Snapshot Semantics
///
/// All mutating operations take `&mut Self::Snapshot`, a type representing an
/// in-progress transaction. The lifecycle is:
///
/// 1. `begin_snapshot()` -- start a transaction, returns a `Snapshot`
/// 2. Call mutating methods with `&mut snapshot`
/// 3. `commit_snapshot(snapshot)` -- commit and consume the transaction
///    OR `abort_snapshot(snapshot)` -- roll back and consume the transaction
///
/// If a `Snapshot` is dropped without committing, the underlying transaction
/// MUST be rolled back (drop semantics on the underlying DB transaction).
///
/// ## OCC Conflict Detection
///
/// `update_string_value` performs an optimistic concurrency check:
/// `UPDATE WHERE version = expected_version`. If zero rows are affected,
/// the method returns `Err(StorageError::ConcurrentConflict { ... })`.
/// This is the safety net behind the propagation analyzer's concurrent-edit
/// conflict class.
///
/// ## Uniqueness
///
/// Backends enforce: one `string_uuid` per workspace; one final `value` per
/// `(workspace, rule, level, parent_uuid)` group; one `(string_id, version)`
/// per modification row. Violations surface as
/// `StorageError::UniqueViolation`.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` to be shared as
/// application state across async task boundaries.
#[async_trait]
pub trait TaxonStorage: Send + Sync + 'static {
    /// The snapshot (transaction) type used by this storage backend.
    ///
    /// Must be `Send` to allow passing across async task boundaries.
    type Snapshot: Send;

    // ── Snapshot lifecycle ────────────────────────────────────────────────────

    /// Begin a new snapshot (transaction).
    async fn begin_snapshot(&self) -> Result<Self::Snapshot, StorageError>;

    /// Commit a snapshot, making all mutations durable.
    ///
    /// Atomic: either every buffered mutation applies or none does. A
    /// conflict detected at commit time (e.g. a version check that no longer
    /// holds) fails the whole snapshot.
    async fn commit_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError>;

    /// Abort (roll back) a snapshot, discarding all mutations.
    async fn abort_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError>;

    // ── Rule configuration reads ──────────────────────────────────────────────

    /// Load every row backing one rule in a single pass.
    ///
    /// Returns `Err(StorageError::RuleNotFound)` if the rule does not exist.
    async fn load_rule_parts(&self, rule_id: i64) -> Result<RuleParts, StorageError>;

    /// Rule ids with at least one detail referencing the dimension.
    ///
    /// Used by the cache coordinator to fan out invalidation when a
    /// dimension or one of its values changes.
    async fn rules_using_dimension(&self, dimension_id: i64) -> Result<Vec<i64>, StorageError>;

    // ── String reads ──────────────────────────────────────────────────────────

    /// Read a string row by id.
    async fn get_string(&self, string_id: i64) -> Result<StringRecord, StorageError>;

    /// Read a string row by stable uuid within a workspace.
    async fn get_string_by_uuid(
        &self,
        workspace_id: i64,
        string_uuid: &str,
    ) -> Result<StringRecord, StorageError>;

    /// All string rows in a workspace.
    async fn list_strings(&self, workspace_id: i64) -> Result<Vec<StringRecord>, StorageError>;

    /// All string detail rows in a workspace.
    async fn list_string_details(
        &self,
        workspace_id: i64,
    ) -> Result<Vec<StringDetailRecord>, StorageError>;

    /// String rows whose `parent_uuid` is set but whose `parent_id` is not
    /// yet resolved.
    async fn list_unresolved_parent_links(
        &self,
        workspace_id: i64,
    ) -> Result<Vec<StringRecord>, StorageError>;

    /// Modification audit rows for one string, oldest first.
    async fn list_modifications(
        &self,
        string_id: i64,
    ) -> Result<Vec<StringModificationRecord>, StorageError>;

    /// Read a propagation job by id.
    async fn get_propagation_job(
        &self,
        job_id: &str,
    ) -> Result<PropagationJobRecord, StorageError>;

    // ── Mutations (within snapshot) ───────────────────────────────────────────

    /// Insert a string row.
    ///
    /// Returns `Err(StorageError::AlreadyExists)` for a duplicate id or uuid
    /// and `Err(StorageError::UniqueViolation)` when the final value collides
    /// under the same `(workspace, rule, level, parent_uuid)` group.
    async fn insert_string(
        &self,
        snapshot: &mut Self::Snapshot,
        record: StringRecord,
    ) -> Result<(), StorageError>;

    /// Insert or replace the detail row for `(string, dimension)`.
    async fn upsert_string_detail(
        &self,
        snapshot: &mut Self::Snapshot,
        record: StringDetailRecord,
    ) -> Result<(), StorageError>;

    /// Apply a version-validated UPDATE to a string's value (OCC).
    ///
    /// The UPDATE is conditional on `version = expected_version`.
    /// If zero rows are affected, returns `Err(StorageError::ConcurrentConflict)`.
    ///
    /// Returns the new version number on success.
    async fn update_string_value(
        &self,
        snapshot: &mut Self::Snapshot,
        string_id: i64,
        expected_version: i64,
        new_value: &str,
    ) -> Result<i64, StorageError>;

    /// Resolve a string's `parent_id` from its `parent_uuid`.
    async fn update_parent_link(
        &self,
        snapshot: &mut Self::Snapshot,
        string_id: i64,
        parent_id: i64,
    ) -> Result<(), StorageError>;

    /// Insert a modification audit row.
    ///
    /// Must be inserted in the SAME snapshot as the `update_string_value`
    /// call it records: no value change without an audit row.
    async fn insert_modification(
        &self,
        snapshot: &mut Self::Snapshot,
        record: StringModificationRecord,
    ) -> Result<(), StorageError>;

    /// Insert or update a propagation job row.
    async fn upsert_propagation_job(
        &self,
        snapshot: &mut Self::Snapshot,
        record: PropagationJobRecord,
    ) -> Result<(), StorageError>;

    /// Insert an error row linked to a propagation job.
    async fn insert_propagation_error(
        &self,
        snapshot: &mut Self::Snapshot,
        record: PropagationErrorRecord,
    ) -> Result<(), StorageError>;
}

/// The cache trait consumed by the rule service.
///
/// No ordering or pub/sub guarantees are required. Values are opaque JSON;
/// expiry is per-key with second granularity. Callers treat every error as
/// a miss, so implementations may fail without poisoning reads.
#[async_trait]
pub trait Cache: Send + Sync + 'static {
    /// Read a value, or None when absent or expired.
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, CacheError>;

    /// Write a value with a TTL in seconds.
    async fn set(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl_seconds: u64,
    ) -> Result<(), CacheError>;

    /// Remove a key. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Remove several keys. Absent keys are not an error.
    async fn delete_many(&self, keys: &[String]) -> Result<(), CacheError>;
}
