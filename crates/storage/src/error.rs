/// All errors that can be returned by a TaxonStorage implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Optimistic concurrency control conflict -- another transaction
    /// modified the string concurrently. The expected version was not found.
    #[error("concurrent conflict on string {string_id}: expected version {expected_version}")]
    ConcurrentConflict {
        string_id: i64,
        expected_version: i64,
    },

    /// No string row with the given id.
    #[error("string not found: {string_id}")]
    StringNotFound { string_id: i64 },

    /// No string row with the given stable uuid in the workspace.
    #[error("string not found: workspace {workspace_id} uuid {string_uuid}")]
    StringUuidNotFound {
        workspace_id: i64,
        string_uuid: String,
    },

    /// No rule row with the given id.
    #[error("rule not found: {rule_id}")]
    RuleNotFound { rule_id: i64 },

    /// No propagation job with the given id.
    #[error("propagation job not found: {job_id}")]
    JobNotFound { job_id: String },

    /// A row already exists with the same primary identity.
    #[error("{kind} already exists: {id}")]
    AlreadyExists { kind: &'static str, id: String },

    /// A storage-layer unique constraint was violated.
    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    /// A backend-specific storage error (DB connection, serialization, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// All errors that can be returned by a Cache implementation.
///
/// Callers treat every cache error as a miss: reads fall through to storage
/// and best-effort invalidation logs and continues.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),
}
