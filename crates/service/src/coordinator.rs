//! Cache invalidation fan-out.
//!
//! The mutation layer calls these triggers whenever a rule detail,
//! dimension, or dimension value changes; the engine never watches storage
//! itself. Invalidation is best-effort: a failing cache deletion is logged
//! and swallowed, and the 30-minute TTL bounds the staleness window.

use taxon_storage::{Cache, StorageError, TaxonStorage};

use crate::keys;

/// Drop every cached artifact derived from one rule.
pub async fn invalidate_rule<C: Cache>(cache: &C, rule_id: i64) {
    let keys = keys::all_rule_keys(rule_id);
    if let Err(e) = cache.delete_many(&keys).await {
        tracing::warn!(rule_id, error = %e, "cache invalidation failed; relying on TTL");
    }
}

/// Drop cached artifacts for every rule using a dimension.
pub async fn invalidate_dimension<S: TaxonStorage, C: Cache>(
    storage: &S,
    cache: &C,
    dimension_id: i64,
) -> Result<(), StorageError> {
    let rule_ids = storage.rules_using_dimension(dimension_id).await?;
    let keys: Vec<String> = rule_ids.iter().flat_map(|&id| keys::all_rule_keys(id)).collect();
    if let Err(e) = cache.delete_many(&keys).await {
        tracing::warn!(
            dimension_id,
            error = %e,
            "cache invalidation failed; relying on TTL"
        );
    }
    Ok(())
}
