//! Cache key derivation.
//!
//! One key per cached artifact per rule. Every invalidation path derives
//! the same keys through these functions; nothing formats keys inline.

/// TTL for all rule-derived cache entries: 30 minutes.
pub const CACHE_TTL_SECONDS: u64 = 1800;

pub fn catalog_key(rule_id: i64) -> String {
    format!("dimension_catalog:{}", rule_id)
}

pub fn matrix_key(rule_id: i64) -> String {
    format!("inheritance_matrix:{}", rule_id)
}

pub fn validation_key(rule_id: i64) -> String {
    format!("rule_validation:{}", rule_id)
}

/// Every key invalidated when anything under a rule changes.
pub fn all_rule_keys(rule_id: i64) -> Vec<String> {
    vec![
        catalog_key(rule_id),
        matrix_key(rule_id),
        validation_key(rule_id),
    ]
}
