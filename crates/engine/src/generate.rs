//! Forward direction of the string codec: dimension values in, formatted
//! naming string out.
//!
//! Formatting is applied in strict `dimension_order`: each segment is
//! `prefix + value + suffix`, and a non-empty delimiter is appended after
//! every segment -- including the last. Delimiters are literal template
//! text, not between-segment joiners.

use std::collections::BTreeMap;

use taxon_core::error::GenerateError;
use taxon_core::validate::orders_contiguous;
use taxon_core::{ConfigError, RuleBundle};

/// Generate the naming string for one hierarchy level of a rule.
///
/// The ordering-integrity check runs on every call: configuration can
/// change between calls, and a gap or duplicate in `dimension_order`
/// invalidates the template.
pub fn generate(
    bundle: &RuleBundle,
    level_id: i64,
    values: &BTreeMap<String, String>,
) -> Result<String, GenerateError> {
    let details = bundle.details_for_level(level_id);
    if details.is_empty() {
        return Err(ConfigError::UnknownLevel {
            rule_id: bundle.rule.id,
            level_id,
        }
        .into());
    }

    let orders: Vec<u32> = details.iter().map(|d| d.dimension_order).collect();
    if !orders_contiguous(&orders) {
        return Err(GenerateError::BrokenOrdering {
            rule_id: bundle.rule.id,
            level_id,
            orders,
        });
    }

    let mut out = String::new();
    for detail in details {
        let dimension = bundle.dimension(detail.dimension_id)?;
        let value = values
            .get(&dimension.name)
            .ok_or_else(|| GenerateError::MissingDimensionValue {
                dimension: dimension.name.clone(),
            })?;

        out.push_str(&detail.prefix);
        out.push_str(value);
        out.push_str(&detail.suffix);
        if !detail.delimiter.is_empty() {
            out.push_str(&detail.delimiter);
        }
    }
    Ok(out)
}
