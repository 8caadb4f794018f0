//! Reverse direction of the string codec: externally-supplied naming string
//! in, dimension values out.
//!
//! Parsing walks the same `dimension_order` as generation. A configured
//! delimiter that is absent from the remainder is a hard error for every
//! detail except the last; a mismatched prefix or suffix is NOT an error
//! (externally-sourced strings may not match internal formatting exactly,
//! so the raw segment is kept). The last detail's delimiter, when present,
//! is split off the tail; anything after it is an incomplete parse.

use std::collections::BTreeMap;

use taxon_core::error::ParseError;
use taxon_core::validate::orders_contiguous;
use taxon_core::{ConfigError, RuleBundle};

/// Recover dimension values from a naming string using the rule's template.
///
/// Inverse of [`crate::generate::generate`] for any configuration with
/// non-empty, non-overlapping delimiters and values free of delimiter,
/// prefix, and suffix substrings.
pub fn parse(
    input: &str,
    bundle: &RuleBundle,
    level_id: i64,
) -> Result<BTreeMap<String, String>, ParseError> {
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
        return Err(ParseError::BrokenOrdering {
            rule_id: bundle.rule.id,
            level_id,
            orders,
        });
    }

    let mut out = BTreeMap::new();
    let mut remainder = input;

    let last_index = details.len() - 1;
    for (i, detail) in details.iter().enumerate() {
        let dimension = bundle.dimension(detail.dimension_id)?;

        let mut segment;
        if i < last_index {
            if detail.delimiter.is_empty() {
                // No boundary to split on: the detail consumes the remainder
                // and later details see an empty input. Such configurations
                // cannot round-trip and fail below on required dimensions.
                segment = remainder;
                remainder = "";
            } else {
                match remainder.split_once(detail.delimiter.as_str()) {
                    Some((before, after)) => {
                        segment = before;
                        remainder = after;
                    }
                    None => {
                        return Err(ParseError::DelimiterNotFound {
                            dimension: dimension.name.clone(),
                            delimiter: detail.delimiter.clone(),
                        });
                    }
                }
            }
        } else {
            // Last detail: generation appends its delimiter too, so split it
            // off the tail when present. A missing trailing delimiter is
            // tolerated for externally-sourced strings.
            if !detail.delimiter.is_empty() {
                match remainder.split_once(detail.delimiter.as_str()) {
                    Some((before, after)) => {
                        segment = before;
                        remainder = after;
                    }
                    None => {
                        segment = remainder;
                        remainder = "";
                    }
                }
            } else {
                segment = remainder;
                remainder = "";
            }
        }

        // Strip formatting only where it actually matches.
        if !detail.prefix.is_empty() {
            if let Some(stripped) = segment.strip_prefix(detail.prefix.as_str()) {
                segment = stripped;
            }
        }
        if !detail.suffix.is_empty() {
            if let Some(stripped) = segment.strip_suffix(detail.suffix.as_str()) {
                segment = stripped;
            }
        }

        if segment.is_empty() && detail.is_required {
            return Err(ParseError::MissingRequired {
                dimension: dimension.name.clone(),
            });
        }

        out.insert(dimension.name.clone(), segment.to_string());
    }

    if !remainder.is_empty() {
        return Err(ParseError::IncompleteParse {
            remainder: remainder.to_string(),
        });
    }

    Ok(out)
}
