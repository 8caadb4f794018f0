//! Human-readable rule templates.
//!
//! A preview like `r[Region]-[Campaign]` shows editors how a level's string
//! is assembled. Previews are display-only: generation always re-derives
//! from live rule details.

use taxon_core::error::ConfigError;
use taxon_core::RuleBundle;

/// Build the `prefix[DimensionName]suffixdelimiter` preview for one level,
/// in dimension order.
pub fn level_preview(bundle: &RuleBundle, level_id: i64) -> Result<String, ConfigError> {
    let details = bundle.details_for_level(level_id);
    if details.is_empty() {
        return Err(ConfigError::UnknownLevel {
            rule_id: bundle.rule.id,
            level_id,
        });
    }

    let mut out = String::new();
    for detail in details {
        let dimension = bundle.dimension(detail.dimension_id)?;
        out.push_str(&detail.prefix);
        out.push('[');
        out.push_str(&dimension.name);
        out.push(']');
        out.push_str(&detail.suffix);
        out.push_str(&detail.delimiter);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use taxon_core::model::{
        Dimension, DimensionKind, EntityLevel, Platform, Rule, RuleDetail, RuleStatus,
    };

    #[test]
    fn test_level_preview() {
        let bundle = RuleBundle::assemble(
            Rule {
                id: 1,
                workspace_id: 1,
                platform_id: 1,
                name: "Display".to_string(),
                status: RuleStatus::Active,
                is_default: true,
            },
            Platform {
                id: 1,
                name: "Meta".to_string(),
            },
            vec![EntityLevel {
                id: 10,
                platform_id: 1,
                name: "Campaign".to_string(),
                level: 1,
                next_level_id: None,
            }],
            vec![
                RuleDetail {
                    id: 1,
                    rule_id: 1,
                    level_id: 10,
                    dimension_id: 1,
                    dimension_order: 1,
                    prefix: "r".to_string(),
                    suffix: String::new(),
                    delimiter: "-".to_string(),
                    is_required: true,
                },
                RuleDetail {
                    id: 2,
                    rule_id: 1,
                    level_id: 10,
                    dimension_id: 2,
                    dimension_order: 2,
                    prefix: String::new(),
                    suffix: String::new(),
                    delimiter: String::new(),
                    is_required: true,
                },
            ],
            vec![
                Dimension {
                    id: 1,
                    workspace_id: 1,
                    name: "Region".to_string(),
                    kind: DimensionKind::List,
                    parent_dimension_id: None,
                    description: String::new(),
                },
                Dimension {
                    id: 2,
                    workspace_id: 1,
                    name: "Campaign".to_string(),
                    kind: DimensionKind::FreeText,
                    parent_dimension_id: None,
                    description: String::new(),
                },
            ],
            vec![],
            vec![],
        )
        .unwrap();

        assert_eq!(level_preview(&bundle, 10).unwrap(), "r[Region]-[Campaign]");
        assert!(level_preview(&bundle, 99).is_err());
    }
}
