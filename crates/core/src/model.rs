//! Domain model for the naming taxonomy engine.
//!
//! Every entity is a plain serde-serializable struct with declared fields;
//! nullable columns are `Option<T>` with defined defaults. Dates are RFC 3339
//! strings at the boundary and parsed on demand.

use serde::{Deserialize, Serialize};
use time::macros::format_description;
use time::Date;

use crate::error::ConfigError;

/// Tenant boundary. All dimensions, rules, and strings belong to exactly one
/// workspace; cross-workspace references are invariant violations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: i64,
    pub name: String,
}

/// Whether a dimension is a controlled vocabulary or a free-text slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DimensionKind {
    List,
    FreeText,
}

/// A named controlled vocabulary or free-text slot, unique per workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    pub id: i64,
    pub workspace_id: i64,
    pub name: String,
    pub kind: DimensionKind,
    /// Parent dimension for value-cascade constraints.
    pub parent_dimension_id: Option<i64>,
    pub description: String,
}

impl Dimension {
    pub fn allows_freetext(&self) -> bool {
        self.kind == DimensionKind::FreeText
    }

    pub fn is_dropdown(&self) -> bool {
        self.kind == DimensionKind::List
    }
}

/// One concrete value of a list-type dimension.
///
/// `(dimension, value)` is unique within a workspace (storage-enforced).
/// `parent_value_id`, when set, must reference a value of the owning
/// dimension's parent dimension, forming the value cascade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionValue {
    pub id: i64,
    pub dimension_id: i64,
    /// Raw token used in generated strings.
    pub value: String,
    /// Display label.
    pub label: String,
    /// Tracking alias.
    pub utm: String,
    pub parent_value_id: Option<i64>,
    /// Inclusive validity start, `YYYY-MM-DD`. None = always valid.
    pub valid_from: Option<String>,
    /// Inclusive validity end, `YYYY-MM-DD`. None = never expires.
    pub valid_until: Option<String>,
    pub order: u32,
}

impl DimensionValue {
    /// Whether this value is within its temporal validity window on `date`.
    ///
    /// Unparseable bounds fail closed: a malformed `valid_from`/`valid_until`
    /// makes the value inactive rather than silently always-active.
    pub fn is_active_on(&self, date: Date) -> bool {
        let fmt = format_description!("[year]-[month]-[day]");
        if let Some(ref from) = self.valid_from {
            match Date::parse(from, &fmt) {
                Ok(from_date) if date >= from_date => {}
                _ => return false,
            }
        }
        if let Some(ref until) = self.valid_until {
            match Date::parse(until, &fmt) {
                Ok(until_date) if date <= until_date => {}
                _ => return false,
            }
        }
        true
    }
}

/// The kind of a per-dimension validation constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    MaxLength,
    MinLength,
    Regex,
    StartsWith,
    EndsWith,
    AllowedChars,
    NoSpaces,
    Lowercase,
    Uppercase,
    NoSpecialChars,
    Alphanumeric,
    Numeric,
    NoUppercase,
    NoNumbers,
    UrlSafe,
}

impl ConstraintKind {
    /// Value-bearing kinds must carry a non-empty `value`; the rest must not.
    pub fn requires_value(&self) -> bool {
        matches!(
            self,
            ConstraintKind::MaxLength
                | ConstraintKind::MinLength
                | ConstraintKind::Regex
                | ConstraintKind::StartsWith
                | ConstraintKind::EndsWith
                | ConstraintKind::AllowedChars
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConstraintKind::MaxLength => "max_length",
            ConstraintKind::MinLength => "min_length",
            ConstraintKind::Regex => "regex",
            ConstraintKind::StartsWith => "starts_with",
            ConstraintKind::EndsWith => "ends_with",
            ConstraintKind::AllowedChars => "allowed_chars",
            ConstraintKind::NoSpaces => "no_spaces",
            ConstraintKind::Lowercase => "lowercase",
            ConstraintKind::Uppercase => "uppercase",
            ConstraintKind::NoSpecialChars => "no_special_chars",
            ConstraintKind::Alphanumeric => "alphanumeric",
            ConstraintKind::Numeric => "numeric",
            ConstraintKind::NoUppercase => "no_uppercase",
            ConstraintKind::NoNumbers => "no_numbers",
            ConstraintKind::UrlSafe => "url_safe",
        }
    }
}

/// An ordered validation rule attached to a dimension.
///
/// `order` determines evaluation sequence and first-failure reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionConstraint {
    pub id: i64,
    pub dimension_id: i64,
    pub kind: ConstraintKind,
    pub value: Option<String>,
    /// Caller-supplied override for the default error message.
    pub error_message: Option<String>,
    pub order: u32,
    pub is_active: bool,
}

impl DimensionConstraint {
    /// Construct a constraint, enforcing the value-bearing invariant and the
    /// regex safety guard at creation time rather than at match time.
    pub fn new(
        id: i64,
        dimension_id: i64,
        kind: ConstraintKind,
        value: Option<String>,
        order: u32,
    ) -> Result<Self, ConfigError> {
        let has_value = value.as_deref().is_some_and(|v| !v.is_empty());
        if kind.requires_value() && !has_value {
            return Err(ConfigError::MissingConstraintValue {
                kind: kind.as_str().to_string(),
                dimension_id,
            });
        }
        if !kind.requires_value() && value.is_some() {
            return Err(ConfigError::UnexpectedConstraintValue {
                kind: kind.as_str().to_string(),
                dimension_id,
            });
        }
        if kind == ConstraintKind::Regex {
            crate::constraint::guard_regex_pattern(value.as_deref().unwrap_or(""))?;
        }
        Ok(DimensionConstraint {
            id,
            dimension_id,
            kind,
            value,
            error_message: None,
            order,
            is_active: true,
        })
    }
}

/// A naming target system (e.g. "Meta", "DV360").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    pub id: i64,
    pub name: String,
}

/// One level of a platform's naming hierarchy (e.g. Account, Campaign),
/// linked to the next level via `next_level_id` to form an ordered chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityLevel {
    pub id: i64,
    pub platform_id: i64,
    pub name: String,
    /// 1-based position in the hierarchy chain.
    pub level: u32,
    pub next_level_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleStatus {
    Active,
    Inactive,
}

/// A workspace+platform-scoped naming configuration composed of ordered
/// rule details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub id: i64,
    pub workspace_id: i64,
    pub platform_id: i64,
    pub name: String,
    pub status: RuleStatus,
    pub is_default: bool,
}

/// The assignment of one dimension to one (rule, level) pair.
///
/// `dimension_order` is 1-based and must form a contiguous, duplicate-free
/// sequence within a (rule, level) group; it is the generation and parsing
/// order. A dimension may appear at multiple levels (inheritance) but not
/// twice at the same level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDetail {
    pub id: i64,
    pub rule_id: i64,
    pub level_id: i64,
    pub dimension_id: i64,
    pub dimension_order: u32,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub suffix: String,
    #[serde(default)]
    pub delimiter: String,
    #[serde(default = "default_true")]
    pub is_required: bool,
}

fn default_true() -> bool {
    true
}

impl RuleDetail {
    /// Whether two details apply identical formatting.
    pub fn same_formatting(&self, other: &RuleDetail) -> bool {
        self.prefix == other.prefix
            && self.suffix == other.suffix
            && self.delimiter == other.delimiter
    }
}

/// One generated or externally-validated naming string instance.
///
/// `string_uuid` is the stable identity independent of the row id;
/// `parent_uuid` references another string's `string_uuid` to form the
/// hierarchy tree. `version` is the optimistic-concurrency counter checked
/// at propagation apply time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringRecord {
    pub id: i64,
    pub workspace_id: i64,
    pub rule_id: i64,
    pub level_id: i64,
    pub value: String,
    pub string_uuid: String,
    pub parent_uuid: Option<String>,
    /// Resolved parent row id; None until reconciled.
    pub parent_id: Option<i64>,
    pub version: i64,
}

/// The per-dimension value assignment backing one string's generation.
///
/// Exactly one of `dimension_value_id` (list dimensions) or `freetext_value`
/// (free-text dimensions) is set; never both, never neither for a required
/// dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringDetailRecord {
    pub id: i64,
    pub string_id: i64,
    pub dimension_id: i64,
    pub dimension_value_id: Option<i64>,
    pub freetext_value: Option<String>,
}

impl StringDetailRecord {
    /// Whether this detail carries an own (non-inherited) value assignment.
    pub fn has_own_value(&self) -> bool {
        self.dimension_value_id.is_some()
            || self.freetext_value.as_deref().is_some_and(|v| !v.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn test_constraint_kind_requires_value() {
        assert!(ConstraintKind::MaxLength.requires_value());
        assert!(ConstraintKind::Regex.requires_value());
        assert!(!ConstraintKind::Lowercase.requires_value());
        assert!(!ConstraintKind::UrlSafe.requires_value());
    }

    #[test]
    fn test_value_bearing_constraint_rejects_missing_value() {
        let err = DimensionConstraint::new(1, 10, ConstraintKind::MaxLength, None, 1).unwrap_err();
        assert!(matches!(err, ConfigError::MissingConstraintValue { .. }));

        let err = DimensionConstraint::new(
            1,
            10,
            ConstraintKind::Regex,
            Some(String::new()),
            1,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingConstraintValue { .. }));
    }

    #[test]
    fn test_flag_constraint_rejects_value() {
        let err = DimensionConstraint::new(
            1,
            10,
            ConstraintKind::NoSpaces,
            Some("x".to_string()),
            1,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::UnexpectedConstraintValue { .. }));
    }

    #[test]
    fn test_valid_constraint_defaults_active() {
        let c = DimensionConstraint::new(
            1,
            10,
            ConstraintKind::MaxLength,
            Some("50".to_string()),
            1,
        )
        .unwrap();
        assert!(c.is_active);
        assert!(c.error_message.is_none());
    }

    #[test]
    fn test_value_activity_window() {
        let v = DimensionValue {
            id: 1,
            dimension_id: 1,
            value: "eu".to_string(),
            label: "Europe".to_string(),
            utm: "eu".to_string(),
            parent_value_id: None,
            valid_from: Some("2024-01-01".to_string()),
            valid_until: Some("2024-12-31".to_string()),
            order: 1,
        };
        assert!(v.is_active_on(date!(2024 - 06 - 15)));
        assert!(!v.is_active_on(date!(2023 - 12 - 31)));
        assert!(!v.is_active_on(date!(2025 - 01 - 01)));
    }

    #[test]
    fn test_value_activity_malformed_bound_fails_closed() {
        let v = DimensionValue {
            id: 1,
            dimension_id: 1,
            value: "eu".to_string(),
            label: "Europe".to_string(),
            utm: String::new(),
            parent_value_id: None,
            valid_from: Some("not-a-date".to_string()),
            valid_until: None,
            order: 1,
        };
        assert!(!v.is_active_on(date!(2024 - 06 - 15)));
    }

    #[test]
    fn test_detail_formatting_comparison() {
        let a = RuleDetail {
            id: 1,
            rule_id: 1,
            level_id: 1,
            dimension_id: 1,
            dimension_order: 1,
            prefix: "p".to_string(),
            suffix: String::new(),
            delimiter: "_".to_string(),
            is_required: true,
        };
        let mut b = a.clone();
        b.level_id = 2;
        assert!(a.same_formatting(&b));
        b.delimiter = "-".to_string();
        assert!(!a.same_formatting(&b));
    }

    #[test]
    fn test_string_detail_own_value() {
        let mut d = StringDetailRecord {
            id: 1,
            string_id: 1,
            dimension_id: 1,
            dimension_value_id: None,
            freetext_value: None,
        };
        assert!(!d.has_own_value());
        d.freetext_value = Some(String::new());
        assert!(!d.has_own_value());
        d.dimension_value_id = Some(9);
        assert!(d.has_own_value());
    }
}
