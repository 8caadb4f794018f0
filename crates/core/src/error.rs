//! Error taxonomy for the rule configuration engine.
//!
//! `ConfigError` is fatal to the call and not retryable: the rule or
//! constraint data itself is malformed. `GenerateError` and `ParseError`
//! are expected failures surfaced to the caller verbatim. Every variant
//! names the offending dimension, level, or rule so the caller can present
//! an actionable message.

use std::fmt;

/// A configuration-integrity failure. Not retryable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A value-bearing constraint kind was created without a value.
    MissingConstraintValue { kind: String, dimension_id: i64 },
    /// A non-value-bearing constraint kind was created with a value.
    UnexpectedConstraintValue { kind: String, dimension_id: i64 },
    /// A regex constraint pattern matches a known catastrophic-backtracking shape.
    UnsafeRegexPattern { pattern: String, reason: String },
    /// A regex constraint pattern failed to compile.
    InvalidRegexPattern { pattern: String, message: String },
    /// A referenced row belongs to a different workspace than the rule.
    WorkspaceMismatch {
        rule_id: i64,
        kind: &'static str,
        ref_id: i64,
    },
    /// The rule has no details for the requested hierarchy level.
    UnknownLevel { rule_id: i64, level_id: i64 },
    /// A rule detail references a dimension missing from the bundle.
    UnknownDimension { dimension_id: i64 },
    /// A dimension value references a parent value outside the parent dimension.
    BrokenValueCascade {
        dimension_id: i64,
        value_id: i64,
        parent_value_id: i64,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingConstraintValue { kind, dimension_id } => {
                write!(
                    f,
                    "constraint kind '{}' on dimension {} requires a value",
                    kind, dimension_id
                )
            }
            ConfigError::UnexpectedConstraintValue { kind, dimension_id } => {
                write!(
                    f,
                    "constraint kind '{}' on dimension {} must not carry a value",
                    kind, dimension_id
                )
            }
            ConfigError::UnsafeRegexPattern { pattern, reason } => {
                write!(f, "unsafe regex pattern '{}': {}", pattern, reason)
            }
            ConfigError::InvalidRegexPattern { pattern, message } => {
                write!(f, "invalid regex pattern '{}': {}", pattern, message)
            }
            ConfigError::WorkspaceMismatch {
                rule_id,
                kind,
                ref_id,
            } => {
                write!(
                    f,
                    "{} {} belongs to a different workspace than rule {}",
                    kind, ref_id, rule_id
                )
            }
            ConfigError::UnknownLevel { rule_id, level_id } => {
                write!(f, "rule {} has no details for level {}", rule_id, level_id)
            }
            ConfigError::UnknownDimension { dimension_id } => {
                write!(f, "unknown dimension: {}", dimension_id)
            }
            ConfigError::BrokenValueCascade {
                dimension_id,
                value_id,
                parent_value_id,
            } => {
                write!(
                    f,
                    "value {} of dimension {} cascades from value {} outside the parent dimension",
                    value_id, dimension_id, parent_value_id
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// A string generation failure. Expected, surfaced to the caller verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerateError {
    /// The rule's dimension_order values for this level are not exactly 1..N.
    BrokenOrdering {
        rule_id: i64,
        level_id: i64,
        orders: Vec<u32>,
    },
    /// No value was supplied for a dimension the rule requires.
    MissingDimensionValue { dimension: String },
    /// The underlying rule configuration is malformed.
    Config(ConfigError),
}

impl fmt::Display for GenerateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerateError::BrokenOrdering {
                rule_id,
                level_id,
                orders,
            } => {
                write!(
                    f,
                    "rule {} level {} has broken dimension ordering: {:?}",
                    rule_id, level_id, orders
                )
            }
            GenerateError::MissingDimensionValue { dimension } => {
                write!(f, "missing value for dimension '{}'", dimension)
            }
            GenerateError::Config(e) => write!(f, "configuration error: {}", e),
        }
    }
}

impl std::error::Error for GenerateError {}

impl From<ConfigError> for GenerateError {
    fn from(e: ConfigError) -> Self {
        GenerateError::Config(e)
    }
}

/// A string parse failure. Expected, surfaced to the caller verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// A configured delimiter was not found in the remaining input.
    DelimiterNotFound { dimension: String, delimiter: String },
    /// Input remained after all rule details were consumed.
    IncompleteParse { remainder: String },
    /// A required dimension parsed to an empty value.
    MissingRequired { dimension: String },
    /// The rule's dimension_order values for this level are not exactly 1..N.
    BrokenOrdering {
        rule_id: i64,
        level_id: i64,
        orders: Vec<u32>,
    },
    /// The underlying rule configuration is malformed.
    Config(ConfigError),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::DelimiterNotFound {
                dimension,
                delimiter,
            } => {
                write!(
                    f,
                    "delimiter '{}' for dimension '{}' not found in input",
                    delimiter, dimension
                )
            }
            ParseError::IncompleteParse { remainder } => {
                write!(f, "unparsed input remains: '{}'", remainder)
            }
            ParseError::MissingRequired { dimension } => {
                write!(
                    f,
                    "required dimension '{}' parsed to an empty value",
                    dimension
                )
            }
            ParseError::BrokenOrdering {
                rule_id,
                level_id,
                orders,
            } => {
                write!(
                    f,
                    "rule {} level {} has broken dimension ordering: {:?}",
                    rule_id, level_id, orders
                )
            }
            ParseError::Config(e) => write!(f, "configuration error: {}", e),
        }
    }
}

impl std::error::Error for ParseError {}

impl From<ConfigError> for ParseError {
    fn from(e: ConfigError) -> Self {
        ParseError::Config(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_error_names_dimension() {
        let e = GenerateError::MissingDimensionValue {
            dimension: "Region".to_string(),
        };
        assert!(e.to_string().contains("Region"));
    }

    #[test]
    fn test_parse_error_names_delimiter() {
        let e = ParseError::DelimiterNotFound {
            dimension: "Campaign".to_string(),
            delimiter: "_".to_string(),
        };
        let msg = e.to_string();
        assert!(msg.contains("Campaign"));
        assert!(msg.contains('_'));
    }

    #[test]
    fn test_config_error_wraps_into_generate() {
        let e: GenerateError = ConfigError::UnknownDimension { dimension_id: 7 }.into();
        assert!(matches!(e, GenerateError::Config(_)));
        assert!(e.to_string().contains('7'));
    }
}
