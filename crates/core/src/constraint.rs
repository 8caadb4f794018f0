//! Constraint validation -- per-kind predicates over candidate dimension
//! values, plus the collect-all evaluator used by the engine and the
//! propagation analyzer.
//!
//! Evaluation never short-circuits: callers need the full violation list,
//! so a value violating both `max_length` and `regex` produces two entries.

use regex::Regex;

use crate::error::ConfigError;
use crate::model::{ConstraintKind, DimensionConstraint};

/// Outcome of evaluating a single constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintOutcome {
    pub is_valid: bool,
    /// None when valid; the override or default message when not.
    pub error_message: Option<String>,
}

impl ConstraintOutcome {
    fn pass() -> Self {
        ConstraintOutcome {
            is_valid: true,
            error_message: None,
        }
    }

    fn fail(message: String) -> Self {
        ConstraintOutcome {
            is_valid: false,
            error_message: Some(message),
        }
    }
}

/// One failing constraint within a full-evaluation report.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ConstraintViolation {
    pub constraint_id: i64,
    pub kind: String,
    pub message: String,
}

/// Result of evaluating every active constraint of a dimension.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ConstraintReport {
    pub is_valid: bool,
    pub errors: Vec<ConstraintViolation>,
}

/// Reject regex patterns containing known catastrophic-backtracking shapes
/// (a quantified group whose body is itself quantified, e.g. `(\w+)*`).
///
/// This is defense in depth at constraint creation, independent of the
/// match-time engine. The compile check runs afterwards so an unsafe shape
/// is reported as unsafe, not merely invalid.
pub fn guard_regex_pattern(pattern: &str) -> Result<(), ConfigError> {
    if has_nested_quantifier(pattern) {
        return Err(ConfigError::UnsafeRegexPattern {
            pattern: pattern.to_string(),
            reason: "quantified group with a quantified body".to_string(),
        });
    }
    Regex::new(pattern).map_err(|e| ConfigError::InvalidRegexPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })?;
    Ok(())
}

/// Scan for `( ... <quantifier> ... ) <quantifier>` with escape awareness.
fn has_nested_quantifier(pattern: &str) -> bool {
    let chars: Vec<char> = pattern.chars().collect();
    // Stack of "group contains a quantifier" flags for open groups.
    let mut stack: Vec<bool> = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '\\' => {
                i += 1; // skip escaped char
            }
            '(' => stack.push(false),
            ')' => {
                let inner_quantified = stack.pop().unwrap_or(false);
                let next = chars.get(i + 1);
                let group_quantified =
                    matches!(next, Some('*') | Some('+')) || matches!(next, Some('{'));
                if inner_quantified && group_quantified {
                    return true;
                }
                // A quantified group counts as a quantifier for the enclosing group.
                if group_quantified {
                    if let Some(flag) = stack.last_mut() {
                        *flag = true;
                    }
                }
            }
            '*' | '+' => {
                if let Some(flag) = stack.last_mut() {
                    *flag = true;
                }
            }
            _ => {}
        }
        i += 1;
    }
    false
}

/// Evaluate a candidate value against one constraint.
pub fn validate(value: &str, constraint: &DimensionConstraint) -> ConstraintOutcome {
    let passed = match constraint.kind {
        ConstraintKind::NoSpaces => !value.chars().any(|c| c.is_whitespace()),
        ConstraintKind::Lowercase => {
            value.chars().any(|c| c.is_alphabetic())
                && value
                    .chars()
                    .filter(|c| c.is_alphabetic())
                    .all(|c| c.is_lowercase())
        }
        ConstraintKind::Uppercase => {
            value.chars().any(|c| c.is_alphabetic())
                && value
                    .chars()
                    .filter(|c| c.is_alphabetic())
                    .all(|c| c.is_uppercase())
        }
        ConstraintKind::NoSpecialChars => {
            value.chars().all(|c| c.is_alphanumeric() || c == '_')
        }
        ConstraintKind::Alphanumeric => {
            !value.is_empty() && value.chars().all(|c| c.is_alphanumeric())
        }
        ConstraintKind::Numeric => !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()),
        ConstraintKind::MaxLength => match bound(constraint) {
            Some(max) => value.chars().count() <= max,
            None => false, // invalid config fails closed
        },
        ConstraintKind::MinLength => match bound(constraint) {
            Some(min) => value.chars().count() >= min,
            None => false,
        },
        ConstraintKind::Regex => match anchored(constraint.value.as_deref().unwrap_or("")) {
            Some(re) => re.is_match(value),
            None => false,
        },
        ConstraintKind::StartsWith => {
            value.starts_with(constraint.value.as_deref().unwrap_or(""))
        }
        ConstraintKind::EndsWith => value.ends_with(constraint.value.as_deref().unwrap_or("")),
        ConstraintKind::AllowedChars => {
            let allowed = constraint.value.as_deref().unwrap_or("");
            value.chars().all(|c| allowed.contains(c))
        }
        ConstraintKind::NoUppercase => !value.chars().any(|c| c.is_uppercase()),
        ConstraintKind::NoNumbers => !value.chars().any(|c| c.is_numeric()),
        ConstraintKind::UrlSafe => {
            !value.is_empty()
                && value
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        }
    };

    if passed {
        ConstraintOutcome::pass()
    } else {
        ConstraintOutcome::fail(message_for(constraint))
    }
}

/// Evaluate every active constraint of a dimension against `value`,
/// ordered by `(order, id)`. Returns one violation per failing constraint.
pub fn validate_all(value: &str, constraints: &[DimensionConstraint]) -> ConstraintReport {
    let mut active: Vec<&DimensionConstraint> =
        constraints.iter().filter(|c| c.is_active).collect();
    active.sort_by_key(|c| (c.order, c.id));

    let mut errors = Vec::new();
    for constraint in active {
        let outcome = validate(value, constraint);
        if !outcome.is_valid {
            errors.push(ConstraintViolation {
                constraint_id: constraint.id,
                kind: constraint.kind.as_str().to_string(),
                message: outcome.error_message.unwrap_or_default(),
            });
        }
    }
    ConstraintReport {
        is_valid: errors.is_empty(),
        errors,
    }
}

fn bound(constraint: &DimensionConstraint) -> Option<usize> {
    constraint.value.as_deref()?.trim().parse().ok()
}

/// Compile the pattern anchored at the start, Python `re.match` style.
fn anchored(pattern: &str) -> Option<Regex> {
    Regex::new(&format!("\\A(?:{})", pattern)).ok()
}

fn message_for(constraint: &DimensionConstraint) -> String {
    if let Some(ref msg) = constraint.error_message {
        return msg.clone();
    }
    let v = constraint.value.as_deref().unwrap_or("");
    match constraint.kind {
        ConstraintKind::NoSpaces => "value must not contain spaces".to_string(),
        ConstraintKind::Lowercase => "value must be lowercase".to_string(),
        ConstraintKind::Uppercase => "value must be uppercase".to_string(),
        ConstraintKind::NoSpecialChars => {
            "value must contain only letters, digits, or underscores".to_string()
        }
        ConstraintKind::Alphanumeric => "value must be alphanumeric".to_string(),
        ConstraintKind::Numeric => "value must be numeric".to_string(),
        ConstraintKind::MaxLength => format!("value must be at most {} characters", v),
        ConstraintKind::MinLength => format!("value must be at least {} characters", v),
        ConstraintKind::Regex => format!("value must match pattern '{}'", v),
        ConstraintKind::StartsWith => format!("value must start with '{}'", v),
        ConstraintKind::EndsWith => format!("value must end with '{}'", v),
        ConstraintKind::AllowedChars => format!("value may only use characters '{}'", v),
        ConstraintKind::NoUppercase => "value must not contain uppercase letters".to_string(),
        ConstraintKind::NoNumbers => "value must not contain digits".to_string(),
        ConstraintKind::UrlSafe => {
            "value may only use letters, digits, '-', '_', or '.'".to_string()
        }
    }
}
