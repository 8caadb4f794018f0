//! taxon-core: domain model and validation core for the naming taxonomy
//! engine.
//!
//! Provides the entity model, the per-dimension constraint validator, the
//! structural rule checks, and the `RuleBundle` load unit consumed by every
//! pure computation in the workspace.
//!
//! # Public API
//!
//! Key types are re-exported at the crate root for convenience:
//!
//! - [`RuleBundle`] -- denormalized rule data with O(1) lookups
//! - [`validate_structure()`] -- structural rule checks
//! - [`constraint::validate_all()`] -- full constraint evaluation
//! - Error types: [`ConfigError`], [`GenerateError`], [`ParseError`]

pub mod bundle;
pub mod constraint;
pub mod error;
pub mod model;
pub mod validate;

pub use bundle::RuleBundle;
pub use constraint::{ConstraintOutcome, ConstraintReport, ConstraintViolation};
pub use error::{ConfigError, GenerateError, ParseError};
pub use model::{
    ConstraintKind, Dimension, DimensionConstraint, DimensionKind, DimensionValue, EntityLevel,
    Platform, Rule, RuleDetail, RuleStatus, StringDetailRecord, StringRecord, Workspace,
};
pub use validate::{validate_structure, StructureIssue};
