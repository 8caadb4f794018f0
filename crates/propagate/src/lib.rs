//! taxon-propagate: cascading updates across the string hierarchy.
//!
//! When one string's dimension-value assignment changes, descendant strings
//! that inherit the dimension must regenerate. This crate computes the
//! impact of such an edit (pure, over a tree snapshot), detects the
//! conflicts that make a cascade unsafe, and applies safe cascades in one
//! all-or-nothing storage transaction with a job record and per-string
//! audit rows.

pub mod apply;
pub mod impact;
pub mod job;
pub mod tree;

pub use apply::{apply_propagation, ApplyError, ApplyOutcome, PropagationOptions};
pub use impact::{
    analyze_impact, AffectedString, Conflict, ConflictKind, DetailUpdate, ImpactError,
    ImpactReport, ImpactSummary, ImpactWarning, UpdateType, WarningKind,
};
pub use job::{can_transition, transition, JobStateError};
pub use tree::StringTreeSnapshot;
