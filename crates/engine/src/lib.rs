//! taxon-engine: the naming string codec.
//!
//! Forward direction generates a formatted string from dimension values by
//! applying prefix/suffix/delimiter per rule detail in strict order; the
//! reverse direction recovers dimension values from an externally-supplied
//! string using the same rule. The pair round-trips for any configuration
//! with non-empty, non-overlapping delimiters.

pub mod generate;
pub mod parse;
pub mod template;

pub use generate::generate;
pub use parse::parse;
pub use template::level_preview;
