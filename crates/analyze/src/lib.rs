//! taxon-analyze: rule analysis suite with structured output.
//!
//! The analyzer consumes a pre-assembled `RuleBundle` (storage stays at the
//! edge), runs the catalog builder, the inheritance matrix builder, and the
//! validation scorer, and aggregates results into a `RuleReport` with
//! extracted findings. Each analysis is a separate module producing a
//! serializable result struct.

pub mod catalog;
pub mod inheritance;
pub mod report;
pub mod scorer;

pub use catalog::{
    build_catalog, CascadeMap, Catalog, CatalogDimension, CatalogValue, LevelTemplate,
    TemplateSlot, ValueRef,
};
pub use inheritance::{build_matrix, InheritanceMatrix, InheritedSlot, MatrixEntry, ProvidedSlot};
pub use report::{Finding, FindingSeverity, RuleReport};
pub use scorer::{summarize, LevelCompleteness, RuleValidationSummary, ValidationFinding};

use taxon_core::RuleBundle;
use time::Date;

/// Run the full analysis suite over one rule bundle.
///
/// Builds the catalog and inheritance matrix, scores validation from them,
/// extracts findings, and returns the aggregated report.
pub fn analyze_rule(bundle: &RuleBundle, as_of: Date) -> RuleReport {
    let catalog = build_catalog(bundle, as_of);
    let matrix = build_matrix(bundle);
    let validation = summarize(bundle, &catalog);

    let mut report = RuleReport::new(bundle.rule.id);
    report.catalog = Some(catalog);
    report.inheritance = Some(matrix);
    report.validation = Some(validation);
    report.analyses_run = vec![
        "catalog".to_string(),
        "inheritance".to_string(),
        "validation".to_string(),
    ];
    report.extract_findings();
    report
}
