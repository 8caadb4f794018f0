//! taxon-service: the facade external callers consume.
//!
//! Wires a storage backend and a cache behind the engine's pure computation:
//! cached catalog/inheritance/validation reads, per-string generation and
//! parsing, propagation analysis and apply, cache invalidation triggers,
//! and parent-link reconciliation. The service trusts the workspace scoping
//! already resolved by its caller; it performs no authentication.

pub mod coordinator;
pub mod keys;
pub mod reconcile;

use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;
use time::OffsetDateTime;

use taxon_analyze::{
    analyze_rule, build_catalog, build_matrix, summarize, Catalog, InheritanceMatrix, RuleReport,
    RuleValidationSummary,
};
use taxon_core::error::{ConfigError, GenerateError, ParseError};
use taxon_core::RuleBundle;
use taxon_propagate::{
    analyze_impact, apply_propagation, ApplyError, ApplyOutcome, DetailUpdate, ImpactError,
    ImpactReport, PropagationOptions, StringTreeSnapshot,
};
use taxon_storage::{Cache, StorageError, TaxonStorage};

/// Top-level error surface of the service.
#[derive(Debug)]
pub enum ServiceError {
    Storage(StorageError),
    Config(ConfigError),
    Generate(GenerateError),
    Parse(ParseError),
    Impact(ImpactError),
    Apply(ApplyError),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::Storage(e) => write!(f, "storage error: {}", e),
            ServiceError::Config(e) => write!(f, "configuration error: {}", e),
            ServiceError::Generate(e) => write!(f, "generation error: {}", e),
            ServiceError::Parse(e) => write!(f, "parse error: {}", e),
            ServiceError::Impact(e) => write!(f, "impact analysis error: {}", e),
            ServiceError::Apply(e) => write!(f, "propagation error: {}", e),
        }
    }
}

impl std::error::Error for ServiceError {}

impl From<StorageError> for ServiceError {
    fn from(e: StorageError) -> Self {
        ServiceError::Storage(e)
    }
}

impl From<ConfigError> for ServiceError {
    fn from(e: ConfigError) -> Self {
        ServiceError::Config(e)
    }
}

impl From<GenerateError> for ServiceError {
    fn from(e: GenerateError) -> Self {
        ServiceError::Generate(e)
    }
}

impl From<ParseError> for ServiceError {
    fn from(e: ParseError) -> Self {
        ServiceError::Parse(e)
    }
}

impl From<ImpactError> for ServiceError {
    fn from(e: ImpactError) -> Self {
        ServiceError::Impact(e)
    }
}

impl From<ApplyError> for ServiceError {
    fn from(e: ApplyError) -> Self {
        ServiceError::Apply(e)
    }
}

/// The rule service. Generic over storage and cache so application state
/// can carry concrete backends without dynamic dispatch.
pub struct TaxonService<S, C> {
    storage: S,
    cache: C,
}

impl<S: TaxonStorage, C: Cache> TaxonService<S, C> {
    pub fn new(storage: S, cache: C) -> Self {
        TaxonService { storage, cache }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Load and assemble the bundle for a rule. Uncached: callers needing
    /// repeated cheap access go through the cached catalog/matrix instead.
    pub async fn load_bundle(&self, rule_id: i64) -> Result<RuleBundle, ServiceError> {
        let parts = self.storage.load_rule_parts(rule_id).await?;
        let bundle = RuleBundle::assemble(
            parts.rule,
            parts.platform,
            parts.levels,
            parts.details,
            parts.dimensions,
            parts.values,
            parts.constraints,
        )?;
        Ok(bundle)
    }

    /// Generate the naming string for one hierarchy level of a rule.
    pub async fn generate_string(
        &self,
        rule_id: i64,
        level_id: i64,
        values: &BTreeMap<String, String>,
    ) -> Result<String, ServiceError> {
        let bundle = self.load_bundle(rule_id).await?;
        Ok(taxon_engine::generate(&bundle, level_id, values)?)
    }

    /// Recover dimension values from an externally-supplied naming string.
    pub async fn parse_string(
        &self,
        value: &str,
        rule_id: i64,
        level_id: i64,
    ) -> Result<BTreeMap<String, String>, ServiceError> {
        let bundle = self.load_bundle(rule_id).await?;
        Ok(taxon_engine::parse(value, &bundle, level_id)?)
    }

    /// The compiled dimension catalog, cache-checked.
    pub async fn get_catalog(&self, rule_id: i64) -> Result<Catalog, ServiceError> {
        let key = keys::catalog_key(rule_id);
        if let Some(catalog) = self.cache_read::<Catalog>(&key).await {
            return Ok(catalog);
        }
        let bundle = self.load_bundle(rule_id).await?;
        let catalog = build_catalog(&bundle, OffsetDateTime::now_utc().date());
        self.cache_write(&key, &catalog).await;
        Ok(catalog)
    }

    /// The inheritance matrix, cache-checked.
    pub async fn get_inheritance_matrix(
        &self,
        rule_id: i64,
    ) -> Result<InheritanceMatrix, ServiceError> {
        let key = keys::matrix_key(rule_id);
        if let Some(matrix) = self.cache_read::<InheritanceMatrix>(&key).await {
            return Ok(matrix);
        }
        let bundle = self.load_bundle(rule_id).await?;
        let matrix = build_matrix(&bundle);
        self.cache_write(&key, &matrix).await;
        Ok(matrix)
    }

    /// The validation summary (issues, warnings, score), cache-checked.
    pub async fn validate_rule(
        &self,
        rule_id: i64,
    ) -> Result<RuleValidationSummary, ServiceError> {
        let key = keys::validation_key(rule_id);
        if let Some(summary) = self.cache_read::<RuleValidationSummary>(&key).await {
            return Ok(summary);
        }
        let bundle = self.load_bundle(rule_id).await?;
        let catalog = self.get_catalog(rule_id).await?;
        let summary = summarize(&bundle, &catalog);
        self.cache_write(&key, &summary).await;
        Ok(summary)
    }

    /// Build the complete rule report and populate every cached artifact in
    /// one pass. The "complete rule data" entry point.
    pub async fn warm_rule(&self, rule_id: i64) -> Result<RuleReport, ServiceError> {
        let bundle = self.load_bundle(rule_id).await?;
        let report = analyze_rule(&bundle, OffsetDateTime::now_utc().date());
        if let Some(ref catalog) = report.catalog {
            self.cache_write(&keys::catalog_key(rule_id), catalog).await;
        }
        if let Some(ref matrix) = report.inheritance {
            self.cache_write(&keys::matrix_key(rule_id), matrix).await;
        }
        if let Some(ref validation) = report.validation {
            self.cache_write(&keys::validation_key(rule_id), validation)
                .await;
        }
        tracing::debug!(rule_id, "rule caches warmed");
        Ok(report)
    }

    /// Dry-run impact analysis of proposed detail updates.
    pub async fn analyze_propagation_impact(
        &self,
        rule_id: i64,
        updates: &[DetailUpdate],
        max_depth: u32,
    ) -> Result<ImpactReport, ServiceError> {
        let bundle = self.load_bundle(rule_id).await?;
        let matrix = self.get_inheritance_matrix(rule_id).await?;
        let workspace_id = bundle.rule.workspace_id;

        let strings = self.storage.list_strings(workspace_id).await?;
        let details = self.storage.list_string_details(workspace_id).await?;
        let tree = StringTreeSnapshot::from_rows(strings, details);

        Ok(analyze_impact(&tree, &bundle, &matrix, updates, max_depth)?)
    }

    /// Apply proposed detail updates, cascading per `options`, in one
    /// all-or-nothing transaction.
    pub async fn apply_propagation(
        &self,
        rule_id: i64,
        updates: &[DetailUpdate],
        options: &PropagationOptions,
    ) -> Result<ApplyOutcome, ServiceError> {
        let bundle = self.load_bundle(rule_id).await?;
        let matrix = self.get_inheritance_matrix(rule_id).await?;
        let workspace_id = bundle.rule.workspace_id;
        Ok(apply_propagation(
            &self.storage,
            &bundle,
            &matrix,
            workspace_id,
            updates,
            options,
        )
        .await?)
    }

    /// Invalidation trigger: a rule detail under `rule_id` changed.
    pub async fn on_rule_detail_changed(&self, rule_id: i64) {
        coordinator::invalidate_rule(&self.cache, rule_id).await;
    }

    /// Invalidation trigger: a dimension or one of its values changed.
    pub async fn on_dimension_value_changed(
        &self,
        dimension_id: i64,
    ) -> Result<(), ServiceError> {
        coordinator::invalidate_dimension(&self.storage, &self.cache, dimension_id).await?;
        Ok(())
    }

    /// Resolve `parent_id` links for a workspace. Idempotent.
    pub async fn reconcile_parent_links(&self, workspace_id: i64) -> Result<usize, ServiceError> {
        Ok(reconcile::reconcile_parent_links(&self.storage, workspace_id).await?)
    }

    /// Best-effort cache read: errors and undecodable values are misses.
    async fn cache_read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.cache.get(key).await {
            Ok(Some(value)) => serde_json::from_value(value).ok(),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(key, error = %e, "cache read failed; falling through");
                None
            }
        }
    }

    /// Best-effort cache write with the standard TTL.
    async fn cache_write<T: Serialize>(&self, key: &str, value: &T) {
        let Ok(json) = serde_json::to_value(value) else {
            return;
        };
        if let Err(e) = self.cache.set(key, json, keys::CACHE_TTL_SECONDS).await {
            tracing::warn!(key, error = %e, "cache write failed; continuing");
        }
    }
}
