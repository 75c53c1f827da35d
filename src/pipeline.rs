//! Linear batch driver: normalize (parallel) → build facts → evaluate KPIs.
//!
//! Each stage returns its own result object and the driver threads them
//! forward. Nothing here holds process-wide state, so two runs over the same
//! input produce identical output.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::facts::{FactBuild, build_facts};
use crate::kpi::{KpiDef, KpiReport, default_catalog, evaluate};
use crate::model::RawTable;
use crate::normalize::{NormalizedTable, NormalizedTables, Normalizer};
use crate::schema::SchemaRegistry;

/// Raw input document: `{"tables": {"<name>": {"columns": [...], "rows": [[...]]}}}`.
///
/// Keys may be canonical table names or provider names.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PipelineInput {
    pub tables: BTreeMap<String, RawTable>,
}

impl PipelineInput {
    pub fn from_json_str(s: &str) -> anyhow::Result<Self> {
        serde_json::from_str(s).context("input is not a valid table document")
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading input {}", path.display()))?;
        Self::from_json_str(&content).with_context(|| format!("parsing input {}", path.display()))
    }

    pub fn with_table(mut self, name: &str, table: RawTable) -> Self {
        self.tables.insert(name.to_string(), table);
        self
    }
}

/// Everything one run produces.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutput {
    pub normalized: NormalizedTables,
    pub facts: FactBuild,
    pub kpis: KpiReport,
}

/// A configured pipeline.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    normalizer: Normalizer,
    catalog: Vec<KpiDef>,
}

impl Pipeline {
    /// Pipeline with the standard registry and the default catalog.
    pub fn new(config: PipelineConfig) -> Self {
        let normalizer = Normalizer::new(SchemaRegistry::standard(), config.precision);
        let catalog = default_catalog(&config);
        Self {
            config,
            normalizer,
            catalog,
        }
    }

    /// Replace the KPI catalog.
    pub fn with_catalog(mut self, catalog: Vec<KpiDef>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &[KpiDef] {
        &self.catalog
    }

    /// Normalize every input table in parallel.
    ///
    /// Fails on the first unregistered or structurally broken table in key
    /// order. When two keys resolve to the same canonical table, the first
    /// in key order is kept.
    pub fn normalize_all(&self, input: &PipelineInput) -> Result<NormalizedTables> {
        let results: Vec<Result<NormalizedTable>> = input
            .tables
            .par_iter()
            .map(|(name, raw)| self.normalizer.normalize(name, raw))
            .collect();

        let mut tables = NormalizedTables::new();
        for result in results {
            let normalized = result?;
            let name = normalized.table.name().to_string();
            if tables.table(&name).is_some() {
                warn!(table = %name, "table supplied more than once; keeping the first");
                continue;
            }
            tables.insert(normalized);
        }
        info!(tables = tables.len(), "normalization complete");
        Ok(tables)
    }

    /// Normalize and join.
    pub fn build(&self, input: &PipelineInput) -> Result<(NormalizedTables, FactBuild)> {
        let normalized = self.normalize_all(input)?;
        let facts = build_facts(&normalized, self.config.precision)?;
        Ok((normalized, facts))
    }

    /// Full run. Individual KPI failures are reported in
    /// [`KpiReport::failures`] rather than failing the run.
    pub fn run(&self, input: &PipelineInput) -> Result<PipelineOutput> {
        let (normalized, facts) = self.build(input)?;
        let kpis = evaluate(&self.catalog, &facts.table, &normalized, self.config.precision);
        Ok(PipelineOutput {
            normalized,
            facts,
            kpis,
        })
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}
