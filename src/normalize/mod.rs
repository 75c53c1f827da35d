//! Table normalizer.
//!
//! Applies one [`TableSchema`] to one raw table: renames recognized
//! headers, coerces every cell, fills declared defaults, computes the
//! table's derived columns, and reports data quality. Bad cells degrade
//! per row and never abort the call; only an unregistered table name or
//! structurally broken input fails.
//!
//! # Module structure
//!
//! - [`coerce`] — per-type parsing and fallback rules
//! - [`derive`] — single-table derived-column formulas
//! - [`quality`] — advisory quality report

pub mod coerce;
pub mod derive;
pub mod quality;

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::model::{RawTable, Table, Value};
use crate::schema::{ColumnSpec, SchemaRegistry, TableSchema};

use self::coerce::{CellOutcome, coerce_cell};
use self::derive::DeriveContext;
pub use self::quality::{Period, QualityReport};

/// Default number of decimal places for money-valued derived columns.
pub const DEFAULT_PRECISION: u32 = 2;

/// A normalized table with its quality report.
#[derive(Debug, Clone, Serialize)]
pub struct NormalizedTable {
    pub table: Table,
    pub quality: QualityReport,
}

/// Normalizes raw tables against a registry.
#[derive(Debug, Clone)]
pub struct Normalizer {
    registry: SchemaRegistry,
    precision: u32,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(SchemaRegistry::standard(), DEFAULT_PRECISION)
    }
}

impl Normalizer {
    pub fn new(registry: SchemaRegistry, precision: u32) -> Self {
        Self {
            registry,
            precision,
        }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Normalize one raw table.
    ///
    /// `table_name` may be the canonical name or the provider's name.
    pub fn normalize(&self, table_name: &str, raw: &RawTable) -> Result<NormalizedTable> {
        let schema = self.registry.lookup(table_name)?;
        if let Some(detail) = raw.structural_defect() {
            return Err(Error::NotTabular {
                table: schema.name.to_string(),
                detail,
            });
        }
        Ok(normalize_with(schema, raw, self.precision))
    }
}

/// Where a declared column's cells come from.
enum Source {
    /// Position of the provider header in the raw row.
    Raw(usize),
    /// Header absent; every row gets this value.
    Default(f64),
}

fn normalize_with(schema: &TableSchema, raw: &RawTable, precision: u32) -> NormalizedTable {
    let header_pos: FxHashMap<&str, usize> = raw
        .columns
        .iter()
        .enumerate()
        .map(|(i, h)| (h.trim(), i))
        .collect();

    // Declared columns in registry order, skipping those absent without a default.
    let plan: Vec<(&ColumnSpec, Source)> = schema
        .columns
        .iter()
        .filter_map(|spec| match header_pos.get(spec.source) {
            Some(&pos) => Some((spec, Source::Raw(pos))),
            None => spec.default.map(|d| (spec, Source::Default(d))),
        })
        .collect();

    let dropped_columns: Vec<String> = raw
        .columns
        .iter()
        .filter(|h| schema.column_for_source(h.trim()).is_none())
        .cloned()
        .collect();

    let mut columns: Vec<String> = plan.iter().map(|(spec, _)| spec.name.to_string()).collect();
    columns.extend(schema.derived.iter().map(|d| d.name.to_string()));
    let positions: FxHashMap<&str, usize> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| (c.as_str(), i))
        .collect();

    let ctx = DeriveContext::new(schema.derived, precision);
    let mut quality = QualityReport {
        table: schema.name.to_string(),
        dropped_columns,
        ..Default::default()
    };
    let mut table = Table::new(schema.name, columns.clone());

    for raw_row in &raw.rows {
        let mut row: Vec<Value> = Vec::with_capacity(columns.len());
        for (spec, source) in &plan {
            match source {
                Source::Raw(pos) => {
                    let (value, outcome, filled) = coerce_cell(&raw_row[*pos], spec.ty, spec.coercion);
                    if outcome == CellOutcome::Invalid {
                        quality.invalid_values += 1;
                    }
                    if filled {
                        quality.zero_filled += 1;
                    }
                    row.push(value);
                }
                Source::Default(d) => {
                    quality.zero_filled += 1;
                    row.push(default_cell(spec, *d));
                }
            }
        }
        for spec in schema.derived {
            let value = {
                let current = &row;
                ctx.evaluate(&spec.derivation, |c| {
                    positions
                        .get(c)
                        .and_then(|&i| current.get(i))
                        .unwrap_or(&Value::Null)
                })
            };
            row.push(value);
        }
        table.push_row(row);
    }

    quality.observe(&table);
    debug!(
        table = schema.name,
        invalid = quality.invalid_values,
        zero_filled = quality.zero_filled,
        dropped = quality.dropped_columns.len(),
        "coercion summary"
    );
    info!(table = schema.name, rows = table.len(), "table normalized");

    NormalizedTable { table, quality }
}

fn default_cell(spec: &ColumnSpec, default: f64) -> Value {
    match spec.ty {
        crate::model::ColumnType::Integer => Value::Integer(default as i64),
        _ => Value::decimal(default),
    }
}

/// Normalized tables keyed by canonical name.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NormalizedTables {
    tables: BTreeMap<String, NormalizedTable>,
}

impl NormalizedTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, normalized: NormalizedTable) {
        self.tables
            .insert(normalized.table.name().to_string(), normalized);
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name).map(|n| &n.table)
    }

    /// Quality report for one table, if it was normalized.
    pub fn quality_report(&self, name: &str) -> Option<&QualityReport> {
        self.tables.get(name).map(|n| &n.quality)
    }

    pub fn quality_reports(&self) -> impl Iterator<Item = &QualityReport> {
        self.tables.values().map(|n| &n.quality)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl FromIterator<NormalizedTable> for NormalizedTables {
    fn from_iter<I: IntoIterator<Item = NormalizedTable>>(iter: I) -> Self {
        let mut out = Self::new();
        for t in iter {
            out.insert(t);
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
