//! KPI catalog evaluation.
//!
//! A catalog is an ordered list of [`KpiDef`]s. Each definition is either an
//! aggregation over the fact table (or one normalized table) followed by a
//! post formula, or a post formula over KPIs computed earlier in the same
//! run. Declaration order is dependency order: a definition may only refer
//! to names declared, and successfully computed, before it. A failing KPI
//! is recorded and skipped; the rest of the catalog still evaluates.
//!
//! # Module structure
//!
//! - [`catalog`] — the default Northwind catalog
//! - [`derive`] — zero-safe ratio helpers

pub mod catalog;
pub mod derive;

use rustc_hash::FxHashMap;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use tracing::{debug, info, warn};

use crate::aggregate::{AggregateSpec, SEGMENT_COLUMN, aggregate, percent_change};
use crate::error::{Error, Result};
use crate::model::value::round_to;
use crate::model::{Table, Value};
use crate::normalize::NormalizedTables;

use self::derive::{LastTwo, last_two, ratio_or_zero, safe_pct};

pub use self::catalog::default_catalog;

// ---------------------------------------------------------------------------
// Definitions
// ---------------------------------------------------------------------------

/// Table an aggregating KPI reads.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KpiSource {
    Facts,
    /// A normalized table by canonical name. An absent table reads as empty.
    Table(&'static str),
}

/// A per-row ratio appended to a ranked list.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RowRatio {
    pub output: String,
    pub numerator: String,
    pub denominator: String,
    /// Express as a percentage (rounded to 2 places) instead of a quotient.
    pub percent: bool,
}

impl RowRatio {
    pub fn pct(output: &str, numerator: &str, denominator: &str) -> Self {
        Self {
            output: output.into(),
            numerator: numerator.into(),
            denominator: denominator.into(),
            percent: true,
        }
    }

    pub fn quotient(output: &str, numerator: &str, denominator: &str) -> Self {
        Self {
            percent: false,
            ..Self::pct(output, numerator, denominator)
        }
    }
}

/// Post formula turning an aggregation result or earlier KPIs into a value.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Post {
    /// First row of `column`; 0 when the result is empty or null. A
    /// non-empty result without `column` is a shape error.
    Scalar { column: String },
    /// The whole result table, plus per-row ratios.
    Rows { ratios: Vec<RowRatio> },
    /// Count and total of `column` per segment label, in label order.
    Segments { labels: Vec<String>, column: String },
    /// Percent-change series of `column` over an earlier ranked KPI.
    PercentChange {
        kpi: String,
        column: String,
        output: String,
    },
    /// Ratio of two earlier scalar KPIs; 0 when the denominator is 0.
    Ratio {
        numerator: String,
        denominator: String,
        percent: bool,
    },
    /// Two-point comparison of the last two rows of an earlier KPI.
    LastTwo {
        kpi: String,
        column: String,
        mode: LastTwo,
        fallback: f64,
    },
    /// Mean of `column` over an earlier KPI's rows; 0 when empty.
    MeanOf { kpi: String, column: String },
}

impl Post {
    /// Earlier KPIs this formula reads.
    pub fn dependencies(&self) -> Vec<&str> {
        match self {
            Self::Scalar { .. } | Self::Rows { .. } | Self::Segments { .. } => Vec::new(),
            Self::PercentChange { kpi, .. } | Self::LastTwo { kpi, .. } | Self::MeanOf { kpi, .. } => {
                vec![kpi.as_str()]
            }
            Self::Ratio {
                numerator,
                denominator,
                ..
            } => vec![numerator.as_str(), denominator.as_str()],
        }
    }

    fn needs_input(&self) -> bool {
        matches!(self, Self::Scalar { .. } | Self::Rows { .. } | Self::Segments { .. })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct KpiInput {
    pub source: KpiSource,
    pub spec: AggregateSpec,
}

/// One named KPI.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct KpiDef {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<KpiInput>,
    pub post: Post,
}

impl KpiDef {
    /// KPI computed from an aggregation.
    pub fn aggregate(name: &str, source: KpiSource, spec: AggregateSpec, post: Post) -> Self {
        Self {
            name: name.to_string(),
            input: Some(KpiInput { source, spec }),
            post,
        }
    }

    /// KPI computed from earlier KPIs only.
    pub fn derived(name: &str, post: Post) -> Self {
        Self {
            name: name.to_string(),
            input: None,
            post,
        }
    }

    /// Scalar from the facts: `post = Scalar(column)`.
    pub fn fact_scalar(name: &str, spec: AggregateSpec, column: &str) -> Self {
        Self::aggregate(
            name,
            KpiSource::Facts,
            spec,
            Post::Scalar {
                column: column.to_string(),
            },
        )
    }

    /// Ranked list from the facts with optional per-row ratios.
    pub fn fact_rows(name: &str, spec: AggregateSpec, ratios: Vec<RowRatio>) -> Self {
        Self::aggregate(name, KpiSource::Facts, spec, Post::Rows { ratios })
    }

    fn shape(&self, detail: impl Into<String>) -> Error {
        Error::KpiShape {
            kpi: self.name.clone(),
            detail: detail.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Values and report
// ---------------------------------------------------------------------------

/// A computed KPI: a number or a small table.
#[derive(Clone, Debug, PartialEq)]
pub enum KpiValue {
    Scalar(Value),
    Rows(Table),
}

impl KpiValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Scalar(v) => v.as_f64(),
            Self::Rows(_) => None,
        }
    }

    pub fn as_rows(&self) -> Option<&Table> {
        match self {
            Self::Scalar(_) => None,
            Self::Rows(t) => Some(t),
        }
    }
}

impl Serialize for KpiValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Scalar(v) => v.serialize(serializer),
            Self::Rows(t) => t.records().serialize(serializer),
        }
    }
}

/// A KPI that could not be computed.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct KpiFailure {
    pub kpi: String,
    pub kind: &'static str,
    pub message: String,
}

impl KpiFailure {
    fn new(kpi: &str, err: &Error) -> Self {
        Self {
            kpi: kpi.to_string(),
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Every KPI computed in one run, in catalog order.
///
/// Serializes as a flat `{name: value}` object; failures are reported
/// separately through [`KpiReport::failures`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct KpiReport {
    values: Vec<(String, KpiValue)>,
    index: FxHashMap<String, usize>,
    failures: Vec<KpiFailure>,
}

impl KpiReport {
    pub fn get(&self, name: &str) -> Option<&KpiValue> {
        self.index.get(name).map(|&i| &self.values[i].1)
    }

    pub fn scalar(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(KpiValue::as_f64)
    }

    pub fn rows(&self, name: &str) -> Option<&Table> {
        self.get(name).and_then(KpiValue::as_rows)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn failures(&self) -> &[KpiFailure] {
        &self.failures
    }

    fn insert(&mut self, name: &str, value: KpiValue) {
        self.index.insert(name.to_string(), self.values.len());
        self.values.push((name.to_string(), value));
    }

    fn require(&self, kpi: &str, dep: &str) -> Result<&KpiValue> {
        self.get(dep).ok_or_else(|| Error::KpiDependency {
            kpi: kpi.to_string(),
            missing: dep.to_string(),
        })
    }
}

impl Serialize for KpiReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in &self.values {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Evaluate `catalog` top to bottom.
///
/// Never fails as a whole: each KPI error is logged, recorded in the
/// report's failures, and leaves that name uncomputed.
pub fn evaluate(
    catalog: &[KpiDef],
    facts: &Table,
    tables: &NormalizedTables,
    precision: u32,
) -> KpiReport {
    let mut report = KpiReport::default();
    for def in catalog {
        let outcome = if report.get(&def.name).is_some() {
            Err(def.shape("declared more than once"))
        } else {
            evaluate_one(def, facts, tables, &report, precision)
        };
        match outcome {
            Ok(value) => {
                debug!(kpi = %def.name, "KPI computed");
                report.insert(&def.name, value);
            }
            Err(err) => {
                warn!(kpi = %def.name, error = %err, "KPI failed");
                report.failures.push(KpiFailure::new(&def.name, &err));
            }
        }
    }
    info!(
        computed = report.len(),
        failed = report.failures.len(),
        "KPI catalog evaluated"
    );
    report
}

fn evaluate_one(
    def: &KpiDef,
    facts: &Table,
    tables: &NormalizedTables,
    prior: &KpiReport,
    precision: u32,
) -> Result<KpiValue> {
    let kpi = def.name.as_str();
    let round = |v: f64| Value::decimal(round_to(v, precision));

    let result = match (&def.input, def.post.needs_input()) {
        (Some(input), true) => {
            let empty;
            let table = match input.source {
                KpiSource::Facts => facts,
                KpiSource::Table(name) => match tables.table(name) {
                    Some(t) => t,
                    None => {
                        empty = Table::new(name, Vec::new());
                        &empty
                    }
                },
            };
            Some(aggregate(table, &input.spec).map_err(|source| Error::Aggregate {
                kpi: kpi.to_string(),
                source,
            })?)
        }
        (None, false) => None,
        (Some(_), false) => return Err(def.shape("post formula takes no aggregation input")),
        (None, true) => return Err(def.shape("post formula needs an aggregation input")),
    };

    match (&def.post, result) {
        (Post::Scalar { column }, Some(r)) => {
            if !r.is_empty() && !r.table.has_column(column) {
                return Err(def.shape(format!("aggregation has no column '{column}'")));
            }
            Ok(KpiValue::Scalar(match r.scalar(column) {
                Some(Value::Integer(i)) => Value::Integer(*i),
                cell => round(cell.and_then(Value::as_f64).unwrap_or(0.0)),
            }))
        }
        (Post::Rows { ratios }, Some(r)) => {
            let mut table = r.table;
            for ratio in ratios {
                table = with_row_ratio(def, table, ratio)?;
            }
            Ok(KpiValue::Rows(round_table(&table, precision)))
        }
        (Post::Segments { labels, column }, Some(r)) => {
            Ok(KpiValue::Rows(round_table(&summarize_segments(def, &r.table, labels, column)?, precision)))
        }
        (Post::PercentChange { kpi: dep, column, output }, None) => {
            let rows = prior_rows(def, prior, dep)?;
            let series = column_series(def, rows, column)?;
            let change: Vec<Value> = percent_change(&series)
                .into_iter()
                .map(Value::from_opt_f64)
                .collect();
            Ok(KpiValue::Rows(round_table(&append_column(rows, output, change), precision)))
        }
        (Post::Ratio { numerator, denominator, percent }, None) => {
            let n = prior_scalar(def, prior, numerator)?;
            let d = prior_scalar(def, prior, denominator)?;
            Ok(KpiValue::Scalar(round(if *percent {
                safe_pct(n, d)
            } else {
                ratio_or_zero(n, d)
            })))
        }
        (Post::LastTwo { kpi: dep, column, mode, fallback }, None) => {
            let rows = prior_rows(def, prior, dep)?;
            let series = column_series(def, rows, column)?;
            Ok(KpiValue::Scalar(round(last_two(&series, *mode, *fallback))))
        }
        (Post::MeanOf { kpi: dep, column }, None) => {
            let rows = prior_rows(def, prior, dep)?;
            let present: Vec<f64> = column_series(def, rows, column)?.into_iter().flatten().collect();
            let mean = ratio_or_zero(present.iter().sum(), present.len() as f64);
            Ok(KpiValue::Scalar(round(mean)))
        }
        _ => Err(def.shape("post formula does not match its input")),
    }
}

fn prior_scalar(def: &KpiDef, prior: &KpiReport, dep: &str) -> Result<f64> {
    match prior.require(&def.name, dep)? {
        KpiValue::Scalar(v) => Ok(v.as_f64().unwrap_or(0.0)),
        KpiValue::Rows(_) => Err(def.shape(format!("'{dep}' is a table, expected a number"))),
    }
}

fn prior_rows<'r>(def: &KpiDef, prior: &'r KpiReport, dep: &str) -> Result<&'r Table> {
    match prior.require(&def.name, dep)? {
        KpiValue::Rows(t) => Ok(t),
        KpiValue::Scalar(_) => Err(def.shape(format!("'{dep}' is a number, expected a table"))),
    }
}

fn column_series(def: &KpiDef, table: &Table, column: &str) -> Result<Vec<Option<f64>>> {
    match table.column(column) {
        Some(cells) => Ok(cells.map(Value::as_f64).collect()),
        None => Err(def.shape(format!("no column '{column}'"))),
    }
}

fn append_column(base: &Table, name: &str, values: Vec<Value>) -> Table {
    let mut columns = base.columns().to_vec();
    columns.push(name.to_string());
    let mut out = Table::new(base.name(), columns);
    for (row, v) in base.raw_rows().iter().zip(values) {
        let mut row = row.clone();
        row.push(v);
        out.push_row(row);
    }
    out
}

fn with_row_ratio(def: &KpiDef, table: Table, ratio: &RowRatio) -> Result<Table> {
    let num = column_series(def, &table, &ratio.numerator)?;
    let den = column_series(def, &table, &ratio.denominator)?;
    let values: Vec<Value> = num
        .iter()
        .zip(&den)
        .map(|(n, d)| {
            let (n, d) = (n.unwrap_or(0.0), d.unwrap_or(0.0));
            Value::decimal(if ratio.percent {
                safe_pct(n, d)
            } else {
                ratio_or_zero(n, d)
            })
        })
        .collect();
    Ok(append_column(&table, &ratio.output, values))
}

fn summarize_segments(def: &KpiDef, table: &Table, labels: &[String], column: &str) -> Result<Table> {
    let segments = table
        .column(SEGMENT_COLUMN)
        .ok_or_else(|| def.shape("aggregation has no segment column"))?;
    let values = column_series(def, table, column)?;
    let mut members = vec![0_i64; labels.len()];
    let mut totals = vec![0.0_f64; labels.len()];
    for (seg, v) in segments.zip(values) {
        if let Some(i) = labels.iter().position(|l| Some(l.as_str()) == seg.as_str()) {
            members[i] += 1;
            totals[i] += v.unwrap_or(0.0);
        }
    }
    let grand: f64 = totals.iter().sum();
    let mut out = Table::new(
        table.name(),
        vec![
            SEGMENT_COLUMN.to_string(),
            "members".to_string(),
            column.to_string(),
            "share_pct".to_string(),
        ],
    );
    for ((label, n), total) in labels.iter().zip(members).zip(totals) {
        out.push_row(vec![
            Value::text(label.as_str()),
            Value::Integer(n),
            Value::decimal(total),
            Value::decimal(safe_pct(total, grand)),
        ]);
    }
    Ok(out)
}

fn round_table(table: &Table, precision: u32) -> Table {
    let mut out = Table::new(table.name(), table.columns().to_vec());
    for row in table.raw_rows() {
        out.push_row(
            row.iter()
                .map(|v| match v {
                    Value::Decimal(d) => Value::decimal(round_to(*d, precision)),
                    other => other.clone(),
                })
                .collect(),
        );
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
