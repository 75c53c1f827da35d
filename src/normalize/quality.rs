//! Advisory per-table data-quality report.

use chrono::NaiveDate;
use rustc_hash::FxHashSet;
use serde::Serialize;

use crate::kpi::derive::safe_pct;
use crate::model::value::round_to;
use crate::model::{Table, Value};

/// Column whose range is reported as the table's period.
const PERIOD_COLUMN: &str = "order_date";

/// Counts gathered while normalizing one table.
///
/// Advisory only: nothing downstream depends on these numbers for
/// correctness.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QualityReport {
    pub table: String,
    pub rows: usize,
    pub columns: usize,
    /// Null cells in the normalized output.
    pub missing_values: usize,
    /// Cells that failed to parse under their declared type.
    pub invalid_values: usize,
    /// Cells replaced by a zero-fallback or a column default.
    pub zero_filled: usize,
    /// Provider headers with no canonical counterpart.
    pub dropped_columns: Vec<String>,
    /// Rows identical to an earlier row.
    pub duplicate_rows: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<Period>,
}

/// Date range covered by a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Period {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl QualityReport {
    /// Fill the output-derived counts from the finished table.
    pub fn observe(&mut self, table: &Table) {
        self.rows = table.len();
        self.columns = table.columns().len();
        self.missing_values = table
            .raw_rows()
            .iter()
            .flat_map(|r| r.iter())
            .filter(|v| v.is_null())
            .count();
        self.duplicate_rows = count_duplicates(table);
        self.period = period(table);
    }

    /// Share of non-null cells, as a percentage rounded to 2 places.
    pub fn completeness_pct(&self) -> f64 {
        let cells = self.rows * self.columns;
        round_to(
            safe_pct(cells.saturating_sub(self.missing_values) as f64, cells as f64),
            2,
        )
    }
}

fn count_duplicates(table: &Table) -> usize {
    let mut seen: FxHashSet<&[Value]> = FxHashSet::default();
    table
        .raw_rows()
        .iter()
        .filter(|r| !seen.insert(r.as_slice()))
        .count()
}

fn period(table: &Table) -> Option<Period> {
    let dates = table.column(PERIOD_COLUMN)?.filter_map(Value::as_date);
    dates.fold(None, |acc, d| match acc {
        None => Some(Period { from: d, to: d }),
        Some(p) => Some(Period {
            from: p.from.min(d),
            to: p.to.max(d),
        }),
    })
}
