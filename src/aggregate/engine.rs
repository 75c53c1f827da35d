//! The aggregation primitive.
//!
//! Evaluation order: filter rows → group (first-seen order) → reduce →
//! segment → sort (stable) → limit, or → pivot. Inputs are never mutated;
//! every call builds a fresh result table.

use std::cmp::Ordering;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use smallvec::SmallVec;
use tracing::trace;

use crate::model::{Table, Value};

use super::AggregateError;
use super::quantile::{quantile_sorted, segment_index};
use super::spec::{AggregateSpec, Reducer, SortBy, SortTarget};

/// Column appended to the result when quantile segmentation is requested.
pub const SEGMENT_COLUMN: &str = "segment";

type GroupKey = SmallVec<[Value; 2]>;

/// Grouped, reduced, ordered output of one [`aggregate`] call.
///
/// The table holds the group-key columns first, then one column per
/// reducer in declaration order, then `segment` when segmentation was
/// requested. A pivoted result holds the first key followed by one column
/// per distinct value of the second key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregationResult {
    pub group_keys: Vec<String>,
    pub table: Table,
}

impl AggregationResult {
    fn empty(name: &str, spec: &AggregateSpec) -> Self {
        let columns = if spec.pivot.is_some() {
            spec.group_keys.iter().take(1).cloned().collect()
        } else {
            spec.output_columns()
        };
        let keys = if spec.pivot.is_some() { 1 } else { spec.group_keys.len() };
        Self {
            group_keys: spec.group_keys.iter().take(keys).cloned().collect(),
            table: Table::new(name, columns),
        }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Value of `column` in the first result row.
    pub fn scalar(&self, column: &str) -> Option<&Value> {
        self.table.get(0, column)
    }

    /// Numeric view of one result column, in row order.
    pub fn series(&self, column: &str) -> Option<Vec<Option<f64>>> {
        Some(self.table.column(column)?.map(Value::as_f64).collect())
    }
}

/// Group `input` by `spec.group_keys` and reduce.
///
/// Empty input yields an empty result for any spec, before any column or
/// option is checked. Rows with a null in any group key belong to no group.
pub fn aggregate(input: &Table, spec: &AggregateSpec) -> Result<AggregationResult, AggregateError> {
    if input.is_empty() {
        return Ok(AggregationResult::empty(input.name(), spec));
    }
    spec.validate()?;

    let col = |name: &str| {
        input
            .column_index(name)
            .ok_or_else(|| AggregateError::UnknownColumn {
                column: name.to_string(),
            })
    };
    for name in spec.input_columns() {
        col(name)?;
    }
    let key_cols: Vec<usize> = spec.group_keys.iter().map(|k| col(k.as_str())).collect::<Result<_, _>>()?;
    let reducer_cols: Vec<usize> = spec
        .reducers
        .iter()
        .map(|r| col(r.column.as_str()))
        .collect::<Result<_, _>>()?;
    let filter = match &spec.filter {
        Some(f) => Some((f, col(f.column.as_str())?)),
        None => None,
    };

    // Group in first-seen order.
    let mut index: FxHashMap<GroupKey, usize> = FxHashMap::default();
    let mut groups: Vec<(GroupKey, Vec<usize>)> = Vec::new();
    for (i, row) in input.raw_rows().iter().enumerate() {
        if let Some((f, c)) = filter
            && !f.accepts(&row[c])
        {
            continue;
        }
        let key: GroupKey = key_cols.iter().map(|&c| row[c].clone()).collect();
        if key.iter().any(Value::is_null) {
            continue;
        }
        match index.get(&key) {
            Some(&g) => groups[g].1.push(i),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push((key, vec![i]));
            }
        }
    }

    let rows = input.raw_rows();
    let mut out: Vec<Vec<Value>> = groups
        .iter()
        .map(|(key, members)| {
            let mut row: Vec<Value> = key.to_vec();
            for (r, &c) in spec.reducers.iter().zip(&reducer_cols) {
                row.push(reduce(r.reducer, members.iter().map(|&i| &rows[i][c])));
            }
            row
        })
        .collect();

    let outputs = spec.output_columns();
    if let Some(seg) = &spec.quantile_segments {
        let pos = position(&outputs, &seg.column)?;
        let mut present: Vec<f64> = out.iter().filter_map(|r| r[pos].as_f64()).collect();
        present.sort_by(f64::total_cmp);
        let thresholds: Vec<f64> = if present.is_empty() {
            Vec::new()
        } else {
            seg.cuts.iter().map(|&q| quantile_sorted(&present, q)).collect()
        };
        for row in &mut out {
            let bucket = segment_index(row[pos].as_f64(), &thresholds);
            row.push(Value::text(seg.labels[bucket].as_str()));
        }
    }

    if let Some(sort) = &spec.sort_by {
        sort_rows(&mut out, sort, &outputs, spec.group_keys.len())?;
    }
    if let Some(n) = spec.limit {
        out.truncate(n);
    }

    let result = match &spec.pivot {
        Some(p) => pivot(input.name(), spec, &out, &p.value)?,
        None => {
            let mut table = Table::new(input.name(), outputs);
            for row in out {
                table.push_row(row);
            }
            AggregationResult {
                group_keys: spec.group_keys.clone(),
                table,
            }
        }
    };
    trace!(
        table = input.name(),
        input_rows = input.len(),
        groups = result.len(),
        "aggregation complete"
    );
    Ok(result)
}

fn position(outputs: &[String], column: &str) -> Result<usize, AggregateError> {
    outputs
        .iter()
        .position(|c| c == column)
        .ok_or_else(|| AggregateError::UnknownColumn {
            column: column.to_string(),
        })
}

// ---------------------------------------------------------------------------
// Reducers
// ---------------------------------------------------------------------------

fn reduce<'a>(reducer: Reducer, cells: impl Iterator<Item = &'a Value>) -> Value {
    let present = cells.filter(|v| !v.is_null());
    match reducer {
        Reducer::Sum => {
            let mut int_sum: Option<i64> = Some(0);
            let mut float_sum = 0.0;
            let mut seen = false;
            for v in present {
                if let Some(f) = v.as_f64() {
                    seen = true;
                    float_sum += f;
                    int_sum = match v {
                        Value::Integer(i) => int_sum.and_then(|s| s.checked_add(*i)),
                        _ => None,
                    };
                }
            }
            match int_sum {
                Some(s) if seen => Value::Integer(s),
                _ => Value::decimal(float_sum),
            }
        }
        Reducer::Count => Value::Integer(present.count() as i64),
        Reducer::CountDistinct => {
            let distinct: FxHashSet<&Value> = present.collect();
            Value::Integer(distinct.len() as i64)
        }
        Reducer::Mean => {
            let (sum, n) = present
                .filter_map(Value::as_f64)
                .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
            if n == 0 {
                Value::Null
            } else {
                Value::decimal(sum / n as f64)
            }
        }
        Reducer::Median => {
            let mut nums: Vec<f64> = present.filter_map(Value::as_f64).collect();
            if nums.is_empty() {
                return Value::Null;
            }
            nums.sort_by(f64::total_cmp);
            Value::decimal(quantile_sorted(&nums, 0.5))
        }
        Reducer::Min => present.min_by(|a, b| a.total_cmp(b)).cloned().unwrap_or_default(),
        Reducer::Max => present.max_by(|a, b| a.total_cmp(b)).cloned().unwrap_or_default(),
    }
}

// ---------------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------------

/// Nulls go last regardless of direction.
fn cmp_nulls_last(a: &Value, b: &Value, descending: bool) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => {
            let ord = a.total_cmp(b);
            if descending { ord.reverse() } else { ord }
        }
    }
}

fn sort_rows(
    rows: &mut [Vec<Value>],
    sort: &SortBy,
    outputs: &[String],
    key_len: usize,
) -> Result<(), AggregateError> {
    let desc = sort.descending;
    match &sort.target {
        SortTarget::Column(c) => {
            let pos = position(outputs, c)?;
            rows.sort_by(|a, b| cmp_nulls_last(&a[pos], &b[pos], desc));
        }
        SortTarget::GroupKeys => {
            rows.sort_by(|a, b| {
                a[..key_len]
                    .iter()
                    .zip(&b[..key_len])
                    .map(|(x, y)| cmp_nulls_last(x, y, desc))
                    .find(|o| o.is_ne())
                    .unwrap_or(Ordering::Equal)
            });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Pivot
// ---------------------------------------------------------------------------

fn pivot(
    name: &str,
    spec: &AggregateSpec,
    rows: &[Vec<Value>],
    value: &str,
) -> Result<AggregationResult, AggregateError> {
    let outputs = spec.output_columns();
    let vpos = position(&outputs, value)?;
    let zero = match spec.reducers.iter().find(|r| r.output == value).map(|r| r.reducer) {
        Some(Reducer::Count | Reducer::CountDistinct) => Value::Integer(0),
        _ => Value::Decimal(0.0),
    };

    let mut row_keys: Vec<&Value> = Vec::new();
    let mut col_keys: Vec<&Value> = Vec::new();
    for r in rows {
        if !row_keys.contains(&&r[0]) {
            row_keys.push(&r[0]);
        }
        if !col_keys.contains(&&r[1]) {
            col_keys.push(&r[1]);
        }
    }
    row_keys.sort_by(|a, b| a.total_cmp(b));
    col_keys.sort_by(|a, b| a.total_cmp(b));

    let cells: FxHashMap<(&Value, &Value), &Value> =
        rows.iter().map(|r| ((&r[0], &r[1]), &r[vpos])).collect();

    let mut columns = vec![spec.group_keys[0].clone()];
    columns.extend(col_keys.iter().map(|k| k.to_string()));
    let mut table = Table::new(name, columns);
    for rk in &row_keys {
        let mut row = vec![(*rk).clone()];
        for ck in &col_keys {
            let cell = cells.get(&(*rk, *ck)).copied().filter(|v| !v.is_null());
            row.push(cell.cloned().unwrap_or_else(|| zero.clone()));
        }
        table.push_row(row);
    }
    Ok(AggregationResult {
        group_keys: vec![spec.group_keys[0].clone()],
        table,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
