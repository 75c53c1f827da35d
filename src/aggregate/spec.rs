//! Declarative aggregation specs.

use serde::Serialize;

use crate::model::Value;

use super::AggregateError;

// ---------------------------------------------------------------------------
// Reducers
// ---------------------------------------------------------------------------

/// Reduction applied to one column within a group.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reducer {
    Sum,
    /// Non-null cells.
    Count,
    CountDistinct,
    Mean,
    Median,
    Min,
    Max,
}

impl std::fmt::Display for Reducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Sum => "sum",
            Self::Count => "count",
            Self::CountDistinct => "count_distinct",
            Self::Mean => "mean",
            Self::Median => "median",
            Self::Min => "min",
            Self::Max => "max",
        };
        f.write_str(s)
    }
}

/// One output column: `output = reducer(column)`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReducerSpec {
    pub output: String,
    pub column: String,
    pub reducer: Reducer,
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// What the result rows are ordered by.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortTarget {
    /// A reduced output column (or a group key column, by name).
    Column(String),
    /// The group-key tuple, compared lexicographically.
    GroupKeys,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SortBy {
    pub target: SortTarget,
    pub descending: bool,
}

/// Comparison used by [`Filter`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CmpOp {
    NotNull,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Row predicate applied before grouping. Null cells never pass.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Filter {
    pub column: String,
    pub op: CmpOp,
    pub value: Value,
}

impl Filter {
    pub fn not_null(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            op: CmpOp::NotNull,
            value: Value::Null,
        }
    }

    pub fn cmp(column: impl Into<String>, op: CmpOp, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    pub(crate) fn accepts(&self, cell: &Value) -> bool {
        use std::cmp::Ordering::*;
        if cell.is_null() {
            return false;
        }
        let ord = cell.total_cmp(&self.value);
        match self.op {
            CmpOp::NotNull => true,
            CmpOp::Eq => ord == Equal,
            CmpOp::Ne => ord != Equal,
            CmpOp::Lt => ord == Less,
            CmpOp::Le => ord != Greater,
            CmpOp::Gt => ord == Greater,
            CmpOp::Ge => ord != Less,
        }
    }
}

/// Partition groups into labelled buckets by quantile cut points on one
/// reduced column. `labels.len()` must be `cuts.len() + 1`; the first label
/// is the lowest bucket.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QuantileSegments {
    pub column: String,
    pub cuts: Vec<f64>,
    pub labels: Vec<String>,
}

/// Spread the second group key into columns holding `value`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Pivot {
    pub value: String,
}

// ---------------------------------------------------------------------------
// AggregateSpec
// ---------------------------------------------------------------------------

/// A full aggregation request. Build with the chained helpers:
///
/// ```
/// use northwind_bi::aggregate::{AggregateSpec, Reducer};
///
/// let spec = AggregateSpec::group_by(["product_name"])
///     .reduce("revenue", "line_total", Reducer::Sum)
///     .sort_desc("revenue")
///     .limit(10);
/// assert_eq!(spec.reducers.len(), 1);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AggregateSpec {
    pub group_keys: Vec<String>,
    pub reducers: Vec<ReducerSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Filter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<SortBy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantile_segments: Option<QuantileSegments>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pivot: Option<Pivot>,
}

impl AggregateSpec {
    /// Spec with no group keys: one group spanning every row.
    pub fn whole() -> Self {
        Self::default()
    }

    pub fn group_by<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            group_keys: keys.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn reduce(mut self, output: &str, column: &str, reducer: Reducer) -> Self {
        self.reducers.push(ReducerSpec {
            output: output.to_string(),
            column: column.to_string(),
            reducer,
        });
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn sort_desc(mut self, column: &str) -> Self {
        self.sort_by = Some(SortBy {
            target: SortTarget::Column(column.to_string()),
            descending: true,
        });
        self
    }

    pub fn sort_asc(mut self, column: &str) -> Self {
        self.sort_by = Some(SortBy {
            target: SortTarget::Column(column.to_string()),
            descending: false,
        });
        self
    }

    /// Chronological order for time series.
    pub fn sort_by_keys(mut self) -> Self {
        self.sort_by = Some(SortBy {
            target: SortTarget::GroupKeys,
            descending: false,
        });
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn segments(mut self, column: &str, cuts: Vec<f64>, labels: Vec<String>) -> Self {
        self.quantile_segments = Some(QuantileSegments {
            column: column.to_string(),
            cuts,
            labels,
        });
        self
    }

    pub fn pivot(mut self, value: &str) -> Self {
        self.pivot = Some(Pivot {
            value: value.to_string(),
        });
        self
    }

    /// Every column the spec reads from its input table.
    pub fn input_columns(&self) -> impl Iterator<Item = &str> {
        self.group_keys
            .iter()
            .map(String::as_str)
            .chain(self.reducers.iter().map(|r| r.column.as_str()))
            .chain(self.filter.iter().map(|f| f.column.as_str()))
    }

    /// Names of the result's columns before pivoting.
    pub fn output_columns(&self) -> Vec<String> {
        let mut out: Vec<String> = self.group_keys.clone();
        out.extend(self.reducers.iter().map(|r| r.output.clone()));
        if self.quantile_segments.is_some() {
            out.push(super::SEGMENT_COLUMN.to_string());
        }
        out
    }

    /// Check internal consistency. Does not look at any table.
    pub fn validate(&self) -> Result<(), AggregateError> {
        let invalid = |msg: String| Err(AggregateError::InvalidSpec(msg));

        let outputs = self.output_columns();
        for (i, name) in outputs.iter().enumerate() {
            if outputs[..i].contains(name) {
                return invalid(format!("output column '{name}' is declared twice"));
            }
        }

        if let Some(SortBy {
            target: SortTarget::Column(c),
            ..
        }) = &self.sort_by
            && !outputs.contains(c)
        {
            return Err(AggregateError::UnknownColumn { column: c.clone() });
        }

        if let Some(seg) = &self.quantile_segments {
            if !self.reducers.iter().any(|r| r.output == seg.column) {
                return Err(AggregateError::UnknownColumn {
                    column: seg.column.clone(),
                });
            }
            if seg.labels.len() != seg.cuts.len() + 1 {
                return invalid(format!(
                    "{} segment labels for {} cut points",
                    seg.labels.len(),
                    seg.cuts.len()
                ));
            }
            if seg.cuts.iter().any(|c| !(0.0..=1.0).contains(c))
                || seg.cuts.windows(2).any(|w| w[0] >= w[1])
            {
                return invalid("segment cuts must ascend within [0, 1]".to_string());
            }
        }

        if let Some(p) = &self.pivot {
            if self.group_keys.len() != 2 {
                return invalid(format!(
                    "pivot needs exactly two group keys, got {}",
                    self.group_keys.len()
                ));
            }
            if !self.reducers.iter().any(|r| r.output == p.value) {
                return Err(AggregateError::UnknownColumn {
                    column: p.value.clone(),
                });
            }
            if self.quantile_segments.is_some() || self.sort_by.is_some() || self.limit.is_some()
            {
                return invalid("pivot cannot be combined with sorting, limits or segments".into());
            }
        }
        Ok(())
    }
}
