//! Generic group / reduce / rank / segment engine.
//!
//! Every KPI is expressed as one [`AggregateSpec`] evaluated by
//! [`aggregate`] over the fact table or a normalized table, followed by a
//! post formula in the KPI layer. The engine itself never divides: ratio
//! handling lives in [`crate::kpi::derive`].
//!
//! # Module structure
//!
//! - [`spec`] — reducers, options and the spec builder
//! - [`engine`] — grouping, reduction, sorting and pivoting
//! - [`quantile`] — linear-interpolation quantiles and segment assignment
//! - [`series`] — period-over-period percent change

pub mod engine;
pub mod quantile;
pub mod series;
pub mod spec;

use thiserror::Error;

pub use engine::{AggregationResult, SEGMENT_COLUMN, aggregate};
pub use quantile::{quantile, segment_index};
pub use series::percent_change;
pub use spec::{
    AggregateSpec, CmpOp, Filter, Pivot, QuantileSegments, ReducerSpec, Reducer, SortBy,
    SortTarget,
};

/// Failure of a single aggregation call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AggregateError {
    /// A group key, reducer input, filter or option names a column the
    /// input table does not have.
    #[error("unknown column '{column}'")]
    UnknownColumn { column: String },

    /// The spec itself is inconsistent (e.g. pivot without two keys).
    #[error("invalid aggregation spec: {0}")]
    InvalidSpec(String),
}
