//! Failure taxonomy for the pipeline.
//!
//! Per-row data problems never show up here: they degrade to null or a
//! declared zero and are counted in the quality report. What remains are
//! structural failures, each carrying the table or KPI name it concerns.

use thiserror::Error;

use crate::aggregate::AggregateError;

/// Structural pipeline failure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Registry lookup for a table name that is not declared.
    #[error("unknown table '{table}': not declared in the schema registry")]
    UnknownTable { table: String },

    /// Input for a registered table is not a well-formed table.
    #[error("table '{table}' is not tabular: {detail}")]
    NotTabular { table: String, detail: String },

    /// The fact build has no order-details table to drive it.
    #[error("required table '{table}' is missing; cannot build the fact table")]
    MissingRequiredTable { table: String },

    /// A KPI refers to a KPI that has not been computed earlier in the run.
    #[error("KPI '{kpi}' depends on '{missing}', which was not computed before it")]
    KpiDependency { kpi: String, missing: String },

    /// A KPI's aggregation could not run.
    #[error("KPI '{kpi}': {source}")]
    Aggregate {
        kpi: String,
        #[source]
        source: AggregateError,
    },

    /// A KPI's post formula was handed a result of the wrong shape.
    #[error("KPI '{kpi}': {detail}")]
    KpiShape { kpi: String, detail: String },
}

impl Error {
    /// Short machine-readable kind, used in JSON error envelopes.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownTable { .. } => "unknown_table",
            Self::NotTabular { .. } => "not_tabular",
            Self::MissingRequiredTable { .. } => "missing_required_table",
            Self::KpiDependency { .. } => "kpi_dependency",
            Self::Aggregate { .. } => "aggregate",
            Self::KpiShape { .. } => "kpi_shape",
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, Error>;
