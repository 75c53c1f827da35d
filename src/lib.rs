//! Normalization, join and KPI aggregation for Northwind-style sales data.
//!
//! Raw tables flow through four stages, each returning a fresh value:
//!
//! 1. [`normalize`] renames, types and derives columns per the
//!    [`schema`] registry and reports data quality.
//! 2. [`facts`] left-joins the normalized tables into one fact table.
//! 3. [`aggregate`] groups, reduces, ranks, segments and pivots.
//! 4. [`kpi`] evaluates a declarative catalog of named KPIs.
//!
//! [`pipeline::Pipeline`] wires the stages together.

pub mod aggregate;
pub mod cli;
pub mod config;
pub mod error;
pub mod facts;
pub mod kpi;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod schema;

pub use config::{ConfigError, PipelineConfig};
pub use error::{Error, Result};
pub use pipeline::{Pipeline, PipelineInput, PipelineOutput};
