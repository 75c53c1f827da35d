//! Canonical schema registry.
//!
//! Pure declarative data: for each source table, which provider headers are
//! recognized, what each one is renamed to, how its cells are coerced, and
//! which single-table derived columns follow from them. The declarations
//! themselves live in [`tables`].

pub mod tables;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::model::ColumnType;

/// Canonical name of the table that drives the fact build.
pub const ORDER_DETAILS: &str = "order_details";
pub const ORDERS: &str = "orders";
pub const PRODUCTS: &str = "products";
pub const CUSTOMERS: &str = "customers";
pub const EMPLOYEES: &str = "employees";

// ---------------------------------------------------------------------------
// Column declarations
// ---------------------------------------------------------------------------

/// What to do with a cell that is missing or fails to parse.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Coercion {
    /// Missing and invalid cells become null.
    Strict,
    /// Missing and invalid numeric cells become 0. Never used on dates.
    ZeroFallback,
    /// Text labels map to integer codes; anything unmapped becomes `default`.
    /// Integral numbers pass through unchanged.
    Lookup {
        #[serde(skip)]
        labels: &'static [(&'static str, i64)],
        default: i64,
    },
}

/// One recognized source column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ColumnSpec {
    /// Header as written by the data provider.
    pub source: &'static str,
    /// Canonical column name.
    pub name: &'static str,
    pub ty: ColumnType,
    pub coercion: Coercion,
    /// Numeric fill for every row when the source column is absent. Without
    /// one, an absent column stays absent from the normalized table.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<f64>,
}

impl ColumnSpec {
    pub const fn new(source: &'static str, name: &'static str, ty: ColumnType) -> Self {
        Self {
            source,
            name,
            ty,
            coercion: Coercion::Strict,
            default: None,
        }
    }

    pub const fn text(source: &'static str, name: &'static str) -> Self {
        Self::new(source, name, ColumnType::Text)
    }

    pub const fn zero_fallback(mut self) -> Self {
        self.coercion = Coercion::ZeroFallback;
        self
    }

    pub const fn lookup(mut self, labels: &'static [(&'static str, i64)], default: i64) -> Self {
        self.coercion = Coercion::Lookup { labels, default };
        self
    }

    pub const fn default_value(mut self, value: f64) -> Self {
        self.default = Some(value);
        self
    }
}

// ---------------------------------------------------------------------------
// Derived columns
// ---------------------------------------------------------------------------

/// Calendar component extracted from a date column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DatePart {
    Year,
    Month,
    Quarter,
    DayName,
}

/// Formula for a derived column. Null in any dependency yields null.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Derivation {
    /// `quantity × unit_price × (1 − discount)`, rounded to the configured precision.
    LineTotal {
        quantity: &'static str,
        unit_price: &'static str,
        discount: &'static str,
    },
    /// Whole days from `start` to `end`.
    DaysBetween {
        start: &'static str,
        end: &'static str,
    },
    DatePart {
        source: &'static str,
        part: DatePart,
    },
    /// `minuend − subtrahend`, rounded.
    Difference {
        minuend: &'static str,
        subtrahend: &'static str,
    },
    /// `numerator / denominator × 100`, rounded; null when the denominator is 0.
    Percentage {
        numerator: &'static str,
        denominator: &'static str,
    },
    /// Text parts joined by `separator`.
    Concat {
        parts: &'static [&'static str],
        separator: &'static str,
    },
    /// First match of `pattern` in a text column.
    Extract {
        source: &'static str,
        pattern: &'static str,
    },
}

/// A single-table derived column.
#[derive(Debug, Clone, Serialize)]
pub struct DerivedSpec {
    pub name: &'static str,
    pub derivation: Derivation,
}

impl DerivedSpec {
    pub const fn new(name: &'static str, derivation: Derivation) -> Self {
        Self { name, derivation }
    }

    /// Columns this derivation reads.
    pub fn dependencies(&self) -> Vec<&'static str> {
        match self.derivation {
            Derivation::LineTotal {
                quantity,
                unit_price,
                discount,
            } => vec![quantity, unit_price, discount],
            Derivation::DaysBetween { start, end } => vec![start, end],
            Derivation::DatePart { source, .. } | Derivation::Extract { source, .. } => {
                vec![source]
            }
            Derivation::Difference {
                minuend,
                subtrahend,
            } => vec![minuend, subtrahend],
            Derivation::Percentage {
                numerator,
                denominator,
            } => vec![numerator, denominator],
            Derivation::Concat { parts, .. } => parts.to_vec(),
        }
    }

    /// Output type of the derived column.
    pub fn column_type(&self) -> ColumnType {
        match self.derivation {
            Derivation::LineTotal { .. }
            | Derivation::Difference { .. }
            | Derivation::Percentage { .. } => ColumnType::Decimal,
            Derivation::DaysBetween { .. } => ColumnType::Integer,
            Derivation::DatePart { part, .. } => match part {
                DatePart::DayName => ColumnType::Text,
                _ => ColumnType::Integer,
            },
            Derivation::Concat { .. } | Derivation::Extract { .. } => ColumnType::Text,
        }
    }
}

// ---------------------------------------------------------------------------
// Table schema and registry
// ---------------------------------------------------------------------------

/// Everything the normalizer needs to know about one source table.
#[derive(Debug, Serialize)]
pub struct TableSchema {
    /// Canonical table name.
    pub name: &'static str,
    /// Human-readable name the provider uses (file or sheet name).
    pub source_name: &'static str,
    pub columns: &'static [ColumnSpec],
    /// Evaluated in order; later entries may read earlier ones.
    pub derived: &'static [DerivedSpec],
}

impl TableSchema {
    /// Column spec for a provider header, matched exactly.
    pub fn column_for_source(&self, header: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.source == header)
    }

    /// Every canonical column name this table can produce, declared columns
    /// first, then derived ones.
    pub fn canonical_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns
            .iter()
            .map(|c| c.name)
            .chain(self.derived.iter().map(|d| d.name))
    }
}

/// Lookup over the declared table schemas.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    tables: Vec<&'static TableSchema>,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl SchemaRegistry {
    /// Registry with the five standard source tables.
    pub fn standard() -> Self {
        Self {
            tables: tables::ALL.to_vec(),
        }
    }

    /// Registry over an explicit set of schemas.
    pub fn with_tables(tables: Vec<&'static TableSchema>) -> Self {
        Self { tables }
    }

    /// Resolve a table by canonical name or provider name, ignoring ASCII case.
    pub fn lookup(&self, name: &str) -> Result<&'static TableSchema> {
        let wanted = name.trim();
        self.tables
            .iter()
            .copied()
            .find(|t| t.name.eq_ignore_ascii_case(wanted) || t.source_name.eq_ignore_ascii_case(wanted))
            .ok_or_else(|| Error::UnknownTable {
                table: name.to_string(),
            })
    }

    pub fn tables(&self) -> impl Iterator<Item = &'static TableSchema> + '_ {
        self.tables.iter().copied()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
