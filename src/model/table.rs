//! Row-major tables.
//!
//! [`RawTable`] carries untyped loader output keyed by the provider's
//! headers. [`Table`] carries typed canonical rows and is the unit every
//! later stage consumes and produces. Tables are never mutated in place by
//! the pipeline; each stage builds a new one.

use rustc_hash::FxHashMap;
use serde::ser::{SerializeMap, SerializeSeq, SerializeStruct};
use serde::{Deserialize, Serialize, Serializer};

use super::value::{RawValue, Value};

// ---------------------------------------------------------------------------
// RawTable
// ---------------------------------------------------------------------------

/// Untyped tabular input for one source table.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawTable {
    /// Column headers exactly as the provider wrote them.
    pub columns: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<RawValue>>,
}

impl RawTable {
    pub fn new(columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Builder-style row append.
    pub fn with_row(mut self, row: Vec<RawValue>) -> Self {
        self.rows.push(row);
        self
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Describe the first structural defect, if any: duplicate headers or a
    /// row whose width differs from the header.
    pub fn structural_defect(&self) -> Option<String> {
        let mut seen = FxHashMap::default();
        for (idx, col) in self.columns.iter().enumerate() {
            if let Some(prev) = seen.insert(col.as_str(), idx) {
                return Some(format!(
                    "duplicate header '{col}' at positions {prev} and {idx}"
                ));
            }
        }
        self.rows
            .iter()
            .position(|r| r.len() != self.columns.len())
            .map(|i| {
                format!(
                    "row {i} has {} cells, header has {}",
                    self.rows[i].len(),
                    self.columns.len()
                )
            })
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// A typed table with uniquely named columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    name: String,
    columns: Vec<String>,
    index: FxHashMap<String, usize>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Create an empty table. Later duplicates of a column name are ignored
    /// by lookups; callers pass unique names.
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        let mut index = FxHashMap::default();
        for (i, c) in columns.iter().enumerate() {
            index.entry(c.clone()).or_insert(i);
        }
        Self {
            name: name.into(),
            columns,
            index,
            rows: Vec::new(),
        }
    }

    /// Convenience constructor used mostly by tests and benches.
    pub fn from_rows(name: &str, columns: &[&str], rows: Vec<Vec<Value>>) -> Self {
        let mut table = Self::new(name, columns.iter().map(|c| c.to_string()).collect());
        for row in rows {
            table.push_row(row);
        }
        table
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.index.get(column).copied()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.index.contains_key(column)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append a row. Short rows are padded with `Null`, long rows truncated.
    pub fn push_row(&mut self, mut row: Vec<Value>) {
        row.resize(self.columns.len(), Value::Null);
        self.rows.push(row);
    }

    pub fn row(&self, idx: usize) -> Option<Row<'_>> {
        self.rows.get(idx).map(|values| Row {
            table: self,
            values,
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(move |values| Row {
            table: self,
            values,
        })
    }

    pub fn raw_rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Cell at `(row, column)`; `None` when either is out of range.
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let col = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(col))
    }

    /// All cells of one column, in row order.
    pub fn column(&self, column: &str) -> Option<impl Iterator<Item = &Value>> {
        let col = self.column_index(column)?;
        Some(self.rows.iter().map(move |r| &r[col]))
    }

    /// Serialize rows as JSON objects keyed by column name.
    pub fn records(&self) -> Records<'_> {
        Records(self)
    }
}

impl Serialize for Table {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Table", 3)?;
        s.serialize_field("name", &self.name)?;
        s.serialize_field("columns", &self.columns)?;
        s.serialize_field("rows", &self.rows)?;
        s.end()
    }
}

/// Borrowed view of one table row.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    table: &'a Table,
    values: &'a [Value],
}

impl<'a> Row<'a> {
    /// Cell by column name; `None` when the table has no such column.
    pub fn get(&self, column: &str) -> Option<&'a Value> {
        self.table.column_index(column).map(|i| &self.values[i])
    }

    /// Cell by column name, treating an absent column as null.
    pub fn value(&self, column: &str) -> &'a Value {
        const NULL: &Value = &Value::Null;
        self.get(column).unwrap_or(NULL)
    }

    pub fn values(&self) -> &'a [Value] {
        self.values
    }
}

impl Serialize for Row<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in self.table.columns.iter().zip(self.values) {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Row-object serialization adapter returned by [`Table::records`].
pub struct Records<'a>(&'a Table);

impl Serialize for Records<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.0.len()))?;
        for row in self.0.rows() {
            seq.serialize_element(&row)?;
        }
        seq.end()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_ragged_rows() {
        let raw = RawTable::new(["Order ID", "Customer"])
            .with_row(vec![RawValue::Number(1.0), RawValue::text("Company A")])
            .with_row(vec![RawValue::Number(2.0)]);
        let defect = raw.structural_defect().unwrap();
        assert!(defect.contains("row 1"), "{defect}");
    }

    #[test]
    fn detects_duplicate_headers() {
        let raw = RawTable::new(["ID", "ID"]);
        assert!(raw.structural_defect().unwrap().contains("duplicate header"));
    }

    #[test]
    fn well_formed_table_has_no_defect() {
        let raw = RawTable::new(["ID"]).with_row(vec![RawValue::Missing]);
        assert!(raw.structural_defect().is_none());
    }

    #[test]
    fn row_lookup_by_name() {
        let t = Table::from_rows(
            "orders",
            &["order_id", "customer_company"],
            vec![vec![Value::Integer(7), Value::text("Company H")]],
        );
        let row = t.row(0).unwrap();
        assert_eq!(row.get("order_id"), Some(&Value::Integer(7)));
        assert_eq!(row.get("nope"), None);
        assert_eq!(row.value("nope"), &Value::Null);
    }

    #[test]
    fn records_keep_column_order() {
        let t = Table::from_rows(
            "t",
            &["zeta", "alpha"],
            vec![vec![Value::Integer(1), Value::text("x")]],
        );
        let json = serde_json::to_string(&t.records()).unwrap();
        assert_eq!(json, r#"[{"zeta":1,"alpha":"x"}]"#);
    }

    #[test]
    fn push_row_pads_short_rows() {
        let mut t = Table::new("t", vec!["a".into(), "b".into()]);
        t.push_row(vec![Value::Integer(1)]);
        assert_eq!(t.get(0, "b"), Some(&Value::Null));
    }
}
