//! Multi-map join lookup.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::model::{Row, Table, Value};

/// Key → row positions in lookup-table row order.
pub(super) struct Lookup<'t> {
    table: &'t Table,
    rows: FxHashMap<&'t Value, SmallVec<[usize; 1]>>,
}

/// The row a probe resolved to.
pub(super) struct Hit<'t> {
    pub key: &'t Value,
    pub row: Row<'t>,
    pub matches: usize,
}

impl<'t> Lookup<'t> {
    /// Index `table` on `key`. `None` when the key column is absent.
    /// Null keys are not indexed.
    pub fn build(table: &'t Table, key: &str) -> Option<Self> {
        let col = table.column_index(key)?;
        let mut rows: FxHashMap<&'t Value, SmallVec<[usize; 1]>> = FxHashMap::default();
        for (i, row) in table.raw_rows().iter().enumerate() {
            let k = &row[col];
            if !k.is_null() {
                rows.entry(k).or_default().push(i);
            }
        }
        Some(Self { table, rows })
    }

    /// First matching row and the total number of matches.
    pub fn first(&self, key: &Value) -> Option<Hit<'t>> {
        let (k, positions) = self.rows.get_key_value(key)?;
        let row = self.table.row(*positions.first()?)?;
        Some(Hit {
            key: *k,
            row,
            matches: positions.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_match_in_row_order() {
        let t = Table::from_rows(
            "products",
            &["product_name", "category"],
            vec![
                vec![Value::text("Chai"), Value::text("a")],
                vec![Value::Null, Value::text("b")],
                vec![Value::text("Chai"), Value::text("c")],
            ],
        );
        let l = Lookup::build(&t, "product_name").unwrap();
        let hit = l.first(&Value::text("Chai")).unwrap();
        assert_eq!(hit.matches, 2);
        assert_eq!(hit.row.value("category"), &Value::text("a"));
        assert!(l.first(&Value::Null).is_none());
        assert!(Lookup::build(&t, "nope").is_none());
    }
}
