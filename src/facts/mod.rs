//! Fact builder.
//!
//! Left-joins order details to orders (order id), products (product name)
//! and customers (company name), in that order, then computes profit and
//! projects the fixed fact column list. Every order-detail row yields
//! exactly one fact row. A failed lookup leaves its columns null; a key
//! with several matches takes the first in lookup-table row order and is
//! reported as a [`FanOutWarning`].

mod lookup;

use std::collections::BTreeMap;

use rustc_hash::FxHashSet;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::model::value::round_to;
use crate::model::{Row, Table, Value};
use crate::normalize::NormalizedTables;
use crate::schema::{CUSTOMERS, ORDER_DETAILS, ORDERS, PRODUCTS};

use self::lookup::Lookup;

/// Name of the built table.
pub const FACT_TABLE: &str = "facts";

/// Fact table columns, in output order.
pub const FACT_COLUMNS: [&str; 22] = [
    "order_id",
    "order_date",
    "order_year",
    "order_month",
    "order_quarter",
    "customer_company",
    "customer_name",
    "city",
    "state",
    "country",
    "employee_name",
    "product_name",
    "category",
    "quantity",
    "unit_price",
    "line_total",
    "standard_cost",
    "profit",
    "shipping_fee",
    "payment_type",
    "delivery_days",
    "status_id",
];

/// Where each fact column is read from.
#[derive(Clone, Copy)]
enum Origin {
    Details(&'static str),
    Orders(&'static str),
    Products(&'static str),
    Customers(&'static str),
    Profit,
}

const PROJECTION: [Origin; 22] = [
    Origin::Details("order_id"),
    Origin::Orders("order_date"),
    Origin::Orders("order_year"),
    Origin::Orders("order_month"),
    Origin::Orders("order_quarter"),
    Origin::Orders("customer_company"),
    Origin::Customers("customer_name"),
    Origin::Customers("city"),
    Origin::Customers("state"),
    Origin::Customers("country"),
    Origin::Orders("employee_name"),
    Origin::Details("product_name"),
    Origin::Products("category"),
    Origin::Details("quantity"),
    Origin::Details("unit_price"),
    Origin::Details("line_total"),
    Origin::Products("standard_cost"),
    Origin::Profit,
    Origin::Orders("shipping_fee"),
    Origin::Orders("payment_type"),
    Origin::Orders("delivery_days"),
    Origin::Orders("status_id"),
];

/// A join key that matched more than one lookup row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FanOutWarning {
    pub table: String,
    pub key: String,
    pub matches: usize,
}

/// Output of [`build_facts`].
#[derive(Debug, Clone, Serialize)]
pub struct FactBuild {
    pub table: Table,
    /// One entry per distinct fanned-out key, in first-hit order.
    pub fan_outs: Vec<FanOutWarning>,
    /// Fact rows whose lookup into each table found nothing.
    pub unmatched: BTreeMap<String, usize>,
}

/// Per-lookup join state.
struct Join<'t> {
    table: &'static str,
    lookup: Option<Lookup<'t>>,
    warned: FxHashSet<&'t Value>,
    unmatched: usize,
}

impl<'t> Join<'t> {
    fn new(tables: &'t NormalizedTables, table: &'static str, key: &'static str) -> Self {
        let lookup = match tables.table(table) {
            None => {
                warn!(table, "lookup table absent; its fact columns will be null");
                None
            }
            Some(t) => {
                let lookup = Lookup::build(t, key);
                if lookup.is_none() {
                    warn!(table, key, "lookup table has no key column; its fact columns will be null");
                }
                lookup
            }
        };
        Self {
            table,
            lookup,
            warned: FxHashSet::default(),
            unmatched: 0,
        }
    }

    fn probe(&mut self, key: &Value, fan_outs: &mut Vec<FanOutWarning>) -> Option<Row<'t>> {
        let hit = self.lookup.as_ref().and_then(|l| l.first(key));
        let Some(hit) = hit else {
            self.unmatched += 1;
            return None;
        };
        if hit.matches > 1 && self.warned.insert(hit.key) {
            warn!(
                table = self.table,
                key = %hit.key,
                matches = hit.matches,
                "join fan-out; using first match"
            );
            fan_outs.push(FanOutWarning {
                table: self.table.to_string(),
                key: hit.key.to_string(),
                matches: hit.matches,
            });
        }
        Some(hit.row)
    }
}

/// Build the fact table from normalized tables.
///
/// Fails only when the order-details table is absent.
pub fn build_facts(tables: &NormalizedTables, precision: u32) -> Result<FactBuild> {
    let details = tables
        .table(ORDER_DETAILS)
        .ok_or_else(|| Error::MissingRequiredTable {
            table: ORDER_DETAILS.to_string(),
        })?;

    let mut orders = Join::new(tables, ORDERS, "order_id");
    let mut products = Join::new(tables, PRODUCTS, "product_name");
    let mut customers = Join::new(tables, CUSTOMERS, "company_name");
    let mut fan_outs = Vec::new();

    let mut facts = Table::new(
        FACT_TABLE,
        FACT_COLUMNS.iter().map(|c| c.to_string()).collect(),
    );
    for detail in details.rows() {
        let order = orders.probe(detail.value("order_id"), &mut fan_outs);
        let product = products.probe(detail.value("product_name"), &mut fan_outs);
        let company = order.map_or(&Value::Null, |o| o.value("customer_company"));
        let customer = customers.probe(company, &mut fan_outs);

        let pick = |row: Option<Row<'_>>, col: &str| row.map_or(Value::Null, |r| r.value(col).clone());
        let mut row: Vec<Value> = PROJECTION
            .iter()
            .map(|origin| match *origin {
                Origin::Details(c) => detail.value(c).clone(),
                Origin::Orders(c) => pick(order, c),
                Origin::Products(c) => pick(product, c),
                Origin::Customers(c) => pick(customer, c),
                Origin::Profit => Value::Null,
            })
            .collect();
        row[PROFIT] = profit(&row, precision);
        facts.push_row(row);
    }

    let unmatched: BTreeMap<String, usize> = [&orders, &products, &customers]
        .iter()
        .map(|j| (j.table.to_string(), j.unmatched))
        .collect();
    info!(
        rows = facts.len(),
        fan_outs = fan_outs.len(),
        unmatched_orders = unmatched[ORDERS],
        unmatched_products = unmatched[PRODUCTS],
        unmatched_customers = unmatched[CUSTOMERS],
        "fact table built"
    );
    Ok(FactBuild {
        table: facts,
        fan_outs,
        unmatched,
    })
}

const QUANTITY: usize = 13;
const UNIT_PRICE: usize = 14;
const STANDARD_COST: usize = 16;
const PROFIT: usize = 17;

/// `(unit_price − standard_cost) × quantity`, null when any input is null.
fn profit(row: &[Value], precision: u32) -> Value {
    match (
        row[UNIT_PRICE].as_f64(),
        row[STANDARD_COST].as_f64(),
        row[QUANTITY].as_f64(),
    ) {
        (Some(price), Some(cost), Some(qty)) => {
            Value::decimal(round_to((price - cost) * qty, precision))
        }
        _ => Value::Null,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{NormalizedTable, QualityReport};
    use chrono::NaiveDate;

    fn normalized(tables: Vec<Table>) -> NormalizedTables {
        tables
            .into_iter()
            .map(|table| NormalizedTable {
                table,
                quality: QualityReport::default(),
            })
            .collect()
    }

    fn details() -> Table {
        Table::from_rows(
            ORDER_DETAILS,
            &["order_id", "product_name", "quantity", "unit_price", "discount", "line_total"],
            vec![
                vec![Value::Integer(1), Value::text("Chai"), Value::Decimal(2.0), Value::Decimal(10.0), Value::Decimal(0.0), Value::Decimal(20.0)],
                vec![Value::Integer(1), Value::text("Jam"), Value::Decimal(1.0), Value::Decimal(5.0), Value::Decimal(0.0), Value::Decimal(5.0)],
                vec![Value::Integer(2), Value::text("Tea"), Value::Decimal(4.0), Value::Decimal(2.0), Value::Decimal(0.0), Value::Decimal(8.0)],
            ],
        )
    }

    fn orders() -> Table {
        let d = Value::Date(NaiveDate::from_ymd_opt(2006, 1, 15).unwrap());
        Table::from_rows(
            ORDERS,
            &["order_id", "customer_company", "order_date", "status_id"],
            vec![
                vec![Value::Integer(1), Value::text("Company A"), d.clone(), Value::Integer(3)],
                vec![Value::Integer(2), Value::text("Company B"), d, Value::Integer(2)],
            ],
        )
    }

    fn products() -> Table {
        Table::from_rows(
            PRODUCTS,
            &["product_name", "standard_cost", "category"],
            vec![
                vec![Value::text("Chai"), Value::Decimal(6.0), Value::text("Beverages")],
                vec![Value::text("Jam"), Value::Decimal(3.0), Value::text("Jams")],
                vec![Value::text("Tea"), Value::Decimal(1.0), Value::text("Beverages")],
            ],
        )
    }

    fn customers() -> Table {
        Table::from_rows(
            CUSTOMERS,
            &["company_name", "customer_name", "country"],
            vec![
                vec![Value::text("Company A"), Value::text("Anna Bedecs"), Value::text("USA")],
                vec![Value::text("Company B"), Value::text("Antonio Gratacos"), Value::text("USA")],
            ],
        )
    }

    fn sum(t: &Table, col: &str) -> f64 {
        t.column(col).unwrap().filter_map(Value::as_f64).sum()
    }

    #[test]
    fn projection_matches_column_list() {
        assert_eq!(PROJECTION.len(), FACT_COLUMNS.len());
        assert_eq!(FACT_COLUMNS[QUANTITY], "quantity");
        assert_eq!(FACT_COLUMNS[UNIT_PRICE], "unit_price");
        assert_eq!(FACT_COLUMNS[STANDARD_COST], "standard_cost");
        assert_eq!(FACT_COLUMNS[PROFIT], "profit");
    }

    #[test]
    fn joins_all_tables_and_computes_profit() {
        let tables = normalized(vec![details(), orders(), products(), customers()]);
        let build = build_facts(&tables, 2).unwrap();
        let t = &build.table;
        assert_eq!(t.len(), 3);
        assert_eq!(t.columns().len(), 22);
        assert_eq!(sum(t, "line_total"), 33.0);
        assert_eq!(sum(t, "profit"), 14.0);
        assert_eq!(t.get(2, "customer_name"), Some(&Value::text("Antonio Gratacos")));
        assert_eq!(t.get(0, "category"), Some(&Value::text("Beverages")));
        assert_eq!(t.get(0, "status_id"), Some(&Value::Integer(3)));
        assert!(build.fan_outs.is_empty());
        assert!(build.unmatched.values().all(|&n| n == 0));
    }

    #[test]
    fn missing_details_is_fatal() {
        let tables = normalized(vec![orders(), products()]);
        assert_eq!(
            build_facts(&tables, 2).unwrap_err(),
            Error::MissingRequiredTable {
                table: ORDER_DETAILS.into()
            }
        );
    }

    #[test]
    fn absent_lookups_degrade_to_null() {
        let tables = normalized(vec![details()]);
        let build = build_facts(&tables, 2).unwrap();
        assert_eq!(build.table.len(), 3);
        assert!(build.table.column("order_date").unwrap().all(Value::is_null));
        assert!(build.table.column("profit").unwrap().all(Value::is_null));
        assert_eq!(build.unmatched[ORDERS], 3);
        assert_eq!(build.unmatched[CUSTOMERS], 3);
    }

    #[test]
    fn fan_out_takes_first_match_and_warns_once() {
        let dup = Table::from_rows(
            PRODUCTS,
            &["product_name", "standard_cost", "category"],
            vec![
                vec![Value::text("Chai"), Value::Decimal(6.0), Value::text("First")],
                vec![Value::text("Chai"), Value::Decimal(9.0), Value::text("Second")],
            ],
        );
        let two_chai = Table::from_rows(
            ORDER_DETAILS,
            &["order_id", "product_name", "quantity", "unit_price"],
            vec![
                vec![Value::Integer(1), Value::text("Chai"), Value::Decimal(1.0), Value::Decimal(10.0)],
                vec![Value::Integer(2), Value::text("Chai"), Value::Decimal(1.0), Value::Decimal(10.0)],
            ],
        );
        let tables = normalized(vec![two_chai, dup]);
        let build = build_facts(&tables, 2).unwrap();
        assert_eq!(build.table.len(), 2);
        assert!(
            build
                .table
                .column("category")
                .unwrap()
                .all(|v| v == &Value::text("First"))
        );
        assert_eq!(
            build.fan_outs,
            vec![FanOutWarning {
                table: PRODUCTS.into(),
                key: "Chai".into(),
                matches: 2
            }]
        );
    }

    #[test]
    fn unknown_standard_cost_leaves_profit_null() {
        let mut p = products();
        p.push_row(vec![Value::text("Mystery"), Value::Null, Value::Null]);
        let d = Table::from_rows(
            ORDER_DETAILS,
            &["order_id", "product_name", "quantity", "unit_price"],
            vec![vec![Value::Integer(1), Value::text("Mystery"), Value::Decimal(3.0), Value::Decimal(4.0)]],
        );
        let build = build_facts(&normalized(vec![d, p]), 2).unwrap();
        assert_eq!(build.table.get(0, "profit"), Some(&Value::Null));
        assert_eq!(build.table.get(0, "line_total"), Some(&Value::Null));
    }

    #[test]
    fn null_keys_never_match() {
        let d = Table::from_rows(
            ORDER_DETAILS,
            &["order_id", "product_name"],
            vec![vec![Value::Null, Value::Null]],
        );
        let build = build_facts(&normalized(vec![d, orders(), products()]), 2).unwrap();
        assert_eq!(build.table.len(), 1);
        assert_eq!(build.unmatched[ORDERS], 1);
        assert_eq!(build.unmatched[PRODUCTS], 1);
    }
}
