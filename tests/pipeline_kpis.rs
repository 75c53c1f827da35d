//! End-to-end runs over the checked-in Northwind sample and small synthetic
//! inputs.

mod util;

use northwind_bi::aggregate::{AggregateSpec, Reducer, aggregate};
use northwind_bi::model::{RawTable, RawValue, Value};
use northwind_bi::{Pipeline, PipelineConfig, PipelineInput};

use util::{TestTracing, order_details, products, sample_input};

#[test]
fn sample_fundamentals() {
    let out = Pipeline::default().run(&sample_input()).unwrap();
    let k = &out.kpis;
    assert!(k.failures().is_empty(), "{:?}", k.failures());

    assert_eq!(k.scalar("total_revenue"), Some(33.0));
    assert_eq!(k.scalar("total_profit"), Some(14.0));
    assert_eq!(k.scalar("margin_pct"), Some(42.42));
    assert_eq!(k.scalar("order_count"), Some(2.0));
    assert_eq!(k.scalar("customer_count"), Some(2.0));
    assert_eq!(k.scalar("products_sold"), Some(3.0));
    assert_eq!(k.scalar("total_quantity"), Some(7.0));
    assert_eq!(k.scalar("average_basket"), Some(16.5));
    assert_eq!(k.scalar("profit_per_order"), Some(7.0));
    assert_eq!(k.scalar("avg_quantity_per_order"), Some(3.5));
}

#[test]
fn sample_time_and_operations() {
    let out = Pipeline::default().run(&sample_input()).unwrap();
    let k = &out.kpis;

    let monthly = k.rows("monthly_sales").unwrap();
    assert_eq!(monthly.len(), 2);
    assert_eq!(monthly.get(0, "order_month"), Some(&Value::Integer(1)));
    assert_eq!(monthly.get(0, "revenue"), Some(&Value::Decimal(25.0)));

    let growth = k.rows("monthly_growth").unwrap();
    assert_eq!(growth.get(0, "growth_pct"), Some(&Value::Null));
    assert_eq!(growth.get(1, "growth_pct"), Some(&Value::Decimal(-68.0)));
    assert_eq!(k.scalar("monthly_growth_rate"), Some(-68.0));

    assert_eq!(k.scalar("avg_delivery_days"), Some(5.0));
    assert_eq!(k.scalar("median_delivery_days"), Some(5.0));
    assert_eq!(k.scalar("delivered_orders"), Some(2.0));
    assert_eq!(k.scalar("fast_deliveries"), Some(2.0));
    assert_eq!(k.scalar("fast_delivery_rate"), Some(100.0));
    assert_eq!(k.scalar("retention_rate"), Some(100.0));
    assert_eq!(k.scalar("average_clv"), Some(16.5));

    let payments = k.rows("payment_methods").unwrap();
    assert_eq!(payments.len(), 2);
}

#[test]
fn sample_rankings_and_segments() {
    let out = Pipeline::default().run(&sample_input()).unwrap();
    let k = &out.kpis;

    let top = k.rows("top_products_revenue").unwrap();
    assert_eq!(top.get(0, "product_name"), Some(&Value::text("Chai")));
    assert_eq!(top.get(0, "margin_pct"), Some(&Value::Decimal(40.0)));

    let customers = k.rows("top_customers").unwrap();
    assert_eq!(customers.get(0, "customer_company"), Some(&Value::text("Company A")));
    assert_eq!(customers.get(0, "avg_order_value"), Some(&Value::Decimal(25.0)));

    let segments = k.rows("customer_segments").unwrap();
    let members: i64 = segments
        .column("members")
        .unwrap()
        .filter_map(Value::as_i64)
        .sum();
    assert_eq!(members, 2);
    assert_eq!(segments.len(), 3);

    assert_eq!(top.get(0, "orders"), Some(&Value::Integer(1)));

    let categories = k.rows("category_performance").unwrap();
    assert_eq!(categories.get(0, "category"), Some(&Value::text("Beverages")));
    assert_eq!(categories.get(0, "orders"), Some(&Value::Integer(2)));

    let staff = k.rows("employee_performance").unwrap();
    assert_eq!(staff.get(0, "employee_name"), Some(&Value::text("Nancy Freehafer")));
    assert_eq!(staff.get(0, "margin_pct"), Some(&Value::Decimal(40.0)));

    let weekdays = k.rows("orders_by_weekday").unwrap();
    assert_eq!(weekdays.len(), 2);
    assert_eq!(weekdays.get(0, "order_day_name"), Some(&Value::text("Sunday")));
    assert_eq!(weekdays.get(1, "order_day_name"), Some(&Value::text("Friday")));

    let matrix = k.rows("category_quarter_matrix").unwrap();
    assert_eq!(matrix.columns(), &["category".to_string(), "1".to_string()]);
    assert_eq!(matrix.get(0, "1"), Some(&Value::Decimal(28.0)));
}

#[test]
fn sample_fact_columns_are_populated() {
    let (normalized, facts) = Pipeline::default().build(&sample_input()).unwrap();
    let t = &facts.table;
    assert_eq!(t.len(), 3);
    assert_eq!(t.get(0, "customer_name"), Some(&Value::text("Anna Bedecs")));
    assert_eq!(t.get(0, "employee_name"), Some(&Value::text("Nancy Freehafer")));
    assert_eq!(t.get(0, "status_id"), Some(&Value::Integer(3)));
    assert_eq!(t.get(0, "shipping_fee"), Some(&Value::Decimal(10.0)));
    assert_eq!(t.get(2, "delivery_days"), Some(&Value::Integer(3)));

    let q = normalized.quality_report("customers").unwrap();
    assert_eq!(q.dropped_columns, vec!["Fax Number".to_string()]);
    let q = normalized.quality_report("order_details").unwrap();
    assert_eq!(q.zero_filled, 1);
    let employees = normalized.table("employees").unwrap();
    assert_eq!(
        employees.get(0, "languages"),
        Some(&Value::text("Fluent in French, German"))
    );
}

#[test]
fn carrier_rows_count_orders_once_and_average_fees() {
    let orders = RawTable::new(["Order ID", "Ship Via", "Shipping Fee"])
        .with_row(vec![RawValue::from(1i64), RawValue::from("A"), RawValue::from(10.0)])
        .with_row(vec![RawValue::from(1i64), RawValue::from("A"), RawValue::from(30.0)]);
    let input = PipelineInput::default()
        .with_table("Order Details", order_details(&[(1, "Chai", 1.0, 10.0)]))
        .with_table("Orders", orders);
    let out = Pipeline::default().run(&input).unwrap();

    let carriers = out.kpis.rows("carrier_performance").unwrap();
    assert_eq!(carriers.len(), 1);
    assert_eq!(carriers.get(0, "orders"), Some(&Value::Integer(1)));
    assert_eq!(carriers.get(0, "avg_shipping_fee"), Some(&Value::Decimal(20.0)));
}

#[test]
fn revenue_profit_margin_example() {
    // 2 orders, 3 lines: 2@$10, 1@$5, 4@$2 with costs 6, 3, 1.
    let input = PipelineInput::default()
        .with_table(
            "Order Details",
            order_details(&[(1, "P1", 2.0, 10.0), (1, "P2", 1.0, 5.0), (2, "P3", 4.0, 2.0)]),
        )
        .with_table(
            "Products",
            products(&[("P1", 6.0, "A"), ("P2", 3.0, "A"), ("P3", 1.0, "B")]),
        );
    let out = Pipeline::default().run(&input).unwrap();
    assert_eq!(out.kpis.scalar("total_revenue"), Some(33.0));
    assert_eq!(out.kpis.scalar("total_profit"), Some(14.0));
    let margin = out.kpis.scalar("margin_pct").unwrap();
    assert!((margin - 42.4).abs() < 0.05, "{margin}");
}

#[test]
fn runs_are_byte_identical() {
    let pipeline = Pipeline::default();
    let input = sample_input();
    let first = serde_json::to_string(&pipeline.run(&input).unwrap()).unwrap();
    let second = serde_json::to_string(&pipeline.run(&input).unwrap()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn top_one_tie_is_first_seen() {
    let input = PipelineInput::default().with_table(
        "Order Details",
        order_details(&[(1, "Second", 1.0, 1.0), (1, "Tied A", 1.0, 10.0), (2, "Tied B", 2.0, 5.0)]),
    );
    let config = PipelineConfig {
        top_products: 1,
        ..Default::default()
    };
    let pipeline = Pipeline::new(config);
    for _ in 0..5 {
        let out = pipeline.run(&input).unwrap();
        let top = out.kpis.rows("top_products_revenue").unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top.get(0, "product_name"), Some(&Value::text("Tied A")));
    }
}

#[test]
fn fan_out_is_logged_once_per_key() {
    let tracing = TestTracing::new();
    let _guard = tracing.install();

    let input = PipelineInput::default()
        .with_table(
            "Order Details",
            order_details(&[(1, "Chai", 1.0, 10.0), (2, "Chai", 1.0, 10.0), (3, "Chai", 1.0, 10.0)]),
        )
        .with_table("Products", products(&[("Chai", 6.0, "First"), ("Chai", 9.0, "Second")]));
    let (_, facts) = Pipeline::default().build(&input).unwrap();

    assert_eq!(facts.table.len(), 3);
    assert_eq!(facts.fan_outs.len(), 1);
    assert_eq!(sum(&facts.table, "profit"), 12.0);
    assert_eq!(tracing.count("join fan-out"), 1);
    tracing.assert_contains("Chai");
}

#[test]
fn kpis_survive_missing_lookup_tables() {
    let input = PipelineInput::default().with_table(
        "Order Details",
        order_details(&[(1, "Chai", 2.0, 10.0)]),
    );
    let out = Pipeline::default().run(&input).unwrap();
    assert!(out.kpis.failures().is_empty(), "{:?}", out.kpis.failures());
    assert_eq!(out.kpis.scalar("total_profit"), Some(0.0));
    assert_eq!(out.kpis.scalar("margin_pct"), Some(0.0));
    assert_eq!(out.kpis.scalar("avg_delivery_days"), Some(0.0));
    assert_eq!(out.kpis.scalar("retention_rate"), Some(100.0));
    assert_eq!(out.facts.unmatched["orders"], 1);
}

#[test]
fn empty_details_give_zero_kpis() {
    let input = PipelineInput::default().with_table("Order Details", RawTable::new(["Order ID"]));
    let out = Pipeline::default().run(&input).unwrap();
    assert_eq!(out.facts.table.len(), 0);
    assert_eq!(out.kpis.scalar("total_revenue"), Some(0.0));
    assert_eq!(out.kpis.scalar("margin_pct"), Some(0.0));
    assert!(out.kpis.rows("top_customers").unwrap().is_empty());
}

#[test]
fn aggregation_reads_normalized_tables_directly() {
    let (normalized, _) = Pipeline::default().build(&sample_input()).unwrap();
    let products = normalized.table("products").unwrap();
    let spec = AggregateSpec::group_by(["category"])
        .reduce("avg_margin", "margin_percentage", Reducer::Mean)
        .sort_asc("category");
    let r = aggregate(products, &spec).unwrap();
    assert_eq!(r.table.get(0, "category"), Some(&Value::text("Beverages")));
    // Chai 40%, Tea 50%.
    assert_eq!(r.table.get(0, "avg_margin"), Some(&Value::Decimal(45.0)));
}

fn sum(t: &northwind_bi::model::Table, column: &str) -> f64 {
    t.column(column).unwrap().filter_map(Value::as_f64).sum()
}
