//! The default Northwind KPI catalog.
//!
//! Order matters: derived KPIs follow the KPIs they read.

use crate::aggregate::{AggregateSpec, CmpOp, Filter, Reducer};
use crate::config::PipelineConfig;
use crate::schema::ORDERS;

use super::derive::LastTwo;
use super::{KpiDef, KpiSource, Post, RowRatio};

use Reducer::{Count, CountDistinct, Max, Mean, Median, Min, Sum};

fn whole(output: &str, column: &str, reducer: Reducer) -> AggregateSpec {
    AggregateSpec::whole().reduce(output, column, reducer)
}

fn ratio(name: &str, numerator: &str, denominator: &str, percent: bool) -> KpiDef {
    KpiDef::derived(
        name,
        Post::Ratio {
            numerator: numerator.into(),
            denominator: denominator.into(),
            percent,
        },
    )
}

fn orders_scalar(name: &str, spec: AggregateSpec, column: &str) -> KpiDef {
    KpiDef::aggregate(
        name,
        KpiSource::Table(ORDERS),
        spec,
        Post::Scalar {
            column: column.into(),
        },
    )
}

/// Build the default catalog for `config`.
pub fn default_catalog(config: &PipelineConfig) -> Vec<KpiDef> {
    let mut kpis = Vec::new();

    // Fundamentals.
    kpis.extend([
        KpiDef::fact_scalar("total_revenue", whole("v", "line_total", Sum), "v"),
        KpiDef::fact_scalar("total_profit", whole("v", "profit", Sum), "v"),
        ratio("margin_pct", "total_profit", "total_revenue", true),
        KpiDef::fact_scalar("order_count", whole("v", "order_id", CountDistinct), "v"),
        KpiDef::fact_scalar("customer_count", whole("v", "customer_company", CountDistinct), "v"),
        KpiDef::fact_scalar("products_sold", whole("v", "product_name", CountDistinct), "v"),
        KpiDef::fact_scalar("total_quantity", whole("v", "quantity", Sum), "v"),
        ratio("average_basket", "total_revenue", "order_count", false),
        ratio("profit_per_order", "total_profit", "order_count", false),
        ratio("avg_quantity_per_order", "total_quantity", "order_count", false),
    ]);

    // Time.
    kpis.extend([
        KpiDef::fact_rows(
            "monthly_sales",
            AggregateSpec::group_by(["order_year", "order_month"])
                .reduce("revenue", "line_total", Sum)
                .reduce("profit", "profit", Sum)
                .reduce("orders", "order_id", CountDistinct)
                .reduce("quantity", "quantity", Sum)
                .sort_by_keys(),
            vec![],
        ),
        KpiDef::derived(
            "monthly_growth",
            Post::PercentChange {
                kpi: "monthly_sales".into(),
                column: "revenue".into(),
                output: "growth_pct".into(),
            },
        ),
    ]);

    // Products.
    let by_product = || AggregateSpec::group_by(["product_name"]);
    kpis.extend([
        KpiDef::fact_rows(
            "top_products_revenue",
            by_product()
                .reduce("revenue", "line_total", Sum)
                .reduce("quantity", "quantity", Sum)
                .reduce("profit", "profit", Sum)
                .reduce("orders", "order_id", CountDistinct)
                .sort_desc("revenue")
                .limit(config.top_products),
            vec![RowRatio::pct("margin_pct", "profit", "revenue")],
        ),
        KpiDef::fact_rows(
            "top_products_quantity",
            by_product()
                .reduce("quantity", "quantity", Sum)
                .reduce("revenue", "line_total", Sum)
                .sort_desc("quantity")
                .limit(config.top_products),
            vec![],
        ),
        KpiDef::fact_rows(
            "top_products_profit",
            by_product()
                .reduce("profit", "profit", Sum)
                .reduce("revenue", "line_total", Sum)
                .sort_desc("profit")
                .limit(config.top_products),
            vec![RowRatio::pct("margin_pct", "profit", "revenue")],
        ),
        KpiDef::fact_rows(
            "category_performance",
            AggregateSpec::group_by(["category"])
                .reduce("revenue", "line_total", Sum)
                .reduce("profit", "profit", Sum)
                .reduce("quantity", "quantity", Sum)
                .reduce("products", "product_name", CountDistinct)
                .reduce("orders", "order_id", CountDistinct)
                .sort_desc("revenue"),
            vec![RowRatio::pct("margin_pct", "profit", "revenue")],
        ),
        KpiDef::fact_rows(
            "category_quarter_matrix",
            AggregateSpec::group_by(["category", "order_quarter"])
                .reduce("revenue", "line_total", Sum)
                .pivot("revenue"),
            vec![],
        ),
    ]);

    // Customers.
    kpis.extend([
        KpiDef::fact_rows(
            "top_customers",
            AggregateSpec::group_by(["customer_company"])
                .reduce("revenue", "line_total", Sum)
                .reduce("profit", "profit", Sum)
                .reduce("orders", "order_id", CountDistinct)
                .reduce("first_order", "order_date", Min)
                .reduce("last_order", "order_date", Max)
                .sort_desc("revenue")
                .limit(config.top_customers),
            vec![
                RowRatio::quotient("avg_order_value", "revenue", "orders"),
                RowRatio::pct("margin_pct", "profit", "revenue"),
            ],
        ),
        KpiDef::aggregate(
            "customer_segments",
            KpiSource::Facts,
            AggregateSpec::group_by(["customer_company"])
                .reduce("revenue", "line_total", Sum)
                .segments(
                    "revenue",
                    config.segments.cuts.clone(),
                    config.segments.labels.clone(),
                ),
            Post::Segments {
                labels: config.segments.labels.clone(),
                column: "revenue".into(),
            },
        ),
        KpiDef::fact_rows(
            "country_performance",
            AggregateSpec::group_by(["country"])
                .reduce("revenue", "line_total", Sum)
                .reduce("profit", "profit", Sum)
                .reduce("customers", "customer_company", CountDistinct)
                .reduce("orders", "order_id", CountDistinct)
                .sort_desc("revenue"),
            vec![],
        ),
    ]);

    // Sales staff.
    kpis.push(KpiDef::fact_rows(
        "employee_performance",
        AggregateSpec::group_by(["employee_name"])
            .reduce("revenue", "line_total", Sum)
            .reduce("profit", "profit", Sum)
            .reduce("orders", "order_id", CountDistinct)
            .reduce("customers", "customer_company", CountDistinct)
            .sort_desc("revenue"),
        vec![
            RowRatio::quotient("avg_order_value", "revenue", "orders"),
            RowRatio::pct("margin_pct", "profit", "revenue"),
        ],
    ));

    // Operations, read from the orders table so each order counts once.
    kpis.extend([
        orders_scalar("avg_delivery_days", whole("v", "delivery_days", Mean), "v"),
        orders_scalar("median_delivery_days", whole("v", "delivery_days", Median), "v"),
        orders_scalar("delivered_orders", whole("v", "delivery_days", Count), "v"),
        orders_scalar(
            "fast_deliveries",
            whole("v", "delivery_days", Count).filter(Filter::cmp(
                "delivery_days",
                CmpOp::Le,
                config.fast_delivery_days,
            )),
            "v",
        ),
        ratio("fast_delivery_rate", "fast_deliveries", "delivered_orders", true),
        KpiDef::aggregate(
            "carrier_performance",
            KpiSource::Table(ORDERS),
            AggregateSpec::group_by(["shipping_company"])
                .reduce("orders", "order_id", CountDistinct)
                .reduce("avg_delivery_days", "delivery_days", Mean)
                .reduce("avg_shipping_fee", "shipping_fee", Mean)
                .sort_desc("orders"),
            Post::Rows { ratios: vec![] },
        ),
        KpiDef::aggregate(
            "payment_methods",
            KpiSource::Table(ORDERS),
            AggregateSpec::group_by(["payment_type"])
                .reduce("orders", "order_id", Count)
                .sort_desc("orders"),
            Post::Rows { ratios: vec![] },
        ),
        KpiDef::aggregate(
            "orders_by_weekday",
            KpiSource::Table(ORDERS),
            AggregateSpec::group_by(["order_day_name"])
                .reduce("orders", "order_id", CountDistinct)
                .reduce("shipping_fees", "shipping_fee", Sum)
                .sort_desc("orders"),
            Post::Rows { ratios: vec![] },
        ),
    ]);

    // Advanced: two-point comparisons and customer value.
    kpis.extend([
        KpiDef::derived(
            "monthly_growth_rate",
            Post::LastTwo {
                kpi: "monthly_sales".into(),
                column: "revenue".into(),
                mode: LastTwo::Change,
                fallback: 0.0,
            },
        ),
        KpiDef::derived(
            "average_clv",
            Post::MeanOf {
                kpi: "top_customers".into(),
                column: "revenue".into(),
            },
        ),
        KpiDef::fact_rows(
            "monthly_active_customers",
            AggregateSpec::group_by(["order_year", "order_month"])
                .reduce("customers", "customer_company", CountDistinct)
                .sort_by_keys(),
            vec![],
        ),
        KpiDef::derived(
            "retention_rate",
            Post::LastTwo {
                kpi: "monthly_active_customers".into(),
                column: "customers".into(),
                mode: LastTwo::Ratio,
                fallback: 100.0,
            },
        ),
    ]);

    kpis
}
