//! Pipeline performance benchmarks for nwbi.
//!
//! Benchmarks for:
//! - Normalization of the raw input tables
//! - Fact-table construction (three lookup joins)
//! - Full run including the KPI catalog
//! - A single grouped aggregation over the fact table
//!
//! Run with:
//!   cargo bench --bench pipeline_perf

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use std::time::Duration;

use northwind_bi::aggregate::{AggregateSpec, Reducer, aggregate};
use northwind_bi::model::{RawTable, RawValue};
use northwind_bi::{Pipeline, PipelineInput};

/// Detail-line counts for the scaling runs.
const SIZES: &[usize] = &[1_000, 10_000, 50_000];

const PRODUCTS: usize = 45;
const CUSTOMERS: usize = 30;

fn configure_criterion() -> Criterion {
    Criterion::default()
        .sample_size(50)
        .measurement_time(Duration::from_secs(3))
        .warm_up_time(Duration::from_secs(1))
        .noise_threshold(0.03)
        .confidence_level(0.95)
        .without_plots()
}

// =============================================================================
// Synthetic input
// =============================================================================

/// Deterministic Northwind-shaped input with `lines` detail rows spread over
/// `lines / 3` orders.
fn synthetic_input(lines: usize) -> PipelineInput {
    let orders = (lines / 3).max(1);

    let mut order_table = RawTable::new([
        "Order ID",
        "Employee",
        "Customer",
        "Order Date",
        "Shipped Date",
        "Shipping Fee",
        "Payment Type",
        "Status ID",
    ]);
    for id in 0..orders {
        let month = id % 12 + 1;
        let day = id % 20 + 1;
        order_table.rows.push(vec![
            RawValue::from(id as i64),
            RawValue::from(format!("Employee {}", id % 9).as_str()),
            RawValue::from(format!("Company {}", id % CUSTOMERS).as_str()),
            RawValue::from(format!("2006-{month:02}-{day:02}").as_str()),
            RawValue::from(format!("2006-{month:02}-{:02}", day + id % 7).as_str()),
            RawValue::from(format!("${}.00", id % 40).as_str()),
            RawValue::from(["Check", "Cash", "Credit Card"][id % 3]),
            RawValue::from(["New", "Invoiced", "Shipped", "Closed"][id % 4]),
        ]);
    }

    let mut details = RawTable::new(["Order ID", "Product", "Quantity", "Unit Price", "Discount"]);
    for i in 0..lines {
        details.rows.push(vec![
            RawValue::from((i % orders) as i64),
            RawValue::from(format!("Product {}", i % PRODUCTS).as_str()),
            RawValue::from((i % 50 + 1) as i64),
            RawValue::from(format!("${}.{:02}", i % 90 + 2, i % 100).as_str()),
            RawValue::from(if i % 5 == 0 { 0.1 } else { 0.0 }),
        ]);
    }

    let mut products = RawTable::new(["Product Name", "Standard Cost", "List Price", "Category"]);
    for p in 0..PRODUCTS {
        products.rows.push(vec![
            RawValue::from(format!("Product {p}").as_str()),
            RawValue::from((p % 30 + 1) as f64),
            RawValue::from((p % 30 + 5) as f64),
            RawValue::from(["Beverages", "Condiments", "Dairy", "Grains"][p % 4]),
        ]);
    }

    let mut customers = RawTable::new(["Company", "First Name", "Last Name", "City"]);
    for c in 0..CUSTOMERS {
        customers.rows.push(vec![
            RawValue::from(format!("Company {c}").as_str()),
            RawValue::from("Ann"),
            RawValue::from(format!("Lee{c}").as_str()),
            RawValue::from(["Seattle", "Boston", "Denver"][c % 3]),
        ]);
    }

    PipelineInput::default()
        .with_table("Orders", order_table)
        .with_table("Order Details", details)
        .with_table("Products", products)
        .with_table("Customers", customers)
}

// =============================================================================
// Benchmarks
// =============================================================================

fn bench_normalize(c: &mut Criterion) {
    let pipeline = Pipeline::default();
    let mut group = c.benchmark_group("normalize");
    for &size in SIZES {
        let input = synthetic_input(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &input, |b, input| {
            b.iter(|| black_box(pipeline.normalize_all(input).unwrap()))
        });
    }
    group.finish();
}

fn bench_build_facts(c: &mut Criterion) {
    let pipeline = Pipeline::default();
    let mut group = c.benchmark_group("build_facts");
    for &size in SIZES {
        let input = synthetic_input(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &input, |b, input| {
            b.iter(|| black_box(pipeline.build(input).unwrap()))
        });
    }
    group.finish();
}

fn bench_full_run(c: &mut Criterion) {
    let pipeline = Pipeline::default();
    let mut group = c.benchmark_group("full_run");
    group.sampling_mode(criterion::SamplingMode::Flat);
    for &size in SIZES {
        let input = synthetic_input(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &input, |b, input| {
            b.iter(|| black_box(pipeline.run(input).unwrap()))
        });
    }
    group.finish();
}

fn bench_grouped_aggregate(c: &mut Criterion) {
    let (_, facts) = Pipeline::default().build(&synthetic_input(50_000)).unwrap();
    let spec = AggregateSpec::group_by(["customer_company"])
        .reduce("revenue", "line_total", Reducer::Sum)
        .reduce("orders", "order_id", Reducer::CountDistinct)
        .sort_desc("revenue")
        .limit(10);

    c.bench_function("aggregate_top_customers_50k", |b| {
        b.iter(|| black_box(aggregate(&facts.table, &spec).unwrap()))
    });
}

criterion_group! {
    name = benches;
    config = configure_criterion();
    targets = bench_normalize, bench_build_facts, bench_full_run, bench_grouped_aggregate
}
criterion_main!(benches);
