//! Benchmarks for aggregation and the analytics pass
//!
//! Records are synthetic line items: `customers` buyers with 1-8 orders each,
//! 1-3 items per order, spread over two years.

use chrono::{Duration, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ltvboard_core::aggregate::aggregate_customers;
use ltvboard_core::analytics::{compute_monthly, compute_routes, AnalyticsData, RfmGrid};
use ltvboard_core::models::{ItemMaster, LineItemRecord, OrderRecord};
use ltvboard_core::AnalysisConfig;

fn generate_records(customers: usize) -> Vec<OrderRecord> {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let mut records = Vec::new();

    for c in 0..customers {
        let orders = 1 + c % 8;
        for o in 0..orders {
            let date = start + Duration::days(((c * 7 + o * 45) % 730) as i64);
            for i in 0..(1 + (c + o) % 3) {
                records.push(OrderRecord::LineItem(LineItemRecord {
                    order_id: format!("{}-{}", c, o),
                    order_date: date.format("%Y-%m-%d").to_string(),
                    customer_key: format!("customer-{}@example.com", c),
                    item_code: format!("sku-{}", (c + o + i) % 40),
                    item_name: format!("Item {}", (c + o + i) % 40),
                    price: 500.0 + ((c * 31 + o * 17 + i) % 50) as f64 * 100.0,
                    email: None,
                    customer_name: None,
                }));
            }
        }
    }
    records
}

fn aggregation_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate_customers");

    for count in [100, 1_000, 10_000] {
        let records = generate_records(count);
        group.bench_with_input(BenchmarkId::new("customers", count), &records, |b, records| {
            b.iter(|| black_box(aggregate_customers(records)));
        });
    }

    group.finish();
}

fn analytics_benchmark(c: &mut Criterion) {
    let config = AnalysisConfig::default();
    let master = ItemMaster::new();
    let mut group = c.benchmark_group("analytics");

    for count in [100, 1_000, 10_000] {
        let records = generate_records(count);
        group.bench_with_input(BenchmarkId::new("full_pass", count), &records, |b, records| {
            b.iter(|| black_box(AnalyticsData::compute(records, &master, &config)));
        });
    }

    let customers = aggregate_customers(&generate_records(10_000));
    group.bench_function("monthly_10000", |b| {
        b.iter(|| black_box(compute_monthly(&customers)));
    });
    group.bench_function("rfm_10000", |b| {
        b.iter(|| black_box(RfmGrid::compute(&customers, config.anchor_date, config.days_per_month)));
    });
    group.bench_function("routes_10000", |b| {
        b.iter(|| {
            black_box(compute_routes(
                &customers,
                &master,
                config.route_depth,
                config.top_routes,
                &config.route_separator,
            ))
        });
    });

    group.finish();
}

criterion_group!(benches, aggregation_benchmark, analytics_benchmark);
criterion_main!(benches);
