//! Calendar-bucketed rollups: daily acquisition, monthly and yearly revenue
//!
//! Monthly and yearly buckets are built from purchase events. Events come
//! from one of two strategies:
//! - [`MonthlyStrategy::OrderBased`]: one event per recorded order, on its date
//! - [`MonthlyStrategy::Synthesized`]: for customers known only by totals,
//!   `purchase_count` events evenly spaced between acquisition and last
//!   purchase, each worth `total_revenue / purchase_count`. This is an
//!   approximation of when revenue happened, not a record of it.
//!
//! Average LTV for a bucket is always the mean of per-customer sums inside
//! the bucket, so a customer buying twice in one month counts once.

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::analytics::items::percent;
use crate::models::CustomerAggregate;
use crate::parsers::normalize::parse_iso_date;

/// How purchase events are derived for monthly/yearly buckets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MonthlyStrategy {
    OrderBased,
    Synthesized,
}

impl MonthlyStrategy {
    /// Order-based whenever every customer carries its order history
    pub fn select(customers: &[CustomerAggregate]) -> Self {
        if customers.iter().all(CustomerAggregate::has_order_history) {
            Self::OrderBased
        } else {
            Self::Synthesized
        }
    }

    pub fn is_approximation(&self) -> bool {
        matches!(self, Self::Synthesized)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::OrderBased => "order-based",
            Self::Synthesized => "synthesized (approximate)",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyPoint {
    /// Acquisition date key
    pub date: String,
    pub revenue: f64,
    /// Customers acquired that day
    pub customers: usize,
    pub ltv: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyPoint {
    /// `YYYY-MM`
    pub month: String,
    pub revenue: f64,
    pub customers: usize,
    /// Percent of the month's buyers with more than one purchase overall
    pub repeat_rate: f64,
    pub avg_ltv: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlySeries {
    pub strategy: MonthlyStrategy,
    pub points: Vec<MonthlyPoint>,
}

impl MonthlySeries {
    pub fn empty() -> Self {
        Self {
            strategy: MonthlyStrategy::OrderBased,
            points: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Buckets whose month starts with `year`
    pub fn for_year(&self, year: &str) -> Vec<MonthlyPoint> {
        self.points
            .iter()
            .filter(|p| p.month.get(..4) == Some(year))
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearlyPoint {
    /// `YYYY`
    pub year: String,
    pub revenue: f64,
    pub customers: usize,
    pub avg_ltv: f64,
}

/// One dated unit of revenue attributed to a customer
struct PurchaseEvent<'a> {
    date: NaiveDate,
    customer: &'a CustomerAggregate,
    revenue: f64,
}

/// Daily series keyed by acquisition date (raw string when unrecognized)
pub fn compute_daily(customers: &[CustomerAggregate]) -> Vec<DailyPoint> {
    let mut daily: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    for customer in customers {
        let entry = daily.entry(customer.acquisition_date.as_str()).or_insert((0.0, 0));
        entry.0 += customer.total_revenue;
        entry.1 += 1;
    }

    daily
        .into_iter()
        .map(|(date, (revenue, customers))| DailyPoint {
            date: date.to_string(),
            revenue,
            customers,
            ltv: revenue / customers as f64,
        })
        .collect()
}

/// Monthly series with the strategy picked by [`MonthlyStrategy::select`]
pub fn compute_monthly(customers: &[CustomerAggregate]) -> MonthlySeries {
    compute_monthly_with(customers, MonthlyStrategy::select(customers))
}

pub fn compute_monthly_with(customers: &[CustomerAggregate], strategy: MonthlyStrategy) -> MonthlySeries {
    let events = purchase_events(customers, strategy);
    let points = bucket(&events, |d| d.format("%Y-%m").to_string())
        .into_iter()
        .map(|(month, b)| MonthlyPoint {
            month,
            revenue: b.revenue,
            customers: b.per_customer.len(),
            repeat_rate: percent(b.repeaters(), b.per_customer.len()),
            avg_ltv: b.mean_customer_revenue(),
        })
        .collect();

    MonthlySeries { strategy, points }
}

pub fn compute_yearly(customers: &[CustomerAggregate], strategy: MonthlyStrategy) -> Vec<YearlyPoint> {
    let events = purchase_events(customers, strategy);
    bucket(&events, |d| d.format("%Y").to_string())
        .into_iter()
        .map(|(year, b)| YearlyPoint {
            year,
            revenue: b.revenue,
            customers: b.per_customer.len(),
            avg_ltv: b.mean_customer_revenue(),
        })
        .collect()
}

fn purchase_events(customers: &[CustomerAggregate], strategy: MonthlyStrategy) -> Vec<PurchaseEvent<'_>> {
    let mut events = Vec::new();
    let mut skipped = 0usize;

    for customer in customers {
        match strategy {
            MonthlyStrategy::OrderBased => {
                for order in &customer.orders {
                    match parse_iso_date(&order.date) {
                        Some(date) => events.push(PurchaseEvent {
                            date,
                            customer,
                            revenue: order.total,
                        }),
                        None => skipped += 1,
                    }
                }
            }
            MonthlyStrategy::Synthesized => {
                if !synthesize_events(customer, &mut events) {
                    skipped += 1;
                }
            }
        }
    }

    if skipped > 0 {
        tracing::debug!(skipped, strategy = ?strategy, "Purchases without a recognizable date left out of series");
    }
    events
}

/// Upper bound on synthesized events per customer
///
/// `purchase_count` comes straight from a summary file. Beyond this bound the
/// customer's revenue is spread over fewer, larger events.
pub const MAX_SYNTHESIZED_PURCHASES: usize = 1_000;

/// Spread a customer's purchases evenly; false if nothing could be placed
fn synthesize_events<'a>(customer: &'a CustomerAggregate, events: &mut Vec<PurchaseEvent<'a>>) -> bool {
    let count = customer.purchase_count.min(MAX_SYNTHESIZED_PURCHASES);
    if count < customer.purchase_count {
        tracing::debug!(
            customer = %customer.customer_key,
            purchase_count = customer.purchase_count,
            "Synthesized purchases capped"
        );
    }
    let Some(first) = parse_iso_date(&customer.acquisition_date) else {
        return false;
    };
    if count == 0 {
        return false;
    }
    let last = parse_iso_date(&customer.last_purchase_date).unwrap_or(first);

    let days_diff = (last - first).num_days().max(1);
    let days_per_purchase = (days_diff / count as i64).max(1);
    let revenue = customer.total_revenue / count as f64;

    for i in 0..count {
        events.push(PurchaseEvent {
            date: first + Duration::days(i as i64 * days_per_purchase),
            customer,
            revenue,
        });
    }
    true
}

#[derive(Default)]
struct Bucket<'a> {
    revenue: f64,
    per_customer: HashMap<&'a str, (f64, usize)>,
}

impl Bucket<'_> {
    /// Mean of per-customer revenue within the bucket
    fn mean_customer_revenue(&self) -> f64 {
        if self.per_customer.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.per_customer.values().map(|(revenue, _)| revenue).sum();
        sum / self.per_customer.len() as f64
    }

    fn repeaters(&self) -> usize {
        self.per_customer
            .values()
            .filter(|(_, purchase_count)| *purchase_count > 1)
            .count()
    }
}

fn bucket<'a, F>(events: &[PurchaseEvent<'a>], key_of: F) -> BTreeMap<String, Bucket<'a>>
where
    F: Fn(NaiveDate) -> String,
{
    let mut buckets: BTreeMap<String, Bucket<'a>> = BTreeMap::new();
    for event in events {
        let b = buckets.entry(key_of(event.date)).or_default();
        b.revenue += event.revenue;
        let entry = b
            .per_customer
            .entry(event.customer.customer_key.as_str())
            .or_insert((0.0, event.customer.purchase_count));
        entry.0 += event.revenue;
    }
    buckets
}
