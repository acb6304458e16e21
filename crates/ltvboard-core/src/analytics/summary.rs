//! Dashboard summary figures

use serde::Serialize;
use std::collections::BTreeSet;

use crate::analytics::items::percent;
use crate::models::CustomerAggregate;
use crate::parsers::normalize::parse_iso_date;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    pub total_sales: f64,
    pub customer_count: usize,
    /// Admitted records behind the figures
    pub record_count: usize,
    /// Percent of customers with more than one purchase
    pub repeat_rate: f64,
    pub average_ltv: f64,
    /// Earliest and latest recognizable purchase dates
    pub date_range: Option<(String, String)>,
    /// Distinct years with purchases, newest first
    pub years: Vec<String>,
}

impl Summary {
    pub fn compute(customers: &[CustomerAggregate], record_count: usize) -> Self {
        if customers.is_empty() {
            return Self {
                record_count,
                ..Self::default()
            };
        }

        let total_sales: f64 = customers.iter().map(|c| c.total_revenue).sum();
        let repeaters = customers.iter().filter(|c| c.is_repeater()).count();

        let dates: BTreeSet<_> = customers
            .iter()
            .flat_map(purchase_dates)
            .filter_map(parse_iso_date)
            .collect();

        let date_range = match (dates.first(), dates.last()) {
            (Some(first), Some(last)) => Some((
                first.format("%Y-%m-%d").to_string(),
                last.format("%Y-%m-%d").to_string(),
            )),
            _ => None,
        };

        let years: BTreeSet<String> = dates.iter().map(|d| d.format("%Y").to_string()).collect();

        Self {
            total_sales,
            customer_count: customers.len(),
            record_count,
            repeat_rate: percent(repeaters, customers.len()),
            average_ltv: total_sales / customers.len() as f64,
            date_range,
            years: years.into_iter().rev().collect(),
        }
    }
}

/// Order dates when known, else the acquisition/last-purchase pair
fn purchase_dates(customer: &CustomerAggregate) -> Vec<&str> {
    if customer.orders.is_empty() {
        vec![
            customer.acquisition_date.as_str(),
            customer.last_purchase_date.as_str(),
        ]
    } else {
        customer.orders.iter().map(|o| o.date.as_str()).collect()
    }
}
