//! Scalar LTV metrics over the customer aggregate set

use serde::Serialize;

use crate::models::CustomerAggregate;

/// Headline LTV figures
///
/// All fields are zero for an empty customer set.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LtvMetrics {
    pub customer_count: usize,
    pub total_ltv: f64,
    pub average_ltv: f64,
    pub median_ltv: f64,
    /// Revenue per purchase
    pub average_purchase_value: f64,
    /// Purchases per customer
    pub average_purchase_frequency: f64,
    /// Mean first-to-last purchase span in days (single purchase counts as 1)
    pub average_customer_lifespan: f64,
}

impl LtvMetrics {
    pub fn compute(customers: &[CustomerAggregate]) -> Self {
        if customers.is_empty() {
            return Self::default();
        }

        let customer_count = customers.len();
        let n = customer_count as f64;
        let total_ltv: f64 = customers.iter().map(CustomerAggregate::ltv).sum();
        let total_purchases: usize = customers.iter().map(|c| c.purchase_count).sum();

        let mut ltvs: Vec<f64> = customers.iter().map(CustomerAggregate::ltv).collect();
        ltvs.sort_by(|a, b| a.total_cmp(b));

        let lifespan_sum: f64 = customers.iter().map(CustomerAggregate::lifespan_days).sum();

        Self {
            customer_count,
            total_ltv,
            average_ltv: total_ltv / n,
            median_ltv: median(&ltvs),
            average_purchase_value: if total_purchases > 0 {
                total_ltv / total_purchases as f64
            } else {
                0.0
            },
            average_purchase_frequency: total_purchases as f64 / n,
            average_customer_lifespan: lifespan_sum / n,
        }
    }
}

/// Median of an ascending slice; 0 when empty
pub fn median(sorted: &[f64]) -> f64 {
    let len = sorted.len();
    if len == 0 {
        return 0.0;
    }
    let mid = len / 2;
    if len % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
