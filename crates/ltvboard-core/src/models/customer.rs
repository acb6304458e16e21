//! Customer aggregates produced by one aggregation pass

use crate::parsers::normalize::parse_iso_date;
use serde::{Deserialize, Serialize};

/// One order of a customer, possibly spanning several line items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_id: String,
    pub date: String,
    pub total: f64,
    /// Item codes in the order they appeared in the input
    pub item_codes: Vec<String>,
}

/// Finalized per-customer aggregate
///
/// Built by [`crate::aggregate::CustomerAggregator`]; never mutated after
/// the pass that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerAggregate {
    pub customer_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Date-ascending; empty when built from a [`CustomerSummary`]
    pub orders: Vec<Order>,
    pub purchase_count: usize,
    pub total_revenue: f64,
    pub acquisition_date: String,
    pub last_purchase_date: String,
}

impl CustomerAggregate {
    /// Lifetime value: total revenue across admitted orders
    pub fn ltv(&self) -> f64 {
        self.total_revenue
    }

    pub fn is_repeater(&self) -> bool {
        self.purchase_count > 1
    }

    /// True when every purchase is backed by a dated order
    pub fn has_order_history(&self) -> bool {
        !self.orders.is_empty() && self.orders.len() == self.purchase_count
    }

    /// Days between first and last purchase, floored at one day
    pub fn lifespan_days(&self) -> f64 {
        match (
            parse_iso_date(&self.acquisition_date),
            parse_iso_date(&self.last_purchase_date),
        ) {
            (Some(first), Some(last)) => ((last - first).num_days() as f64).max(1.0),
            _ => 1.0,
        }
    }

    /// Display label: name, then email, then the key itself
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or(&self.customer_key)
    }

    pub fn summary(&self) -> CustomerSummary {
        CustomerSummary {
            customer_id: self.customer_key.clone(),
            acquisition_date: self.acquisition_date.clone(),
            last_purchase_date: self.last_purchase_date.clone(),
            total_revenue: self.total_revenue,
            purchase_count: self.purchase_count,
        }
    }

    /// Aggregate without per-order history (synthesized monthly strategy only)
    pub fn from_summary(summary: CustomerSummary) -> Self {
        Self {
            customer_key: summary.customer_id,
            name: None,
            email: None,
            orders: Vec::new(),
            purchase_count: summary.purchase_count,
            total_revenue: summary.total_revenue,
            acquisition_date: summary.acquisition_date,
            last_purchase_date: summary.last_purchase_date,
        }
    }
}

/// Aggregate-only customer view: dates and totals, no orders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerSummary {
    pub customer_id: String,
    pub acquisition_date: String,
    pub last_purchase_date: String,
    pub total_revenue: f64,
    pub purchase_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer(first: &str, last: &str, count: usize) -> CustomerAggregate {
        CustomerAggregate::from_summary(CustomerSummary {
            customer_id: "C1".into(),
            acquisition_date: first.into(),
            last_purchase_date: last.into(),
            total_revenue: 1000.0,
            purchase_count: count,
        })
    }

    #[test]
    fn test_lifespan_floor_is_one_day() {
        assert_eq!(customer("2024-01-10", "2024-01-10", 1).lifespan_days(), 1.0);
        assert_eq!(customer("2024-01-10", "2024-02-10", 2).lifespan_days(), 31.0);
    }

    #[test]
    fn test_lifespan_unparsable_dates() {
        assert_eq!(customer("someday", "2024-01-10", 2).lifespan_days(), 1.0);
    }

    #[test]
    fn test_summary_has_no_history() {
        let c = customer("2024-01-10", "2024-03-10", 3);
        assert!(!c.has_order_history());
        assert!(c.is_repeater());
        assert_eq!(c.summary().purchase_count, 3);
    }

    #[test]
    fn test_display_name_fallbacks() {
        let mut c = customer("2024-01-10", "2024-01-10", 1);
        assert_eq!(c.display_name(), "C1");
        c.email = Some("c1@example.com".into());
        assert_eq!(c.display_name(), "c1@example.com");
        c.name = Some("山田太郎".into());
        assert_eq!(c.display_name(), "山田太郎");
    }
}
