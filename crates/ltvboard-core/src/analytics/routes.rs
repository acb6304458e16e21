//! Golden routes: customers grouped by their purchase sequence
//!
//! A route is the first item of each of a customer's first N orders. Routes
//! are ranked by the average LTV of the customers who followed them.

use serde::Serialize;
use std::collections::HashMap;

use crate::models::{CustomerAggregate, ItemMaster};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoldenRoute {
    /// Display names (or raw codes) per step, in purchase order
    pub steps: Vec<String>,
    /// Steps joined with the configured separator
    pub route: String,
    pub count: usize,
    pub total_ltv: f64,
    pub avg_ltv: f64,
}

impl GoldenRoute {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Route steps for one customer; orders without items contribute nothing
pub fn route_steps(customer: &CustomerAggregate, master: &ItemMaster, depth: usize) -> Vec<String> {
    customer
        .orders
        .iter()
        .take(depth)
        .filter_map(|order| order.item_codes.first())
        .map(|code| master.display(code).to_string())
        .collect()
}

/// Rank routes by average LTV, keeping the top `limit`
///
/// Customers without any itemized order have no route and are skipped.
pub fn compute_routes(
    customers: &[CustomerAggregate],
    master: &ItemMaster,
    depth: usize,
    limit: usize,
    separator: &str,
) -> Vec<GoldenRoute> {
    let mut groups: HashMap<Vec<String>, (usize, f64)> = HashMap::new();

    for customer in customers {
        let steps = route_steps(customer, master, depth);
        if steps.is_empty() {
            continue;
        }
        let entry = groups.entry(steps).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += customer.ltv();
    }

    let mut routes: Vec<GoldenRoute> = groups
        .into_iter()
        .map(|(steps, (count, total_ltv))| GoldenRoute {
            route: steps.join(separator),
            steps,
            count,
            total_ltv,
            avg_ltv: total_ltv / count as f64,
        })
        .collect();

    routes.sort_by(|a, b| {
        b.avg_ltv
            .total_cmp(&a.avg_ltv)
            .then_with(|| a.route.cmp(&b.route))
    });
    routes.truncate(limit);

    tracing::debug!(routes = routes.len(), "Golden routes ranked");
    routes
}
