//! Item ranking over line-item records

use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::models::{CustomerAggregate, ItemMaster, OrderRecord};

/// Per-item purchase statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemStats {
    pub code: String,
    pub name: String,
    /// Line items sold
    pub count: usize,
    pub sales: f64,
    pub buyers: usize,
    /// Percent of buyers with more than one order overall
    pub repeat_rate: f64,
    /// Item sales per distinct buyer
    pub avg_ltv: f64,
}

#[derive(Default)]
struct ItemAccumulator<'a> {
    name: &'a str,
    count: usize,
    sales: f64,
    buyers: HashSet<&'a str>,
}

/// Rank items by line-item count (ties by code)
///
/// Simple order records and line items without a code are ignored.
pub fn compute_items(
    records: &[OrderRecord],
    customers: &[CustomerAggregate],
    master: &ItemMaster,
) -> Vec<ItemStats> {
    let purchase_counts: HashMap<&str, usize> = customers
        .iter()
        .map(|c| (c.customer_key.as_str(), c.purchase_count))
        .collect();

    let mut items: HashMap<&str, ItemAccumulator> = HashMap::new();
    for record in records {
        let OrderRecord::LineItem(line) = record else {
            continue;
        };
        if line.item_code.is_empty() {
            continue;
        }
        let acc = items.entry(line.item_code.as_str()).or_default();
        if acc.name.is_empty() {
            acc.name = &line.item_name;
        }
        acc.count += 1;
        acc.sales += line.price;
        acc.buyers.insert(&line.customer_key);
    }

    let mut ranked: Vec<ItemStats> = items
        .into_iter()
        .map(|(code, acc)| {
            let buyers = acc.buyers.len();
            let repeaters = acc
                .buyers
                .iter()
                .filter(|key| purchase_counts.get(*key).copied().unwrap_or(0) > 1)
                .count();
            let name = match master.get(code) {
                Some(name) => name.to_string(),
                None if !acc.name.is_empty() => acc.name.to_string(),
                None => code.to_string(),
            };

            ItemStats {
                code: code.to_string(),
                name,
                count: acc.count,
                sales: acc.sales,
                buyers,
                repeat_rate: percent(repeaters, buyers),
                avg_ltv: if buyers > 0 { acc.sales / buyers as f64 } else { 0.0 },
            }
        })
        .collect();

    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.code.cmp(&b.code)));
    ranked
}

pub(crate) fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}
