//! Customer aggregation: flat records -> per-customer order history
//!
//! A [`CustomerAggregator`] owns its grouping maps for exactly one pass.
//! [`CustomerAggregator::finish`] consumes it and returns finalized
//! aggregates, so the intermediate state is never visible to callers.

use crate::models::{CanonicalOrderRecord, CustomerAggregate, LineItemRecord, Order, OrderRecord};
use std::collections::HashMap;

/// Order under construction
struct OrderBuilder {
    date: String,
    total: f64,
    item_codes: Vec<String>,
    /// Input position of the first contributing record (stable tie-break)
    seq: usize,
}

#[derive(Default)]
struct CustomerBuilder {
    name: Option<String>,
    email: Option<String>,
    orders: HashMap<String, OrderBuilder>,
}

impl CustomerBuilder {
    fn order_entry(&mut self, order_id: &str, date: &str, seq: usize) -> &mut OrderBuilder {
        self.orders
            .entry(order_id.to_string())
            .or_insert_with(|| OrderBuilder {
                date: date.to_string(),
                total: 0.0,
                item_codes: Vec::new(),
                seq,
            })
    }

    fn finish(self, customer_key: String) -> CustomerAggregate {
        let mut orders: Vec<(usize, Order)> = self
            .orders
            .into_iter()
            .map(|(order_id, b)| {
                (
                    b.seq,
                    Order {
                        order_id,
                        date: b.date,
                        total: b.total,
                        item_codes: b.item_codes,
                    },
                )
            })
            .collect();
        orders.sort_by(|(seq_a, a), (seq_b, b)| a.date.cmp(&b.date).then(seq_a.cmp(seq_b)));
        let orders: Vec<Order> = orders.into_iter().map(|(_, order)| order).collect();

        let total_revenue = orders.iter().map(|o| o.total).sum();
        let acquisition_date = orders.first().map(|o| o.date.clone()).unwrap_or_default();
        let last_purchase_date = orders.last().map(|o| o.date.clone()).unwrap_or_default();

        CustomerAggregate {
            customer_key,
            name: self.name,
            email: self.email,
            purchase_count: orders.len(),
            total_revenue,
            acquisition_date,
            last_purchase_date,
            orders,
        }
    }
}

/// Single-pass builder grouping records by customer key
#[derive(Default)]
pub struct CustomerAggregator {
    customers: HashMap<String, CustomerBuilder>,
    records_seen: usize,
}

impl CustomerAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one record of either shape
    pub fn add(&mut self, record: &OrderRecord) {
        match record {
            OrderRecord::Order(r) => self.add_record(r),
            OrderRecord::LineItem(r) => self.add_line_item(r),
        }
    }

    /// A simple record is an order on its own
    pub fn add_record(&mut self, record: &CanonicalOrderRecord) {
        let seq = self.next_seq();
        let order_id = format!("#R{}", seq);
        let builder = self
            .customers
            .entry(record.customer_key.clone())
            .or_default();
        builder
            .order_entry(&order_id, &record.order_date, seq)
            .total += record.amount;
    }

    /// Line items sharing an order id accumulate into one order
    pub fn add_line_item(&mut self, item: &LineItemRecord) {
        let seq = self.next_seq();
        let builder = self.customers.entry(item.customer_key.clone()).or_default();

        if builder.name.is_none() {
            builder.name = item.customer_name.clone().filter(|n| !n.is_empty());
        }
        if builder.email.is_none() {
            builder.email = item.email.clone().filter(|e| !e.is_empty());
        }

        let order = builder.order_entry(&item.order_id, &item.order_date, seq);
        order.total += item.price;
        if !item.item_code.is_empty() {
            order.item_codes.push(item.item_code.clone());
        }
    }

    pub fn customer_count(&self) -> usize {
        self.customers.len()
    }

    /// Finalize: orders sorted by date, derived totals computed
    ///
    /// Output is sorted by customer key so repeated passes over the same
    /// records produce identical results.
    pub fn finish(self) -> Vec<CustomerAggregate> {
        let mut customers: Vec<CustomerAggregate> = self
            .customers
            .into_iter()
            .map(|(key, builder)| builder.finish(key))
            .collect();
        customers.sort_by(|a, b| a.customer_key.cmp(&b.customer_key));
        customers
    }

    fn next_seq(&mut self) -> usize {
        let seq = self.records_seen;
        self.records_seen += 1;
        seq
    }
}

/// Aggregate a whole record set in one pass
pub fn aggregate_customers<'a, I>(records: I) -> Vec<CustomerAggregate>
where
    I: IntoIterator<Item = &'a OrderRecord>,
{
    let mut aggregator = CustomerAggregator::new();
    for record in records {
        aggregator.add(record);
    }
    aggregator.finish()
}
