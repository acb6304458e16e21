//! Input records: raw CSV rows and the admitted record shapes
//!
//! A raw row keeps the header order of its source file because column
//! detection falls back to "first matching header" semantics.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One parsed CSV row: header -> value, in file column order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    fields: Vec<(String, String)>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from header/value pairs, preserving their order
    pub fn from_pairs<H, V>(pairs: impl IntoIterator<Item = (H, V)>) -> Self
    where
        H: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: pairs
                .into_iter()
                .map(|(h, v)| (h.into(), v.into()))
                .collect(),
        }
    }

    /// Append a field; a repeated header keeps its first position
    pub fn push(&mut self, header: impl Into<String>, value: impl Into<String>) {
        let header = header.into();
        if self.fields.iter().all(|(h, _)| *h != header) {
            self.fields.push((header, value.into()));
        }
    }

    /// Value for an exact header
    pub fn get(&self, header: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(h, _)| h == header)
            .map(|(_, v)| v.as_str())
    }

    /// Non-empty, trimmed value for an exact header
    pub fn non_empty(&self, header: &str) -> Option<&str> {
        self.get(header).map(str::trim).filter(|v| !v.is_empty())
    }

    /// Headers in natural (file) order
    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(h, _)| h.as_str())
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(h, v)| (h.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Normalized (date, customer key, amount) triple
///
/// `extra` keeps the columns that were not used for analytics so they can
/// still be displayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalOrderRecord {
    /// `YYYY-MM-DD` when the source date was recognized, else the raw string
    pub order_date: String,
    pub customer_key: String,
    pub amount: f64,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, String>,
}

impl CanonicalOrderRecord {
    pub fn new(order_date: impl Into<String>, customer_key: impl Into<String>, amount: f64) -> Self {
        Self {
            order_date: order_date.into(),
            customer_key: customer_key.into(),
            amount,
            extra: HashMap::new(),
        }
    }
}

/// One purchased item inside an order (marketplace export shape)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemRecord {
    pub order_id: String,
    pub order_date: String,
    pub customer_key: String,
    pub item_code: String,
    pub item_name: String,
    pub price: f64,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub customer_name: Option<String>,
}

/// Either admitted shape, as persisted in the orders collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OrderRecord {
    Order(CanonicalOrderRecord),
    LineItem(LineItemRecord),
}

impl OrderRecord {
    pub fn order_date(&self) -> &str {
        match self {
            OrderRecord::Order(r) => &r.order_date,
            OrderRecord::LineItem(r) => &r.order_date,
        }
    }

    pub fn customer_key(&self) -> &str {
        match self {
            OrderRecord::Order(r) => &r.customer_key,
            OrderRecord::LineItem(r) => &r.customer_key,
        }
    }

    pub fn amount(&self) -> f64 {
        match self {
            OrderRecord::Order(r) => r.amount,
            OrderRecord::LineItem(r) => r.price,
        }
    }

    /// Content-derived key; identical records differ only by `occurrence`
    fn base_key(&self) -> String {
        match self {
            OrderRecord::Order(r) => {
                format!("o|{}|{}|{}", r.order_date, r.customer_key, r.amount)
            }
            OrderRecord::LineItem(r) => format!("li|{}|{}", r.order_id, r.item_code),
        }
    }
}

/// A record addressed by its unique store key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyedRecord {
    pub key: String,
    pub record: OrderRecord,
}

impl KeyedRecord {
    /// Assign deterministic keys to a batch
    ///
    /// Re-importing the same file yields the same keys, so upserts are
    /// idempotent. Duplicate rows within one batch get increasing
    /// occurrence suffixes.
    pub fn assign_keys(records: Vec<OrderRecord>) -> Vec<KeyedRecord> {
        let mut seen: HashMap<String, usize> = HashMap::new();
        records
            .into_iter()
            .map(|record| {
                let base = record.base_key();
                let occurrence = seen.entry(base.clone()).or_insert(0);
                let key = format!("{}#{}", base, occurrence);
                *occurrence += 1;
                KeyedRecord { key, record }
            })
            .collect()
    }
}
