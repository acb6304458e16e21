//! Recency x frequency segmentation
//!
//! Fixed thresholds, not quantiles: results are comparable across extracts.
//! Index 0 is always the "best" bucket (most recent / most frequent).

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::CustomerAggregate;
use crate::parsers::normalize::parse_iso_date;

pub const GRID_SIZE: usize = 6;

pub const RECENCY_LABELS: [&str; GRID_SIZE] = ["≤1m", "2-3m", "4-5m", "6-12m", "13-17m", "18m+"];
pub const FREQUENCY_LABELS: [&str; GRID_SIZE] = ["6+", "5", "4", "3", "2", "1"];

/// Recency bucket for months since last purchase (upper bounds inclusive)
pub fn recency_index(months: f64) -> usize {
    if months <= 1.0 {
        0
    } else if months <= 3.0 {
        1
    } else if months <= 5.0 {
        2
    } else if months <= 12.0 {
        3
    } else if months <= 17.0 {
        4
    } else {
        5
    }
}

pub fn frequency_index(purchase_count: usize) -> usize {
    match purchase_count {
        n if n >= 6 => 0,
        5 => 1,
        4 => 2,
        3 => 3,
        2 => 4,
        _ => 5,
    }
}

/// Months between `last_purchase` and `anchor`; None if the date is unreadable
pub fn months_since(last_purchase: &str, anchor: NaiveDate, days_per_month: f64) -> Option<f64> {
    let last = parse_iso_date(last_purchase)?;
    Some((anchor - last).num_days() as f64 / days_per_month)
}

/// Customer as listed in a cell drill-down
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RfmMember {
    pub customer_key: String,
    pub display_name: String,
    pub email: Option<String>,
    pub purchase_count: usize,
    pub ltv: f64,
}

impl From<&CustomerAggregate> for RfmMember {
    fn from(c: &CustomerAggregate) -> Self {
        Self {
            customer_key: c.customer_key.clone(),
            display_name: c.display_name().to_string(),
            email: c.email.clone(),
            purchase_count: c.purchase_count,
            ltv: c.ltv(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RfmCell {
    pub recency_index: usize,
    pub frequency_index: usize,
    pub members: Vec<RfmMember>,
}

impl RfmCell {
    pub fn count(&self) -> usize {
        self.members.len()
    }

    pub fn recency_label(&self) -> &'static str {
        RECENCY_LABELS[self.recency_index]
    }

    pub fn frequency_label(&self) -> &'static str {
        FREQUENCY_LABELS[self.frequency_index]
    }
}

/// 6x6 grid; every cell exists even when empty
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RfmGrid {
    pub anchor_date: NaiveDate,
    /// Row-major: `cells[recency][frequency]`
    pub cells: Vec<Vec<RfmCell>>,
}

impl RfmGrid {
    pub fn empty(anchor_date: NaiveDate) -> Self {
        let cells = (0..GRID_SIZE)
            .map(|r| {
                (0..GRID_SIZE)
                    .map(|f| RfmCell {
                        recency_index: r,
                        frequency_index: f,
                        members: Vec::new(),
                    })
                    .collect()
            })
            .collect();
        Self { anchor_date, cells }
    }

    /// Classify every customer against `anchor_date`
    ///
    /// Unreadable last-purchase dates land in the oldest recency bucket.
    pub fn compute(customers: &[CustomerAggregate], anchor_date: NaiveDate, days_per_month: f64) -> Self {
        let mut grid = Self::empty(anchor_date);
        for customer in customers {
            let r = months_since(&customer.last_purchase_date, anchor_date, days_per_month)
                .map(recency_index)
                .unwrap_or(GRID_SIZE - 1);
            let f = frequency_index(customer.purchase_count);
            grid.cells[r][f].members.push(RfmMember::from(customer));
        }
        grid
    }

    pub fn cell(&self, recency: usize, frequency: usize) -> Option<&RfmCell> {
        self.cells.get(recency)?.get(frequency)
    }

    /// Member counts per cell
    pub fn counts(&self) -> [[usize; GRID_SIZE]; GRID_SIZE] {
        let mut counts = [[0usize; GRID_SIZE]; GRID_SIZE];
        for (r, row) in self.cells.iter().enumerate() {
            for (f, cell) in row.iter().enumerate() {
                counts[r][f] = cell.count();
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.cells.iter().flatten().map(RfmCell::count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}
