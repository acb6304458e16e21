//! LTV analytics over admitted order records
//!
//! Every consumer is a pure function of the finalized customer aggregates
//! (plus, for item ranking, the raw line items). Nothing here fails: an empty
//! record set produces zero metrics, an empty grid and empty rankings.

use chrono::{DateTime, Utc};

use crate::aggregate::aggregate_customers;
use crate::config::AnalysisConfig;
use crate::models::{CustomerAggregate, ItemMaster, OrderRecord};

pub mod items;
pub mod metrics;
pub mod rfm;
pub mod routes;
pub mod summary;
pub mod timeseries;


pub use items::{compute_items, ItemStats};
pub use metrics::{median, LtvMetrics};
pub use rfm::{
    frequency_index, months_since, recency_index, RfmCell, RfmGrid, RfmMember, FREQUENCY_LABELS,
    GRID_SIZE, RECENCY_LABELS,
};
pub use routes::{compute_routes, route_steps, GoldenRoute};
pub use summary::Summary;
pub use timeseries::{
    compute_daily, compute_monthly, compute_monthly_with, compute_yearly, DailyPoint,
    MonthlyPoint, MonthlySeries, MonthlyStrategy, YearlyPoint,
};

/// Every derived view for one record set
#[derive(Debug, Clone)]
pub struct AnalyticsData {
    /// Sorted by customer key
    pub customers: Vec<CustomerAggregate>,
    pub metrics: LtvMetrics,
    pub summary: Summary,
    pub daily: Vec<DailyPoint>,
    pub monthly: MonthlySeries,
    pub yearly: Vec<YearlyPoint>,
    pub rfm: RfmGrid,
    pub routes: Vec<GoldenRoute>,
    pub items: Vec<ItemStats>,
    pub computed_at: DateTime<Utc>,
}

impl AnalyticsData {
    /// Aggregate `records` and derive every view
    ///
    /// # Performance
    /// Single pass over records, then one pass per view over customers.
    pub fn compute(records: &[OrderRecord], master: &ItemMaster, config: &AnalysisConfig) -> Self {
        let customers = aggregate_customers(records);
        tracing::debug!(
            records = records.len(),
            customers = customers.len(),
            "Customer aggregation complete"
        );
        Self::from_customers(customers, records, master, config)
    }

    /// Derive views from already-built aggregates
    ///
    /// `records` only feeds item ranking and the record count; aggregates
    /// built from customer summaries can pass an empty slice.
    pub fn from_customers(
        customers: Vec<CustomerAggregate>,
        records: &[OrderRecord],
        master: &ItemMaster,
        config: &AnalysisConfig,
    ) -> Self {
        let mut customers = customers;
        customers.sort_by(|a, b| a.customer_key.cmp(&b.customer_key));

        let strategy = MonthlyStrategy::select(&customers);
        if strategy.is_approximation() && !customers.is_empty() {
            tracing::info!("Per-order dates unavailable, monthly series uses synthesized purchase dates");
        }

        let record_count = if records.is_empty() {
            customers.iter().map(|c| c.purchase_count).sum()
        } else {
            records.len()
        };

        Self {
            metrics: LtvMetrics::compute(&customers),
            summary: Summary::compute(&customers, record_count),
            daily: compute_daily(&customers),
            monthly: compute_monthly_with(&customers, strategy),
            yearly: compute_yearly(&customers, strategy),
            rfm: RfmGrid::compute(&customers, config.anchor_date, config.days_per_month),
            routes: compute_routes(
                &customers,
                master,
                config.route_depth,
                config.top_routes,
                &config.route_separator,
            ),
            items: compute_items(records, &customers, master),
            customers,
            computed_at: Utc::now(),
        }
    }

    /// Placeholder before anything was loaded
    pub fn empty(config: &AnalysisConfig) -> Self {
        Self::from_customers(Vec::new(), &[], &ItemMaster::new(), config)
    }

    pub fn is_empty(&self) -> bool {
        self.customers.is_empty()
    }

    pub fn customer(&self, key: &str) -> Option<&CustomerAggregate> {
        self.customers
            .binary_search_by(|c| c.customer_key.as_str().cmp(key))
            .ok()
            .map(|idx| &self.customers[idx])
    }

    /// Customers by LTV, highest first
    pub fn top_customers(&self, limit: usize) -> Vec<&CustomerAggregate> {
        let mut ranked: Vec<&CustomerAggregate> = self.customers.iter().collect();
        ranked.sort_by(|a, b| {
            b.ltv()
                .total_cmp(&a.ltv())
                .then_with(|| a.customer_key.cmp(&b.customer_key))
        });
        ranked.truncate(limit);
        ranked
    }
}
