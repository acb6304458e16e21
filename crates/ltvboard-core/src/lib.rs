//! ltvboard-core - Core library for ltvboard
//!
//! Ingests order exports with unknown column layouts and derives customer
//! lifetime-value analytics: per-customer aggregates, LTV metrics, RFM grid,
//! golden purchase routes, item ranking and calendar rollups.

pub mod aggregate;
pub mod analytics;
pub mod cache;
pub mod config;
pub mod error;
pub mod event;
pub mod export;
pub mod models;
pub mod parsers;
pub mod store;

pub use aggregate::{aggregate_customers, CustomerAggregator};
pub use analytics::AnalyticsData;
pub use config::AnalysisConfig;
pub use error::{CoreError, LoadReport};
pub use event::{DataEvent, EventBus};
pub use export::{export_view, ExportFormat, ExportKind};
pub use store::DataStore;
