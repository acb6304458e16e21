//! Data models for ltvboard

pub mod customer;
pub mod item;
pub mod record;

pub use customer::{CustomerAggregate, CustomerSummary, Order};
pub use item::ItemMaster;
pub use record::{CanonicalOrderRecord, KeyedRecord, LineItemRecord, OrderRecord, RawRow};
