//! Persistence layer for ltvboard-core
//!
//! SQLite store for imported orders and item-name overrides.

pub mod order_store;

pub use order_store::{OrderStore, StoreStats, STORE_FILE_NAME};
