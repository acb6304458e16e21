//! SQLite-backed persistence for imported orders and item names
//!
//! Two independent collections:
//! - orders: unique record key -> JSON-encoded [`OrderRecord`]
//! - item_master: item code -> display name
//!
//! Both support whole-collection reads, single-record upserts and a wipe.
//! Analytics never read from here directly; [`crate::store::DataStore`]
//! loads the collections into memory.
//!
//! Store Version History:
//! - v1: Initial schema (orders + item_master)

use crate::error::CoreError;
use crate::models::{ItemMaster, KeyedRecord, OrderRecord};
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

/// Current schema version; a mismatch clears both collections on open
const STORE_VERSION: i32 = 1;

pub const STORE_FILE_NAME: &str = "orders.db";

/// Persistent order store (thread-safe)
pub struct OrderStore {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl OrderStore {
    /// Create or open `<data_dir>/orders.db`
    pub fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir).with_context(|| {
            format!("Failed to create data directory: {}", data_dir.display())
        })?;

        let path = data_dir.join(STORE_FILE_NAME);
        let conn = Connection::open(&path)
            .map_err(|e| CoreError::store(format!("cannot open {}", path.display()), e))?;

        conn.pragma_update(None, "journal_mode", "WAL")
            .context("Failed to enable WAL mode")?;

        Self::init_schema(&conn)?;

        debug!(path = %path.display(), "Order store opened");
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS store_metadata (
                key TEXT PRIMARY KEY,
                value INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS orders (
                key TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                order_date TEXT NOT NULL,
                customer_key TEXT NOT NULL,
                amount REAL NOT NULL,
                data TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS item_master (
                item_code TEXT PRIMARY KEY,
                display_name TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_orders_customer ON orders(customer_key);
            "#,
        )
        .context("Failed to create schema")?;

        let stored_version: Option<i32> = conn
            .query_row(
                "SELECT value FROM store_metadata WHERE key = 'version'",
                [],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to query store version")?;

        match stored_version {
            Some(v) if v == STORE_VERSION => {
                debug!(version = v, "Store version matches");
            }
            Some(v) => {
                warn!(
                    stored = v,
                    current = STORE_VERSION,
                    "Store version mismatch, clearing persisted collections"
                );
                conn.execute_batch("DELETE FROM orders; DELETE FROM item_master;")
                    .context("Failed to clear stale store")?;
                Self::write_version(conn)?;
            }
            None => Self::write_version(conn)?,
        }
        Ok(())
    }

    fn write_version(conn: &Connection) -> Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO store_metadata (key, value) VALUES ('version', ?)",
            params![STORE_VERSION],
        )
        .context("Failed to write store version")?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Order store lock poisoned: {}", e))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every persisted record, in first-insertion order
    pub fn all_records(&self) -> Result<Vec<KeyedRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT key, data FROM orders ORDER BY rowid")
            .context("Failed to prepare query")?;

        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .context("Failed to query orders")?;

        let mut records = Vec::new();
        let mut corrupt = 0usize;
        for row in rows {
            let (key, data) = row.context("Failed to read row")?;
            match serde_json::from_str::<OrderRecord>(&data) {
                Ok(record) => records.push(KeyedRecord { key, record }),
                Err(e) => {
                    corrupt += 1;
                    debug!(key = %key, error = %e, "Skipping undecodable order row");
                }
            }
        }
        if corrupt > 0 {
            warn!(corrupt, "Order rows could not be decoded and were skipped");
        }

        Ok(records)
    }

    /// Insert or replace one record
    pub fn upsert_record(&self, record: &KeyedRecord) -> Result<()> {
        let conn = self.lock()?;
        Self::upsert_on(&conn, record)?;
        debug!(key = %record.key, "Order upserted");
        Ok(())
    }

    /// Upsert a batch inside a single transaction
    pub fn upsert_records(&self, records: &[KeyedRecord]) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().context("Failed to begin transaction")?;
        for record in records {
            Self::upsert_on(&tx, record)?;
        }
        tx.commit().context("Failed to commit orders")?;

        debug!(count = records.len(), "Orders upserted");
        Ok(records.len())
    }

    fn upsert_on(conn: &Connection, keyed: &KeyedRecord) -> Result<()> {
        let record = &keyed.record;
        let data = serde_json::to_string(record).context("Failed to serialize order")?;
        let kind = match record {
            OrderRecord::Order(_) => "order",
            OrderRecord::LineItem(_) => "line_item",
        };

        // ON CONFLICT keeps the rowid, so re-imports do not reorder records
        conn.execute(
            r#"
            INSERT INTO orders (key, kind, order_date, customer_key, amount, data)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                kind = excluded.kind,
                order_date = excluded.order_date,
                customer_key = excluded.customer_key,
                amount = excluded.amount,
                data = excluded.data
            "#,
            params![
                keyed.key.as_str(),
                kind,
                record.order_date(),
                record.customer_key(),
                record.amount(),
                data,
            ],
        )
        .context("Failed to upsert order")?;
        Ok(())
    }

    /// Whole item-name collection
    pub fn item_names(&self) -> Result<ItemMaster> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT item_code, display_name FROM item_master")
            .context("Failed to prepare query")?;

        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
            .context("Failed to query item names")?;

        let mut names = Vec::new();
        for row in rows {
            names.push(row.context("Failed to read row")?);
        }
        Ok(names.into_iter().collect())
    }

    pub fn upsert_item_name(&self, code: &str, display_name: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO item_master (item_code, display_name) VALUES (?, ?)",
            params![code, display_name],
        )
        .context("Failed to upsert item name")?;

        debug!(code, "Item name upserted");
        Ok(())
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let conn = self.lock()?;
        let orders: i64 = conn
            .query_row("SELECT COUNT(*) FROM orders", [], |row| row.get(0))
            .context("Failed to count orders")?;
        let customers: i64 = conn
            .query_row("SELECT COUNT(DISTINCT customer_key) FROM orders", [], |row| {
                row.get(0)
            })
            .context("Failed to count customers")?;
        let item_names: i64 = conn
            .query_row("SELECT COUNT(*) FROM item_master", [], |row| row.get(0))
            .context("Failed to count item names")?;

        Ok(StoreStats {
            orders: orders as usize,
            customers: customers as usize,
            item_names: item_names as usize,
        })
    }

    /// Delete both collections
    pub fn wipe(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch("DELETE FROM orders; DELETE FROM item_master;")
            .context("Failed to wipe store")?;
        debug!("Order store wiped");
        Ok(())
    }
}

impl Drop for OrderStore {
    fn drop(&mut self) {
        if let Ok(conn) = self.conn.lock() {
            if let Err(e) = conn.pragma_update(None, "wal_checkpoint", "TRUNCATE") {
                warn!("Failed to checkpoint WAL on OrderStore drop: {}", e);
            }
        }
    }
}

/// Row counts of the persisted collections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub orders: usize,
    pub customers: usize,
    pub item_names: usize,
}
