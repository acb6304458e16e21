//! Analysis session: in-memory record set, item master and memoized analytics
//!
//! Records and item names live behind parking_lot::RwLock; every mutation
//! bumps a generation counter. [`DataStore::analytics`] rebuilds the
//! snapshot only when the generation moved, and a separate mutex makes sure
//! only one rebuild runs at a time.

use crate::analytics::AnalyticsData;
use crate::cache::{OrderStore, StoreStats};
use crate::config::AnalysisConfig;
use crate::error::{CoreError, LoadError, LoadReport};
use crate::event::{DataEvent, EventBus};
use crate::models::{ItemMaster, KeyedRecord, OrderRecord};
use crate::parsers::CsvIngest;
use anyhow::{Context, Result};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Keyed records in first-admission order
#[derive(Default)]
struct RecordSet {
    records: Vec<KeyedRecord>,
    index: HashMap<String, usize>,
}

impl RecordSet {
    fn len(&self) -> usize {
        self.records.len()
    }

    /// Replace an existing key in place, else append
    fn upsert(&mut self, keyed: KeyedRecord) -> bool {
        match self.index.get(&keyed.key) {
            Some(&idx) => {
                self.records[idx] = keyed;
                false
            }
            None => {
                self.index.insert(keyed.key.clone(), self.records.len());
                self.records.push(keyed);
                true
            }
        }
    }

    fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    fn clear(&mut self) {
        self.records.clear();
        self.index.clear();
    }
}

/// Outcome of admitting one batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub inserted: usize,
    pub replaced: usize,
    pub over_limit: usize,
}

/// Central data store for one analysis session
pub struct DataStore {
    config: AnalysisConfig,
    /// Persisted collections; None when running purely in memory
    order_store: Option<Arc<OrderStore>>,
    records: RwLock<RecordSet>,
    item_master: RwLock<ItemMaster>,
    generation: AtomicU64,
    analytics: RwLock<Option<(u64, Arc<AnalyticsData>)>>,
    /// Serializes analytics rebuilds
    compute_lock: Mutex<()>,
    event_bus: EventBus,
}

impl DataStore {
    /// Session backed by `<data_dir>/orders.db`
    ///
    /// If the database cannot be opened the session still works, without
    /// persistence.
    pub fn new(config: AnalysisConfig, data_dir: &Path) -> Self {
        let order_store = match OrderStore::open(data_dir) {
            Ok(store) => {
                debug!(path = %store.path().display(), "Order store enabled");
                Some(Arc::new(store))
            }
            Err(e) => {
                warn!(error = %e, "Failed to open order store, running in memory");
                None
            }
        };
        Self::with_store(config, order_store)
    }

    /// Session without persistence (one-shot analysis, tests)
    pub fn in_memory(config: AnalysisConfig) -> Self {
        Self::with_store(config, None)
    }

    fn with_store(config: AnalysisConfig, order_store: Option<Arc<OrderStore>>) -> Self {
        Self {
            config,
            order_store,
            records: RwLock::new(RecordSet::default()),
            item_master: RwLock::new(ItemMaster::new()),
            generation: AtomicU64::new(0),
            analytics: RwLock::new(None),
            compute_lock: Mutex::new(()),
            event_bus: EventBus::default_capacity(),
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn is_persistent(&self) -> bool {
        self.order_store.is_some()
    }

    pub fn store_path(&self) -> Option<PathBuf> {
        self.order_store.as_ref().map(|s| s.path().to_path_buf())
    }

    /// Read both persisted collections into the session
    pub fn load(&self) -> LoadReport {
        let mut report = LoadReport::new();
        let Some(store) = &self.order_store else {
            return report;
        };

        match store.all_records() {
            Ok(records) => {
                let mut set = self.records.write();
                set.clear();
                for keyed in records {
                    set.upsert(keyed);
                }
                report.records_admitted = set.len();
                report.store_loaded = true;
            }
            Err(e) => {
                report.add_error(
                    LoadError::fatal("store", format!("Failed to read orders: {:#}", e))
                        .with_suggestion("Run 'ltvboard reset --yes' to rebuild the store"),
                );
            }
        }

        match store.item_names() {
            Ok(master) => *self.item_master.write() = master,
            Err(e) => report.add_warning("store", format!("Failed to read item names: {:#}", e)),
        }

        self.invalidate();
        info!(
            records = report.records_admitted,
            item_names = self.item_master.read().len(),
            "Session loaded from store"
        );
        report
    }

    /// Parse a CSV file and admit its records
    ///
    /// A failure to persist is reported as an error in the returned report;
    /// the session is left unchanged in that case.
    pub async fn import_csv(&self, path: &Path) -> Result<LoadReport, CoreError> {
        let outcome = CsvIngest::ingest_file(path).await?;
        let mut report = outcome.report;
        let admitted = report.records_admitted;

        let summary = match self.import_records(outcome.records, &path.display().to_string()) {
            Ok(summary) => summary,
            Err(e) => {
                report.add_error(
                    LoadError::error(
                        "store",
                        format!("{} records not imported: {:#}", admitted, e),
                    )
                    .with_suggestion("Run 'ltvboard reset --yes' to rebuild the store"),
                );
                report.records_admitted = 0;
                return Ok(report);
            }
        };

        report.records_over_limit += summary.over_limit;
        if summary.over_limit > 0 {
            report.add_warning(
                "import",
                format!(
                    "{} records not admitted: store limit of {} reached",
                    summary.over_limit, self.config.max_records
                ),
            );
        }
        if !self.is_persistent() {
            report.add_warning("store", "Order store unavailable; records kept in memory only");
        }
        Ok(report)
    }

    /// Admit a batch, enforcing `max_records`, and persist it
    ///
    /// Records whose key is already present replace the stored copy and do
    /// not count against the limit. The batch is written to the order store
    /// before the session changes, so a failed write leaves both untouched.
    pub fn import_records(&self, records: Vec<OrderRecord>, source: &str) -> Result<ImportSummary> {
        let keyed = KeyedRecord::assign_keys(records);
        let mut summary = ImportSummary::default();

        let mut set = self.records.write();
        let mut new_keys = 0usize;
        let mut admitted = Vec::with_capacity(keyed.len());
        for record in keyed {
            let known = set.contains(&record.key);
            if !known && set.len() + new_keys >= self.config.max_records {
                summary.over_limit += 1;
                continue;
            }
            if !known {
                new_keys += 1;
            }
            admitted.push(record);
        }

        if let Some(store) = &self.order_store {
            store
                .upsert_records(&admitted)
                .with_context(|| format!("Failed to persist records from {}", source))?;
        }

        for record in admitted {
            if set.upsert(record) {
                summary.inserted += 1;
            } else {
                summary.replaced += 1;
            }
        }
        drop(set);

        if summary.over_limit > 0 {
            warn!(
                over_limit = summary.over_limit,
                max_records = self.config.max_records,
                "Record limit reached, remaining rows skipped"
            );
        }

        self.invalidate();
        self.event_bus.publish(DataEvent::RecordsImported {
            admitted: summary.inserted + summary.replaced,
            source: source.to_string(),
        });
        info!(
            source,
            inserted = summary.inserted,
            replaced = summary.replaced,
            "Records imported"
        );
        Ok(summary)
    }

    /// Set the display name for an item code
    pub fn rename_item(&self, code: &str, display_name: &str) -> Result<()> {
        let code = code.trim();
        let display_name = display_name.trim();
        if code.is_empty() || display_name.is_empty() {
            return Err(CoreError::InvalidInput {
                message: "item code and display name must not be empty".to_string(),
            }
            .into());
        }

        if let Some(store) = &self.order_store {
            store.upsert_item_name(code, display_name)?;
        }
        self.item_master.write().upsert(code, display_name);

        self.invalidate();
        self.event_bus.publish(DataEvent::ItemNameUpdated {
            code: code.to_string(),
        });
        Ok(())
    }

    /// Clear persisted collections and the session
    pub fn wipe(&self) -> Result<()> {
        if let Some(store) = &self.order_store {
            store.wipe()?;
        }
        self.records.write().clear();
        *self.item_master.write() = ItemMaster::new();

        self.invalidate();
        self.event_bus.publish(DataEvent::StoreWiped);
        info!("Store wiped");
        Ok(())
    }

    /// Current analytics snapshot, rebuilt only after a mutation
    pub fn analytics(&self) -> Arc<AnalyticsData> {
        if let Some(data) = self.cached_analytics() {
            return data;
        }

        let _guard = self.compute_lock.lock();
        // Another caller may have rebuilt while we waited
        if let Some(data) = self.cached_analytics() {
            return data;
        }

        let generation = self.generation.load(Ordering::Acquire);
        let records = self.records();
        let master = self.item_master();
        let data = Arc::new(AnalyticsData::compute(&records, &master, &self.config));

        *self.analytics.write() = Some((generation, Arc::clone(&data)));
        self.event_bus
            .publish(DataEvent::AnalyticsRecomputed { generation });
        debug!(generation, customers = data.customers.len(), "Analytics recomputed");
        data
    }

    fn cached_analytics(&self) -> Option<Arc<AnalyticsData>> {
        let current = self.generation.load(Ordering::Acquire);
        match &*self.analytics.read() {
            Some((generation, data)) if *generation == current => Some(Arc::clone(data)),
            _ => None,
        }
    }

    fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Snapshot of admitted records
    pub fn records(&self) -> Vec<OrderRecord> {
        self.records
            .read()
            .records
            .iter()
            .map(|k| k.record.clone())
            .collect()
    }

    pub fn record_count(&self) -> usize {
        self.records.read().len()
    }

    pub fn item_master(&self) -> ItemMaster {
        self.item_master.read().clone()
    }

    /// Persisted row counts, if a store is attached
    pub fn store_stats(&self) -> Option<StoreStats> {
        let store = self.order_store.as_ref()?;
        match store.stats() {
            Ok(stats) => Some(stats),
            Err(e) => {
                warn!(error = %e, "Failed to read store stats");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CanonicalOrderRecord;

    fn order(date: &str, customer: &str, amount: f64) -> OrderRecord {
        OrderRecord::Order(CanonicalOrderRecord::new(date, customer, amount))
    }

    #[test]
    fn test_analytics_memoized_until_mutation() {
        let store = DataStore::in_memory(AnalysisConfig::default());
        store.import_records(vec![order("2024-01-10", "A", 1000.0)], "test").unwrap();

        let first = store.analytics();
        let second = store.analytics();
        assert!(Arc::ptr_eq(&first, &second));

        store.import_records(vec![order("2024-01-15", "B", 500.0)], "test").unwrap();
        let third = store.analytics();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(third.metrics.customer_count, 2);
    }

    #[test]
    fn test_reimport_replaces_instead_of_duplicating() {
        let store = DataStore::in_memory(AnalysisConfig::default());
        let batch = || vec![order("2024-01-10", "A", 1000.0), order("2024-01-10", "A", 1000.0)];

        let first = store.import_records(batch(), "a.csv").unwrap();
        let second = store.import_records(batch(), "a.csv").unwrap();

        assert_eq!(first.inserted, 2);
        assert_eq!(second.replaced, 2);
        assert_eq!(store.record_count(), 2);
    }

    #[test]
    fn test_record_limit() {
        let config = AnalysisConfig {
            max_records: 2,
            ..AnalysisConfig::default()
        };
        let store = DataStore::in_memory(config);
        let summary = store.import_records(
            vec![
                order("2024-01-01", "A", 1.0),
                order("2024-01-02", "B", 2.0),
                order("2024-01-03", "C", 3.0),
            ],
            "big.csv",
        )
        .unwrap();

        assert_eq!(summary.inserted, 2);
        assert_eq!(summary.over_limit, 1);
        assert_eq!(store.record_count(), 2);
    }

    #[test]
    fn test_rename_item_validates_input() {
        let store = DataStore::in_memory(AnalysisConfig::default());
        assert!(store.rename_item("", "Name").is_err());
        assert!(store.rename_item("tea", "  ").is_err());

        let before = store.generation();
        store.rename_item("tea", "Green Tea").unwrap();
        assert!(store.generation() > before);
        assert_eq!(store.item_master().get("tea"), Some("Green Tea"));
    }

    #[tokio::test]
    async fn test_events_published() {
        let store = DataStore::in_memory(AnalysisConfig::default());
        let mut rx = store.event_bus().subscribe();

        store.import_records(vec![order("2024-01-10", "A", 1000.0)], "x.csv").unwrap();
        store.wipe().unwrap();

        assert!(matches!(
            rx.recv().await.unwrap(),
            DataEvent::RecordsImported { admitted: 1, .. }
        ));
        assert_eq!(rx.recv().await.unwrap(), DataEvent::StoreWiped);
        assert_eq!(store.record_count(), 0);
    }
}
