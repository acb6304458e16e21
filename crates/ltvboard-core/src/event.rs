//! Change notifications for the analysis session
//!
//! Every mutation of the record set or the item master is announced here so
//! consumers know their derived views are stale.

use tokio::sync::broadcast;

/// Events emitted by [`crate::store::DataStore`]
#[derive(Debug, Clone, PartialEq)]
pub enum DataEvent {
    /// Records were imported (count admitted into the session)
    RecordsImported { admitted: usize, source: String },
    /// An item display name was set
    ItemNameUpdated { code: String },
    /// Persisted collections and in-memory state were cleared
    StoreWiped,
    /// A fresh analytics snapshot was built
    AnalyticsRecomputed { generation: u64 },
}

/// Broadcast channel for [`DataEvent`]s
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<DataEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// 64 pending events per subscriber
    pub fn default_capacity() -> Self {
        Self::new(64)
    }

    /// Send to all subscribers; nobody listening is fine
    pub fn publish(&self, event: DataEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DataEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::default_capacity()
    }
}
