use crate::Action;
use crate::cache::load_stored;
use crate::error::StoreError;
use crate::results::Dataset;
use crate::store::{GeneralState, KeyValueStore, StoredAudit};
use serde::Serialize;
use tokio::sync::mpsc;

/// Notifications emitted by the audit core. Fire and forget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "detail")]
pub enum TableEvent {
    #[serde(rename = "onTableRendered")]
    TableRendered { action: Action },

    #[serde(rename = "onTableDataChange", rename_all = "camelCase")]
    TableDataChange { table_data: Dataset },

    #[serde(rename = "onPageChange")]
    PageChange { page: usize },
}

/// Receiver side of the notifications
pub trait EventSink {
    fn emit(&self, event: TableEvent);
}

/// Sink that forwards events over an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<TableEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TableEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: TableEvent) {
        if self.tx.send(event).is_err() {
            ::log::debug!("No listener for table events, dropping event");
        }
    }
}

/// Sink for callers that do not persist anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: TableEvent) {}
}

/// Writes table events into the store record of one namespace
pub struct StorageBridge<S> {
    store: S,
    namespace: String,
}

impl<S: KeyValueStore> StorageBridge<S> {
    pub fn new(store: S, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
        }
    }

    /// Applies one event to the namespace record
    pub fn apply(&mut self, event: &TableEvent) -> Result<(), StoreError> {
        let mut stored = match load_stored(&self.store, &self.namespace) {
            Ok(stored) => stored,
            Err(e) => {
                ::log::warn!("{}; replacing the stored record", e);
                StoredAudit::default()
            }
        };

        match event {
            TableEvent::TableRendered { action } => {
                stored.general_state = Some(GeneralState::rendered());
                stored.action = Some(*action);
            }
            TableEvent::TableDataChange { table_data } => {
                stored.data = Some(table_data.clone());
            }
            TableEvent::PageChange { page } => {
                stored.page = Some(*page);
            }
        }

        ::log::trace!("Persisting {:?} for {}", event, self.namespace);
        self.store
            .set(&self.namespace, serde_json::to_value(&stored)?)
    }

    /// Consumes events until every sender is gone, then hands the store back
    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<TableEvent>) -> Result<S, StoreError> {
        let mut applied = 0usize;
        while let Some(event) = rx.recv().await {
            self.apply(&event)?;
            applied += 1;
        }
        ::log::debug!("Storage bridge for {} applied {} events", self.namespace, applied);
        Ok(self.store)
    }

    pub fn into_store(self) -> S {
        self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::PageRecord;
    use crate::store::MemoryStore;
    use serde_json::json;

    const NS: &str = "https://e.com";

    #[test]
    fn test_event_wire_names() {
        let value = serde_json::to_value(TableEvent::PageChange { page: 2 }).unwrap();
        assert_eq!(value, json!({"event": "onPageChange", "detail": {"page": 2}}));

        let value = serde_json::to_value(TableEvent::TableDataChange {
            table_data: Dataset::default(),
        })
        .unwrap();
        assert_eq!(value, json!({"event": "onTableDataChange", "detail": {"tableData": []}}));
    }

    #[test]
    fn test_bridge_updates_record_per_event() {
        let mut bridge = StorageBridge::new(MemoryStore::new(), NS);
        let data = Dataset::from_records(vec![PageRecord::failed("https://e.com/x", "boom")]);

        bridge
            .apply(&TableEvent::TableDataChange {
                table_data: data.clone(),
            })
            .unwrap();
        bridge
            .apply(&TableEvent::TableRendered {
                action: Action::UsePage,
            })
            .unwrap();
        bridge.apply(&TableEvent::PageChange { page: 1 }).unwrap();

        let stored = load_stored(&bridge.into_store(), NS).unwrap();
        assert_eq!(stored.data, Some(data));
        assert_eq!(stored.action, Some(Action::UsePage));
        assert_eq!(stored.general_state, Some(GeneralState::rendered()));
        assert_eq!(stored.page, Some(1));
    }

    #[test]
    fn test_bridge_replaces_corrupt_record() {
        let mut store = MemoryStore::new();
        store.set(NS, json!("garbage")).unwrap();

        let mut bridge = StorageBridge::new(store, NS);
        bridge.apply(&TableEvent::PageChange { page: 3 }).unwrap();
        assert_eq!(bridge.into_store().get(NS), Some(json!({"page": 3})));
    }

    #[tokio::test]
    async fn test_bridge_drains_channel() {
        let (sink, rx) = ChannelSink::new();
        let bridge = tokio::spawn(StorageBridge::new(MemoryStore::new(), NS).run(rx));

        sink.emit(TableEvent::PageChange { page: 5 });
        drop(sink);

        let store = bridge.await.unwrap().unwrap();
        assert_eq!(load_stored(&store, NS).unwrap().page, Some(5));
    }
}
