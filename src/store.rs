use tokio::sync::{broadcast, watch};

use crate::types::{HandshakeRecord, StoreEvent, STATUS_IDLE};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Writer half of the observable scan state. Held by the coordinator only;
/// the presentation layer sees a [`ScanView`] and cannot mutate anything.
pub struct ScanStore {
    status: watch::Sender<String>,
    records: watch::Sender<Vec<HandshakeRecord>>,
    events: broadcast::Sender<StoreEvent>,
}

/// Read-only projection of the scan state. Cheap to clone; observers poll
/// current values through the watch receivers or subscribe for ordered
/// mutation events.
#[derive(Clone)]
pub struct ScanView {
    status: watch::Receiver<String>,
    records: watch::Receiver<Vec<HandshakeRecord>>,
    events: broadcast::Sender<StoreEvent>,
}

impl ScanStore {
    pub fn new() -> (Self, ScanView) {
        let (status_tx, status_rx) = watch::channel(STATUS_IDLE.to_string());
        let (records_tx, records_rx) = watch::channel(Vec::new());
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let store = Self {
            status: status_tx,
            records: records_tx,
            events: events_tx.clone(),
        };
        let view = ScanView {
            status: status_rx,
            records: records_rx,
            events: events_tx,
        };
        (store, view)
    }

    /// Replace the current status. Setting the value it already holds is a
    /// no-op and skips notification.
    pub fn set_status(&self, text: impl Into<String>) {
        let text = text.into();
        let changed = self.status.send_if_modified(|current| {
            if *current == text {
                false
            } else {
                log::debug!("[store] status_changed: old={} new={}", current, text);
                *current = text.clone();
                true
            }
        });
        if changed {
            // No receivers is fine; the event is simply dropped.
            let _ = self.events.send(StoreEvent::StatusChanged(text));
        }
    }

    /// Append a discovered record. Insertion order is preserved; records are
    /// never deduplicated.
    pub fn push_record(&self, record: HandshakeRecord) {
        log::debug!("[store] record_appended: ssid={} mac={} state={}",
            record.ssid, record.mac, record.state);
        self.records.send_modify(|records| records.push(record.clone()));
        let _ = self.events.send(StoreEvent::RecordAppended(record));
    }
}

impl ScanView {
    /// Current status value.
    pub fn status(&self) -> String {
        self.status.borrow().clone()
    }

    /// Snapshot of the discovered records, in insertion order.
    pub fn records(&self) -> Vec<HandshakeRecord> {
        self.records.borrow().clone()
    }

    pub fn record_count(&self) -> usize {
        self.records.borrow().len()
    }

    /// Subscribe to ordered mutation events. Events published before the
    /// subscription are not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    /// Wait until the status value changes from what this receiver last saw.
    pub async fn status_changed(&mut self) -> eyre::Result<()> {
        self.status
            .changed()
            .await
            .map_err(|_| eyre::eyre!("scan store dropped"))
    }
}
