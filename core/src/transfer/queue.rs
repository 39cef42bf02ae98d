use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::warn;

use super::broadcast::ProgressBroadcaster;
use super::types::{TransferRecord, TransferStatus, TransferUpdate};

/// In-memory table of transfer records.
///
/// Every mutation is published while the table lock is held, so observers
/// receive updates in the order they were applied.
pub struct TransferQueue {
    records: Mutex<HashMap<String, TransferRecord>>,
    broadcaster: Arc<ProgressBroadcaster>,
}

impl TransferQueue {
    pub fn new(broadcaster: Arc<ProgressBroadcaster>) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            broadcaster,
        }
    }

    /// Insert a record. It always starts `transferring` at 0 %.
    pub async fn create(&self, mut record: TransferRecord) -> TransferRecord {
        record.status = TransferStatus::Transferring;
        record.progress = 0;
        record.error = None;
        record.finished_at = None;

        let mut records = self.records.lock().await;
        records.insert(record.id.clone(), record.clone());
        self.broadcaster.publish(&record);
        record
    }

    /// Merge `update` into a record.
    ///
    /// Unknown ids, records that already finished, and attempts to move a
    /// record back to `queued` are refused and logged. Returns the updated
    /// snapshot on success.
    pub async fn update(&self, id: &str, update: TransferUpdate) -> Option<TransferRecord> {
        let mut records = self.records.lock().await;
        let Some(record) = records.get_mut(id) else {
            warn!(transfer_id = %id, "Ignoring update for unknown transfer");
            return None;
        };
        if record.status.is_terminal() {
            warn!(
                transfer_id = %id,
                status = ?record.status,
                "Ignoring update for finished transfer"
            );
            return None;
        }
        if update.status == Some(TransferStatus::Queued) {
            warn!(transfer_id = %id, "Ignoring transition back to queued");
            return None;
        }

        if let Some(status) = update.status {
            record.status = status;
            if status.is_terminal() {
                record.finished_at = Some(Utc::now());
            }
        }
        if let Some(progress) = update.progress {
            record.progress = progress.min(100);
        }
        if let Some(size) = update.size {
            record.size = Some(size);
        }
        if record.status == TransferStatus::Failed {
            record.error = Some(
                update
                    .error
                    .filter(|e| !e.trim().is_empty())
                    .unwrap_or_else(|| "unknown error".to_string()),
            );
        }

        let snapshot = record.clone();
        self.broadcaster.publish(&snapshot);
        Some(snapshot)
    }

    pub async fn complete(&self, id: &str) -> Option<TransferRecord> {
        self.update(id, TransferUpdate::completed()).await
    }

    pub async fn fail(&self, id: &str, message: &str) -> Option<TransferRecord> {
        self.update(id, TransferUpdate::failed(message)).await
    }

    pub async fn get(&self, id: &str) -> Option<TransferRecord> {
        self.records.lock().await.get(id).cloned()
    }

    /// All records, oldest first.
    pub async fn list(&self) -> Vec<TransferRecord> {
        let mut all: Vec<TransferRecord> = self.records.lock().await.values().cloned().collect();
        all.sort_by_key(|r| r.started_at);
        all
    }

    /// Drop every finished record. In-flight records are kept. Returns the
    /// number removed.
    pub async fn clear(&self) -> usize {
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|_, r| !r.status.is_terminal());
        before - records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::types::TransferKind;

    fn queue() -> TransferQueue {
        TransferQueue::new(Arc::new(ProgressBroadcaster::new()))
    }

    fn record(name: &str) -> TransferRecord {
        TransferRecord::new(TransferKind::Upload, name, "/l", "/r")
    }

    #[tokio::test]
    async fn create_starts_transferring() {
        let q = queue();
        let rec = q.create(record("a")).await;
        assert_eq!(rec.status, TransferStatus::Transferring);
        assert_eq!(rec.progress, 0);
        assert_eq!(q.get(&rec.id).await.unwrap(), rec);
    }

    #[tokio::test]
    async fn complete_sets_progress_and_finish_time() {
        let q = queue();
        let rec = q.create(record("a")).await;
        let done = q.complete(&rec.id).await.unwrap();
        assert_eq!(done.status, TransferStatus::Completed);
        assert_eq!(done.progress, 100);
        assert!(done.finished_at.is_some());
        assert!(done.error.is_none());
    }

    #[tokio::test]
    async fn terminal_records_are_frozen() {
        let q = queue();
        let rec = q.create(record("a")).await;
        q.fail(&rec.id, "disk full").await.unwrap();

        assert!(q.complete(&rec.id).await.is_none());
        assert!(q.update(&rec.id, TransferUpdate::progress(50)).await.is_none());

        let stored = q.get(&rec.id).await.unwrap();
        assert_eq!(stored.status, TransferStatus::Failed);
        assert_eq!(stored.error.as_deref(), Some("disk full"));
    }

    #[tokio::test]
    async fn unknown_ids_are_refused() {
        let q = queue();
        assert!(q.complete("missing").await.is_none());
    }

    #[tokio::test]
    async fn progress_is_clamped() {
        let q = queue();
        let rec = q.create(record("a")).await;
        let updated = q.update(&rec.id, TransferUpdate::progress(250)).await.unwrap();
        assert_eq!(updated.progress, 100);
        assert_eq!(updated.status, TransferStatus::Transferring);
    }

    #[tokio::test]
    async fn clear_keeps_in_flight_records() {
        let q = queue();
        let a = q.create(record("a")).await;
        let b = q.create(record("b")).await;
        let c = q.create(record("c")).await;
        q.complete(&a.id).await;
        q.fail(&b.id, "boom").await;

        assert_eq!(q.clear().await, 2);
        let left = q.list().await;
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].id, c.id);
        assert_eq!(q.clear().await, 0);
    }

    #[tokio::test]
    async fn observers_see_updates_in_order() {
        let broadcaster = Arc::new(ProgressBroadcaster::new());
        let q = TransferQueue::new(broadcaster.clone());
        let (_, mut rx) = broadcaster.subscribe();

        let rec = q.create(record("a")).await;
        q.update(&rec.id, TransferUpdate::progress(40)).await;
        q.complete(&rec.id).await;

        let mut statuses = Vec::new();
        for _ in 0..3 {
            let msg: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
            statuses.push((
                msg["record"]["status"].as_str().unwrap().to_string(),
                msg["record"]["progress"].as_u64().unwrap(),
            ));
        }
        assert_eq!(
            statuses,
            vec![
                ("transferring".to_string(), 0),
                ("transferring".to_string(), 40),
                ("completed".to_string(), 100),
            ]
        );
    }
}
