//! Intent history as reported by the SDK

use crate::sdk::IntentRecord;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const RECENT_COUNT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentStatus {
    Pending,
    Completed,
    Failed,
}

impl IntentStatus {
    pub fn of(record: &IntentRecord) -> Self {
        if record.fulfilled {
            IntentStatus::Completed
        } else if record.refunded {
            IntentStatus::Failed
        } else {
            IntentStatus::Pending
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistoryStatistics {
    pub total: usize,
    pub pending: usize,
    pub completed: usize,
    pub failed: usize,
    /// Completed share in percent, 0 for an empty history
    pub success_rate: f64,
}

#[derive(Debug, Clone, Default)]
pub struct TransactionHistory {
    records: Vec<IntentRecord>,
    is_loading: bool,
    error: Option<String>,
    refreshed_at: Option<DateTime<Utc>>,
}

impl TransactionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records, newest first
    pub fn records(&self) -> &[IntentRecord] {
        &self.records
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.refreshed_at
    }

    pub fn begin_refresh(&mut self) {
        self.is_loading = true;
        self.error = None;
    }

    pub fn finish_refresh(&mut self, records: Vec<IntentRecord>) {
        self.records = records;
        self.is_loading = false;
        self.refreshed_at = Some(Utc::now());
    }

    pub fn fail_refresh(&mut self, error: impl Into<String>) {
        self.is_loading = false;
        self.error = Some(error.into());
    }

    pub fn by_status(&self, status: IntentStatus) -> Vec<&IntentRecord> {
        self.records
            .iter()
            .filter(|r| IntentStatus::of(r) == status)
            .collect()
    }

    pub fn statistics(&self) -> HistoryStatistics {
        let count = |status| self.records.iter().filter(|r| IntentStatus::of(r) == status).count();
        let total = self.records.len();
        let completed = count(IntentStatus::Completed);

        HistoryStatistics {
            total,
            pending: count(IntentStatus::Pending),
            completed,
            failed: count(IntentStatus::Failed),
            success_rate: if total > 0 {
                completed as f64 / total as f64 * 100.0
            } else {
                0.0
            },
        }
    }

    /// Records whose id or destination chain id contains `query`
    pub fn search(&self, query: &str) -> Vec<&IntentRecord> {
        self.records
            .iter()
            .filter(|r| {
                r.id.to_string().contains(query)
                    || r.destination_chain_id.to_string().contains(query)
            })
            .collect()
    }

    pub fn recent(&self) -> &[IntentRecord] {
        &self.records[..self.records.len().min(RECENT_COUNT)]
    }

    pub fn most_recent(&self) -> Option<&IntentRecord> {
        self.records.first()
    }

    pub fn has_pending(&self) -> bool {
        self.records
            .iter()
            .any(|r| IntentStatus::of(r) == IntentStatus::Pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u64, destination: u64, fulfilled: bool, refunded: bool) -> IntentRecord {
        IntentRecord {
            id,
            token: "USDT".to_string(),
            amount: "10".to_string(),
            source_chain_ids: vec![42161],
            destination_chain_id: destination,
            deposited: true,
            fulfilled,
            refunded,
            created_at: Utc::now(),
        }
    }

    fn history() -> TransactionHistory {
        let mut history = TransactionHistory::new();
        history.finish_refresh(vec![
            record(7, 1, false, false),
            record(6, 42161, true, false),
            record(5, 1, false, true),
            record(4, 1, true, false),
            record(3, 10, true, false),
            record(2, 1, true, false),
        ]);
        history
    }

    #[test]
    fn test_status_derivation() {
        assert_eq!(IntentStatus::of(&record(1, 1, true, true)), IntentStatus::Completed);
        assert_eq!(IntentStatus::of(&record(1, 1, false, true)), IntentStatus::Failed);
        assert_eq!(IntentStatus::of(&record(1, 1, false, false)), IntentStatus::Pending);
    }

    #[test]
    fn test_statistics() {
        let stats = history().statistics();
        assert_eq!(stats.total, 6);
        assert_eq!(stats.completed, 4);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.pending, 1);
        assert!((stats.success_rate - 66.666).abs() < 0.01);

        assert_eq!(TransactionHistory::new().statistics().success_rate, 0.0);
    }

    #[test]
    fn test_queries() {
        let history = history();
        assert_eq!(history.recent().len(), 5);
        assert_eq!(history.most_recent().map(|r| r.id), Some(7));
        assert!(history.has_pending());
        assert_eq!(history.by_status(IntentStatus::Failed).len(), 1);

        let ids: Vec<u64> = history.search("4216").iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![6]);
        assert_eq!(history.search("7").len(), 1);
    }

    #[test]
    fn test_failed_refresh_keeps_records() {
        let mut history = history();
        history.begin_refresh();
        history.fail_refresh("SDK not initialized");
        assert_eq!(history.records().len(), 6);
        assert_eq!(history.error(), Some("SDK not initialized"));
        assert!(!history.is_loading());
    }
}
