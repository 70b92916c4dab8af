//! In-memory progress of running imports
//!
//! One entry per client. The import loop is the only writer; pollers take a
//! read lock just long enough to clone the record. Finished imports stay
//! visible (inactive) for a short while so a poller that missed the last
//! update still sees the final counts.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::debug;

use crate::config::ProgressConfig;
use crate::models::ProgressRecord;

/// How a processed row ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOutcome {
    Imported,
    Skipped,
}

struct Entry {
    record: ProgressRecord,
    started: Instant,
    finished_at: Option<Instant>,
    cancel: Arc<AtomicBool>,
}

impl Entry {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.finished_at.is_some_and(|t| t.elapsed() >= ttl)
    }
}

/// Live progress keyed by client id
pub struct ProgressTracker {
    entries: RwLock<HashMap<String, Entry>>,
    final_snapshot: Duration,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new(&ProgressConfig::default())
    }
}

impl ProgressTracker {
    pub fn new(config: &ProgressConfig) -> Self {
        Self::with_final_snapshot(Duration::from_secs(config.final_snapshot_secs))
    }

    pub fn with_final_snapshot(final_snapshot: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            final_snapshot,
        }
    }

    // A panicking writer leaves counters intact, so poisoning is ignored
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Entry>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Entry>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Start tracking a batch, replacing any earlier entry for the client.
    /// Returns the cancellation flag the import loop should check.
    pub fn begin(&self, client_id: &str, session_id: i64, total: usize) -> Arc<AtomicBool> {
        let cancel = Arc::new(AtomicBool::new(false));
        let entry = Entry {
            record: ProgressRecord {
                session_id,
                total,
                processed: 0,
                imported: 0,
                skipped: 0,
                percent: 0,
                current_entry: None,
                start_time: Utc::now(),
                estimated_time_remaining: None,
                is_active: true,
            },
            started: Instant::now(),
            finished_at: None,
            cancel: Arc::clone(&cancel),
        };

        let mut entries = self.write();
        let ttl = self.final_snapshot;
        entries.retain(|_, e| !e.is_expired(ttl));
        entries.insert(client_id.to_string(), entry);
        debug!(client_id, session_id, total, "Progress tracking started");
        cancel
    }

    /// Count one processed row. Returns the updated record, or None when the
    /// client's entry belongs to another session or is no longer active.
    pub fn record_row(
        &self,
        client_id: &str,
        session_id: i64,
        outcome: RowOutcome,
        current_entry: Option<String>,
    ) -> Option<ProgressRecord> {
        let mut entries = self.write();
        let entry = entries
            .get_mut(client_id)
            .filter(|e| e.record.session_id == session_id && e.record.is_active)?;

        let record = &mut entry.record;
        if record.processed >= record.total {
            return Some(record.clone());
        }

        match outcome {
            RowOutcome::Imported => record.imported += 1,
            RowOutcome::Skipped => record.skipped += 1,
        }
        record.processed = record.imported + record.skipped;
        record.percent = record.percent.max(percent(record.processed, record.total));
        record.current_entry = current_entry;

        let elapsed = entry.started.elapsed().as_secs_f64();
        let remaining = record.total - record.processed;
        record.estimated_time_remaining =
            Some((elapsed / record.processed as f64 * remaining as f64).round() as u64);

        Some(record.clone())
    }

    /// Mark the batch inactive; the final snapshot stays queryable for the
    /// configured window
    pub fn finish(&self, client_id: &str, session_id: i64) {
        let mut entries = self.write();
        if let Some(entry) = entries
            .get_mut(client_id)
            .filter(|e| e.record.session_id == session_id)
        {
            entry.record.is_active = false;
            entry.record.current_entry = None;
            entry.record.estimated_time_remaining = None;
            if entry.record.processed == entry.record.total {
                entry.record.percent = 100;
            }
            entry.finished_at.get_or_insert_with(Instant::now);
            debug!(client_id, session_id, "Progress tracking finished");
        }
    }

    /// Ask a running batch to stop before its next row
    pub fn request_cancel(&self, client_id: &str, session_id: i64) -> bool {
        let entries = self.read();
        match entries
            .get(client_id)
            .filter(|e| e.record.session_id == session_id && e.record.is_active)
        {
            Some(entry) => {
                entry.cancel.store(true, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    /// Copy of the client's current record, if any and not expired
    pub fn snapshot(&self, client_id: &str) -> Option<ProgressRecord> {
        let entries = self.read();
        entries
            .get(client_id)
            .filter(|e| !e.is_expired(self.final_snapshot))
            .map(|e| e.record.clone())
    }

    /// Drop the client's entry
    pub fn clear(&self, client_id: &str) {
        self.write().remove(client_id);
    }
}

/// Rounded percentage; an empty batch counts as done
pub fn percent(processed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((processed as f64 / total as f64) * 100.0).round().min(100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_and_percent() {
        let tracker = ProgressTracker::default();
        tracker.begin("acme", 1, 4);

        tracker.record_row("acme", 1, RowOutcome::Imported, Some("Row 1".into()));
        let record = tracker
            .record_row("acme", 1, RowOutcome::Skipped, Some("Row 2".into()))
            .unwrap();

        assert_eq!(record.imported, 1);
        assert_eq!(record.skipped, 1);
        assert_eq!(record.processed, 2);
        assert_eq!(record.percent, 50);
        assert_eq!(record.current_entry.as_deref(), Some("Row 2"));
        assert!(record.estimated_time_remaining.is_some());
        assert!(record.is_active);
    }

    #[test]
    fn test_monotonic_and_bounded() {
        let tracker = ProgressTracker::default();
        tracker.begin("acme", 1, 3);

        let mut last_percent = 0;
        let mut last_processed = 0;
        for _ in 0..5 {
            let record = tracker
                .record_row("acme", 1, RowOutcome::Imported, None)
                .unwrap();
            assert!(record.percent >= last_percent);
            assert!(record.processed >= last_processed);
            assert!(record.processed <= record.total);
            assert_eq!(record.processed, record.imported + record.skipped);
            last_percent = record.percent;
            last_processed = record.processed;
        }
        assert_eq!(last_processed, 3);
        assert_eq!(last_percent, 100);
    }

    #[test]
    fn test_other_session_is_ignored() {
        let tracker = ProgressTracker::default();
        tracker.begin("acme", 2, 10);
        assert!(tracker
            .record_row("acme", 1, RowOutcome::Imported, None)
            .is_none());
        assert_eq!(tracker.snapshot("acme").unwrap().processed, 0);
    }

    #[test]
    fn test_finish_keeps_inactive_snapshot() {
        let tracker = ProgressTracker::default();
        tracker.begin("acme", 1, 1);
        tracker.record_row("acme", 1, RowOutcome::Imported, None);
        tracker.finish("acme", 1);

        let record = tracker.snapshot("acme").unwrap();
        assert!(!record.is_active);
        assert_eq!(record.percent, 100);
        assert_eq!(record.estimated_time_remaining, None);

        // Inactive entries take no more rows
        assert!(tracker
            .record_row("acme", 1, RowOutcome::Imported, None)
            .is_none());
    }

    #[test]
    fn test_final_snapshot_expires() {
        let tracker = ProgressTracker::with_final_snapshot(Duration::ZERO);
        tracker.begin("acme", 1, 1);
        assert!(tracker.snapshot("acme").is_some());
        tracker.finish("acme", 1);
        assert!(tracker.snapshot("acme").is_none());
    }

    #[test]
    fn test_cancel_flag() {
        let tracker = ProgressTracker::default();
        let flag = tracker.begin("acme", 1, 10);
        assert!(!flag.load(Ordering::SeqCst));

        assert!(!tracker.request_cancel("acme", 99));
        assert!(tracker.request_cancel("acme", 1));
        assert!(flag.load(Ordering::SeqCst));
    }

    #[test]
    fn test_clients_are_independent() {
        let tracker = ProgressTracker::default();
        tracker.begin("acme", 1, 2);
        tracker.begin("globex", 2, 2);
        tracker.record_row("acme", 1, RowOutcome::Imported, None);

        assert_eq!(tracker.snapshot("acme").unwrap().processed, 1);
        assert_eq!(tracker.snapshot("globex").unwrap().processed, 0);
        tracker.clear("acme");
        assert!(tracker.snapshot("acme").is_none());
    }

    #[test]
    fn test_percent_helper() {
        assert_eq!(percent(0, 0), 100);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
    }
}
