//! Append-only event feed with bounded retention.
//!
//! Entries live in a fixed-capacity ring (no reallocation): once
//! [`EVENT_LOG_CAPACITY`] entries are held, each append evicts the oldest.
//! Every entry gets a strictly increasing sequence number which doubles as
//! the read cursor, so viewers can resume with `list(Some(last_seq + 1))`
//! without re-reading the whole feed.
//!
//! ```text
//!   evicted ◀── [ seq 12 | seq 13 | … | seq 511 ] ◀── append(seq 512)
//!                 ▲ first_seq                ▲ next_seq - 1
//! ```

use std::sync::{PoisonError, RwLock};

use heapless::Deque;

use crate::app::events::{LogEntry, LogRecord, Seq};

/// Retention cap: the most recent entries kept.
pub const EVENT_LOG_CAPACITY: usize = 500;

struct LogInner {
    entries: Deque<LogEntry, EVENT_LOG_CAPACITY>,
    next_seq: Seq,
}

/// Reader-writer guarded event feed.
pub struct EventLog {
    inner: RwLock<LogInner>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(LogInner {
                entries: Deque::new(),
                next_seq: 1,
            }),
        }
    }

    /// Append a record, evicting the oldest entry when full.
    pub fn append(&self, record: LogRecord) -> LogEntry {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let entry = LogEntry {
            seq: inner.next_seq,
            record,
        };
        inner.next_seq += 1;
        push_evicting(&mut inner.entries, entry.clone());
        entry
    }

    /// Entries with `seq >= since`, oldest first.  `None` returns everything
    /// retained; a cursor older than the retained window also returns
    /// everything retained.
    pub fn list(&self, since: Option<Seq>) -> Vec<LogEntry> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let Some(first) = inner.entries.front().map(|e| e.seq) else {
            return Vec::new();
        };
        let skip = since.map_or(0, |s| s.saturating_sub(first) as usize);
        inner.entries.iter().skip(skip).cloned().collect()
    }

    /// Sequence number the next append will receive.
    pub fn next_seq(&self) -> Seq {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).next_seq
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replace the contents with restored entries.
    ///
    /// `entries` must be sorted by `seq`; only the newest
    /// [`EVENT_LOG_CAPACITY`] survive.  `next_seq` never moves backwards past
    /// the restored tail.
    pub fn restore(&self, entries: Vec<LogEntry>, next_seq: Seq) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.entries.clear();
        let tail = entries.last().map_or(0, |e| e.seq + 1);
        for entry in entries {
            push_evicting(&mut inner.entries, entry);
        }
        inner.next_seq = next_seq.max(tail).max(1);
    }
}

fn push_evicting(entries: &mut Deque<LogEntry, EVENT_LOG_CAPACITY>, entry: LogEntry) {
    if entries.is_full() {
        entries.pop_front();
    }
    // Cannot fail: a slot was just freed if the ring was full.
    let _ = entries.push_back(entry);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::events::{Alert, AlertKind};
    use chrono::NaiveDate;

    fn alert(n: u32) -> LogRecord {
        let ts = NaiveDate::from_ymd_opt(2026, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + chrono::Duration::seconds(n as i64);
        LogRecord::Alert(Alert::new(ts, AlertKind::LowFood, "low"))
    }

    #[test]
    fn sequence_starts_at_one() {
        let log = EventLog::new();
        assert!(log.list(None).is_empty());
        assert_eq!(log.append(alert(0)).seq, 1);
        assert_eq!(log.append(alert(1)).seq, 2);
        assert_eq!(log.next_seq(), 3);
    }

    #[test]
    fn cursor_resumes_incrementally() {
        let log = EventLog::new();
        for n in 0..5 {
            log.append(alert(n));
        }
        let first_page = log.list(None);
        let cursor = first_page.last().unwrap().seq + 1;
        assert!(log.list(Some(cursor)).is_empty());

        log.append(alert(5));
        let next = log.list(Some(cursor));
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].seq, 6);
        assert_eq!(log.list(Some(3)).iter().map(|e| e.seq).collect::<Vec<_>>(), vec![3, 4, 5, 6]);
    }

    #[test]
    fn retention_evicts_oldest_first() {
        let log = EventLog::new();
        let total = EVENT_LOG_CAPACITY as u32 + 20;
        for n in 0..total {
            log.append(alert(n));
        }
        let all = log.list(None);
        assert_eq!(all.len(), EVENT_LOG_CAPACITY);
        assert_eq!(all.first().unwrap().seq, 21);
        assert_eq!(all.last().unwrap().seq, u64::from(total));
        // A cursor inside the evicted range yields the whole retained window.
        assert_eq!(log.list(Some(2)).len(), EVENT_LOG_CAPACITY);
    }

    #[test]
    fn restore_continues_sequence() {
        let log = EventLog::new();
        let entries = vec![
            LogEntry { seq: 40, record: alert(0) },
            LogEntry { seq: 41, record: alert(1) },
        ];
        log.restore(entries, 0);
        assert_eq!(log.len(), 2);
        assert_eq!(log.append(alert(2)).seq, 42);
    }
}
