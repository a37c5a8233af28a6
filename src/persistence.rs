//! Storage layout for the schedule and the event feed.
//!
//! ```text
//!  namespace   key        value
//!  ─────────   ───        ─────
//!  schedule    rules      postcard(ScheduleSnapshot)
//!  events      head       next seq, u64 little-endian
//!  events      e{n}       json(LogEntry) with seq % 500 == n
//! ```
//!
//! The event feed is a ring of [`EVENT_LOG_CAPACITY`] slots: appending
//! entry `seq` overwrites the slot that held `seq - 500`, so storage never
//! grows past the in-memory retention cap.  Slots are JSON because log
//! entries use tagged enums that postcard cannot describe.

use log::warn;

use crate::app::events::{LogEntry, Seq};
use crate::app::ports::{StorageError, StoragePort};
use crate::event_log::EVENT_LOG_CAPACITY;
use crate::schedule::ScheduleSnapshot;

const SCHEDULE_NS: &str = "schedule";
const SCHEDULE_KEY: &str = "rules";
const EVENTS_NS: &str = "events";
const EVENTS_HEAD_KEY: &str = "head";

// ───────────────────────────────────────────────────────────────
// Schedule snapshot
// ───────────────────────────────────────────────────────────────

pub fn save_schedule(
    storage: &mut dyn StoragePort,
    snapshot: &ScheduleSnapshot,
) -> Result<(), StorageError> {
    let bytes = postcard::to_allocvec(snapshot).map_err(|_| StorageError::IoError)?;
    storage.write(SCHEDULE_NS, SCHEDULE_KEY, &bytes)
}

/// `Ok(None)` on first boot.  A corrupt blob is reported and ignored.
pub fn load_schedule(storage: &dyn StoragePort) -> Result<Option<ScheduleSnapshot>, StorageError> {
    let bytes = match storage.read(SCHEDULE_NS, SCHEDULE_KEY) {
        Ok(b) => b,
        Err(StorageError::NotFound) => return Ok(None),
        Err(e) => return Err(e),
    };
    match postcard::from_bytes(&bytes) {
        Ok(snapshot) => Ok(Some(snapshot)),
        Err(e) => {
            warn!("Persistence: schedule snapshot unreadable ({}), starting empty", e);
            Ok(None)
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Event ring
// ───────────────────────────────────────────────────────────────

/// Storage-backed ring of log entries.
pub struct EventRing;

impl EventRing {
    /// Write `entry` into its slot and advance the head.
    pub fn write_entry(
        storage: &mut dyn StoragePort,
        entry: &LogEntry,
    ) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec(entry).map_err(|_| StorageError::IoError)?;
        storage.write(EVENTS_NS, &Self::slot_key(entry.seq), &bytes)?;
        let head = (entry.seq + 1).to_le_bytes();
        storage.write(EVENTS_NS, EVENTS_HEAD_KEY, &head)
    }

    /// Every retained entry in sequence order, plus the next sequence
    /// number to hand out.  Slots from before the head's window are ignored.
    pub fn read_all(storage: &dyn StoragePort) -> (Vec<LogEntry>, Seq) {
        let head = match storage.read(EVENTS_NS, EVENTS_HEAD_KEY) {
            Ok(bytes) => match <[u8; 8]>::try_from(bytes.as_slice()) {
                Ok(raw) => u64::from_le_bytes(raw),
                Err(_) => {
                    warn!("Persistence: event head corrupt, discarding feed");
                    return (Vec::new(), 1);
                }
            },
            Err(_) => return (Vec::new(), 1),
        };
        let oldest = head.saturating_sub(EVENT_LOG_CAPACITY as Seq);

        let mut entries: Vec<LogEntry> = (0..EVENT_LOG_CAPACITY as Seq)
            .filter_map(|slot| storage.read(EVENTS_NS, &Self::slot_key(slot)).ok())
            .filter_map(|bytes| match serde_json::from_slice::<LogEntry>(&bytes) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Persistence: skipping unreadable event slot ({})", e);
                    None
                }
            })
            .filter(|e| e.seq >= oldest && e.seq < head)
            .collect();
        entries.sort_by_key(|e| e.seq);
        (entries, head.max(1))
    }

    /// Erase all slots and the head.
    pub fn clear(storage: &mut dyn StoragePort) {
        for slot in 0..EVENT_LOG_CAPACITY as Seq {
            let _ = storage.delete(EVENTS_NS, &Self::slot_key(slot));
        }
        let _ = storage.delete(EVENTS_NS, EVENTS_HEAD_KEY);
    }

    fn slot_key(seq: Seq) -> heapless::String<16> {
        let mut s = heapless::String::new();
        let _ = core::fmt::Write::write_fmt(
            &mut s,
            format_args!("e{}", seq % EVENT_LOG_CAPACITY as Seq),
        );
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    use crate::adapters::storage::MemoryStorage;
    use crate::app::events::{Alert, AlertKind, LogRecord};
    use crate::schedule::ScheduleStore;

    fn entry(seq: Seq) -> LogEntry {
        let ts = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        LogEntry {
            seq,
            record: LogRecord::Alert(Alert::new(ts, AlertKind::LowFood, "food low")),
        }
    }

    #[test]
    fn schedule_survives_restart() {
        let mut storage = MemoryStorage::new();
        assert_eq!(load_schedule(&storage), Ok(None));

        let store = ScheduleStore::new();
        store.add("18:30", 40).unwrap();
        store.add("07:15", 30).unwrap();
        save_schedule(&mut storage, &store.snapshot()).unwrap();

        let restored = ScheduleStore::new();
        restored.restore(load_schedule(&storage).unwrap().unwrap());
        assert_eq!(restored.list(), store.list());
    }

    #[test]
    fn corrupt_schedule_is_ignored() {
        let mut storage = MemoryStorage::new();
        storage.write(SCHEDULE_NS, SCHEDULE_KEY, &[0xff; 3]).unwrap();
        assert_eq!(load_schedule(&storage), Ok(None));
    }

    #[test]
    fn empty_ring_starts_at_one() {
        let storage = MemoryStorage::new();
        let (entries, next) = EventRing::read_all(&storage);
        assert!(entries.is_empty());
        assert_eq!(next, 1);
    }

    #[test]
    fn ring_keeps_last_capacity_entries_in_order() {
        let mut storage = MemoryStorage::new();
        let total = EVENT_LOG_CAPACITY as Seq + 20;
        for seq in 1..=total {
            EventRing::write_entry(&mut storage, &entry(seq)).unwrap();
        }
        let (entries, next) = EventRing::read_all(&storage);
        assert_eq!(next, total + 1);
        assert_eq!(entries.len(), EVENT_LOG_CAPACITY);
        assert_eq!(entries.first().map(|e| e.seq), Some(21));
        assert_eq!(entries.last().map(|e| e.seq), Some(total));
    }

    #[test]
    fn clear_empties_the_ring() {
        let mut storage = MemoryStorage::new();
        EventRing::write_entry(&mut storage, &entry(1)).unwrap();
        EventRing::clear(&mut storage);
        assert_eq!(EventRing::read_all(&storage).0.len(), 0);
    }
}
