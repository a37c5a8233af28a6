//! Fuzz target: persisted event ring
//!
//! Writes arbitrary bytes into the ring's head and slot keys, then restores
//! the feed.  Verifies:
//! - `read_all` never panics on corrupt storage
//! - it never returns more than `EVENT_LOG_CAPACITY` entries
//! - restored entries are sorted and below the head
//! - `clear` empties the ring
//!
//! cargo fuzz run fuzz_event_ring

#![no_main]

use libfuzzer_sys::fuzz_target;
use petfeeder::adapters::storage::MemoryStorage;
use petfeeder::app::ports::StoragePort;
use petfeeder::event_log::{EVENT_LOG_CAPACITY, EventLog};
use petfeeder::persistence::EventRing;

fuzz_target!(|data: &[u8]| {
    if data.len() < 9 {
        return;
    }

    let mut store = MemoryStorage::new();
    let _ = store.write("events", "head", &data[..8]);

    // Remaining bytes: [slot, len, payload…] records.
    let mut rest = &data[8..];
    while rest.len() >= 2 {
        let slot = rest[0] as usize % EVENT_LOG_CAPACITY;
        let len = (rest[1] as usize).min(rest.len() - 2);
        let _ = store.write("events", &format!("e{slot}"), &rest[2..2 + len]);
        rest = &rest[2 + len..];
    }

    let (entries, next) = EventRing::read_all(&store);
    assert!(entries.len() <= EVENT_LOG_CAPACITY);
    assert!(next >= 1);
    assert!(entries.windows(2).all(|w| w[0].seq <= w[1].seq));
    assert!(entries.iter().all(|e| e.seq < next));

    let log = EventLog::new();
    log.restore(entries, next);
    assert!(log.len() <= EVENT_LOG_CAPACITY);

    EventRing::clear(&mut store);
    let (after, _) = EventRing::read_all(&store);
    assert!(after.is_empty(), "read_all after clear returned {} entries", after.len());
});
