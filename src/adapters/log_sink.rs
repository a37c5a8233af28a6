//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by mirroring every event-log entry to the
//! `log` output.  A push-notification or websocket adapter would implement
//! the same trait.

use log::{info, warn};

use crate::app::events::{LogEntry, LogRecord};
use crate::app::ports::EventSink;

/// Adapter that logs every [`LogEntry`] to the console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, entry: &LogEntry) {
        match &entry.record {
            LogRecord::Dispense(e) if e.outcome.is_success() => info!("DISPENSE | {}", entry),
            LogRecord::Dispense(_) => warn!("DISPENSE | {}", entry),
            LogRecord::Alert(_) => warn!("ALERT | {}", entry),
        }
    }
}
