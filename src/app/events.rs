//! Outbound records: dispense outcomes and alerts.
//!
//! The [`FeederService`](super::service::FeederService) appends these to the
//! [`EventLog`](crate::event_log::EventLog) and fans them out through the
//! [`EventSink`](super::ports::EventSink) port.  All records are immutable
//! once created.

use core::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::ActuatorFault;
use crate::schedule::RuleId;

/// Maximum alert text length (bytes).
pub const ALERT_MESSAGE_LEN: usize = 64;

/// What asked for the rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "rule")]
pub enum DispenseSource {
    Manual,
    Scheduled(RuleId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispenseOutcome {
    Success,
    ActuatorFault,
    Jammed,
}

impl DispenseOutcome {
    /// Outcome for a finished rotation attempt.
    pub fn of(result: &Result<u32, ActuatorFault>) -> Self {
        match result {
            Ok(_) => Self::Success,
            Err(ActuatorFault::Jammed) => Self::Jammed,
            Err(_) => Self::ActuatorFault,
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Result of one manual or scheduled rotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispenseEvent {
    pub timestamp: NaiveDateTime,
    pub source: DispenseSource,
    pub grams_dispensed: u32,
    pub outcome: DispenseOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    LowWater,
    LowFood,
    ActuatorFault,
    /// A queued manual request was replaced before it ran.
    ManualDropped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub timestamp: NaiveDateTime,
    pub kind: AlertKind,
    pub message: heapless::String<ALERT_MESSAGE_LEN>,
}

impl Alert {
    /// Build an alert, truncating `message` on a char boundary if needed.
    pub fn new(timestamp: NaiveDateTime, kind: AlertKind, message: &str) -> Self {
        let mut text = heapless::String::new();
        for ch in message.chars() {
            if text.push(ch).is_err() {
                break;
            }
        }
        Self {
            timestamp,
            kind,
            message: text,
        }
    }
}

/// One entry payload in the event feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum LogRecord {
    Dispense(DispenseEvent),
    Alert(Alert),
}

impl LogRecord {
    pub fn timestamp(&self) -> NaiveDateTime {
        match self {
            Self::Dispense(e) => e.timestamp,
            Self::Alert(a) => a.timestamp,
        }
    }

    pub fn as_dispense(&self) -> Option<&DispenseEvent> {
        match self {
            Self::Dispense(e) => Some(e),
            Self::Alert(_) => None,
        }
    }

    pub fn as_alert(&self) -> Option<&Alert> {
        match self {
            Self::Alert(a) => Some(a),
            Self::Dispense(_) => None,
        }
    }
}

/// Cursor into the event feed.  Strictly increasing, never reused.
pub type Seq = u64;

/// A record plus its position in the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub seq: Seq,
    #[serde(flatten)]
    pub record: LogRecord,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.record {
            LogRecord::Dispense(e) => {
                let how = match e.source {
                    DispenseSource::Manual => "manually".to_string(),
                    DispenseSource::Scheduled(id) => format!("by rule {id}"),
                };
                write!(
                    f,
                    "#{} cylinder rotated {} at {}: {} g dispensed ({:?})",
                    self.seq,
                    how,
                    e.timestamp.format("%H:%M:%S"),
                    e.grams_dispensed,
                    e.outcome
                )
            }
            LogRecord::Alert(a) => write!(
                f,
                "#{} {:?} alert at {}: {}",
                self.seq,
                a.kind,
                a.timestamp.format("%H:%M:%S"),
                a.message
            ),
        }
    }
}
