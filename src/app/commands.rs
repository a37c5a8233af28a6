//! Inbound commands and their replies.
//!
//! These mirror the external operations a transport (HTTP, serial, BLE)
//! exposes.  The transport deserializes a [`FeederCommand`], hands it to
//! [`FeederService::handle_command`](super::service::FeederService::handle_command)
//! and serializes the [`FeederReply`] back.
//!
//! ```json
//! {"op":"add_rule","time":"08:00","weight_threshold_grams":50}
//! {"status":"rule_added","id":1}
//! ```

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::schedule::{DispenseRule, RuleId};
use crate::sensors::SensorStatus;

use super::events::{DispenseEvent, LogEntry, Seq};

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum FeederCommand {
    /// Add a rule.  Signed so a negative threshold is rejected, not mis-parsed.
    AddRule {
        time: String,
        weight_threshold_grams: i64,
    },
    RemoveRule {
        id: RuleId,
    },
    ListRules,
    /// Dispense one manual portion and wait for the result.
    DispenseManual,
    ReadSensors,
    /// Entries at or after `since` (everything retained when absent).
    ListEvents {
        #[serde(default)]
        since: Option<Seq>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FeederReply {
    RuleAdded { id: RuleId },
    RuleRemoved { id: RuleId },
    Rules { rules: Vec<DispenseRule> },
    Dispensed { event: DispenseEvent },
    Sensors(SensorStatus),
    Events { events: Vec<LogEntry> },
    Rejected { code: &'static str, message: String },
}

impl From<Error> for FeederReply {
    fn from(e: Error) -> Self {
        Self::Rejected {
            code: e.code(),
            message: e.to_string(),
        }
    }
}
