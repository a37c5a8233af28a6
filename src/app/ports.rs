//! Port traits - the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ FeederService (domain)
//! ```
//!
//! Driven adapters (clock, sensors, actuator, event sinks, storage) implement
//! these traits.  The [`FeederService`](super::service::FeederService)
//! consumes them via generics or trait objects, so the domain core never
//! touches hardware directly.
//!
//! Physical ports (`ActuatorPort`, `SensorPort`) are handed to a
//! [`DeviceWorker`](crate::drivers::worker::DeviceWorker) which owns them on a
//! dedicated thread; they must therefore be `Send + 'static` but never need
//! to be `Sync`.

use core::fmt;
use core::time::Duration;

use chrono::NaiveDateTime;

use crate::config::FeederConfig;
use crate::error::{ActuatorError, SensorError};
use crate::schedule::DispenseRule;

use super::events::{DispenseOutcome, LogEntry};

// ───────────────────────────────────────────────────────────────
// Clock port (driven adapter: time source → domain)
// ───────────────────────────────────────────────────────────────

/// Time source for rule evaluation, event stamps and staleness.
pub trait ClockPort: Send + Sync {
    /// Current local wall-clock time (device time, no zone conversion).
    fn local_now(&self) -> NaiveDateTime;

    /// Monotonic time since the clock was created.
    fn uptime(&self) -> Duration;
}

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Raw reads from the water-level and food-weight sensors.
pub trait SensorPort {
    /// Water bowl level, percent.
    fn read_water_percent(&mut self) -> Result<u8, SensorError>;

    /// Food left in the hopper, grams.
    fn read_food_grams(&mut self) -> Result<u32, SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// The physical rotation mechanism.
pub trait ActuatorPort {
    /// Rotate until roughly `target_grams` have left the hopper.
    ///
    /// Returns the grams actually dispensed, which may differ from the
    /// target because of mechanism granularity.
    fn rotate(&mut self, target_grams: u32) -> Result<u32, ActuatorError>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / notification)
// ───────────────────────────────────────────────────────────────

/// Receives every entry appended to the event log.  Adapters decide where
/// it goes (serial log, push notification, UI websocket, …).
pub trait EventSink: Send {
    fn emit(&mut self, entry: &LogEntry);
}

// ───────────────────────────────────────────────────────────────
// Scheduler delegate (decouples scheduler from the actuator)
// ───────────────────────────────────────────────────────────────

/// Callback the [`FeedingScheduler`](crate::scheduler::FeedingScheduler)
/// invokes when a rule is due.
///
/// The scheduler decides *when*; the delegate performs the rotation, records
/// the event and any alert, and reports the outcome back so the scheduler can
/// log it.  Faults are final for the day either way.
pub trait DispenseDelegate {
    fn dispense_scheduled(&mut self, rule: &DispenseRule) -> DispenseOutcome;
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists [`FeederConfig`].
///
/// Implementations MUST validate before persisting; invalid ranges are
/// rejected with [`ConfigError::ValidationFailed`], never clamped.
pub trait ConfigPort {
    /// Returns [`ConfigError::NotFound`] on first boot.
    fn load(&self) -> Result<FeederConfig, ConfigError>;

    fn save(&mut self, config: &FeederConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ disk / flash)
// ───────────────────────────────────────────────────────────────

/// Namespaced key-value blob storage for the schedule, the event ring and
/// the configuration.
///
/// Writes MUST be atomic per key: after a crash a key holds either the old
/// or the new value, never a partial one.
pub trait StoragePort: Send {
    fn read(&self, namespace: &str, key: &str) -> Result<Vec<u8>, StorageError>;

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    fn exists(&self, namespace: &str, key: &str) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Disk / partition is full.
    Full,
    /// Generic I/O error.
    IoError,
    /// Namespace or key contains characters the backend cannot store.
    InvalidKey,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
            Self::InvalidKey => write!(f, "invalid key"),
        }
    }
}

impl std::error::Error for ConfigError {}
impl std::error::Error for StorageError {}

impl From<StorageError> for ConfigError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound => Self::NotFound,
            _ => Self::IoError,
        }
    }
}

impl From<ConfigError> for crate::error::Error {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::ValidationFailed(msg) => Self::Config(msg),
            ConfigError::NotFound => Self::Config("config not found"),
            ConfigError::Corrupted => Self::Config("config corrupted"),
            ConfigError::IoError => Self::Config("config I/O error"),
        }
    }
}
