//! Unified error types for the PetFeeder core.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! command dispatch and the scheduler loop uniform.  Nothing here is fatal:
//! the service turns every failure into a recorded event or alert, and these
//! types only describe *what* went wrong to the caller that asked.
//!
//! All variants are `Copy` so they can be passed through the scheduler and
//! the dispense coordinator without allocation.

use core::fmt;

use crate::schedule::RuleId;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible core operation funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Schedule mutation rejected.
    Schedule(ScheduleError),
    /// The dispense actuator failed; already translated at the adapter boundary.
    Actuator(ActuatorFault),
    /// A sensor value is unknown (stale, timed out, or unreadable).
    Sensor(SensorError),
    /// A manual dispense request never reached the actuator.
    Dispense(DispenseError),
    /// The scheduler woke after a rule's window had passed and skipped it.
    StaleTick(RuleId),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
    /// Peripheral worker could not be started.
    Init(&'static str),
}

impl Error {
    /// Stable machine-readable code for the transport layer.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Schedule(ScheduleError::InvalidRule(_)) => "invalid_rule",
            Self::Schedule(ScheduleError::NotFound(_)) => "not_found",
            Self::Actuator(_) => "actuator_fault",
            Self::Sensor(SensorError::StaleReading) => "stale_reading",
            Self::Sensor(_) => "sensor_error",
            Self::Dispense(DispenseError::Superseded) => "superseded",
            Self::Dispense(DispenseError::Cancelled) => "cancelled",
            Self::StaleTick(_) => "stale_tick",
            Self::Config(_) => "invalid_config",
            Self::Init(_) => "init_failed",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Schedule(e) => write!(f, "schedule: {e}"),
            Self::Actuator(e) => write!(f, "actuator: {e}"),
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Dispense(e) => write!(f, "dispense: {e}"),
            Self::StaleTick(id) => write!(f, "missed window for rule {id}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Schedule errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleError {
    /// Malformed time of day or out-of-range weight threshold.
    InvalidRule(&'static str),
    /// No rule with this id exists (never did, or already removed).
    NotFound(RuleId),
}

impl fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRule(reason) => write!(f, "invalid rule: {reason}"),
            Self::NotFound(id) => write!(f, "rule {id} not found"),
        }
    }
}

impl From<ScheduleError> for Error {
    fn from(e: ScheduleError) -> Self {
        Self::Schedule(e)
    }
}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

/// Raw errors reported by the physical rotation layer.
///
/// These never leave the [`DispenseActuator`](crate::dispense::DispenseActuator)
/// adapter; the scheduler only ever sees [`ActuatorFault`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// Jam sensor tripped mid-rotation.
    Jammed,
    /// Step / enable GPIO write failed.
    GpioWriteFailed,
    /// Motor driver stopped responding.
    Disconnected,
    /// Motor current exceeded the driver limit.
    OverCurrent,
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Jammed => write!(f, "jammed"),
            Self::GpioWriteFailed => write!(f, "GPIO write failed"),
            Self::Disconnected => write!(f, "driver disconnected"),
            Self::OverCurrent => write!(f, "over current"),
        }
    }
}

/// A failed rotation, as seen by everything above the actuator adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorFault {
    /// Mechanism jammed; food may be partially dispensed.
    Jammed,
    /// The physical layer reported an error.
    Mechanism(ActuatorError),
    /// No result within the configured actuator timeout.
    Timeout,
    /// The actuator worker is not accepting commands.
    Unreachable,
}

impl fmt::Display for ActuatorFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Jammed => write!(f, "dispenser jammed"),
            Self::Mechanism(e) => write!(f, "mechanism fault ({e})"),
            Self::Timeout => write!(f, "rotation timed out"),
            Self::Unreachable => write!(f, "actuator unreachable"),
        }
    }
}

impl From<ActuatorError> for ActuatorFault {
    fn from(e: ActuatorError) -> Self {
        match e {
            ActuatorError::Jammed => Self::Jammed,
            other => Self::Mechanism(other),
        }
    }
}

impl From<ActuatorFault> for Error {
    fn from(e: ActuatorFault) -> Self {
        Self::Actuator(e)
    }
}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// No reading newer than `stale_after` is cached.
    StaleReading,
    /// The sensor worker did not answer within the sensor timeout.
    Timeout,
    /// ADC / load-cell read returned an error.
    ReadFailed,
    /// Reading is outside the physically plausible range.
    OutOfRange,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StaleReading => write!(f, "stale reading"),
            Self::Timeout => write!(f, "sensor timed out"),
            Self::ReadFailed => write!(f, "read failed"),
            Self::OutOfRange => write!(f, "reading out of range"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Manual dispense errors
// ---------------------------------------------------------------------------

/// Why a queued manual request finished without rotating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispenseError {
    /// A newer manual request replaced this one in the queue.
    Superseded,
    /// The caller withdrew the request before the rotation started.
    Cancelled,
}

impl fmt::Display for DispenseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Superseded => write!(f, "replaced by a newer manual request"),
            Self::Cancelled => write!(f, "cancelled before rotation"),
        }
    }
}

impl From<DispenseError> for Error {
    fn from(e: DispenseError) -> Self {
        Self::Dispense(e)
    }
}
