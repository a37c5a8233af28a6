//! Application core - pure domain logic, zero I/O.
//!
//! Business rules for the feeder: rule scheduling, dispense coordination,
//! sensor alerts and the event feed.  All interaction with hardware, time
//! and storage happens through **port traits** defined in [`ports`], keeping
//! this layer fully testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
