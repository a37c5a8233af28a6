//! PetFeeder core library.
//!
//! Exposes the scheduling, dispensing, sensing and event-feed logic for the
//! host binary, integration tests and any transport that wraps the
//! [`FeederService`](app::service::FeederService).

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod dispense;
pub mod error;
pub mod event_log;
pub mod persistence;
pub mod runtime;
pub mod schedule;
pub mod scheduler;

pub mod adapters;
pub mod drivers;
pub mod sensors;
