//! Mock hardware adapters for integration tests.
//!
//! Records every actuator call so tests can assert on the full rotation
//! history without touching a real motor, and exposes sensor levels that
//! tests change between polls.

use std::collections::VecDeque;
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, NaiveDateTime};

use petfeeder::adapters::time::ManualClock;
use petfeeder::app::events::LogEntry;
use petfeeder::app::ports::{ActuatorPort, EventSink, SensorPort};
use petfeeder::error::{ActuatorError, SensorError};

pub fn at(day: u32, h: u32, m: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, day)
        .unwrap()
        .and_hms_opt(h, m, s)
        .unwrap()
}

pub fn clock_at(h: u32, m: u32) -> ManualClock {
    ManualClock::new(at(1, h, m, 0))
}

// ── MockActuator ──────────────────────────────────────────────

/// Shared view of a [`MockActuator`] that stays with the test after the
/// actuator itself moves onto its worker thread.
#[derive(Clone, Default)]
pub struct ActuatorLog {
    calls: Arc<Mutex<Vec<u32>>>,
    script: Arc<Mutex<VecDeque<Result<u32, ActuatorError>>>>,
}

#[allow(dead_code)]
impl ActuatorLog {
    /// Targets of every rotation, in call order.
    pub fn calls(&self) -> Vec<u32> {
        self.calls.lock().unwrap().clone()
    }

    /// Queue the result of the next unscripted rotation.
    pub fn push_result(&self, result: Result<u32, ActuatorError>) {
        self.script.lock().unwrap().push_back(result);
    }
}

/// Rotates instantly, returning scripted results (the target when the
/// script is empty).  A gated actuator reports each start and then waits
/// for the test to release it.
pub struct MockActuator {
    log: ActuatorLog,
    gate: Option<(Sender<u32>, Receiver<()>)>,
}

#[allow(dead_code)]
impl MockActuator {
    pub fn new() -> (Self, ActuatorLog) {
        let log = ActuatorLog::default();
        (
            Self {
                log: log.clone(),
                gate: None,
            },
            log,
        )
    }

    pub fn gated(started: Sender<u32>, release: Receiver<()>) -> (Self, ActuatorLog) {
        let (mut actuator, log) = Self::new();
        actuator.gate = Some((started, release));
        (actuator, log)
    }
}

impl ActuatorPort for MockActuator {
    fn rotate(&mut self, target_grams: u32) -> Result<u32, ActuatorError> {
        self.log.calls.lock().unwrap().push(target_grams);
        if let Some((started, release)) = &self.gate {
            let _ = started.send(target_grams);
            let _ = release.recv();
        }
        self.log
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(target_grams))
    }
}

// ── MockSensors ───────────────────────────────────────────────

#[derive(Clone)]
pub struct SensorLevels {
    state: Arc<Mutex<(Result<u8, SensorError>, Result<u32, SensorError>)>>,
}

#[allow(dead_code)]
impl SensorLevels {
    pub fn set_water(&self, percent: u8) {
        self.state.lock().unwrap().0 = Ok(percent);
    }

    pub fn set_food(&self, grams: u32) {
        self.state.lock().unwrap().1 = Ok(grams);
    }

    pub fn fail_water(&self, e: SensorError) {
        self.state.lock().unwrap().0 = Err(e);
    }
}

pub struct MockSensors {
    levels: SensorLevels,
}

impl MockSensors {
    pub fn new(water: u8, food: u32) -> (Self, SensorLevels) {
        let levels = SensorLevels {
            state: Arc::new(Mutex::new((Ok(water), Ok(food)))),
        };
        (
            Self {
                levels: levels.clone(),
            },
            levels,
        )
    }
}

impl SensorPort for MockSensors {
    fn read_water_percent(&mut self) -> Result<u8, SensorError> {
        self.levels.state.lock().unwrap().0
    }

    fn read_food_grams(&mut self) -> Result<u32, SensorError> {
        self.levels.state.lock().unwrap().1
    }
}

// ── RecordingSink ─────────────────────────────────────────────

/// Event sink that keeps every emitted entry.
#[derive(Clone, Default)]
pub struct RecordingSink {
    pub entries: Arc<Mutex<Vec<LogEntry>>>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.entries.lock().unwrap().clone()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, entry: &LogEntry) {
        self.entries.lock().unwrap().push(entry.clone());
    }
}
