//! Clock adapters.
//!
//! - [`SystemClock`] - local wall clock from `chrono::Local`, uptime from
//!   `std::time::Instant`.
//! - [`ManualClock`] - settable clock for simulation and tests; wall time
//!   and uptime advance together.

use core::time::Duration;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use chrono::{Local, NaiveDateTime};

use crate::app::ports::ClockPort;

/// Device clock.
pub struct SystemClock {
    start: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl ClockPort for SystemClock {
    fn local_now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }

    fn uptime(&self) -> Duration {
        self.start.elapsed()
    }
}

#[derive(Debug, Clone, Copy)]
struct ManualState {
    now: NaiveDateTime,
    uptime: Duration,
}

/// Clock that only moves when told to.  Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    state: Arc<Mutex<ManualState>>,
}

impl ManualClock {
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            state: Arc::new(Mutex::new(ManualState {
                now: start,
                uptime: Duration::ZERO,
            })),
        }
    }

    /// Jump the wall clock.  Uptime still moves forward by the difference
    /// (or not at all when jumping backwards).
    pub fn set(&self, now: NaiveDateTime) {
        let mut s = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let Ok(delta) = (now - s.now).to_std() {
            s.uptime += delta;
        }
        s.now = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut s = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let Ok(delta) = chrono::Duration::from_std(by) {
            s.now += delta;
        }
        s.uptime += by;
    }
}

impl ClockPort for ManualClock {
    fn local_now(&self) -> NaiveDateTime {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).now
    }

    fn uptime(&self) -> Duration {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).uptime
    }
}
