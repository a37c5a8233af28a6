//! Sensor gateway - cached water/food readings with staleness and alerts.
//!
//! The gateway owns the physical [`SensorPort`] through a
//! [`DeviceWorker`] and keeps the latest good reading per kind.  Reads
//! never block on hardware: they answer from the cache and report
//! [`SensorError::StaleReading`] once a reading is older than
//! `stale_after` (or none was ever taken).  A failed or timed-out refresh
//! leaves the cache untouched, so a dead sensor ages into staleness instead
//! of hanging a caller.

pub mod threshold;

use core::time::Duration;
use std::sync::{Mutex, PoisonError, RwLock};

use chrono::NaiveDateTime;
use log::{debug, warn};
use serde::{Serialize, Serializer};

use crate::app::events::{Alert, AlertKind};
use crate::app::ports::{ClockPort, SensorPort};
use crate::config::FeederConfig;
use crate::drivers::worker::{DeviceWorker, WorkerError};
use crate::error::SensorError;
use threshold::LowLevelMonitor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    Water,
    Food,
}

/// Latest value of one sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorReading {
    pub kind: SensorKind,
    /// Percent for water, grams for food.
    pub value: u32,
    /// Local time of the read (for alerts and display).
    pub timestamp: NaiveDateTime,
    /// Clock uptime of the read (for staleness).
    pub taken_at: Duration,
    pub stale_after: Duration,
}

impl SensorReading {
    pub fn is_fresh(&self, uptime: Duration) -> bool {
        uptime.saturating_sub(self.taken_at) <= self.stale_after
    }
}

/// One gauge as reported to clients: a number or `"stale"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gauge {
    Level(u32),
    Stale,
}

impl Serialize for Gauge {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Level(v) => serializer.serialize_u32(*v),
            Self::Stale => serializer.serialize_str("stale"),
        }
    }
}

impl<T: Into<u32>> From<Result<T, SensorError>> for Gauge {
    fn from(r: Result<T, SensorError>) -> Self {
        r.map_or(Self::Stale, |v| Self::Level(v.into()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SensorStatus {
    pub water: Gauge,
    pub food: Gauge,
}

#[derive(Default)]
struct Cache {
    water: Option<SensorReading>,
    food: Option<SensorReading>,
}

struct Monitors {
    water: LowLevelMonitor,
    food: LowLevelMonitor,
}

pub struct SensorGateway<S: SensorPort + Send + 'static> {
    worker: DeviceWorker<S>,
    timeout: Duration,
    stale_after: Duration,
    cache: RwLock<Cache>,
    monitors: Mutex<Monitors>,
}

impl<S: SensorPort + Send + 'static> SensorGateway<S> {
    pub fn new(port: S, config: &FeederConfig) -> std::io::Result<Self> {
        Ok(Self {
            worker: DeviceWorker::spawn("sensors", port)?,
            timeout: config.sensor_timeout(),
            stale_after: config.sensor_stale_after(),
            cache: RwLock::new(Cache::default()),
            monitors: Mutex::new(Monitors {
                water: LowLevelMonitor::new(
                    AlertKind::LowWater,
                    u32::from(config.low_water_percent),
                ),
                food: LowLevelMonitor::new(AlertKind::LowFood, config.low_food_grams),
            }),
        })
    }

    /// Pull both sensors once and update the cache with whatever succeeded.
    /// Returns the per-kind read results.
    pub fn refresh(
        &self,
        clock: &dyn ClockPort,
    ) -> (Result<u8, SensorError>, Result<u32, SensorError>) {
        let reads = self.worker.call(self.timeout, |port: &mut S| {
            (port.read_water_percent(), port.read_food_grams())
        });
        let (water, food) = match reads {
            Ok((w, f)) => (w.and_then(check_percent), f),
            Err(WorkerError::Timeout) => (Err(SensorError::Timeout), Err(SensorError::Timeout)),
            Err(_) => (Err(SensorError::ReadFailed), Err(SensorError::ReadFailed)),
        };

        let timestamp = clock.local_now();
        let taken_at = clock.uptime();
        let reading = |kind, value| SensorReading {
            kind,
            value,
            timestamp,
            taken_at,
            stale_after: self.stale_after,
        };

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        match water {
            Ok(v) => cache.water = Some(reading(SensorKind::Water, u32::from(v))),
            Err(e) => warn!("Sensors: water read failed: {}", e),
        }
        match food {
            Ok(v) => cache.food = Some(reading(SensorKind::Food, v)),
            Err(e) => warn!("Sensors: food read failed: {}", e),
        }
        debug!("Sensors: water={:?} food={:?}", water, food);
        (water, food)
    }

    /// Cached water level in percent, or `StaleReading`.
    pub fn read_water(&self, uptime: Duration) -> Result<u8, SensorError> {
        let value = self.fresh(uptime, |c| c.water)?;
        u8::try_from(value).map_err(|_| SensorError::OutOfRange)
    }

    /// Cached food weight in grams, or `StaleReading`.
    pub fn read_food(&self, uptime: Duration) -> Result<u32, SensorError> {
        self.fresh(uptime, |c| c.food)
    }

    pub fn status(&self, uptime: Duration) -> SensorStatus {
        SensorStatus {
            water: self.read_water(uptime).into(),
            food: self.read_food(uptime).into(),
        }
    }

    /// Evaluate thresholds against the fresh cached values.  Stale values
    /// neither raise nor clear an alert.
    pub fn check_thresholds(&self, clock: &dyn ClockPort) -> Vec<Alert> {
        let uptime = clock.uptime();
        let now = clock.local_now();
        let mut monitors = self.monitors.lock().unwrap_or_else(PoisonError::into_inner);
        let mut alerts = Vec::new();

        if let Ok(water) = self.read_water(uptime) {
            if monitors.water.evaluate(u32::from(water)) {
                alerts.push(low_alert(
                    now,
                    AlertKind::LowWater,
                    water.into(),
                    &monitors.water,
                    "%",
                ));
            }
        }
        if let Ok(food) = self.read_food(uptime) {
            if monitors.food.evaluate(food) {
                alerts.push(low_alert(now, AlertKind::LowFood, food, &monitors.food, " g"));
            }
        }
        alerts
    }

    /// Latest raw reading of `kind`, fresh or not.
    pub fn last_reading(&self, kind: SensorKind) -> Option<SensorReading> {
        let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
        match kind {
            SensorKind::Water => cache.water,
            SensorKind::Food => cache.food,
        }
    }

    fn fresh(
        &self,
        uptime: Duration,
        pick: impl Fn(&Cache) -> Option<SensorReading>,
    ) -> Result<u32, SensorError> {
        let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
        match pick(&cache) {
            Some(r) if r.is_fresh(uptime) => Ok(r.value),
            _ => Err(SensorError::StaleReading),
        }
    }
}

fn check_percent(v: u8) -> Result<u8, SensorError> {
    if v > 100 { Err(SensorError::OutOfRange) } else { Ok(v) }
}

fn low_alert(
    now: NaiveDateTime,
    kind: AlertKind,
    value: u32,
    monitor: &LowLevelMonitor,
    unit: &str,
) -> Alert {
    let what = if kind == AlertKind::LowWater { "water" } else { "food" };
    let message = format!("{what} at {value}{unit}, below {}{unit}", monitor.threshold());
    Alert::new(now, kind, &message)
}
