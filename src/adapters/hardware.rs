//! Simulated hardware - bridges an in-memory feeder to the port traits.
//!
//! [`SimHardware`] models the hopper and the water bowl.  It hands out a
//! [`SimActuator`] and [`SimSensors`] that share that state, so dispensing
//! drains the hopper the food sensor reports.  Controls on `SimHardware`
//! inject levels and faults while the feeder runs.
//!
//! The real device swaps these for
//! [`AugerDriver`](crate::drivers::auger::AugerDriver) and load-cell /
//! level-sensor drivers behind the same traits.

use core::time::Duration;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::debug;

use crate::app::ports::{ActuatorPort, SensorPort};
use crate::error::{ActuatorError, SensorError};

/// Mechanism granularity of the simulated cylinder.
pub const SIM_INCREMENT_GRAMS: u32 = 5;

#[derive(Debug)]
struct SimState {
    hopper_grams: u32,
    water_percent: u8,
    actuator_fault: Option<ActuatorError>,
    sensor_fault: Option<SensorError>,
    rotation_time: Duration,
}

/// Shared simulated feeder.  Clones control the same feeder.
#[derive(Debug, Clone)]
pub struct SimHardware {
    state: Arc<Mutex<SimState>>,
}

impl SimHardware {
    pub fn new(hopper_grams: u32, water_percent: u8) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState {
                hopper_grams,
                water_percent: water_percent.min(100),
                actuator_fault: None,
                sensor_fault: None,
                rotation_time: Duration::ZERO,
            })),
        }
    }

    pub fn actuator(&self) -> SimActuator {
        SimActuator { hw: self.clone() }
    }

    pub fn sensors(&self) -> SimSensors {
        SimSensors { hw: self.clone() }
    }

    pub fn hopper_grams(&self) -> u32 {
        self.lock().hopper_grams
    }

    pub fn set_hopper_grams(&self, grams: u32) {
        self.lock().hopper_grams = grams;
    }

    pub fn set_water_percent(&self, percent: u8) {
        self.lock().water_percent = percent.min(100);
    }

    /// Every rotation fails with `fault` until cleared with `None`.
    pub fn inject_actuator_fault(&self, fault: Option<ActuatorError>) {
        self.lock().actuator_fault = fault;
    }

    /// Every sensor read fails with `fault` until cleared with `None`.
    pub fn inject_sensor_fault(&self, fault: Option<SensorError>) {
        self.lock().sensor_fault = fault;
    }

    /// How long one rotation takes.
    pub fn set_rotation_time(&self, time: Duration) {
        self.lock().rotation_time = time;
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Simulated rotating cylinder.
pub struct SimActuator {
    hw: SimHardware,
}

impl ActuatorPort for SimActuator {
    fn rotate(&mut self, target_grams: u32) -> Result<u32, ActuatorError> {
        let (grams, rotation_time) = {
            let mut s = self.hw.lock();
            if let Some(fault) = s.actuator_fault {
                return Err(fault);
            }
            let available = s.hopper_grams - s.hopper_grams % SIM_INCREMENT_GRAMS;
            let wanted = target_grams - target_grams % SIM_INCREMENT_GRAMS;
            let grams = wanted.min(available);
            s.hopper_grams -= grams;
            (grams, s.rotation_time)
        };
        if !rotation_time.is_zero() {
            std::thread::sleep(rotation_time);
        }
        debug!("SimActuator: {} g requested, {} g dispensed", target_grams, grams);
        Ok(grams)
    }
}

/// Simulated water-level sensor and hopper load cell.
pub struct SimSensors {
    hw: SimHardware,
}

impl SensorPort for SimSensors {
    fn read_water_percent(&mut self) -> Result<u8, SensorError> {
        let s = self.hw.lock();
        s.sensor_fault.map_or(Ok(s.water_percent), Err)
    }

    fn read_food_grams(&mut self) -> Result<u32, SensorError> {
        let s = self.hw.lock();
        s.sensor_fault.map_or(Ok(s.hopper_grams), Err)
    }
}
