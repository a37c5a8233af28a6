//! Auger (rotating cylinder) stepper driver.
//!
//! Each STEP pulse turns the cylinder by a fixed angle and releases a
//! roughly constant mass of kibble, so a target weight becomes a whole
//! number of steps.  Partial steps are never issued: the dispensed amount
//! rounds *down* to the mechanism granularity (50 g at 2.4 g/step → 20
//! steps → 48 g).
//!
//! ## Jam detection
//!
//! A jam-sense input (motor stall / optical gate) is sampled after every
//! step.  When it reads HIGH the rotation stops immediately and the driver
//! reports [`ActuatorError::Jammed`].
//!
//! Generic over `embedded-hal` 1.0 traits so it runs against real GPIO on
//! the device and against mock pins in tests.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use log::{debug, warn};

use crate::app::ports::ActuatorPort;
use crate::error::ActuatorError;

/// Mechanical calibration of the auger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AugerCalibration {
    /// Mass released per STEP pulse (milligrams).
    pub milligrams_per_step: u32,
    /// STEP high / low time (microseconds).
    pub pulse_us: u32,
    /// Hard cap on steps for one rotation.
    pub max_steps: u32,
}

impl Default for AugerCalibration {
    fn default() -> Self {
        Self {
            milligrams_per_step: 2_400,
            pulse_us: 800,
            max_steps: 2_000,
        }
    }
}

pub struct AugerDriver<Step, Jam, D> {
    step: Step,
    jam: Jam,
    delay: D,
    cal: AugerCalibration,
    total_steps: u64,
}

impl<Step, Jam, D> AugerDriver<Step, Jam, D>
where
    Step: OutputPin,
    Jam: InputPin,
    D: DelayNs,
{
    pub fn new(step: Step, jam: Jam, delay: D, cal: AugerCalibration) -> Self {
        Self {
            step,
            jam,
            delay,
            cal,
            total_steps: 0,
        }
    }

    /// Whole steps needed for `target_grams`, capped at `max_steps`.
    pub fn steps_for(&self, target_grams: u32) -> u32 {
        if self.cal.milligrams_per_step == 0 {
            return 0;
        }
        let steps = u64::from(target_grams) * 1_000 / u64::from(self.cal.milligrams_per_step);
        steps.min(u64::from(self.cal.max_steps)) as u32
    }

    /// Lifetime step count (wear tracking).
    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }

    fn pulse(&mut self) -> Result<(), ActuatorError> {
        self.step
            .set_high()
            .map_err(|_| ActuatorError::GpioWriteFailed)?;
        self.delay.delay_us(self.cal.pulse_us);
        self.step
            .set_low()
            .map_err(|_| ActuatorError::GpioWriteFailed)?;
        self.delay.delay_us(self.cal.pulse_us);
        Ok(())
    }
}

impl<Step, Jam, D> ActuatorPort for AugerDriver<Step, Jam, D>
where
    Step: OutputPin,
    Jam: InputPin,
    D: DelayNs,
{
    fn rotate(&mut self, target_grams: u32) -> Result<u32, ActuatorError> {
        let steps = self.steps_for(target_grams);
        debug!("Auger: {} g → {} steps", target_grams, steps);

        for done in 0..steps {
            self.pulse()?;
            self.total_steps += 1;
            // Jam-sense read errors count as a jam: never keep driving blind.
            if self.jam.is_high().unwrap_or(true) {
                warn!("Auger: jam after {}/{} steps", done + 1, steps);
                let _ = self.step.set_low();
                return Err(ActuatorError::Jammed);
            }
        }

        let milligrams = u64::from(steps) * u64::from(self.cal.milligrams_per_step);
        Ok((milligrams / 1_000) as u32)
    }
}
