//! Device-level drivers.
//!
//! - [`worker`] - runs a physical port on its own thread behind a deadline.
//! - [`auger`] - `embedded-hal` stepper driver implementing `ActuatorPort`.

pub mod auger;
pub mod worker;
