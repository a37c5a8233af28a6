//! Adapters - concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements    | Connects to                     |
//! |------------|---------------|---------------------------------|
//! | `hardware` | SensorPort    | Simulated level sensor / scale  |
//! |            | ActuatorPort  | Simulated rotating cylinder     |
//! | `log_sink` | EventSink     | `log` output                    |
//! | `storage`  | ConfigPort    | In-memory map / data directory  |
//! |            | StoragePort   |                                 |
//! | `time`     | ClockPort     | `chrono::Local` + `Instant`     |

pub mod hardware;
pub mod log_sink;
pub mod storage;
pub mod time;
