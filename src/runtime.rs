//! Scheduler thread - drives every time-based behavior of the feeder.
//!
//! Runs in a dedicated thread using `edge-executor` for cooperative
//! scheduling and `async-io-mini` timers for the wake-ups (no
//! busy-polling).  Two concurrent loops:
//!
//! 1. **Tick** - one scheduler pass every `tick_interval_secs`
//! 2. **Sensors** - refresh + threshold check every `sensor_poll_interval_secs`
//!
//! ```text
//!  ┌──────────────────────────────────────────────────┐
//!  │  feeder-runtime thread                           │
//!  │  ┌────────────────────────────────────────────┐  │
//!  │  │  edge_executor::LocalExecutor              │  │
//!  │  │   ┌──────────┐   ┌───────────┐             │  │
//!  │  │   │ tick ⏱   │   │ sensors ⏱ │             │  │
//!  │  │   └──────────┘   └───────────┘             │  │
//!  │  └───────────────── run until STOP ───────────┘  │
//!  └──────────────────────────────────────────────────┘
//! ```
//!
//! Both loops call blocking service methods, so a long rotation delays the
//! next sensor poll; every such call is deadline-bounded.

use std::sync::Arc;
use std::thread::JoinHandle;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use log::{debug, info};

use crate::app::ports::{ActuatorPort, SensorPort};
use crate::app::service::FeederService;

type StopSignal = Signal<CriticalSectionRawMutex, ()>;

/// Handle to the running scheduler thread.
pub struct FeederRuntime {
    stop: Arc<StopSignal>,
    thread: Option<JoinHandle<()>>,
}

impl FeederRuntime {
    /// Spawn the scheduler thread for `service`.
    pub fn start<A, S>(service: Arc<FeederService<A, S>>) -> std::io::Result<Self>
    where
        A: ActuatorPort + Send + 'static,
        S: SensorPort + Send + 'static,
    {
        let stop = Arc::new(StopSignal::new());
        let stop_rx = stop.clone();
        let thread = std::thread::Builder::new()
            .name("feeder-runtime".into())
            .spawn(move || run(service, &stop_rx))?;
        Ok(Self {
            stop,
            thread: Some(thread),
        })
    }

    /// Stop both loops and wait for the thread to exit.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        self.stop.signal(());
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
            info!("Runtime stopped");
        }
    }
}

impl Drop for FeederRuntime {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

fn run<A, S>(service: Arc<FeederService<A, S>>, stop: &StopSignal)
where
    A: ActuatorPort + Send + 'static,
    S: SensorPort + Send + 'static,
{
    let executor: edge_executor::LocalExecutor<'_, 8> = edge_executor::LocalExecutor::new();

    executor.spawn(tick_loop(service.clone())).detach();
    executor.spawn(sensor_loop(service)).detach();

    info!("Runtime started");
    futures_lite::future::block_on(executor.run(stop.wait()));
}

async fn tick_loop<A, S>(service: Arc<FeederService<A, S>>)
where
    A: ActuatorPort + Send + 'static,
    S: SensorPort + Send + 'static,
{
    let interval = service.config().tick_interval();
    loop {
        let report = service.tick();
        if !report.is_empty() {
            debug!(
                "Runtime: tick fired {} rule(s), skipped {}",
                report.fired.len(),
                report.skipped.len()
            );
        }
        async_io_mini::Timer::after(interval).await;
    }
}

async fn sensor_loop<A, S>(service: Arc<FeederService<A, S>>)
where
    A: ActuatorPort + Send + 'static,
    S: SensorPort + Send + 'static,
{
    let interval = service.config().sensor_poll_interval();
    loop {
        service.poll_sensors();
        async_io_mini::Timer::after(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;

    use chrono::NaiveDate;

    use crate::adapters::hardware::SimHardware;
    use crate::adapters::time::ManualClock;
    use crate::config::FeederConfig;

    #[test]
    fn runtime_fires_due_rule_and_stops() {
        let clock = ManualClock::new(
            NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(8, 0, 0)
                .unwrap(),
        );
        let hw = SimHardware::new(500, 60);
        let config = FeederConfig {
            tick_interval_secs: 1,
            ..Default::default()
        };
        let service = Arc::new(
            FeederService::new(config, Arc::new(clock), hw.actuator(), hw.sensors()).unwrap(),
        );
        service.add_rule("08:00", 50).unwrap();

        let runtime = FeederRuntime::start(service.clone()).unwrap();
        let deadline = std::time::Instant::now() + Duration::from_secs(3);
        while (service.events(None).is_empty() || service.read_water().is_err())
            && std::time::Instant::now() < deadline
        {
            std::thread::sleep(Duration::from_millis(10));
        }
        runtime.shutdown();

        let events = service.events(None);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].record.as_dispense().map(|e| e.grams_dispensed), Some(50));
        assert_eq!(service.read_water(), Ok(60));
    }
}
