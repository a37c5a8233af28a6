//! Application service - the hexagonal core.
//!
//! [`FeederService`] owns the schedule store, the feeding scheduler, the
//! dispense coordinator, the sensor gateway and the event log.  It exposes a
//! hardware-agnostic API; every outcome is recorded in the event log and
//! fanned out to the registered [`EventSink`]s.
//!
//! ```text
//!  SensorPort ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!                 │         FeederService        │
//! ActuatorPort ◀──│ Store · Scheduler · EventLog │ ◀─▶ StoragePort
//!                 └──────────────────────────────┘
//! ```
//!
//! All methods take `&self`; the service is shared as `Arc<FeederService>`
//! between the runtime thread and whatever transport drives commands.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{info, warn};

use crate::config::FeederConfig;
use crate::dispense::{
    CompletedManual, DispenseActuator, DispenseCoordinator, ManualRequest, ManualResult,
    ManualTicket,
};
use crate::error::{ActuatorFault, Error};
use crate::event_log::EventLog;
use crate::persistence::{self, EventRing};
use crate::scheduler::{FeedingScheduler, TickReport};
use crate::schedule::{DispenseRule, RuleId, ScheduleStore};
use crate::sensors::{SensorGateway, SensorStatus};

use super::commands::{FeederCommand, FeederReply};
use super::events::{
    Alert, AlertKind, DispenseEvent, DispenseOutcome, DispenseSource, LogEntry, LogRecord, Seq,
};
use super::ports::{
    ActuatorPort, ClockPort, DispenseDelegate, EventSink, SensorPort, StoragePort,
};

// ───────────────────────────────────────────────────────────────
// FeederService
// ───────────────────────────────────────────────────────────────

pub struct FeederService<A, S>
where
    A: ActuatorPort + Send + 'static,
    S: SensorPort + Send + 'static,
{
    config: FeederConfig,
    clock: Arc<dyn ClockPort>,
    store: ScheduleStore,
    scheduler: Mutex<FeedingScheduler>,
    dispenser: DispenseCoordinator<A>,
    sensors: SensorGateway<S>,
    log: EventLog,
    sinks: Mutex<Vec<Box<dyn EventSink>>>,
    storage: Option<Mutex<Box<dyn StoragePort>>>,
}

impl<A, S> FeederService<A, S>
where
    A: ActuatorPort + Send + 'static,
    S: SensorPort + Send + 'static,
{
    /// Validate `config` and move both physical ports onto their workers.
    pub fn new(
        config: FeederConfig,
        clock: Arc<dyn ClockPort>,
        actuator: A,
        sensors: S,
    ) -> Result<Self, Error> {
        config.validate()?;
        let actuator = DispenseActuator::new(actuator, config.actuator_timeout())
            .map_err(|_| Error::Init("actuator worker"))?;
        let sensors =
            SensorGateway::new(sensors, &config).map_err(|_| Error::Init("sensor worker"))?;

        info!(
            "FeederService: tick {}s, window {}s, sensors every {}s",
            config.tick_interval_secs, config.tick_window_secs, config.sensor_poll_interval_secs
        );
        Ok(Self {
            scheduler: Mutex::new(FeedingScheduler::new(config.tick_window_secs)),
            config,
            clock,
            store: ScheduleStore::new(),
            dispenser: DispenseCoordinator::new(actuator),
            sensors,
            log: EventLog::new(),
            sinks: Mutex::new(Vec::new()),
            storage: None,
        })
    }

    /// Restore the schedule and event feed from `storage` and persist every
    /// later change there.  Persistence failures are logged, never returned.
    pub fn with_storage(mut self, storage: Box<dyn StoragePort>) -> Self {
        match persistence::load_schedule(&*storage) {
            Ok(Some(snapshot)) => {
                info!("FeederService: restored {} rule(s)", snapshot.rules.len());
                self.store.restore(snapshot);
            }
            Ok(None) => {}
            Err(e) => warn!("FeederService: schedule not restored: {}", e),
        }

        let (entries, next_seq) = EventRing::read_all(&*storage);
        let today = self.clock.local_now().date();
        let fired_today: Vec<RuleId> = entries
            .iter()
            .filter_map(|e| e.record.as_dispense())
            .filter(|d| d.timestamp.date() == today)
            .filter_map(|d| match d.source {
                DispenseSource::Scheduled(id) => Some(id),
                DispenseSource::Manual => None,
            })
            .collect();
        if !entries.is_empty() {
            info!(
                "FeederService: restored {} event(s), {} rule(s) already fired today",
                entries.len(),
                fired_today.len()
            );
        }
        self.scheduler
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .seed_fired(today, fired_today);
        self.log.restore(entries, next_seq);

        self.storage = Some(Mutex::new(storage));
        self
    }

    pub fn add_sink(&self, sink: Box<dyn EventSink>) {
        lock(&self.sinks).push(sink);
    }

    pub fn config(&self) -> &FeederConfig {
        &self.config
    }

    pub fn clock(&self) -> &dyn ClockPort {
        &*self.clock
    }

    // ── Schedule ──────────────────────────────────────────────

    pub fn add_rule(&self, time: &str, weight_threshold_grams: i64) -> Result<DispenseRule, Error> {
        let rule = self.store.add(time, weight_threshold_grams)?;
        self.persist_schedule();
        Ok(rule)
    }

    pub fn remove_rule(&self, id: RuleId) -> Result<DispenseRule, Error> {
        let rule = self.store.remove(id)?;
        self.persist_schedule();
        Ok(rule)
    }

    pub fn rules(&self) -> Vec<DispenseRule> {
        self.store.list()
    }

    // ── Scheduling ────────────────────────────────────────────

    /// One scheduler pass at the clock's current local time.
    pub fn tick(&self) -> TickReport {
        let now = self.clock.local_now();
        let rules = self.store.list();
        let mut scheduler = lock(&self.scheduler);
        scheduler.tick(now, &rules, &mut ScheduledDispense { service: self })
    }

    // ── Manual dispense ───────────────────────────────────────

    /// Dispense one manual portion and wait for its recorded event.
    ///
    /// Returns the fault if the rotation failed (the event and an alert are
    /// recorded either way), or the reason the request never ran.
    pub fn dispense_now(&self) -> Result<DispenseEvent, Error> {
        match self.submit_manual().wait() {
            ManualResult::Completed { event, result: Ok(_) } => Ok(event),
            ManualResult::Completed { result: Err(fault), .. } => Err(Error::Actuator(fault)),
            ManualResult::Dropped(reason) => Err(Error::Dispense(reason)),
        }
    }

    /// Submit a manual portion without waiting.  The handle's ticket can be
    /// passed to [`cancel_manual`](Self::cancel_manual) until it runs.
    pub fn submit_manual(&self) -> ManualRequest {
        let submission = self
            .dispenser
            .request_manual(self.config.manual_portion_grams);
        if let Some(dropped) = submission.superseded {
            warn!("FeederService: manual request {} dropped", dropped.0);
            self.record(LogRecord::Alert(Alert::new(
                self.clock.local_now(),
                AlertKind::ManualDropped,
                "dropped manual request",
            )));
        }
        self.record_manual(submission.completed);
        submission.request
    }

    pub fn cancel_manual(&self, ticket: ManualTicket) -> bool {
        self.dispenser.cancel(ticket)
    }

    /// Whether a manual request is waiting behind an in-flight rotation.
    pub fn manual_pending(&self) -> bool {
        self.dispenser.has_pending()
    }

    // ── Sensors ───────────────────────────────────────────────

    /// Refresh both sensors and record any threshold alerts.
    pub fn poll_sensors(&self) -> Vec<Alert> {
        let (water, food) = self.sensors.refresh(&*self.clock);
        if water.is_err() && food.is_err() {
            // Cached values were already checked when they were read.
            return Vec::new();
        }
        let alerts = self.sensors.check_thresholds(&*self.clock);
        for alert in &alerts {
            self.record(LogRecord::Alert(alert.clone()));
        }
        alerts
    }

    pub fn read_water(&self) -> Result<u8, Error> {
        Ok(self.sensors.read_water(self.clock.uptime())?)
    }

    pub fn read_food(&self) -> Result<u32, Error> {
        Ok(self.sensors.read_food(self.clock.uptime())?)
    }

    pub fn sensor_status(&self) -> SensorStatus {
        self.sensors.status(self.clock.uptime())
    }

    // ── Event feed ────────────────────────────────────────────

    pub fn events(&self, since: Option<Seq>) -> Vec<LogEntry> {
        self.log.list(since)
    }

    // ── Command handling ──────────────────────────────────────

    /// Process an external command (HTTP, serial, BLE, …).
    pub fn handle_command(&self, cmd: FeederCommand) -> FeederReply {
        let reply = match cmd {
            FeederCommand::AddRule {
                time,
                weight_threshold_grams,
            } => self
                .add_rule(&time, weight_threshold_grams)
                .map(|rule| FeederReply::RuleAdded { id: rule.id }),
            FeederCommand::RemoveRule { id } => self
                .remove_rule(id)
                .map(|rule| FeederReply::RuleRemoved { id: rule.id }),
            FeederCommand::ListRules => Ok(FeederReply::Rules {
                rules: self.rules(),
            }),
            FeederCommand::DispenseManual => self
                .dispense_now()
                .map(|event| FeederReply::Dispensed { event }),
            FeederCommand::ReadSensors => Ok(FeederReply::Sensors(self.sensor_status())),
            FeederCommand::ListEvents { since } => Ok(FeederReply::Events {
                events: self.events(since),
            }),
        };
        reply.unwrap_or_else(|e| {
            warn!("FeederService: command rejected: {}", e);
            FeederReply::from(e)
        })
    }

    // ── Internal ──────────────────────────────────────────────

    /// Record one finished rotation, plus an alert if it faulted.
    fn record_rotation(
        &self,
        source: DispenseSource,
        result: Result<u32, ActuatorFault>,
    ) -> DispenseEvent {
        let now = self.clock.local_now();
        let event = DispenseEvent {
            timestamp: now,
            source,
            grams_dispensed: *result.as_ref().unwrap_or(&0),
            outcome: DispenseOutcome::of(&result),
        };
        self.record(LogRecord::Dispense(event.clone()));
        if let Err(fault) = result {
            let who = match source {
                DispenseSource::Manual => "manual".to_string(),
                DispenseSource::Scheduled(id) => format!("rule {id}"),
            };
            self.record(LogRecord::Alert(Alert::new(
                now,
                AlertKind::ActuatorFault,
                &format!("{who} dispense failed: {fault}"),
            )));
        }
        event
    }

    fn record_manual(&self, completed: Vec<CompletedManual>) {
        for done in completed {
            let event = self.record_rotation(DispenseSource::Manual, done.result);
            done.resolve(event);
        }
    }

    fn record(&self, record: LogRecord) -> LogEntry {
        let entry = match &self.storage {
            Some(storage) => {
                // Appending under the storage lock keeps slot and head
                // writes in sequence order.
                let mut storage = lock(storage);
                let entry = self.log.append(record);
                if let Err(e) = EventRing::write_entry(&mut **storage, &entry) {
                    warn!("FeederService: event {} not persisted: {}", entry.seq, e);
                }
                entry
            }
            None => self.log.append(record),
        };
        for sink in lock(&self.sinks).iter_mut() {
            sink.emit(&entry);
        }
        entry
    }

    fn persist_schedule(&self) {
        let Some(storage) = &self.storage else {
            return;
        };
        let mut storage = lock(storage);
        if let Err(e) = persistence::save_schedule(&mut **storage, &self.store.snapshot()) {
            warn!("FeederService: schedule not persisted: {}", e);
        }
    }
}

/// Runs due rules through the dispense coordinator on behalf of the scheduler.
struct ScheduledDispense<'a, A, S>
where
    A: ActuatorPort + Send + 'static,
    S: SensorPort + Send + 'static,
{
    service: &'a FeederService<A, S>,
}

impl<A, S> DispenseDelegate for ScheduledDispense<'_, A, S>
where
    A: ActuatorPort + Send + 'static,
    S: SensorPort + Send + 'static,
{
    fn dispense_scheduled(&mut self, rule: &DispenseRule) -> DispenseOutcome {
        let service = self.service;
        let (event, drained) = service
            .dispenser
            .dispense_exclusive(rule.weight_threshold_grams, |result| {
                service.record_rotation(DispenseSource::Scheduled(rule.id), result)
            });
        service.record_manual(drained);
        event.outcome
    }
}

fn lock<T: ?Sized>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
