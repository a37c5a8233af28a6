//! Integration tests for the schedule → scheduler → actuator → event log
//! pipeline, and for the sensor alert path.
//!
//! Time is driven by a `ManualClock`; the runtime thread is not started, so
//! every tick happens exactly when the test calls it.

use std::sync::Arc;

use petfeeder::adapters::time::ManualClock;
use petfeeder::app::events::{AlertKind, DispenseOutcome, DispenseSource, LogRecord};
use petfeeder::app::service::FeederService;
use petfeeder::config::FeederConfig;
use petfeeder::error::{ActuatorError, Error, SensorError};
use petfeeder::schedule::RuleId;

use crate::mock_hw::{
    ActuatorLog, MockActuator, MockSensors, RecordingSink, SensorLevels, at, clock_at,
};

type Service = FeederService<MockActuator, MockSensors>;

fn make_service(clock: &ManualClock) -> (Service, ActuatorLog, SensorLevels, RecordingSink) {
    let (actuator, log) = MockActuator::new();
    let (sensors, levels) = MockSensors::new(60, 1_000);
    let service = FeederService::new(
        FeederConfig::default(),
        Arc::new(clock.clone()),
        actuator,
        sensors,
    )
    .unwrap();
    let sink = RecordingSink::default();
    service.add_sink(Box::new(sink.clone()));
    (service, log, levels, sink)
}

// ── Scheduled dispensing ──────────────────────────────────────

#[test]
fn due_rule_dispenses_and_records_actual_grams() {
    let clock = clock_at(8, 0);
    let (svc, hw, _, sink) = make_service(&clock);
    hw.push_result(Ok(48));
    let rule = svc.add_rule("08:00", 50).unwrap();

    let report = svc.tick();

    assert_eq!(report.fired, vec![(rule.id, DispenseOutcome::Success)]);
    assert_eq!(hw.calls(), vec![50]);
    let events = svc.events(None);
    assert_eq!(events.len(), 1);
    let event = events[0].record.as_dispense().unwrap();
    assert_eq!(event.source, DispenseSource::Scheduled(rule.id));
    assert_eq!(event.grams_dispensed, 48);
    assert_eq!(event.outcome, DispenseOutcome::Success);
    assert_eq!(event.timestamp, at(1, 8, 0, 0));
    assert_eq!(sink.snapshot(), events, "sink should see every entry");
}

#[test]
fn rule_fires_once_per_day() {
    let clock = clock_at(8, 0);
    let (svc, hw, _, _) = make_service(&clock);
    svc.add_rule("08:00", 30).unwrap();

    for _ in 0..4 {
        svc.tick();
        clock.advance(core::time::Duration::from_secs(15));
    }
    assert_eq!(hw.calls().len(), 1, "repeated ticks inside the window");

    clock.set(at(2, 8, 0, 30));
    svc.tick();
    assert_eq!(hw.calls().len(), 2, "next day fires again");
}

#[test]
fn rule_outside_window_is_not_due() {
    let clock = clock_at(7, 58);
    let (svc, hw, _, _) = make_service(&clock);
    svc.add_rule("08:00", 30).unwrap();
    svc.add_rule("07:00", 30).unwrap();

    let report = svc.tick();

    assert!(report.is_empty(), "neither rule is inside the window");
    assert!(hw.calls().is_empty());
    assert!(svc.events(None).is_empty());
}

#[test]
fn actuator_fault_logs_one_event_and_one_alert_without_retry() {
    let clock = clock_at(8, 0);
    let (svc, hw, _, _) = make_service(&clock);
    hw.push_result(Err(ActuatorError::Jammed));
    let rule = svc.add_rule("08:00", 50).unwrap();

    let report = svc.tick();
    assert_eq!(report.fired, vec![(rule.id, DispenseOutcome::Jammed)]);

    clock.advance(core::time::Duration::from_secs(20));
    assert!(svc.tick().is_empty(), "a faulted rule is done for the day");
    assert_eq!(hw.calls().len(), 1);

    let events = svc.events(None);
    let dispenses: Vec<_> = events.iter().filter_map(|e| e.record.as_dispense()).collect();
    let alerts: Vec<_> = events.iter().filter_map(|e| e.record.as_alert()).collect();
    assert_eq!(dispenses.len(), 1);
    assert_eq!(dispenses[0].outcome, DispenseOutcome::Jammed);
    assert_eq!(dispenses[0].grams_dispensed, 0);
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].kind, AlertKind::ActuatorFault);
    assert!(alerts[0].message.contains("rule 1"), "got {:?}", alerts[0].message);
}

#[test]
fn missed_window_is_reported_and_skipped() {
    let clock = clock_at(7, 59);
    let (svc, hw, _, _) = make_service(&clock);
    let rule = svc.add_rule("08:00", 30).unwrap();
    assert!(svc.tick().is_empty());

    clock.set(at(1, 8, 5, 0));
    let report = svc.tick();

    assert_eq!(report.skipped, vec![rule.id]);
    assert_eq!(
        report.stale_ticks().collect::<Vec<_>>(),
        vec![Error::StaleTick(rule.id)]
    );
    assert!(hw.calls().is_empty(), "no catch-up dispense");
    assert!(svc.events(None).is_empty());
}

#[test]
fn removed_rule_no_longer_fires() {
    let clock = clock_at(8, 0);
    let (svc, hw, _, _) = make_service(&clock);
    let keep = svc.add_rule("08:00", 20).unwrap();
    let gone = svc.add_rule("08:00", 40).unwrap();
    svc.remove_rule(gone.id).unwrap();

    let report = svc.tick();

    assert_eq!(report.fired, vec![(keep.id, DispenseOutcome::Success)]);
    assert_eq!(hw.calls(), vec![20]);
    assert_eq!(svc.rules().iter().map(|r| r.id).collect::<Vec<_>>(), vec![RuleId(1)]);
}

// ── Sensor alerts ─────────────────────────────────────────────

#[test]
fn water_alert_raised_once_per_crossing() {
    let clock = clock_at(9, 0);
    let (svc, _, levels, _) = make_service(&clock);

    let mut kinds = Vec::new();
    for water in [60, 5, 15, 8] {
        levels.set_water(water);
        kinds.extend(svc.poll_sensors().into_iter().map(|a| a.kind));
    }

    assert_eq!(kinds, vec![AlertKind::LowWater, AlertKind::LowWater]);
    let logged = svc
        .events(None)
        .iter()
        .filter(|e| matches!(&e.record, LogRecord::Alert(a) if a.kind == AlertKind::LowWater))
        .count();
    assert_eq!(logged, 2);
    assert_eq!(svc.read_water(), Ok(8));
}

#[test]
fn low_food_alert_and_reads() {
    let clock = clock_at(9, 0);
    let (svc, _, levels, _) = make_service(&clock);

    levels.set_food(30);
    let alerts = svc.poll_sensors();

    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].kind, AlertKind::LowFood);
    assert_eq!(svc.read_food(), Ok(30));
}

#[test]
fn failed_read_keeps_cache_until_stale() {
    let clock = clock_at(9, 0);
    let (svc, _, levels, _) = make_service(&clock);
    assert_eq!(
        svc.read_water(),
        Err(Error::Sensor(SensorError::StaleReading)),
        "nothing read yet"
    );

    svc.poll_sensors();
    levels.fail_water(SensorError::ReadFailed);
    svc.poll_sensors();
    assert_eq!(svc.read_water(), Ok(60), "last good value still fresh");

    let stale_after = svc.config().sensor_stale_after();
    clock.advance(stale_after + core::time::Duration::from_secs(1));
    assert_eq!(svc.read_water(), Err(Error::Sensor(SensorError::StaleReading)));
}
