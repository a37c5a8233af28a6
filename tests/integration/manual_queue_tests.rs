//! Integration tests for manual dispensing against a busy actuator.
//!
//! A gated mock actuator holds the first rotation open so tests can park
//! requests in the single manual slot and observe what happens to them.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

use petfeeder::app::commands::{FeederCommand, FeederReply};
use petfeeder::app::events::{AlertKind, DispenseOutcome, DispenseSource};
use petfeeder::app::service::FeederService;
use petfeeder::config::FeederConfig;
use petfeeder::dispense::ManualResult;
use petfeeder::error::DispenseError;

use crate::mock_hw::{ActuatorLog, MockActuator, MockSensors, clock_at};

const WAIT: Duration = Duration::from_secs(5);

type Service = FeederService<MockActuator, MockSensors>;

struct Gated {
    svc: Arc<Service>,
    hw: ActuatorLog,
    started: Receiver<u32>,
    release: Sender<()>,
}

fn gated_service() -> Gated {
    let (started_tx, started) = mpsc::channel();
    let (release, release_rx) = mpsc::channel();
    let (actuator, hw) = MockActuator::gated(started_tx, release_rx);
    let (sensors, _) = MockSensors::new(60, 1_000);
    let config = FeederConfig {
        manual_portion_grams: 20,
        ..Default::default()
    };
    let svc = FeederService::new(config, Arc::new(clock_at(12, 0)), actuator, sensors).unwrap();
    Gated {
        svc: Arc::new(svc),
        hw,
        started,
        release,
    }
}

#[test]
fn idle_manual_dispense_runs_immediately() {
    let (actuator, hw) = MockActuator::new();
    let (sensors, _) = MockSensors::new(60, 1_000);
    let clock = Arc::new(clock_at(12, 0));
    let svc = FeederService::new(FeederConfig::default(), clock, actuator, sensors).unwrap();

    let reply = svc.handle_command(FeederCommand::DispenseManual);

    let FeederReply::Dispensed { event } = reply else {
        panic!("unexpected reply {reply:?}");
    };
    assert_eq!(event.source, DispenseSource::Manual);
    assert_eq!(event.outcome, DispenseOutcome::Success);
    assert_eq!(event.grams_dispensed, svc.config().manual_portion_grams);
    assert_eq!(hw.calls().len(), 1);
}

#[test]
fn newer_manual_request_supersedes_queued_one() {
    let g = gated_service();

    // #1 holds the actuator.
    let first = {
        let svc = g.svc.clone();
        thread::spawn(move || svc.dispense_now())
    };
    assert_eq!(g.started.recv_timeout(WAIT), Ok(20));

    // #2 parks in the slot, #3 replaces it.
    let second = g.svc.submit_manual();
    assert!(second.is_queued());
    let third = g.svc.submit_manual();
    assert!(third.is_queued());

    assert_eq!(second.wait(), ManualResult::Dropped(DispenseError::Superseded));

    // Release #1, then the drained #3.
    g.release.send(()).unwrap();
    assert_eq!(g.started.recv_timeout(WAIT), Ok(20));
    g.release.send(()).unwrap();

    let first = first.join().unwrap().unwrap();
    assert_eq!(first.outcome, DispenseOutcome::Success);
    let ManualResult::Completed { event, result } = third.wait() else {
        panic!("queued request should have run");
    };
    assert_eq!(result, Ok(20));
    assert_eq!(event.source, DispenseSource::Manual);

    assert_eq!(g.hw.calls(), vec![20, 20], "superseded request never rotated");
    let events = g.svc.events(None);
    let alerts: Vec<_> = events.iter().filter_map(|e| e.record.as_alert()).collect();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].kind, AlertKind::ManualDropped);
    assert_eq!(alerts[0].message.as_str(), "dropped manual request");
    assert_eq!(
        events.iter().filter(|e| e.record.as_dispense().is_some()).count(),
        2
    );
}

#[test]
fn queued_request_can_be_cancelled() {
    let g = gated_service();

    let first = {
        let svc = g.svc.clone();
        thread::spawn(move || svc.dispense_now())
    };
    assert_eq!(g.started.recv_timeout(WAIT), Ok(20));

    let queued = g.svc.submit_manual();
    assert!(g.svc.cancel_manual(queued.ticket()));
    assert!(!g.svc.cancel_manual(queued.ticket()), "already withdrawn");

    g.release.send(()).unwrap();
    first.join().unwrap().unwrap();

    assert_eq!(queued.wait(), ManualResult::Dropped(DispenseError::Cancelled));
    assert_eq!(g.hw.calls().len(), 1);
}

#[test]
fn queued_manual_waits_for_scheduled_rotation() {
    let g = gated_service();
    g.svc.add_rule("12:00", 40).unwrap();

    let tick = {
        let svc = g.svc.clone();
        thread::spawn(move || svc.tick())
    };
    assert_eq!(g.started.recv_timeout(WAIT), Ok(40));

    let manual = {
        let svc = g.svc.clone();
        thread::spawn(move || svc.dispense_now())
    };
    while !g.svc.manual_pending() {
        thread::yield_now();
    }
    // The manual request must not reach the actuator while the rule runs.
    assert!(g.started.try_recv().is_err());

    g.release.send(()).unwrap();
    assert_eq!(g.started.recv_timeout(WAIT), Ok(20));
    g.release.send(()).unwrap();

    assert_eq!(tick.join().unwrap().fired.len(), 1);
    let event = manual.join().unwrap().unwrap();
    assert_eq!(event.grams_dispensed, 20);

    let sources: Vec<_> = g
        .svc
        .events(None)
        .iter()
        .filter_map(|e| e.record.as_dispense().map(|d| d.source))
        .collect();
    assert_eq!(sources.len(), 2);
    assert!(matches!(sources[0], DispenseSource::Scheduled(_)));
    assert_eq!(sources[1], DispenseSource::Manual);
}

#[test]
fn dropped_request_is_reported_to_command_caller() {
    let g = gated_service();

    let first = {
        let svc = g.svc.clone();
        thread::spawn(move || svc.dispense_now())
    };
    assert_eq!(g.started.recv_timeout(WAIT), Ok(20));

    let older = {
        let svc = g.svc.clone();
        thread::spawn(move || svc.handle_command(FeederCommand::DispenseManual))
    };
    // Let the older command park before the newer one replaces it.
    while !g.svc.manual_pending() {
        thread::yield_now();
    }
    let newer = g.svc.submit_manual();

    let reply = older.join().unwrap();
    assert!(matches!(reply, FeederReply::Rejected { code: "superseded", .. }), "got {reply:?}");

    g.release.send(()).unwrap();
    assert_eq!(g.started.recv_timeout(WAIT), Ok(20));
    g.release.send(()).unwrap();
    first.join().unwrap().unwrap();
    assert!(matches!(newer.wait(), ManualResult::Completed { .. }));
}
