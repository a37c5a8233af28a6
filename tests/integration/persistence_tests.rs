//! Integration tests for restart behavior: schedule, event feed and
//! fired-today markers restored from a data directory.

use std::sync::Arc;

use petfeeder::adapters::storage::FileStorage;
use petfeeder::adapters::time::ManualClock;
use petfeeder::app::commands::{FeederCommand, FeederReply};
use petfeeder::app::service::FeederService;
use petfeeder::config::FeederConfig;

use crate::mock_hw::{ActuatorLog, MockActuator, MockSensors, at, clock_at};

type Service = FeederService<MockActuator, MockSensors>;

fn boot(dir: &tempfile::TempDir, clock: &ManualClock) -> (Service, ActuatorLog) {
    let (actuator, hw) = MockActuator::new();
    let (sensors, _) = MockSensors::new(60, 1_000);
    let clock = Arc::new(clock.clone());
    let svc = FeederService::new(FeederConfig::default(), clock, actuator, sensors)
        .unwrap()
        .with_storage(Box::new(FileStorage::open(dir.path()).unwrap()));
    (svc, hw)
}

#[test]
fn schedule_and_events_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let clock = clock_at(8, 0);

    let (svc, _) = boot(&dir, &clock);
    svc.add_rule("08:00", 30).unwrap();
    let removed = svc.add_rule("09:00", 30).unwrap();
    svc.add_rule("20:30", 45).unwrap();
    svc.remove_rule(removed.id).unwrap();
    svc.tick();
    svc.dispense_now().unwrap();
    let before = svc.events(None);
    let rules = svc.rules();
    drop(svc);

    let (svc, hw) = boot(&dir, &clock);
    assert_eq!(svc.rules(), rules);
    assert_eq!(svc.events(None), before);

    clock.advance(core::time::Duration::from_secs(10));
    assert!(svc.tick().is_empty());

    // Sequence numbers continue after the restored tail.
    svc.dispense_now().unwrap();
    let events = svc.events(None);
    assert_eq!(events.len(), 3);
    assert_eq!(events[2].seq, before[1].seq + 1);
    assert_eq!(hw.calls().len(), 1, "restart must not re-run the 08:00 rule");
}

#[test]
fn fired_markers_only_carry_over_within_the_same_day() {
    let dir = tempfile::tempdir().unwrap();
    let clock = clock_at(8, 0);

    let (svc, _) = boot(&dir, &clock);
    svc.add_rule("08:00", 30).unwrap();
    assert_eq!(svc.tick().fired.len(), 1);
    drop(svc);

    clock.set(at(2, 8, 0, 10));
    let (svc, hw) = boot(&dir, &clock);
    assert_eq!(svc.tick().fired.len(), 1, "yesterday's event does not block today");
    assert_eq!(hw.calls(), vec![30]);
}

#[test]
fn events_since_cursor_through_commands() {
    let dir = tempfile::tempdir().unwrap();
    let clock = clock_at(12, 0);
    let (svc, _) = boot(&dir, &clock);
    for _ in 0..3 {
        svc.dispense_now().unwrap();
    }

    let reply = svc.handle_command(FeederCommand::ListEvents { since: Some(2) });
    let FeederReply::Events { events } = reply else {
        panic!("expected events");
    };
    assert_eq!(events.iter().map(|e| e.seq).collect::<Vec<_>>(), vec![2, 3]);
}
