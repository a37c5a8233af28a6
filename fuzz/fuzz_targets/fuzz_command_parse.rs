//! Fuzz target: command and time-of-day parsing
//!
//! Feeds arbitrary text to `TimeOfDay::parse` and to the JSON command
//! decoder, then runs decoded `add_rule` commands through a real store.
//! Asserts that nothing panics and that every accepted time prints back as
//! a valid `HH:MM`.
//!
//! cargo fuzz run fuzz_command_parse

#![no_main]

use libfuzzer_sys::fuzz_target;
use petfeeder::app::commands::FeederCommand;
use petfeeder::schedule::{ScheduleStore, TimeOfDay};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else {
        return;
    };

    if let Ok(t) = TimeOfDay::parse(text) {
        assert!(t.hour() < 24 && t.minute() < 60);
        assert_eq!(TimeOfDay::parse(&t.to_string()), Ok(t));
    }

    if let Ok(FeederCommand::AddRule {
        time,
        weight_threshold_grams,
    }) = serde_json::from_str::<FeederCommand>(text)
    {
        let store = ScheduleStore::new();
        match store.add(&time, weight_threshold_grams) {
            Ok(rule) => {
                assert!(weight_threshold_grams >= 0);
                assert_eq!(store.list(), vec![rule]);
            }
            Err(_) => assert!(store.is_empty()),
        }
    }
});
