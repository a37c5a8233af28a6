//! Feeding scheduler engine.
//!
//! Decides *when* a rule is due; the [`DispenseDelegate`] decides *how* the
//! rotation is carried out and recorded.  The engine owns nothing but the
//! fired-today markers.
//!
//! ```text
//!  ┌──────┐  tick(now)  ┌──────────┐  rule due  ┌──────────────────┐
//!  │ Idle │────────────▶│ Checking │───────────▶│ Dispensing(rule) │
//!  └──────┘             └──────────┘            └────────┬─────────┘
//!     ▲                      │ no more rules             │ delegate returns
//!     └──────────────────────┴───────────────────────────┘
//! ```
//!
//! A rule is due when its time of day lies in `[now - window, now]` and it
//! has not fired on the current local date.  A date change observed on tick
//! clears every marker.  The window does not wrap across midnight, and a
//! rule whose window passed between two ticks is skipped for the day and
//! reported as a stale tick (no catch-up).

use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use log::{debug, info, warn};

use crate::app::events::DispenseOutcome;
use crate::app::ports::DispenseDelegate;
use crate::error::Error;
use crate::schedule::{DispenseRule, RuleId};

/// Where the engine is inside one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    Idle,
    Checking,
    Dispensing(RuleId),
}

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Rules dispensed this tick, in store order.
    pub fired: Vec<(RuleId, DispenseOutcome)>,
    /// Rules whose window elapsed unseen since the previous tick.
    pub skipped: Vec<RuleId>,
}

impl TickReport {
    pub fn is_empty(&self) -> bool {
        self.fired.is_empty() && self.skipped.is_empty()
    }

    /// Missed windows as [`Error::StaleTick`] values.
    pub fn stale_ticks(&self) -> impl Iterator<Item = Error> + '_ {
        self.skipped.iter().copied().map(Error::StaleTick)
    }
}

pub struct FeedingScheduler {
    window_secs: u32,
    fired_today: BTreeSet<RuleId>,
    current_day: Option<NaiveDate>,
    last_tick: Option<NaiveDateTime>,
    phase: SchedulerPhase,
}

impl FeedingScheduler {
    pub fn new(window_secs: u32) -> Self {
        Self {
            window_secs,
            fired_today: BTreeSet::new(),
            current_day: None,
            last_tick: None,
            phase: SchedulerPhase::Idle,
        }
    }

    pub fn phase(&self) -> SchedulerPhase {
        self.phase
    }

    pub fn has_fired_today(&self, id: RuleId) -> bool {
        self.fired_today.contains(&id)
    }

    /// Pre-mark rules as fired on `day`, e.g. from the restored event log,
    /// so a restart inside a rule's window does not dispense twice.
    pub fn seed_fired(&mut self, day: NaiveDate, ids: impl IntoIterator<Item = RuleId>) {
        if self.current_day != Some(day) {
            self.fired_today.clear();
            self.current_day = Some(day);
        }
        self.fired_today.extend(ids);
    }

    /// Run one scheduler pass at local time `now` over `rules` (store order).
    pub fn tick(
        &mut self,
        now: NaiveDateTime,
        rules: &[DispenseRule],
        delegate: &mut dyn DispenseDelegate,
    ) -> TickReport {
        let today = now.date();
        if self.current_day != Some(today) {
            if self.current_day.is_some() {
                info!(
                    "Scheduler: new day {}, clearing {} fired marker(s)",
                    today,
                    self.fired_today.len()
                );
            }
            self.fired_today.clear();
            self.current_day = Some(today);
        }

        // Only a previous tick on the same date can prove a window was missed.
        let last_secs = self
            .last_tick
            .filter(|t| t.date() == today && *t <= now)
            .map(|t| t.time().num_seconds_from_midnight());
        let now_secs = now.time().num_seconds_from_midnight();

        self.phase = SchedulerPhase::Checking;
        debug!("Scheduler: tick at {} over {} rule(s)", now, rules.len());

        let mut report = TickReport::default();
        for rule in rules {
            if self.fired_today.contains(&rule.id) {
                continue;
            }
            let rule_secs = rule.time.seconds_from_midnight();

            if rule_secs <= now_secs && now_secs - rule_secs <= self.window_secs {
                self.phase = SchedulerPhase::Dispensing(rule.id);
                // Marked before dispensing: a fault is final for the day.
                self.fired_today.insert(rule.id);
                info!(
                    "Scheduler: rule {} due ({} → {} g)",
                    rule.id, rule.time, rule.weight_threshold_grams
                );
                let outcome = delegate.dispense_scheduled(rule);
                if !outcome.is_success() {
                    warn!("Scheduler: rule {} ended {:?}, no retry today", rule.id, outcome);
                }
                report.fired.push((rule.id, outcome));
                self.phase = SchedulerPhase::Checking;
            } else if let Some(last) = last_secs {
                let window_end = rule_secs.saturating_add(self.window_secs);
                if last < rule_secs && window_end < now_secs {
                    warn!(
                        "Scheduler: {} (window {} + {}s passed between ticks)",
                        Error::StaleTick(rule.id),
                        rule.time,
                        self.window_secs
                    );
                    self.fired_today.insert(rule.id);
                    report.skipped.push(rule.id);
                }
            }
        }

        self.last_tick = Some(now);
        self.phase = SchedulerPhase::Idle;
        report
    }
}
