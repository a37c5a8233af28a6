//! Schedule store - the configured feeding rules.
//!
//! The store exclusively owns the [`DispenseRule`] collection.  Rules are
//! kept sorted by time of day (ties in insertion order) so the scheduler can
//! walk them in firing order without re-sorting each tick.
//!
//! Mutations are serialized behind a writer lock; [`ScheduleStore::list`]
//! takes the reader side and may run concurrently with other readers.
//! The store never dispenses anything itself.

use core::fmt;
use std::sync::{PoisonError, RwLock};

use chrono::{NaiveTime, Timelike};
use log::info;
use serde::{Deserialize, Serialize};

use crate::error::ScheduleError;

const SECS_PER_MINUTE: u32 = 60;
const MINUTES_PER_HOUR: u32 = 60;

// ═══════════════════════════════════════════════════════════════
//  Rule types
// ═══════════════════════════════════════════════════════════════

/// Unique rule identifier.  Ids are never reused within a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(pub u32);

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Wall-clock time of day in local device time, minute resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeOfDay {
    hour: u8,
    minute: u8,
}

impl TimeOfDay {
    pub fn new(hour: u8, minute: u8) -> Result<Self, ScheduleError> {
        if hour > 23 {
            return Err(ScheduleError::InvalidRule("hour must be 0-23"));
        }
        if minute > 59 {
            return Err(ScheduleError::InvalidRule("minute must be 0-59"));
        }
        Ok(Self { hour, minute })
    }

    /// Parse the `HH:MM` form produced by a time input (`"08:00"`, `"23:59"`).
    pub fn parse(text: &str) -> Result<Self, ScheduleError> {
        let (h, m) = text
            .trim()
            .split_once(':')
            .ok_or(ScheduleError::InvalidRule("time must be HH:MM"))?;
        if h.is_empty() || h.len() > 2 || m.len() != 2 {
            return Err(ScheduleError::InvalidRule("time must be HH:MM"));
        }
        if !h.bytes().chain(m.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(ScheduleError::InvalidRule("time must be HH:MM"));
        }
        let hour = h
            .parse::<u8>()
            .map_err(|_| ScheduleError::InvalidRule("time must be HH:MM"))?;
        let minute = m
            .parse::<u8>()
            .map_err(|_| ScheduleError::InvalidRule("time must be HH:MM"))?;
        Self::new(hour, minute)
    }

    pub fn hour(self) -> u8 {
        self.hour
    }

    pub fn minute(self) -> u8 {
        self.minute
    }

    /// Seconds since local midnight.
    pub fn seconds_from_midnight(self) -> u32 {
        (self.hour as u32 * MINUTES_PER_HOUR + self.minute as u32) * SECS_PER_MINUTE
    }

    /// Truncate a wall-clock time to minute resolution.
    pub fn from_naive(time: NaiveTime) -> Self {
        Self {
            hour: time.hour() as u8,
            minute: time.minute() as u8,
        }
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// A configured feeding: dispense `weight_threshold_grams` at `time`.
///
/// Immutable once created; an edit is a remove followed by an add.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispenseRule {
    pub id: RuleId,
    pub time: TimeOfDay,
    pub weight_threshold_grams: u32,
}

/// Serializable image of the store used by persistence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSnapshot {
    pub next_id: u32,
    pub rules: Vec<DispenseRule>,
}

// ═══════════════════════════════════════════════════════════════
//  Store
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
struct StoreInner {
    /// Sorted by `time`, ties in insertion order.
    rules: Vec<DispenseRule>,
    next_id: u32,
}

/// Thread-safe owner of the rule collection.
#[derive(Debug, Default)]
pub struct ScheduleStore {
    inner: RwLock<StoreInner>,
}

impl ScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate raw input and insert a new rule.
    ///
    /// `weight_threshold_grams` is signed because it comes straight from the
    /// outside world; negatives are rejected here rather than wrapped.
    pub fn add(
        &self,
        time: &str,
        weight_threshold_grams: i64,
    ) -> Result<DispenseRule, ScheduleError> {
        let time = TimeOfDay::parse(time)?;
        if weight_threshold_grams < 0 {
            return Err(ScheduleError::InvalidRule("weight threshold must be >= 0"));
        }
        let grams = u32::try_from(weight_threshold_grams)
            .map_err(|_| ScheduleError::InvalidRule("weight threshold too large"))?;
        Ok(self.insert(time, grams))
    }

    /// Insert an already-validated rule and return it with its fresh id.
    pub fn insert(&self, time: TimeOfDay, weight_threshold_grams: u32) -> DispenseRule {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.next_id += 1;
        let rule = DispenseRule {
            id: RuleId(inner.next_id),
            time,
            weight_threshold_grams,
        };
        // After every rule at the same time, so ties keep insertion order.
        let pos = inner.rules.partition_point(|r| r.time <= time);
        inner.rules.insert(pos, rule.clone());
        info!(
            "Schedule: added rule {} at {} ({} g)",
            rule.id, rule.time, rule.weight_threshold_grams
        );
        rule
    }

    /// Remove a rule.  A second removal of the same id fails with `NotFound`.
    pub fn remove(&self, id: RuleId) -> Result<DispenseRule, ScheduleError> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let pos = inner
            .rules
            .iter()
            .position(|r| r.id == id)
            .ok_or(ScheduleError::NotFound(id))?;
        let rule = inner.rules.remove(pos);
        info!("Schedule: removed rule {} ({})", rule.id, rule.time);
        Ok(rule)
    }

    /// Rules in firing order.
    pub fn list(&self) -> Vec<DispenseRule> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .rules
            .clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> ScheduleSnapshot {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        ScheduleSnapshot {
            next_id: inner.next_id,
            rules: inner.rules.clone(),
        }
    }

    /// Replace the contents with a persisted snapshot.
    ///
    /// Rules are re-sorted (stable, so stored tie order survives) and the id
    /// counter never goes below the highest restored id.
    pub fn restore(&self, snapshot: ScheduleSnapshot) {
        let mut rules = snapshot.rules;
        rules.sort_by_key(|r| r.time);
        let max_id = rules.iter().map(|r| r.id.0).max().unwrap_or(0);
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.next_id = snapshot.next_id.max(max_id);
        inner.rules = rules;
        info!("Schedule: restored {} rule(s)", inner.rules.len());
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
