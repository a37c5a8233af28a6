//! Edge-triggered low-level detection with hysteresis.
//!
//! A monitor latches when the value drops below its threshold and only
//! reports that transition.  It unlatches once the value rises strictly
//! above the threshold, which re-arms it for the next drop.

use log::{info, warn};

use crate::app::events::AlertKind;

#[derive(Debug, Clone, Copy)]
pub struct LowLevelMonitor {
    kind: AlertKind,
    threshold: u32,
    latched: bool,
}

impl LowLevelMonitor {
    pub fn new(kind: AlertKind, threshold: u32) -> Self {
        Self {
            kind,
            threshold,
            latched: false,
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn is_latched(&self) -> bool {
        self.latched
    }

    /// Feed a fresh value.  Returns `true` only on the transition into the
    /// low state.
    pub fn evaluate(&mut self, value: u32) -> bool {
        if value < self.threshold {
            if self.latched {
                return false;
            }
            warn!("{:?}: {} below threshold {}", self.kind, value, self.threshold);
            self.latched = true;
            true
        } else {
            if self.latched && value > self.threshold {
                info!("{:?}: recovered ({} > {})", self.kind, value, self.threshold);
                self.latched = false;
            }
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alerts_once_per_drop() {
        let mut m = LowLevelMonitor::new(AlertKind::LowWater, 10);
        let edges: Vec<bool> = [60, 5, 4, 15, 8].iter().map(|&v| m.evaluate(v)).collect();
        assert_eq!(edges, vec![false, true, false, false, true]);
    }

    #[test]
    fn threshold_value_itself_does_not_rearm() {
        let mut m = LowLevelMonitor::new(AlertKind::LowWater, 10);
        let edges: Vec<bool> = [5, 10, 5].iter().map(|&v| m.evaluate(v)).collect();
        assert_eq!(edges, vec![true, false, false]);
        assert!(m.is_latched());

        assert!(!m.evaluate(11));
        assert!(!m.is_latched());
        assert!(m.evaluate(9));
    }

    #[test]
    fn resting_at_threshold_never_alerts() {
        let mut m = LowLevelMonitor::new(AlertKind::LowFood, 50);
        assert!(!m.evaluate(50));
        assert!(!m.is_latched());
    }
}
