//! Threshold notification gate.

use ratewatch_protocols::NotifyTarget;

use crate::error::MonitorError;

/// Alert band. A rate at or beyond either bound is a breach.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateThresholds {
    min: f64,
    max: f64,
}

impl RateThresholds {
    /// Requires finite bounds with `min < max`.
    pub fn new(min: f64, max: f64) -> Result<Self, MonitorError> {
        if !min.is_finite() || !max.is_finite() || min >= max {
            return Err(MonitorError::InvalidThresholds { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn is_breached(&self, rate: f64) -> bool {
        rate <= self.min || rate >= self.max
    }
}

/// Per-run monitoring state. Only the orchestrator task mutates it.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorState {
    pub thresholds: RateThresholds,
    /// `None` until the first notification sequence completes.
    pub last_notified_rate: Option<f64>,
    pub notify_target: NotifyTarget,
}

impl MonitorState {
    pub fn new(thresholds: RateThresholds, notify_target: NotifyTarget) -> Self {
        Self {
            thresholds,
            last_notified_rate: None,
            notify_target,
        }
    }

    pub fn should_notify(&self, current: f64) -> bool {
        should_notify(current, self)
    }

    /// Record that a notification sequence for `rate` has finished.
    pub fn record_notified(&mut self, rate: f64) {
        self.last_notified_rate = Some(rate);
    }
}

/// Notify when the rate is out of band and differs from the last notified rate.
pub fn should_notify(current: f64, state: &MonitorState) -> bool {
    state.thresholds.is_breached(current) && Some(current) != state.last_notified_rate
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> MonitorState {
        MonitorState::new(
            RateThresholds::new(2.50, 3.00).unwrap(),
            NotifyTarget::Personal("42".to_string()),
        )
    }

    /// Runs a sequence through the gate, recording each positive decision
    /// as a completed notification.
    fn run(state: &mut MonitorState, rates: &[f64]) -> Vec<bool> {
        rates
            .iter()
            .map(|&rate| {
                let notify = state.should_notify(rate);
                if notify {
                    state.record_notified(rate);
                }
                notify
            })
            .collect()
    }

    #[test]
    fn test_thresholds_require_min_below_max() {
        assert!(RateThresholds::new(3.0, 2.5).is_err());
        assert!(RateThresholds::new(3.0, 3.0).is_err());
        assert!(RateThresholds::new(f64::NAN, 3.0).is_err());
        let t = RateThresholds::new(2.5, 3.0).unwrap();
        assert_eq!((t.min(), t.max()), (2.5, 3.0));
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let t = RateThresholds::new(2.5, 3.0).unwrap();
        assert!(t.is_breached(2.5));
        assert!(t.is_breached(3.0));
        assert!(!t.is_breached(2.75));
    }

    #[test]
    fn test_in_band_never_notifies() {
        let mut s = state();
        assert_eq!(run(&mut s, &[2.6, 2.8, 2.99]), vec![false, false, false]);
        assert_eq!(s.last_notified_rate, None);
    }

    #[test]
    fn test_repeated_rate_notifies_once() {
        let mut s = state();
        assert_eq!(run(&mut s, &[3.00, 3.00, 3.00]), vec![true, false, false]);
    }

    #[test]
    fn test_changing_out_of_band_rates() {
        let mut s = state();
        assert_eq!(run(&mut s, &[2.40, 2.45, 2.40]), vec![true, true, true]);
    }

    #[test]
    fn test_return_to_band_does_not_rearm() {
        let mut s = state();
        assert_eq!(run(&mut s, &[3.1, 2.8, 3.1]), vec![true, false, false]);
    }

    #[test]
    fn test_formula_over_grid() {
        let mut s = state();
        let values = [2.0, 2.5, 2.75, 3.0, 3.5];
        for last in [None, Some(2.0), Some(3.0), Some(2.75)] {
            s.last_notified_rate = last;
            for &current in &values {
                let expected = (current <= 2.5 || current >= 3.0) && Some(current) != last;
                assert_eq!(should_notify(current, &s), expected, "{current} {last:?}");
            }
        }
    }
}
