//! A single observed rate and its movement against the previous one.

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateSample {
    pub value: f64,
    pub observed_at: DateTime<Utc>,
}

impl RateSample {
    pub fn new(value: f64) -> Self {
        Self::at(value, Utc::now())
    }

    pub fn at(value: f64, observed_at: DateTime<Utc>) -> Self {
        Self { value, observed_at }
    }
}

/// Direction of a sample relative to the one before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateTrend {
    First,
    Up,
    Down,
    Flat,
}

impl RateTrend {
    pub fn between(previous: Option<&RateSample>, current: &RateSample) -> Self {
        match previous {
            None => RateTrend::First,
            Some(prev) if current.value > prev.value => RateTrend::Up,
            Some(prev) if current.value < prev.value => RateTrend::Down,
            Some(_) => RateTrend::Flat,
        }
    }
}
