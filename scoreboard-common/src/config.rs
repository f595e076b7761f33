use log::*;
use serde::{Deserialize, Serialize};
use serde_with::{DurationMilliSeconds, DurationSecondsWithFrac, serde_as};
use std::time::Duration;

#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockTiming {
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub period_length: Duration,
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub possession_period: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub tick_interval: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub autosave_interval: Duration,
}

impl Default for ClockTiming {
    fn default() -> Self {
        Self {
            period_length: Duration::from_secs(600),
            possession_period: Duration::from_secs(12),
            tick_interval: Duration::from_millis(100),
            autosave_interval: Duration::from_millis(1000),
        }
    }
}

impl ClockTiming {
    /// Replaces intervals that can't drive a timer (zero) with the defaults.
    pub fn sanitized(self) -> Self {
        let defaults = Self::default();
        let mut timing = self;
        if timing.tick_interval.is_zero() {
            warn!(
                "A tick interval of zero is not usable, using {:?}",
                defaults.tick_interval
            );
            timing.tick_interval = defaults.tick_interval;
        }
        if timing.autosave_interval.is_zero() {
            warn!(
                "An autosave interval of zero is not usable, using {:?}",
                defaults.autosave_interval
            );
            timing.autosave_interval = defaults.autosave_interval;
        }
        if timing.possession_period.is_zero() {
            warn!(
                "A shot clock period of zero is not usable, using {:?}",
                defaults.possession_period
            );
            timing.possession_period = defaults.possession_period;
        }
        timing
    }
}
