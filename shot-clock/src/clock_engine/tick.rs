use std::time::Duration;

/// Both countdowns, advanced together one step at a time so that stopping is
/// always atomic across the pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickDriver {
    main: Duration,
    possession: Duration,
    possession_period: Duration,
    step: Duration,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// The main clock was already at zero, nothing was advanced
    pub main_exhausted: bool,
    pub main_expired: bool,
    pub possession_expired: bool,
    pub possession_reloaded: bool,
}

impl TickReport {
    pub fn must_stop(&self) -> bool {
        self.main_exhausted || self.main_expired || self.possession_expired
    }
}

impl TickDriver {
    pub fn new(main: Duration, possession: Duration, possession_period: Duration, step: Duration) -> Self {
        Self {
            main,
            possession,
            possession_period,
            step,
        }
    }

    pub fn main(&self) -> Duration {
        self.main
    }

    pub fn possession(&self) -> Duration {
        self.possession
    }

    pub fn possession_period(&self) -> Duration {
        self.possession_period
    }

    pub fn set_main(&mut self, time: Duration) {
        self.main = time;
    }

    pub fn set_possession(&mut self, time: Duration) {
        self.possession = time;
    }

    /// One period of both drivers. The main clock is evaluated first; a shot
    /// clock found at zero reloads instead of counting for this step.
    pub fn advance(&mut self) -> TickReport {
        let mut report = TickReport::default();

        if self.main.is_zero() {
            report.main_exhausted = true;
            return report;
        }

        if self.possession.is_zero() {
            self.possession = self.possession_period;
            report.possession_reloaded = true;
        } else {
            self.possession = self.possession.saturating_sub(self.step);
            report.possession_expired = self.possession.is_zero();
        }

        self.main = self.main.saturating_sub(self.step);
        report.main_expired = self.main.is_zero();

        report
    }
}
