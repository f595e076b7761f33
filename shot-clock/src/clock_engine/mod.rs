use crate::persistence::{PersistedSnapshot, SnapshotStore, restore_clocks};
use log::*;
use scoreboard_common::{
    clock_time::{ClockKind, ClockTextError, format_clock, parse_clock},
    config::ClockTiming,
};
use std::time::Duration;
use time::OffsetDateTime;

mod tick;
pub use tick::{TickDriver, TickReport};

/// The outcome of leaving edit mode through a save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    Applied(Duration),
    Reverted(ClockTextError),
    NotEditing,
}

/// Everything a display needs, taken after each operation on the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockSnapshot {
    pub running: bool,
    pub main: Duration,
    pub possession: Duration,
    pub expired: [bool; 2],
    pub editing: [bool; 2],
}

impl ClockSnapshot {
    pub fn time(&self, clock: ClockKind) -> Duration {
        match clock {
            ClockKind::Main => self.main,
            ClockKind::Possession => self.possession,
        }
    }

    pub fn text(&self, clock: ClockKind) -> String {
        format_clock(clock, self.time(clock))
    }
}

pub struct ClockEngine {
    timing: ClockTiming,
    driver: TickDriver,
    running: bool,
    editing: [bool; 2],
    expired: [bool; 2],
    store: Box<dyn SnapshotStore + Send>,
    snapshot_key: String,
}

impl std::fmt::Debug for ClockEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClockEngine")
            .field("driver", &self.driver)
            .field("running", &self.running)
            .field("editing", &self.editing)
            .field("expired", &self.expired)
            .field("snapshot_key", &self.snapshot_key)
            .finish_non_exhaustive()
    }
}

impl ClockEngine {
    /// Builds the engine from whatever `store` holds under `snapshot_key`,
    /// resuming the countdown if it was running when last saved.
    pub fn new(
        timing: ClockTiming,
        store: Box<dyn SnapshotStore + Send>,
        snapshot_key: impl Into<String>,
        now: OffsetDateTime,
    ) -> Self {
        let timing = timing.sanitized();
        let snapshot_key = snapshot_key.into();
        let snapshot = store
            .get(&snapshot_key)
            .and_then(|text| PersistedSnapshot::from_json(&text));
        let restored = restore_clocks(
            snapshot.as_ref(),
            timing.period_length,
            timing.possession_period,
            now,
        );

        let driver = TickDriver::new(
            restored.main,
            restored.possession,
            timing.possession_period,
            timing.tick_interval,
        );
        let mut engine = Self {
            timing,
            driver,
            running: false,
            editing: [false; 2],
            expired: [false; 2],
            store,
            snapshot_key,
        };
        info!(
            "{} Restored clocks (snapshot found: {})",
            engine.status_string(),
            snapshot.is_some()
        );
        if restored.resume {
            engine.start();
        }
        engine
    }

    pub fn timing(&self) -> &ClockTiming {
        &self.timing
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_editing(&self, clock: ClockKind) -> bool {
        self.editing[clock.index()]
    }

    pub fn is_expired(&self, clock: ClockKind) -> bool {
        self.expired[clock.index()]
    }

    pub fn clock_time(&self, clock: ClockKind) -> Duration {
        match clock {
            ClockKind::Main => self.driver.main(),
            ClockKind::Possession => self.driver.possession(),
        }
    }

    fn set_clock_time(&mut self, clock: ClockKind, time: Duration) {
        match clock {
            ClockKind::Main => self.driver.set_main(time),
            ClockKind::Possession => self.driver.set_possession(time),
        }
    }

    pub fn snapshot(&self) -> ClockSnapshot {
        ClockSnapshot {
            running: self.running,
            main: self.driver.main(),
            possession: self.driver.possession(),
            expired: self.expired,
            editing: self.editing,
        }
    }

    fn status_string(&self) -> String {
        format!(
            "[{} {}]",
            format_clock(ClockKind::Main, self.driver.main()),
            format_clock(ClockKind::Possession, self.driver.possession())
        )
    }

    /// Returns `true` if the clocks started counting.
    pub fn start(&mut self) -> bool {
        if self.running {
            return false;
        }
        if self.editing.iter().any(|e| *e) {
            warn!("{} Refusing to start while a clock is being edited", self.status_string());
            return false;
        }
        info!("{} Starting clocks", self.status_string());
        self.expired = [false; 2];
        self.running = true;
        true
    }

    /// Returns `true` if the clocks were running.
    pub fn stop(&mut self) -> bool {
        if !self.running {
            return false;
        }
        info!("{} Stopping clocks", self.status_string());
        self.running = false;
        true
    }

    pub fn toggle(&mut self) -> bool {
        if self.running {
            self.stop();
        } else {
            self.start();
        }
        self.running
    }

    pub fn reset_possession(&mut self, now: OffsetDateTime) {
        let possession = self.driver.main().min(self.timing.possession_period);
        self.driver.set_possession(possession);
        self.expired = [false; 2];
        info!("{} Reset shot clock", self.status_string());
        self.persist(now);
    }

    pub fn reset_main(&mut self, now: OffsetDateTime) {
        self.driver.set_main(self.timing.period_length);
        self.expired = [false; 2];
        info!("{} Reset main clock", self.status_string());
        self.persist(now);
    }

    /// Advances both clocks by one tick interval. Does nothing while stopped.
    pub fn tick(&mut self) -> TickReport {
        if !self.running {
            return TickReport::default();
        }
        let report = self.driver.advance();
        if report.main_expired {
            self.expired[ClockKind::Main.index()] = true;
        }
        if report.possession_expired {
            self.expired[ClockKind::Possession.index()] = true;
        }
        if report.possession_reloaded {
            debug!("{} Shot clock reloaded", self.status_string());
        }
        if report.must_stop() {
            info!("{} Clock ran out, stopping", self.status_string());
            self.running = false;
        }
        report
    }

    pub fn enter_edit(&mut self, clock: ClockKind) {
        self.stop();
        self.editing[clock.index()] = true;
        self.expired[clock.index()] = false;
        debug!("{} Editing the {clock}", self.status_string());
    }

    pub fn cancel_edit(&mut self, clock: ClockKind) -> bool {
        let was_editing = std::mem::take(&mut self.editing[clock.index()]);
        if was_editing {
            debug!("{} Cancelled edit of the {clock}", self.status_string());
        }
        was_editing
    }

    /// Leaves edit mode. Valid text replaces the clock value and is persisted,
    /// anything else leaves the prior value in place.
    pub fn save_edit(&mut self, clock: ClockKind, text: &str, now: OffsetDateTime) -> EditOutcome {
        if !std::mem::take(&mut self.editing[clock.index()]) {
            return EditOutcome::NotEditing;
        }
        match self.apply_text(clock, text, now) {
            Ok(time) => EditOutcome::Applied(time),
            Err(e) => EditOutcome::Reverted(e),
        }
    }

    /// Edit and save in one step.
    pub fn set(
        &mut self,
        clock: ClockKind,
        text: &str,
        now: OffsetDateTime,
    ) -> Result<Duration, ClockTextError> {
        self.enter_edit(clock);
        self.editing[clock.index()] = false;
        self.apply_text(clock, text, now)
    }

    fn apply_text(
        &mut self,
        clock: ClockKind,
        text: &str,
        now: OffsetDateTime,
    ) -> Result<Duration, ClockTextError> {
        let time = parse_clock(clock, text)
            .inspect_err(|e| warn!("{} Keeping the {clock}: {e}", self.status_string()))?;
        self.set_clock_time(clock, time);
        info!("{} Set the {clock} to {text:?}", self.status_string());
        self.persist(now);
        Ok(time)
    }

    pub fn persist(&mut self, now: OffsetDateTime) {
        let snapshot = PersistedSnapshot::capture(
            self.driver.main(),
            self.driver.possession(),
            self.running,
            now,
        );
        if let Some(json) = snapshot.to_json() {
            trace!("Saving clock snapshot {json}");
            self.store.set(&self.snapshot_key, json);
        }
    }
}
