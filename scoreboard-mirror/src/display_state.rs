//! The mirror's view of the scoreboard, built only by folding feed messages.

use scoreboard_common::{
    clock_time::{ClockKind, format_feed_main, format_feed_possession},
    display::DisplaySink,
    feed::{FeedMessage, MessageKind, StatePatch},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayState {
    pub timer_tenths: i32,
    pub shot_clock_tenths: i32,
    pub is_timer_running: bool,
    pub is_shot_clock_running: bool,
    pub score_a: u32,
    pub score_b: u32,
    pub foul_a: u32,
    pub foul_b: u32,
    pub team_a_name: String,
    pub team_b_name: String,
    pub connected: bool,
    formatted_timer: String,
    formatted_shot_clock: String,
}

impl Default for DisplayState {
    fn default() -> Self {
        let mut state = Self {
            timer_tenths: 6000,
            shot_clock_tenths: 120,
            is_timer_running: false,
            is_shot_clock_running: false,
            score_a: 0,
            score_b: 0,
            foul_a: 0,
            foul_b: 0,
            team_a_name: String::from("TEAM A"),
            team_b_name: String::from("TEAM B"),
            connected: false,
            formatted_timer: String::new(),
            formatted_shot_clock: String::new(),
        };
        state.refresh_formatted();
        state
    }
}

impl DisplayState {
    pub fn formatted_timer(&self) -> &str {
        &self.formatted_timer
    }

    pub fn formatted_shot_clock(&self) -> &str {
        &self.formatted_shot_clock
    }

    pub fn score_line(&self) -> String {
        format!(
            "{} {} - {} {} (fouls {} - {})",
            self.team_a_name, self.score_a, self.score_b, self.team_b_name, self.foul_a, self.foul_b
        )
    }

    fn merge(&mut self, patch: &StatePatch) {
        fn take<T: Clone>(field: &mut T, value: &Option<T>) {
            if let Some(value) = value {
                *field = value.clone();
            }
        }

        take(&mut self.timer_tenths, &patch.timer_tenths);
        take(&mut self.shot_clock_tenths, &patch.shot_clock_tenths);
        take(&mut self.is_timer_running, &patch.is_timer_running);
        take(&mut self.is_shot_clock_running, &patch.is_shot_clock_running);
        take(&mut self.score_a, &patch.score_a);
        take(&mut self.score_b, &patch.score_b);
        take(&mut self.foul_a, &patch.foul_a);
        take(&mut self.foul_b, &patch.foul_b);
        take(&mut self.team_a_name, &patch.team_a_name);
        take(&mut self.team_b_name, &patch.team_b_name);
        self.refresh_formatted();
    }

    fn refresh_formatted(&mut self) {
        self.formatted_timer = format_feed_main(self.timer_tenths);
        self.formatted_shot_clock = format_feed_possession(self.shot_clock_tenths);
    }

    /// Pushes the clocks and link status to `sink`.
    pub fn render<D: DisplaySink + ?Sized>(&self, sink: &mut D) {
        sink.render_clock(ClockKind::Main, &self.formatted_timer);
        sink.render_clock(ClockKind::Possession, &self.formatted_shot_clock);
        sink.render_expired(ClockKind::Main, self.timer_tenths <= 0);
        sink.render_expired(ClockKind::Possession, self.shot_clock_tenths <= 0);
        sink.render_connected(self.connected);
        sink.present();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reduction {
    pub state: DisplayState,
    /// The server stopped its shot clock; anything ticking locally must stop too
    pub halt_local_timers: bool,
}

/// Folds one server message into `state`. Unrecognized messages leave the
/// state as it was.
pub fn reduce(state: &DisplayState, message: &FeedMessage) -> Reduction {
    let FeedMessage::Known { kind, patch } = message else {
        return Reduction {
            state: state.clone(),
            halt_local_timers: false,
        };
    };

    let mut next = state.clone();
    match kind {
        MessageKind::StateSync
        | MessageKind::GameReset
        | MessageKind::ScoreUpdate
        | MessageKind::TimerUpdate
        | MessageKind::FoulUpdate
        | MessageKind::ShotclockUpdate => next.merge(patch),
    }

    Reduction {
        state: next,
        halt_local_timers: *kind == MessageKind::ShotclockUpdate
            && patch.is_shot_clock_running == Some(false),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    Opened,
    Closed,
    Errored,
}

pub fn apply_connection(state: &DisplayState, event: ConnectionEvent) -> DisplayState {
    DisplayState {
        connected: event == ConnectionEvent::Opened,
        ..state.clone()
    }
}
