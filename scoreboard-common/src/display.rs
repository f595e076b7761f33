use crate::clock_time::ClockKind;
use log::*;
use std::io::Write;

/// Write-only output for clock digits. Implementations must not feed anything
/// back into the clocks; they only show what they are given.
pub trait DisplaySink {
    fn render_clock(&mut self, clock: ClockKind, text: &str);

    fn render_expired(&mut self, clock: ClockKind, expired: bool);

    fn render_connected(&mut self, _connected: bool) {}

    /// Called once a batch of `render_*` calls is complete.
    fn present(&mut self) {}

    fn dispose(&mut self) {}
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClockFace {
    pub texts: [String; 2],
    pub expired: [bool; 2],
    pub connected: Option<bool>,
}

impl ClockFace {
    pub fn status_line(&self) -> String {
        let mut line = String::new();
        for clock in ClockKind::ALL {
            let label = match clock {
                ClockKind::Main => "GAME",
                ClockKind::Possession => "SHOT",
            };
            let alert = if self.expired[clock.index()] { "!" } else { " " };
            line.push_str(&format!(
                "{label} {:>5}{alert}  ",
                self.texts[clock.index()]
            ));
        }
        match self.connected {
            Some(true) => line.push_str("[online]"),
            Some(false) => line.push_str("[offline]"),
            None => {}
        }
        line.trim_end().to_string()
    }
}

/// Redraws a single status line on a terminal.
pub struct TerminalDisplay<W: Write> {
    out: W,
    face: ClockFace,
    last_line: Option<String>,
}

impl<W: Write> TerminalDisplay<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            face: ClockFace::default(),
            last_line: None,
        }
    }

    pub fn face(&self) -> &ClockFace {
        &self.face
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> DisplaySink for TerminalDisplay<W> {
    fn render_clock(&mut self, clock: ClockKind, text: &str) {
        self.face.texts[clock.index()] = text.to_string();
    }

    fn render_expired(&mut self, clock: ClockKind, expired: bool) {
        self.face.expired[clock.index()] = expired;
    }

    fn render_connected(&mut self, connected: bool) {
        self.face.connected = Some(connected);
    }

    fn present(&mut self) {
        let line = self.face.status_line();
        if self.last_line.as_ref() == Some(&line) {
            return;
        }
        if let Err(e) = write!(self.out, "\r\x1b[2K{line}").and_then(|()| self.out.flush()) {
            warn!("Failed to draw the clock display: {e}");
        }
        self.last_line = Some(line);
    }

    fn dispose(&mut self) {
        if self.last_line.take().is_some() {
            if let Err(e) = writeln!(self.out).and_then(|()| self.out.flush()) {
                warn!("Failed to close the clock display: {e}");
            }
        }
    }
}
