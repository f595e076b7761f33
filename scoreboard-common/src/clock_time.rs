use crate::tenths::*;
use serde::{Deserialize, Serialize};
use std::{str::FromStr, time::Duration};
use thiserror::Error;

/// Which of the two clocks an operation is aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClockKind {
    Main,
    Possession,
}

impl ClockKind {
    pub const ALL: [ClockKind; 2] = [ClockKind::Main, ClockKind::Possession];

    pub fn index(self) -> usize {
        match self {
            Self::Main => 0,
            Self::Possession => 1,
        }
    }
}

impl core::fmt::Display for ClockKind {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match *self {
            Self::Main => write!(f, "main clock"),
            Self::Possession => write!(f, "shot clock"),
        }
    }
}

impl FromStr for ClockKind {
    type Err = UnknownClock;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "main" | "game" | "timer" => Ok(Self::Main),
            "shot" | "possession" | "shotclock" => Ok(Self::Possession),
            _ => Err(UnknownClock(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown clock {0:?}, expected `main` or `shot`")]
pub struct UnknownClock(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClockTextError {
    #[error("{text:?} is not a valid {clock} time")]
    Format { clock: ClockKind, text: String },
    #[error("The {field} value {value} is out of range for the {clock}")]
    OutOfRange {
        clock: ClockKind,
        field: &'static str,
        value: u64,
    },
}

pub fn duration_from_tenths(tenths: u64) -> Duration {
    Duration::from_millis(tenths * MILLIS_PER_TENTH)
}

/// Whole tenths contained in `time`, truncating anything finer.
pub fn whole_tenths(time: Duration) -> u64 {
    (time.as_millis() / u128::from(MILLIS_PER_TENTH))
        .try_into()
        .unwrap_or(u64::MAX)
}

pub fn format_clock(clock: ClockKind, time: Duration) -> String {
    match clock {
        ClockKind::Main => format_main(time),
        ClockKind::Possession => format_possession(time),
    }
}

/// `MM:SS` rounded to the nearest second at or above one minute, `SS.T`
/// truncated below it.
pub fn format_main(time: Duration) -> String {
    if time < Duration::from_secs(60) {
        format_tenths_truncated(time)
    } else {
        let total_secs = (time.as_millis() + 500) / 1000;
        format!("{:02}:{:02}", total_secs / 60, total_secs % 60)
    }
}

pub fn format_possession(time: Duration) -> String {
    format_tenths_truncated(time)
}

fn format_tenths_truncated(time: Duration) -> String {
    let tenths = whole_tenths(time);
    format!(
        "{:02}.{}",
        tenths / TENTHS_PER_SEC,
        tenths % TENTHS_PER_SEC
    )
}

/// Main clock text as the server feed presents it: `m:ss`, no padding on the
/// minutes and the sub-second part dropped.
pub fn format_feed_main(tenths: i32) -> String {
    let total_secs = tenths.max(0) / 10;
    format!("{}:{:02}", total_secs / 60, total_secs % 60)
}

/// Shot clock text as the server feed presents it: `s.t`.
pub fn format_feed_possession(tenths: i32) -> String {
    let tenths = tenths.max(0);
    format!("{}.{}", tenths / 10, tenths % 10)
}

pub fn parse_clock(clock: ClockKind, text: &str) -> Result<Duration, ClockTextError> {
    match clock {
        ClockKind::Main => parse_main(text),
        ClockKind::Possession => parse_possession(text),
    }
}

/// Accepts `MM:SS`, `SS.T` (under a minute) or a bare number of seconds.
pub fn parse_main(text: &str) -> Result<Duration, ClockTextError> {
    const CLOCK: ClockKind = ClockKind::Main;
    let text = text.trim();

    if let Some((mins, secs)) = text.split_once(':') {
        let (Some(mins), Some(secs)) = (digits(mins, 1, 2), digits(secs, 2, 2)) else {
            return Err(format_error(CLOCK, text));
        };
        check_range(CLOCK, "seconds", secs, 59)?;
        return Ok(Duration::from_secs(mins * 60 + secs));
    }

    if let Some((secs, tenths)) = text.split_once('.') {
        let (Some(secs), Some(tenths)) = (digits(secs, 1, 2), digits(tenths, 1, 1)) else {
            return Err(format_error(CLOCK, text));
        };
        check_range(CLOCK, "seconds", secs, 59)?;
        return Ok(duration_from_tenths(secs * TENTHS_PER_SEC + tenths));
    }

    match digits(text, 1, 2) {
        Some(secs) => Ok(Duration::from_secs(secs)),
        None => Err(format_error(CLOCK, text)),
    }
}

/// Accepts `SS.T` or a bare number of seconds.
pub fn parse_possession(text: &str) -> Result<Duration, ClockTextError> {
    const CLOCK: ClockKind = ClockKind::Possession;
    let text = text.trim();

    if let Some((secs, tenths)) = text.split_once('.') {
        let (Some(secs), Some(tenths)) = (digits(secs, 1, 2), digits(tenths, 1, 1)) else {
            return Err(format_error(CLOCK, text));
        };
        check_range(CLOCK, "seconds", secs, MAX_EDITABLE_SECS)?;
        return Ok(duration_from_tenths(secs * TENTHS_PER_SEC + tenths));
    }

    match digits(text, 1, 2) {
        Some(secs) => Ok(Duration::from_secs(secs)),
        None => Err(format_error(CLOCK, text)),
    }
}

fn digits(text: &str, min_len: usize, max_len: usize) -> Option<u64> {
    if text.len() < min_len || text.len() > max_len || !text.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    text.parse().ok()
}

fn check_range(
    clock: ClockKind,
    field: &'static str,
    value: u64,
    max: u64,
) -> Result<(), ClockTextError> {
    if value > max {
        Err(ClockTextError::OutOfRange {
            clock,
            field,
            value,
        })
    } else {
        Ok(())
    }
}

fn format_error(clock: ClockKind, text: &str) -> ClockTextError {
    ClockTextError::Format {
        clock,
        text: text.to_string(),
    }
}
