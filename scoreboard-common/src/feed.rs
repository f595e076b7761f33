//! The wire contract of the scoreboard server's push feed.
//!
//! Every message is a JSON object `{ "type": <kind>, "data": <partial state> }`.
//! A single transport frame may carry one message or several separated by
//! newlines.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    StateSync,
    ScoreUpdate,
    TimerUpdate,
    FoulUpdate,
    ShotclockUpdate,
    GameReset,
}

impl MessageKind {
    pub const ALL: [MessageKind; 6] = [
        MessageKind::StateSync,
        MessageKind::ScoreUpdate,
        MessageKind::TimerUpdate,
        MessageKind::FoulUpdate,
        MessageKind::ShotclockUpdate,
        MessageKind::GameReset,
    ];

    pub fn from_wire(kind: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_wire() == kind)
    }

    pub fn as_wire(self) -> &'static str {
        match self {
            Self::StateSync => "state_sync",
            Self::ScoreUpdate => "score_update",
            Self::TimerUpdate => "timer_update",
            Self::FoulUpdate => "foul_update",
            Self::ShotclockUpdate => "shotclock_update",
            Self::GameReset => "game_reset",
        }
    }
}

impl core::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// Partial scoreboard state. Fields left as `None` are not touched when the
/// patch is merged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timer_tenths: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shot_clock_tenths: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_timer_running: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_shot_clock_running: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_a: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_b: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foul_a: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foul_b: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_a_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_b_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeedMessage {
    Known { kind: MessageKind, patch: StatePatch },
    Unrecognized(String),
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Malformed feed message: {0}")]
    Json(#[from] serde_json::Error),
    #[error("The payload of a {kind} message is not a state patch: {source}")]
    Payload {
        kind: MessageKind,
        source: serde_json::Error,
    },
}

#[derive(Deserialize)]
struct WireMessage {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

impl FeedMessage {
    pub fn new(kind: MessageKind, patch: StatePatch) -> Self {
        Self::Known { kind, patch }
    }

    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        let wire: WireMessage = serde_json::from_str(text)?;
        let Some(kind) = MessageKind::from_wire(&wire.kind) else {
            return Ok(Self::Unrecognized(wire.kind));
        };
        let patch = match wire.data {
            Value::Null => StatePatch::default(),
            data => serde_json::from_value(data)
                .map_err(|source| DecodeError::Payload { kind, source })?,
        };
        Ok(Self::Known { kind, patch })
    }

    /// Decodes every non-blank line of a transport frame independently, so one
    /// bad line does not take its neighbours down with it.
    pub fn decode_frame(frame: &str) -> Vec<Result<Self, DecodeError>> {
        frame
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(Self::decode)
            .collect()
    }

    pub fn kind(&self) -> Option<MessageKind> {
        match self {
            Self::Known { kind, .. } => Some(*kind),
            Self::Unrecognized(_) => None,
        }
    }
}
