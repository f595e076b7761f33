//! Client for the scoreboard server's HTTP API.

use log::*;
use reqwest::{Client, ClientBuilder, Method, Response, StatusCode};
use scoreboard_common::{
    clock_time::{ClockKind, ClockTextError, UnknownClock, parse_clock, whole_tenths},
    feed::StatePatch,
};
use serde::Deserialize;
use serde_json::json;
use std::{str::FromStr, time::Duration};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RestError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("The server answered {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error(transparent)]
    ClockText(#[from] ClockTextError),
}

pub type Result<T> = std::result::Result<T, RestError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockAction {
    Start,
    Stop,
    Reset,
}

impl ClockAction {
    fn as_path(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Reset => "reset",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown clock action {0:?}, expected start, stop or reset")]
pub struct UnknownAction(pub String);

impl FromStr for ClockAction {
    type Err = UnknownAction;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            "reset" => Ok(Self::Reset),
            _ => Err(UnknownAction(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCommand {
    Clock(ClockKind, ClockAction),
    /// `time` is already in the server's format for `clock`
    SetClock {
        clock: ClockKind,
        time: String,
    },
    ResetGame,
    SyncState,
}

impl RemoteCommand {
    /// Checks `text` the same way the local clock editor does, then rewrites
    /// it in the form the server expects (`M:SS` or `S.T`).
    pub fn set_clock(clock: ClockKind, text: &str) -> std::result::Result<Self, ClockTextError> {
        let time = parse_clock(clock, text)?;
        let time = match clock {
            ClockKind::Main => {
                let secs = time.as_secs();
                format!("{}:{:02}", secs / 60, secs % 60)
            }
            ClockKind::Possession => {
                let tenths = whole_tenths(time);
                format!("{}.{}", tenths / 10, tenths % 10)
            }
        };
        Ok(Self::SetClock { clock, time })
    }

    pub fn path(&self) -> String {
        fn clock_path(clock: ClockKind) -> &'static str {
            match clock {
                ClockKind::Main => "timer",
                ClockKind::Possession => "shotclock",
            }
        }

        match self {
            Self::Clock(clock, action) => {
                format!("/api/{}/{}", clock_path(*clock), action.as_path())
            }
            Self::SetClock { clock, .. } => format!("/api/{}/set", clock_path(*clock)),
            Self::ResetGame => "/api/game/reset".to_string(),
            Self::SyncState => "/api/state/sync".to_string(),
        }
    }

    pub fn body(&self) -> Option<serde_json::Value> {
        match self {
            Self::SetClock { time, .. } => Some(json!({ "time": time })),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandWordsError {
    #[error("Unrecognized command {0:?}")]
    Unknown(String),
    #[error("`set` needs a time")]
    MissingTime,
    #[error(transparent)]
    Clock(#[from] UnknownClock),
    #[error(transparent)]
    Action(#[from] UnknownAction),
    #[error(transparent)]
    Time(#[from] ClockTextError),
}

/// Reads `<main|shot> <start|stop|reset>`, `<main|shot> set <time>`,
/// `game reset` or `state sync`.
impl FromStr for RemoteCommand {
    type Err = CommandWordsError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        let words: Vec<&str> = lowered.split_whitespace().collect();
        match words.as_slice() {
            ["game", "reset"] => Ok(Self::ResetGame),
            ["state", "sync"] | ["sync"] => Ok(Self::SyncState),
            [clock, "set", time] => Ok(Self::set_clock(clock.parse()?, time)?),
            [_, "set"] => Err(CommandWordsError::MissingTime),
            [clock, action] => Ok(Self::Clock(clock.parse()?, action.parse()?)),
            _ => Err(CommandWordsError::Unknown(s.trim().to_string())),
        }
    }
}

/// One line of the server's change log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEntry {
    Change {
        clock: String,
        field: String,
        value: String,
    },
    /// A line that does not follow the `<clock> | <field> changed to <value>` shape
    Raw(String),
}

impl LogEntry {
    pub fn parse(line: &str) -> Self {
        if let Some((clock, rest)) = line.split_once(" | ") {
            if let Some((field, value)) = rest.split_once(" changed to ") {
                return Self::Change {
                    clock: clock.trim().to_string(),
                    field: field.trim().to_string(),
                    value: value.trim().to_string(),
                };
            }
        }
        Self::Raw(line.to_string())
    }
}

impl core::fmt::Display for LogEntry {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            Self::Change {
                clock,
                field,
                value,
            } => write!(f, "{clock:>7}  {field:<18} {value}"),
            Self::Raw(line) => f.write_str(line),
        }
    }
}

#[derive(Deserialize)]
struct LogBody {
    #[serde(default)]
    log: Vec<String>,
}

#[derive(Clone)]
pub struct RestClient {
    base_url: String,
    client: Client,
}

impl RestClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = ClientBuilder::new().timeout(timeout).build()?;
        Ok(Self::with_client(base_url, client))
    }

    /// Uses an already configured `reqwest` client, e.g. one with custom proxy
    /// or TLS settings.
    pub fn with_client(base_url: &str, client: Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    pub async fn fetch_state(&self) -> Result<StatePatch> {
        let response = self.request(Method::GET, "/api/state", None).await?;
        Ok(response.json().await?)
    }

    pub async fn fetch_log(&self) -> Result<Vec<LogEntry>> {
        let response = self.request(Method::GET, "/api/log", None).await?;
        let body: LogBody = response.json().await?;
        Ok(body
            .log
            .iter()
            .filter(|line| !line.trim().is_empty())
            .map(|line| LogEntry::parse(line))
            .collect())
    }

    pub async fn send(&self, command: &RemoteCommand) -> Result<()> {
        info!("Sending {command:?}");
        self.request(Method::POST, &command.path(), command.body())
            .await?;
        Ok(())
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<Response> {
        let url = format!("{}{path}", self.base_url);
        debug!("{method} {url}");
        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            warn!("Request to {url} failed with {status}: {body}");
            Err(RestError::Status { status, body })
        }
    }
}
