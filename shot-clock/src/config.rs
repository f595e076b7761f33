use serde::{Deserialize, Serialize};
use std::path::PathBuf;
pub use scoreboard_common::config::ClockTiming;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Storage {
    /// Where snapshots are written, the platform data directory when unset
    pub storage_dir: Option<PathBuf>,
    pub snapshot_key: String,
}

impl Default for Storage {
    fn default() -> Self {
        Self {
            storage_dir: None,
            snapshot_key: "timerState".to_string(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub timing: ClockTiming,
    pub storage: Storage,
}
