use log::*;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};
use thiserror::Error;
use time::OffsetDateTime;

/// A string keyed slot that outlives the process. Failures are logged by the
/// implementation and never surface to the clocks.
pub trait SnapshotStore {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&mut self, key: &str, value: String);
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Could not find a directory to store clock snapshots")]
    NoDataDir,
    #[error("Snapshot key {0:?} is not usable as a file name")]
    BadKey(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Keeps each key in its own JSON file.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn in_data_dir(app_name: &str) -> Result<Self, StoreError> {
        let dirs = directories::ProjectDirs::from("", "", app_name).ok_or(StoreError::NoDataDir)?;
        Ok(Self::new(dirs.data_local_dir().to_path_buf()))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            return Err(StoreError::BadKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }

    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.path_for(key)?) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir)?;
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, value)?;
        fs::rename(&staging, &path)?;
        Ok(())
    }
}

impl SnapshotStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.read(key).unwrap_or_else(|e| {
            warn!("Failed to read snapshot {key:?}: {e}");
            None
        })
    }

    fn set(&mut self, key: &str, value: String) {
        if let Err(e) = self.write(key, &value) {
            error!("Failed to save snapshot {key:?}: {e}");
        }
    }
}

/// Shares its contents between clones, so a test can keep a handle while the
/// engine owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    slots: Arc<Mutex<HashMap<String, String>>>,
}

impl SnapshotStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&mut self, key: &str, value: String) {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
    }
}

/// What gets written on every save. Clock values are seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSnapshot {
    #[serde(default)]
    pub main_clock: Option<f64>,
    #[serde(default)]
    pub possession_clock: Option<f64>,
    #[serde(default)]
    pub running: bool,
    #[serde(default)]
    pub saved_at: Option<OffsetDateTime>,
}

impl PersistedSnapshot {
    pub fn capture(
        main: Duration,
        possession: Duration,
        running: bool,
        now: OffsetDateTime,
    ) -> Self {
        Self {
            main_clock: Some(main.as_secs_f64()),
            possession_clock: Some(possession.as_secs_f64()),
            running,
            saved_at: Some(now),
        }
    }

    pub fn from_json(text: &str) -> Option<Self> {
        match serde_json::from_str(text) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!("Ignoring unreadable clock snapshot: {e}");
                None
            }
        }
    }

    pub fn to_json(&self) -> Option<String> {
        serde_json::to_string(self)
            .inspect_err(|e| error!("Failed to serialize clock snapshot: {e}"))
            .ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoredClocks {
    pub main: Duration,
    pub possession: Duration,
    pub resume: bool,
}

/// Whole milliseconds, negative values floored at zero.
fn secs_to_duration(secs: Option<f64>) -> Option<Duration> {
    let millis = (secs? * 1000.0).round();
    millis
        .is_finite()
        .then(|| Duration::from_millis(millis.max(0.0) as u64))
}

/// Rebuilds both clocks from a snapshot, replaying the time that passed while
/// nothing was running. The shot clock is assumed to have been reset every time
/// it ran out, while the main clock simply keeps counting down.
pub fn restore_clocks(
    snapshot: Option<&PersistedSnapshot>,
    period_length: Duration,
    possession_period: Duration,
    now: OffsetDateTime,
) -> RestoredClocks {
    let Some(snapshot) = snapshot else {
        return RestoredClocks {
            main: period_length,
            possession: possession_period,
            resume: false,
        };
    };

    let mut main = secs_to_duration(snapshot.main_clock).unwrap_or(period_length);
    let mut possession = secs_to_duration(snapshot.possession_clock).unwrap_or(possession_period);

    if snapshot.running {
        let elapsed = snapshot
            .saved_at
            .and_then(|saved_at| Duration::try_from(now - saved_at).ok())
            .unwrap_or(Duration::ZERO);
        debug!("Replaying {elapsed:?} of downtime");

        main = main.saturating_sub(elapsed);
        possession = catch_up_possession(possession, possession_period, elapsed);
    }

    RestoredClocks {
        main,
        possession,
        resume: snapshot.running && !main.is_zero(),
    }
}

fn catch_up_possession(possession: Duration, period: Duration, elapsed: Duration) -> Duration {
    if period.is_zero() {
        return Duration::ZERO;
    }
    let period_ns = period.as_nanos();
    let cycle = elapsed.as_nanos() % period_ns;
    let remaining = possession.as_nanos();
    if cycle < remaining {
        possession - Duration::from_nanos(cycle as u64)
    } else {
        let deficit = (cycle - remaining) % period_ns;
        Duration::from_nanos((period_ns - deficit) as u64)
    }
}
