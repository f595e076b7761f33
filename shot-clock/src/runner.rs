use crate::{
    clock_engine::{ClockEngine, ClockSnapshot, EditOutcome},
    console::Command,
};
use log::*;
use scoreboard_common::{
    clock_time::{ClockKind, ClockTextError},
    display::DisplaySink,
};
use std::future::Future;
use time::OffsetDateTime;
use tokio::{
    select,
    sync::mpsc,
    time::{MissedTickBehavior, interval},
};

fn wall_clock() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

/// Drives `engine` until `quit` is received or `shutdown` resolves, then saves
/// a final snapshot and releases the display.
pub async fn run<D, F>(
    mut engine: ClockEngine,
    mut display: D,
    mut commands: mpsc::Receiver<Command>,
    shutdown: F,
) -> (ClockEngine, D)
where
    D: DisplaySink,
    F: Future<Output = ()>,
{
    let timing = engine.timing().clone();

    let mut ticker = interval(timing.tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);
    ticker.reset();
    let mut autosave = interval(timing.autosave_interval);
    autosave.set_missed_tick_behavior(MissedTickBehavior::Delay);
    autosave.reset();

    tokio::pin!(shutdown);

    let mut commands_open = true;
    let mut was_running = engine.is_running();
    let mut shown = None;
    show(engine.snapshot(), &mut display, &mut shown);

    loop {
        select! {
            _ = ticker.tick(), if engine.is_running() => {
                engine.tick();
            }
            _ = autosave.tick() => {
                engine.persist(wall_clock());
            }
            command = commands.recv(), if commands_open => match command {
                Some(Command::Quit) => {
                    info!("Quit requested");
                    break;
                }
                Some(command) => {
                    if let Err(e) = apply(&mut engine, command, wall_clock()) {
                        eprintln!("\n{e}");
                    }
                }
                None => {
                    debug!("Command channel closed, waiting for shutdown");
                    commands_open = false;
                }
            },
            () = &mut shutdown => {
                info!("Shutdown requested");
                break;
            }
        }

        // Count a full period from the moment the clocks start
        if engine.is_running() && !was_running {
            ticker.reset();
        }
        was_running = engine.is_running();

        show(engine.snapshot(), &mut display, &mut shown);
    }

    engine.persist(wall_clock());
    display.dispose();
    (engine, display)
}

/// Errors are returned only for commands whose caller asked for a result.
pub fn apply(
    engine: &mut ClockEngine,
    command: Command,
    now: OffsetDateTime,
) -> Result<(), ClockTextError> {
    match command {
        Command::Start => {
            engine.start();
        }
        Command::Stop => {
            engine.stop();
        }
        Command::Toggle => {
            engine.toggle();
        }
        Command::ResetPossession => engine.reset_possession(now),
        Command::ResetMain => engine.reset_main(now),
        Command::Edit(clock) => engine.enter_edit(clock),
        Command::Cancel(clock) => {
            engine.cancel_edit(clock);
        }
        Command::Save(clock, text) => {
            if engine.save_edit(clock, &text, now) == EditOutcome::NotEditing {
                debug!("Ignoring save, the {clock} is not being edited");
            }
        }
        Command::Set(clock, text) => {
            engine.set(clock, &text, now)?;
        }
        Command::Quit => {}
    }
    Ok(())
}

fn show<D: DisplaySink>(
    snapshot: ClockSnapshot,
    display: &mut D,
    shown: &mut Option<ClockSnapshot>,
) {
    if shown.as_ref() == Some(&snapshot) {
        return;
    }
    for clock in ClockKind::ALL {
        display.render_clock(clock, &snapshot.text(clock));
        display.render_expired(clock, snapshot.expired[clock.index()]);
    }
    display.present();
    *shown = Some(snapshot);
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::persistence::{MemoryStore, PersistedSnapshot, SnapshotStore};
    use scoreboard_common::{config::ClockTiming, display::ClockFace};
    use std::{sync::Once, time::Duration};
    use tokio::{sync::oneshot, time::sleep};

    static INIT: Once = Once::new();

    fn initialize() {
        INIT.call_once(|| {
            let _ = env_logger::builder().is_test(true).try_init();
        });
    }

    const KEY: &str = "timerState";

    #[derive(Debug, Default)]
    struct RecordingDisplay {
        face: ClockFace,
        frames: Vec<ClockFace>,
        disposed: bool,
    }

    impl DisplaySink for RecordingDisplay {
        fn render_clock(&mut self, clock: ClockKind, text: &str) {
            self.face.texts[clock.index()] = text.to_string();
        }

        fn render_expired(&mut self, clock: ClockKind, expired: bool) {
            self.face.expired[clock.index()] = expired;
        }

        fn present(&mut self) {
            self.frames.push(self.face.clone());
        }

        fn dispose(&mut self) {
            self.disposed = true;
        }
    }

    fn engine_with(store: &MemoryStore) -> ClockEngine {
        initialize();
        ClockEngine::new(
            ClockTiming::default(),
            Box::new(store.clone()),
            KEY,
            OffsetDateTime::now_utc(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_in_real_time() {
        let store = MemoryStore::default();
        let (tx, rx) = mpsc::channel(8);
        let runner = tokio::spawn(run(
            engine_with(&store),
            RecordingDisplay::default(),
            rx,
            std::future::pending(),
        ));

        tx.send(Command::Start).await.unwrap();
        sleep(Duration::from_millis(1_050)).await;
        tx.send(Command::Stop).await.unwrap();
        tx.send(Command::Quit).await.unwrap();

        let (engine, display) = runner.await.unwrap();
        assert_eq!(engine.clock_time(ClockKind::Main), Duration::from_secs(599));
        assert_eq!(
            engine.clock_time(ClockKind::Possession),
            Duration::from_secs(11)
        );
        assert!(display.disposed);
        assert_eq!(display.frames.first().unwrap().texts[1], "12.0");
        assert_eq!(display.frames.last().unwrap().texts[1], "11.0");

        let saved = PersistedSnapshot::from_json(&store.get(KEY).unwrap()).unwrap();
        assert_eq!(saved.main_clock, Some(599.0));
        assert!(!saved.running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_intervals_from_config_still_run() {
        initialize();
        let store = MemoryStore::default();
        let timing: ClockTiming = toml::from_str(
            r#"period_length = 600.0
possession_period = 12.0
tick_interval = 0
autosave_interval = 0
"#,
        )
        .unwrap();
        let engine = ClockEngine::new(
            timing,
            Box::new(store.clone()),
            KEY,
            OffsetDateTime::now_utc(),
        );
        let (tx, rx) = mpsc::channel(8);
        let runner = tokio::spawn(run(
            engine,
            RecordingDisplay::default(),
            rx,
            std::future::pending(),
        ));

        tx.send(Command::Start).await.unwrap();
        sleep(Duration::from_millis(1_050)).await;
        tx.send(Command::Quit).await.unwrap();

        let (engine, _) = runner.await.unwrap();
        assert_eq!(engine.clock_time(ClockKind::Main), Duration::from_secs(599));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_stops_ticking() {
        let store = MemoryStore::default();
        let (tx, rx) = mpsc::channel(8);
        let runner = tokio::spawn(run(
            engine_with(&store),
            RecordingDisplay::default(),
            rx,
            std::future::pending(),
        ));

        tx.send(Command::Set(ClockKind::Possession, "00.5".to_string()))
            .await
            .unwrap();
        tx.send(Command::Start).await.unwrap();
        sleep(Duration::from_secs(2)).await;
        tx.send(Command::Quit).await.unwrap();

        let (engine, display) = runner.await.unwrap();
        assert!(!engine.is_running());
        assert!(engine.is_expired(ClockKind::Possession));
        assert_eq!(
            engine.clock_time(ClockKind::Main),
            Duration::from_millis(599_500)
        );
        let last = display.frames.last().unwrap();
        assert_eq!(last.texts, ["10:00".to_string(), "00.0".to_string()]);
        assert_eq!(last.expired, [false, true]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_saves_running_state() {
        let store = MemoryStore::default();
        let (tx, rx) = mpsc::channel(8);
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let runner = tokio::spawn(run(
            engine_with(&store),
            RecordingDisplay::default(),
            rx,
            async move {
                let _ = stop_rx.await;
            },
        ));

        tx.send(Command::Start).await.unwrap();
        sleep(Duration::from_millis(550)).await;
        stop_tx.send(()).unwrap();

        let (engine, _) = runner.await.unwrap();
        assert!(engine.is_running());
        let saved = PersistedSnapshot::from_json(&store.get(KEY).unwrap()).unwrap();
        assert!(saved.running);
        assert_eq!(saved.main_clock, Some(599.5));

        // A restart picks the countdown back up
        let restarted = engine_with(&store);
        assert!(restarted.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_input_keeps_clock_running() {
        let store = MemoryStore::default();
        let (tx, rx) = mpsc::channel(8);
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let runner = tokio::spawn(run(
            engine_with(&store),
            RecordingDisplay::default(),
            rx,
            async move {
                let _ = stop_rx.await;
            },
        ));

        tx.send(Command::Start).await.unwrap();
        drop(tx);
        sleep(Duration::from_millis(2_050)).await;
        stop_tx.send(()).unwrap();

        let (engine, _) = runner.await.unwrap();
        assert_eq!(engine.clock_time(ClockKind::Main), Duration::from_secs(598));
    }

    #[test]
    fn test_apply_reports_bad_set() {
        let store = MemoryStore::default();
        let mut engine = engine_with(&store);
        let now = OffsetDateTime::now_utc();

        assert!(apply(&mut engine, Command::Set(ClockKind::Main, "1:5".to_string()), now).is_err());
        assert_eq!(engine.clock_time(ClockKind::Main), Duration::from_secs(600));
        assert!(!engine.is_editing(ClockKind::Main));

        apply(&mut engine, Command::Edit(ClockKind::Possession), now).unwrap();
        apply(&mut engine, Command::Start, now).unwrap();
        assert!(!engine.is_running());
        apply(
            &mut engine,
            Command::Save(ClockKind::Possession, "07.3".to_string()),
            now,
        )
        .unwrap();
        assert_eq!(
            engine.clock_time(ClockKind::Possession),
            Duration::from_millis(7_300)
        );
        apply(&mut engine, Command::ResetMain, now).unwrap();
        apply(&mut engine, Command::Toggle, now).unwrap();
        assert!(engine.is_running());
    }
}
