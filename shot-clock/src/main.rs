use clap::Parser;
use log::*;
use scoreboard_common::{
    display::TerminalDisplay,
    logging::{LogArgs, init_logging},
};
use shot_clock::{
    clock_engine::ClockEngine, config::Config, console, persistence::FileStore, runner,
};
use std::{io, path::PathBuf};
use time::OffsetDateTime;
use tokio::{io::BufReader, runtime::Runtime, sync::mpsc};

const APP_NAME: &str = "shot-clock";
const COMMAND_CHANNEL_LEN: usize = 8;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[clap(long)]
    /// Directory to keep the clock snapshot in, overrides the config file
    storage_dir: Option<PathBuf>,

    #[clap(long)]
    /// Name of the snapshot to restore from and save to, overrides the config file
    snapshot_key: Option<String>,

    #[clap(flatten)]
    log: LogArgs,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Cli::parse();

    let log_path = init_logging(APP_NAME, &args.log)?;
    #[cfg(debug_assertions)]
    println!("Log path: {}", log_path.display());
    info!("Starting {APP_NAME} v{}", env!("CARGO_PKG_VERSION"));

    info!(
        "Reading config file from {:?}",
        confy::get_configuration_file_path(APP_NAME, None)?
    );
    let config: Config = match confy::load(APP_NAME, None) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read config file, overwriting with default. Error: {e}");
            let config = Config::default();
            confy::store(APP_NAME, None, &config)?;
            config
        }
    };
    debug!("Using config {config:?}");

    let store = match args.storage_dir.or(config.storage.storage_dir) {
        Some(dir) => FileStore::new(dir),
        None => FileStore::in_data_dir(APP_NAME)?,
    };
    info!("Keeping clock snapshots in {}", store.dir().display());
    let snapshot_key = args.snapshot_key.unwrap_or(config.storage.snapshot_key);
    let timing = config.timing.sanitized();

    let runtime = Runtime::new()?;
    runtime.block_on(async move {
        let engine = ClockEngine::new(
            timing,
            Box::new(store),
            snapshot_key,
            OffsetDateTime::now_utc(),
        );

        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_LEN);
        tokio::spawn(console::read_commands(
            BufReader::new(tokio::io::stdin()),
            tx,
        ));

        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Unable to listen for ctrl-c: {e}");
                std::future::pending::<()>().await;
            }
        };

        runner::run(engine, TerminalDisplay::new(io::stdout()), rx, shutdown).await;
    });

    // The stdin reader may be parked in a blocking read forever
    runtime.shutdown_background();
    info!("Exiting");
    Ok(())
}
