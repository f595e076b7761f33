use clap::{Parser, Subcommand};
use log::*;
use scoreboard_common::{
    display::TerminalDisplay,
    logging::{LogArgs, init_logging},
};
use scoreboard_mirror::{
    config::AppConfig,
    mirror,
    network::{FeedClient, FeedSettings, WsConnector},
    rest::{RemoteCommand, RestClient},
};
use std::{error::Error, io};
use tokio::runtime::Runtime;

const APP_NAME: &str = "scoreboard-mirror";

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[clap(long)]
    /// Base URL of the scoreboard server, overrides the config file
    server_url: Option<String>,

    #[clap(subcommand)]
    command: Option<Action>,

    #[clap(flatten)]
    log: LogArgs,
}

#[derive(Subcommand, Debug, Clone)]
enum Action {
    /// Mirror the live clocks in the terminal (the default)
    Watch,
    /// Print the server's change log
    Log,
    /// Send a clock command, e.g. `shot reset` or `main set 10:00`
    Command {
        #[clap(required = true, num_args = 1..)]
        words: Vec<String>,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Cli::parse();

    let log_path = init_logging(APP_NAME, &args.log)?;
    #[cfg(debug_assertions)]
    println!("Log path: {}", log_path.display());
    info!("Starting {APP_NAME} v{}", env!("CARGO_PKG_VERSION"));

    info!(
        "Reading config file from {:?}",
        confy::get_configuration_file_path(APP_NAME, None)?
    );
    let mut config: AppConfig = match confy::load(APP_NAME, None) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read config file, overwriting with default. Error: {e}");
            let config = AppConfig::default();
            confy::store(APP_NAME, None, &config)?;
            config
        }
    };
    if let Some(url) = args.server_url {
        config.server_url = url;
    }
    debug!("Using config {config:?}");

    let runtime = Runtime::new()?;
    let result = match args.command.unwrap_or(Action::Watch) {
        Action::Watch => runtime.block_on(watch_feed(config)),
        Action::Log => runtime.block_on(print_log(config)),
        Action::Command { words } => runtime.block_on(send_command(config, &words.join(" "))),
    };
    if let Err(e) = &result {
        error!("{e}");
    }
    info!("Exiting");
    result
}

async fn watch_feed(config: AppConfig) -> Result<(), Box<dyn Error>> {
    let url = config.feed_url()?;
    info!("Mirroring the feed at {url}");

    let rest = if config.fetch_state_on_open {
        Some(RestClient::new(config.api_base(), config.connect_timeout())?)
    } else {
        None
    };
    let settings = FeedSettings {
        backoff: (&config.reconnect).into(),
        connect_timeout: config.connect_timeout(),
    };
    let (client, events) = FeedClient::spawn(WsConnector::new(url), settings);
    client.connect();

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Unable to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };
    let (state, _) = mirror::watch(events, TerminalDisplay::new(io::stdout()), rest, shutdown).await;
    client.disconnect();
    println!("{}", state.score_line());

    Ok(())
}

async fn print_log(config: AppConfig) -> Result<(), Box<dyn Error>> {
    let client = RestClient::new(config.api_base(), config.connect_timeout())?;
    let entries = client.fetch_log().await?;
    if entries.is_empty() {
        println!("The change log is empty");
    }
    for entry in entries {
        println!("{entry}");
    }
    Ok(())
}

async fn send_command(config: AppConfig, words: &str) -> Result<(), Box<dyn Error>> {
    let command: RemoteCommand = words.parse()?;
    let client = RestClient::new(config.api_base(), config.connect_timeout())?;
    client.send(&command).await?;
    println!("Sent {}", command.path());
    Ok(())
}
