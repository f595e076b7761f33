use log::*;
use scoreboard_common::clock_time::{ClockKind, UnknownClock};
use std::str::FromStr;
use thiserror::Error;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt},
    sync::mpsc,
};

/// One line typed by the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    Toggle,
    ResetPossession,
    ResetMain,
    Edit(ClockKind),
    Save(ClockKind, String),
    Cancel(ClockKind),
    Set(ClockKind, String),
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Unknown command {0:?}")]
    Unknown(String),
    #[error("`{0}` needs a clock, `main` or `shot`")]
    MissingClock(&'static str),
    #[error("`{0}` needs a time to set the clock to")]
    MissingText(&'static str),
    #[error("Unexpected text after `{0}`")]
    Trailing(&'static str),
    #[error(transparent)]
    Clock(#[from] UnknownClock),
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(Self::Toggle);
        };

        let verb = verb.to_ascii_lowercase();
        let command = match verb.as_str() {
            "start" => Self::Start,
            "stop" => Self::Stop,
            "toggle" => Self::Toggle,
            "quit" | "exit" => Self::Quit,
            "reset" => match words.next() {
                None => Self::ResetPossession,
                Some(clock) => match clock.parse::<ClockKind>()? {
                    ClockKind::Main => Self::ResetMain,
                    ClockKind::Possession => Self::ResetPossession,
                },
            },
            "edit" => Self::Edit(clock_arg(&mut words, "edit")?),
            "cancel" => Self::Cancel(clock_arg(&mut words, "cancel")?),
            "save" => {
                let clock = clock_arg(&mut words, "save")?;
                Self::Save(clock, text_arg(&mut words, "save")?)
            }
            "set" => {
                let clock = clock_arg(&mut words, "set")?;
                Self::Set(clock, text_arg(&mut words, "set")?)
            }
            _ => return Err(CommandError::Unknown(line.trim().to_string())),
        };

        if words.next().is_some() {
            return Err(CommandError::Trailing(match command {
                Self::Start => "start",
                Self::Stop => "stop",
                Self::Toggle => "toggle",
                Self::Quit => "quit",
                Self::ResetMain | Self::ResetPossession => "reset",
                Self::Edit(_) => "edit",
                Self::Cancel(_) => "cancel",
                Self::Save(..) => "save",
                Self::Set(..) => "set",
            }));
        }
        Ok(command)
    }
}

fn clock_arg<'a>(
    words: &mut impl Iterator<Item = &'a str>,
    verb: &'static str,
) -> Result<ClockKind, CommandError> {
    Ok(words
        .next()
        .ok_or(CommandError::MissingClock(verb))?
        .parse::<ClockKind>()?)
}

fn text_arg<'a>(
    words: &mut impl Iterator<Item = &'a str>,
    verb: &'static str,
) -> Result<String, CommandError> {
    words
        .next()
        .map(str::to_string)
        .ok_or(CommandError::MissingText(verb))
}

/// Reads commands from `input` until it ends, `quit` is read, or the receiving
/// side goes away. Lines that don't parse are logged and skipped.
pub async fn read_commands<R>(input: R, tx: mpsc::Sender<Command>)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                info!("Operator input closed");
                break;
            }
            Err(e) => {
                error!("Failed to read operator input: {e}");
                break;
            }
        };
        match line.parse::<Command>() {
            Ok(command) => {
                let quit = command == Command::Quit;
                if tx.send(command).await.is_err() || quit {
                    break;
                }
            }
            Err(e) => warn!("{e}"),
        }
    }
}
