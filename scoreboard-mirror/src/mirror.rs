use crate::{
    display_state::{ConnectionEvent, DisplayState, Reduction, apply_connection, reduce},
    network::FeedEvent,
    rest::{self, RestClient},
};
use futures::{FutureExt, future::BoxFuture};
use log::*;
use scoreboard_common::{
    display::DisplaySink,
    feed::{FeedMessage, MessageKind, StatePatch},
};
use std::future::Future;
use tokio::{select, sync::mpsc};

type Resync = BoxFuture<'static, rest::Result<StatePatch>>;

/// Folds feed events into a [`DisplayState`] and shows every change on
/// `display` until the events end or `shutdown` resolves.
///
/// With a `rest` client the full state is fetched after every successful
/// open, so a late joiner is not left blank until the next push. The fetch is
/// dropped as soon as the feed delivers anything, since the feed is newer.
pub async fn watch<D: DisplaySink, F: Future<Output = ()>>(
    mut events: mpsc::UnboundedReceiver<FeedEvent>,
    mut display: D,
    rest: Option<RestClient>,
    shutdown: F,
) -> (DisplayState, D) {
    tokio::pin!(shutdown);

    let mut state = DisplayState::default();
    let mut shown = state.clone();
    state.render(&mut display);
    let mut resync: Option<Resync> = None;

    loop {
        select! {
            event = events.recv() => {
                let Some(event) = event else {
                    info!("Feed events ended");
                    break;
                };
                match event {
                    FeedEvent::Opened => {
                        state = apply_connection(&state, ConnectionEvent::Opened);
                        if let Some(client) = &rest {
                            let client = client.clone();
                            resync = Some(async move { client.fetch_state().await }.boxed());
                        }
                    }
                    FeedEvent::Message(message) => {
                        if resync.take().is_some() {
                            debug!("Feed state arrived first, dropping the state fetch");
                        }
                        let Reduction {
                            state: next,
                            halt_local_timers,
                        } = reduce(&state, &message);
                        if halt_local_timers {
                            debug!("Server stopped the shot clock");
                        }
                        state = next;
                    }
                    FeedEvent::Closed { retry_in } => {
                        resync = None;
                        state = apply_connection(&state, ConnectionEvent::Closed);
                        match retry_in {
                            Some(delay) => info!("Feed lost, retrying in {delay:?}"),
                            None => warn!("Feed lost, no more retries"),
                        }
                    }
                    FeedEvent::TransportError(e) => {
                        debug!("Feed transport error: {e}");
                        state = apply_connection(&state, ConnectionEvent::Errored);
                    }
                    FeedEvent::DecodeError(e) => debug!("Skipped a feed message: {e}"),
                }
            }
            result = wait_for_resync(&mut resync) => {
                resync = None;
                match result {
                    Ok(patch) => {
                        debug!("Fetched full state");
                        let message = FeedMessage::new(MessageKind::StateSync, patch);
                        state = reduce(&state, &message).state;
                    }
                    Err(e) => warn!("Could not fetch the full state: {e}"),
                }
            }
            () = &mut shutdown => {
                info!("Stopping the mirror");
                break;
            }
        }

        if state != shown {
            state.render(&mut display);
            shown = state.clone();
        }
    }

    display.dispose();
    (state, display)
}

async fn wait_for_resync(resync: &mut Option<Resync>) -> rest::Result<StatePatch> {
    match resync {
        Some(fetch) => fetch.await,
        None => core::future::pending().await,
    }
}
