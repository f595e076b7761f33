use crate::backoff::{BackoffPolicy, ConnectionAttemptState};
use futures::{FutureExt, SinkExt, StreamExt, future::BoxFuture, stream::BoxStream};
use log::*;
use scoreboard_common::feed::{DecodeError, FeedMessage};
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};
use thiserror::Error;
use tokio::{
    select,
    sync::{mpsc, watch},
    task::{self, JoinHandle},
    time::{Instant, Sleep, sleep_until, timeout},
};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{self, Message},
};

/// Text frames as they arrive from the server. The stream ending means the
/// server closed the connection.
pub type FrameStream = BoxStream<'static, Result<String, FeedError>>;

/// Sends the close handshake on an open transport.
pub type CloseHandshake = BoxFuture<'static, Result<(), FeedError>>;

type ConnectAttempt = BoxFuture<'static, Result<FeedConnection, FeedError>>;

const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// An open transport: what the server sends, and how to hang up politely.
pub struct FeedConnection {
    pub frames: FrameStream,
    pub close: CloseHandshake,
}

/// Opens a transport to the feed.
pub trait Connector: Send + Sync + 'static {
    fn connect(&self) -> BoxFuture<'static, Result<FeedConnection, FeedError>>;
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error(transparent)]
    WebSocket(#[from] Box<tungstenite::Error>),
    #[error("The feed did not open within {0:?}")]
    ConnectTimeout(Duration),
    #[error("{0}")]
    Transport(String),
}

impl From<tungstenite::Error> for FeedError {
    fn from(e: tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(e))
    }
}

#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl Connector for WsConnector {
    fn connect(&self) -> BoxFuture<'static, Result<FeedConnection, FeedError>> {
        let url = self.url.clone();
        async move {
            debug!("Opening feed at {url}");
            let (socket, _) = connect_async(url.as_str()).await?;
            let (mut sink, stream) = socket.split();
            let frames = stream.filter_map(|message| async move {
                match message {
                    Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
                    Ok(Message::Close(frame)) => {
                        debug!("Server closed the feed: {frame:?}");
                        None
                    }
                    Ok(_) => None,
                    Err(e) => Some(Err(FeedError::from(e))),
                }
            });
            let close = async move { sink.close().await.map_err(FeedError::from) }.boxed();
            Ok(FeedConnection {
                frames: frames.boxed(),
                close,
            })
        }
        .boxed()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Closed,
}

impl core::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Connecting => write!(f, "connecting"),
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

#[derive(Debug)]
pub enum FeedEvent {
    Opened,
    Message(FeedMessage),
    /// `retry_in` is `None` once reconnecting has stopped
    Closed { retry_in: Option<Duration> },
    TransportError(FeedError),
    DecodeError(DecodeError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedSettings {
    pub backoff: BackoffPolicy,
    pub connect_timeout: Duration,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            backoff: Default::default(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug)]
enum ClientCommand {
    Connect,
    Disconnect,
    Stop,
}

/// Handle to the task that keeps the feed connected. Dropping it stops the
/// task and closes the transport.
#[derive(Debug)]
pub struct FeedClient {
    tx: mpsc::UnboundedSender<ClientCommand>,
    state: watch::Receiver<ConnectionState>,
    join: JoinHandle<()>,
}

impl FeedClient {
    pub fn spawn<C: Connector>(
        connector: C,
        settings: FeedSettings,
    ) -> (Self, mpsc::UnboundedReceiver<FeedEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(ConnectionState::Idle);

        let worker = Worker {
            connector,
            settings,
            attempts: Default::default(),
            state_tx,
            events: events_tx,
        };
        let join = task::spawn(worker.run_loop(rx));

        (Self { tx, state, join }, events_rx)
    }

    pub fn connect(&self) {
        self.send(ClientCommand::Connect);
    }

    pub fn disconnect(&self) {
        self.send(ClientCommand::Disconnect);
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    fn send(&self, command: ClientCommand) {
        if self.tx.send(command).is_err() {
            error!("The feed worker has stopped");
        }
    }
}

impl Drop for FeedClient {
    fn drop(&mut self) {
        if self.tx.send(ClientCommand::Stop).is_err() {
            self.join.abort();
        }
    }
}

struct Worker<C> {
    connector: C,
    settings: FeedSettings,
    attempts: ConnectionAttemptState,
    state_tx: watch::Sender<ConnectionState>,
    events: mpsc::UnboundedSender<FeedEvent>,
}

impl<C: Connector> Worker<C> {
    async fn run_loop(mut self, mut commands: mpsc::UnboundedReceiver<ClientCommand>) {
        let mut attempt: Option<ConnectAttempt> = None;
        let mut frames: Option<FrameStream> = None;
        let mut closer: Option<CloseHandshake> = None;
        let mut retry_at: Option<Instant> = None;

        loop {
            let retry = match retry_at {
                Some(time) => RetryTimer::At(Box::pin(sleep_until(time))),
                None => RetryTimer::Never(core::future::pending()),
            };

            select! {
                command = commands.recv() => match command {
                    Some(ClientCommand::Connect) => match self.state() {
                        ConnectionState::Connecting | ConnectionState::Open => {
                            debug!("Feed is already {}, ignoring connect", self.state());
                        }
                        ConnectionState::Idle | ConnectionState::Closed => {
                            self.attempts = Default::default();
                            retry_at = None;
                            attempt = Some(self.begin_attempt());
                        }
                    },
                    Some(ClientCommand::Disconnect) => {
                        retry_at = None;
                        attempt = None;
                        frames = None;
                        if let Some(close) = closer.take() {
                            close_transport(close).await;
                        }
                        if matches!(
                            self.state(),
                            ConnectionState::Connecting | ConnectionState::Open
                        ) {
                            info!("Disconnecting from the feed");
                            self.set_state(ConnectionState::Closed);
                            self.emit(FeedEvent::Closed { retry_in: None });
                        }
                    }
                    Some(ClientCommand::Stop) | None => {
                        frames = None;
                        if let Some(close) = closer.take() {
                            close_transport(close).await;
                        }
                        break;
                    }
                },
                result = wait_for_attempt(&mut attempt) => {
                    attempt = None;
                    match result {
                        Ok(connection) => {
                            info!("Feed connected");
                            self.attempts.on_open();
                            frames = Some(connection.frames);
                            closer = Some(connection.close);
                            self.set_state(ConnectionState::Open);
                            self.emit(FeedEvent::Opened);
                        }
                        Err(e) => retry_at = self.connection_lost(Some(e)),
                    }
                }
                frame = next_frame(&mut frames) => match frame {
                    Some(Ok(text)) => self.dispatch(&text),
                    Some(Err(e)) => {
                        frames = None;
                        closer = None;
                        retry_at = self.connection_lost(Some(e));
                    }
                    None => {
                        frames = None;
                        closer = None;
                        retry_at = self.connection_lost(None);
                    }
                },
                () = retry => {
                    retry_at = None;
                    attempt = Some(self.begin_attempt());
                }
            }
        }

        debug!("Feed worker stopped");
    }

    fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
    }

    fn emit(&self, event: FeedEvent) {
        // Nobody listening is not an error for the connection itself
        let _ = self.events.send(event);
    }

    fn begin_attempt(&self) -> ConnectAttempt {
        debug!(
            "Starting feed connection attempt (failures so far: {})",
            self.attempts.attempt_count
        );
        self.set_state(ConnectionState::Connecting);
        let limit = self.settings.connect_timeout;
        let connecting = self.connector.connect();
        async move {
            timeout(limit, connecting)
                .await
                .unwrap_or(Err(FeedError::ConnectTimeout(limit)))
        }
        .boxed()
    }

    /// Returns when to try again, if at all.
    fn connection_lost(&mut self, error: Option<FeedError>) -> Option<Instant> {
        match error {
            Some(e) => {
                warn!("Feed connection failed: {e}");
                self.emit(FeedEvent::TransportError(e));
            }
            None => info!("Feed closed by the server"),
        }

        let retry_in = self.attempts.on_failure(&self.settings.backoff);
        self.set_state(ConnectionState::Closed);
        self.emit(FeedEvent::Closed { retry_in });

        match retry_in {
            Some(delay) => {
                info!(
                    "Reconnecting in {delay:?} (attempt {} of {})",
                    self.attempts.attempt_count, self.settings.backoff.max_attempts
                );
                Some(Instant::now() + delay)
            }
            None => {
                error!("Giving up on the feed, connect again to retry");
                None
            }
        }
    }

    fn dispatch(&self, frame: &str) {
        for decoded in FeedMessage::decode_frame(frame) {
            match decoded {
                Ok(message) => {
                    trace!("Feed message: {message:?}");
                    self.emit(FeedEvent::Message(message));
                }
                Err(e) => {
                    warn!("Dropping feed message: {e}");
                    self.emit(FeedEvent::DecodeError(e));
                }
            }
        }
    }
}

async fn wait_for_attempt(
    attempt: &mut Option<ConnectAttempt>,
) -> Result<FeedConnection, FeedError> {
    match attempt {
        Some(connecting) => connecting.await,
        None => core::future::pending().await,
    }
}

async fn close_transport(close: CloseHandshake) {
    match timeout(CLOSE_TIMEOUT, close).await {
        Ok(Ok(())) => debug!("Feed closed cleanly"),
        Ok(Err(e)) => debug!("Feed close handshake failed: {e}"),
        Err(_) => debug!("Feed close handshake timed out after {CLOSE_TIMEOUT:?}"),
    }
}

async fn next_frame(frames: &mut Option<FrameStream>) -> Option<Result<String, FeedError>> {
    match frames {
        Some(stream) => stream.next().await,
        None => core::future::pending().await,
    }
}

enum RetryTimer {
    Never(core::future::Pending<()>),
    At(Pin<Box<Sleep>>),
}

impl Future for RetryTimer {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match *self {
            Self::Never(ref mut pend) => Pin::new(pend).poll(cx),
            Self::At(ref mut slp) => slp.as_mut().poll(cx),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use futures::stream;
    use scoreboard_common::feed::MessageKind;
    use std::{
        collections::VecDeque,
        sync::{
            Arc, Mutex, Once,
            atomic::{AtomicUsize, Ordering},
        },
    };

    static INIT: Once = Once::new();

    fn initialize() {
        INIT.call_once(|| {
            let _ = env_logger::builder().is_test(true).try_init();
        });
    }

    enum Script {
        Refuse,
        Hang,
        Open {
            frames: Vec<Result<String, FeedError>>,
            stay_open: bool,
        },
    }

    #[derive(Clone, Default)]
    struct ScriptedConnector {
        scripts: Arc<Mutex<VecDeque<Script>>>,
        attempts: Arc<AtomicUsize>,
        closes: Arc<AtomicUsize>,
    }

    impl ScriptedConnector {
        fn new(scripts: impl IntoIterator<Item = Script>) -> Self {
            Self {
                scripts: Arc::new(Mutex::new(scripts.into_iter().collect())),
                ..Default::default()
            }
        }

        fn attempts(&self) -> usize {
            self.attempts.load(Ordering::SeqCst)
        }

        fn closes(&self) -> usize {
            self.closes.load(Ordering::SeqCst)
        }
    }

    impl Connector for ScriptedConnector {
        fn connect(&self) -> BoxFuture<'static, Result<FeedConnection, FeedError>> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let script = self
                .scripts
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Script::Refuse);
            match script {
                Script::Refuse => {
                    futures::future::ready(Err(FeedError::Transport("refused".to_string())))
                        .boxed()
                }
                Script::Hang => futures::future::pending().boxed(),
                Script::Open { frames, stay_open } => {
                    let frames = stream::iter(frames);
                    let frames = if stay_open {
                        frames.chain(stream::pending()).boxed()
                    } else {
                        frames.boxed()
                    };
                    let closes = self.closes.clone();
                    let close = async move {
                        closes.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                    .boxed();
                    futures::future::ready(Ok(FeedConnection { frames, close })).boxed()
                }
            }
        }
    }

    fn text(frame: &str) -> Result<String, FeedError> {
        Ok(frame.to_string())
    }

    async fn next_event(events: &mut mpsc::UnboundedReceiver<FeedEvent>) -> FeedEvent {
        timeout(Duration::from_secs(600), events.recv())
            .await
            .expect("no feed event arrived")
            .expect("feed worker stopped")
    }

    async fn next_closed(events: &mut mpsc::UnboundedReceiver<FeedEvent>) -> Option<Duration> {
        loop {
            if let FeedEvent::Closed { retry_in } = next_event(events).await {
                return retry_in;
            }
        }
    }

    async fn assert_quiet(events: &mut mpsc::UnboundedReceiver<FeedEvent>) {
        let waited = timeout(Duration::from_secs(120), events.recv()).await;
        assert!(waited.is_err(), "unexpected event {waited:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_and_dispatch() {
        initialize();
        let connector = ScriptedConnector::new([Script::Open {
            frames: vec![
                text(r#"{"type": "state_sync", "data": {"timerTenths": 5000}}"#),
                text("{\"type\": \"score_update\", \"data\": {\"scoreA\": 1}}\nnot json\n"),
            ],
            stay_open: true,
        }]);
        let (client, mut events) = FeedClient::spawn(connector.clone(), Default::default());
        assert_eq!(client.state(), ConnectionState::Idle);
        client.connect();

        assert!(matches!(next_event(&mut events).await, FeedEvent::Opened));
        assert_eq!(client.state(), ConnectionState::Open);
        let FeedEvent::Message(first) = next_event(&mut events).await else {
            panic!("expected a message");
        };
        assert_eq!(first.kind(), Some(MessageKind::StateSync));
        let FeedEvent::Message(second) = next_event(&mut events).await else {
            panic!("expected a message");
        };
        assert_eq!(second.kind(), Some(MessageKind::ScoreUpdate));
        assert!(matches!(
            next_event(&mut events).await,
            FeedEvent::DecodeError(_)
        ));

        // Bad input does not touch the connection
        assert_quiet(&mut events).await;
        assert_eq!(client.state(), ConnectionState::Open);
        assert_eq!(connector.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_until_exhausted() {
        initialize();
        let connector = ScriptedConnector::default();
        let (client, mut events) = FeedClient::spawn(connector.clone(), Default::default());
        client.connect();

        let mut retries = Vec::new();
        let mut failed_at = Vec::new();
        loop {
            match next_event(&mut events).await {
                FeedEvent::TransportError(_) => failed_at.push(Instant::now()),
                FeedEvent::Closed { retry_in } => {
                    retries.push(retry_in);
                    if retry_in.is_none() {
                        break;
                    }
                }
                other => panic!("unexpected event {other:?}"),
            }
        }

        let secs = |s| Some(Duration::from_secs(s));
        assert_eq!(
            retries,
            vec![secs(2), secs(4), secs(8), secs(16), secs(30), None]
        );
        let gaps: Vec<_> = failed_at.windows(2).map(|w| w[1] - w[0]).collect();
        assert_eq!(
            gaps,
            [2, 4, 8, 16, 30].map(Duration::from_secs).to_vec()
        );

        assert_quiet(&mut events).await;
        assert_eq!(connector.attempts(), 6);
        assert_eq!(client.state(), ConnectionState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_restores_budget() {
        initialize();
        let connector = ScriptedConnector::default();
        let settings = FeedSettings {
            backoff: BackoffPolicy {
                max_attempts: 1,
                ..Default::default()
            },
            ..Default::default()
        };
        let (client, mut events) = FeedClient::spawn(connector.clone(), settings);
        client.connect();
        assert_eq!(next_closed(&mut events).await, Some(Duration::from_secs(2)));
        assert_eq!(next_closed(&mut events).await, None);

        client.connect();
        assert_eq!(next_closed(&mut events).await, Some(Duration::from_secs(2)));
        assert_eq!(connector.attempts(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_after_server_close() {
        initialize();
        let connector = ScriptedConnector::new([
            Script::Refuse,
            Script::Open {
                frames: vec![text(r#"{"type": "game_reset", "data": {}}"#)],
                stay_open: false,
            },
            Script::Open {
                frames: vec![],
                stay_open: true,
            },
        ]);
        let (client, mut events) = FeedClient::spawn(connector.clone(), Default::default());
        client.connect();

        assert_eq!(next_closed(&mut events).await, Some(Duration::from_secs(2)));
        assert!(matches!(next_event(&mut events).await, FeedEvent::Opened));
        assert!(matches!(next_event(&mut events).await, FeedEvent::Message(_)));

        // The successful open reset the failure count
        assert_eq!(next_closed(&mut events).await, Some(Duration::from_secs(2)));
        assert!(matches!(next_event(&mut events).await, FeedEvent::Opened));
        assert_eq!(client.state(), ConnectionState::Open);
        assert_eq!(connector.attempts(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_error_counts_as_failure() {
        initialize();
        let connector = ScriptedConnector::new([
            Script::Open {
                frames: vec![Err(FeedError::Transport("reset by peer".to_string()))],
                stay_open: true,
            },
            Script::Open {
                frames: vec![],
                stay_open: true,
            },
        ]);
        let (client, mut events) = FeedClient::spawn(connector.clone(), Default::default());
        client.connect();

        assert!(matches!(next_event(&mut events).await, FeedEvent::Opened));
        assert!(matches!(
            next_event(&mut events).await,
            FeedEvent::TransportError(FeedError::Transport(_))
        ));
        assert_eq!(next_closed(&mut events).await, Some(Duration::from_secs(2)));
        assert!(matches!(next_event(&mut events).await, FeedEvent::Opened));
        assert_eq!(client.state(), ConnectionState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_timeout() {
        initialize();
        let connector = ScriptedConnector::new([Script::Hang]);
        let (client, mut events) = FeedClient::spawn(connector.clone(), Default::default());
        let started = Instant::now();
        client.connect();

        let FeedEvent::TransportError(e) = next_event(&mut events).await else {
            panic!("expected a transport error");
        };
        assert!(matches!(e, FeedError::ConnectTimeout(_)));
        assert_eq!(Instant::now() - started, Duration::from_secs(10));
        assert_eq!(next_closed(&mut events).await, Some(Duration::from_secs(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_while_open_is_noop() {
        initialize();
        let connector = ScriptedConnector::new([Script::Open {
            frames: vec![],
            stay_open: true,
        }]);
        let (client, mut events) = FeedClient::spawn(connector.clone(), Default::default());
        client.connect();
        client.connect();
        assert!(matches!(next_event(&mut events).await, FeedEvent::Opened));
        client.connect();
        assert_quiet(&mut events).await;
        assert_eq!(connector.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_cancels_retry() {
        initialize();
        let connector = ScriptedConnector::default();
        let (client, mut events) = FeedClient::spawn(connector.clone(), Default::default());
        client.connect();
        assert_eq!(next_closed(&mut events).await, Some(Duration::from_secs(2)));

        client.disconnect();
        client.disconnect();
        assert_quiet(&mut events).await;
        assert_eq!(connector.attempts(), 1);
        assert_eq!(client.state(), ConnectionState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_closes_open_feed() {
        initialize();
        let connector = ScriptedConnector::new([Script::Open {
            frames: vec![],
            stay_open: true,
        }]);
        let (client, mut events) = FeedClient::spawn(connector.clone(), Default::default());
        client.disconnect();
        client.connect();
        assert!(matches!(next_event(&mut events).await, FeedEvent::Opened));

        client.disconnect();
        assert_eq!(next_closed(&mut events).await, None);
        assert_eq!(client.state(), ConnectionState::Closed);
        assert_eq!(connector.closes(), 1);
        assert_quiet(&mut events).await;
        assert_eq!(connector.attempts(), 1);
        assert_eq!(connector.closes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_close_skips_handshake() {
        initialize();
        let connector = ScriptedConnector::new([Script::Open {
            frames: vec![],
            stay_open: false,
        }]);
        let settings = FeedSettings {
            backoff: BackoffPolicy {
                max_attempts: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        let (client, mut events) = FeedClient::spawn(connector.clone(), settings);
        client.connect();
        assert!(matches!(next_event(&mut events).await, FeedEvent::Opened));
        assert_eq!(next_closed(&mut events).await, None);

        client.disconnect();
        assert_quiet(&mut events).await;
        assert_eq!(connector.closes(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_replaces_pending_retry() {
        initialize();
        let connector = ScriptedConnector::new([
            Script::Refuse,
            Script::Open {
                frames: vec![],
                stay_open: true,
            },
        ]);
        let (client, mut events) = FeedClient::spawn(connector.clone(), Default::default());
        let started = Instant::now();
        client.connect();
        assert_eq!(next_closed(&mut events).await, Some(Duration::from_secs(2)));

        tokio::time::sleep(Duration::from_secs(1)).await;
        client.connect();
        assert!(matches!(next_event(&mut events).await, FeedEvent::Opened));
        assert_eq!(Instant::now() - started, Duration::from_secs(1));
        assert_eq!(connector.attempts(), 2);

        // The old 2s deadline must not start a third attempt
        assert_quiet(&mut events).await;
        assert_eq!(connector.attempts(), 2);
        assert_eq!(client.state(), ConnectionState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_reschedules_from_new_failure() {
        initialize();
        let connector = ScriptedConnector::new([
            Script::Refuse,
            Script::Refuse,
            Script::Open {
                frames: vec![],
                stay_open: true,
            },
        ]);
        let (client, mut events) = FeedClient::spawn(connector.clone(), Default::default());
        let started = Instant::now();
        client.connect();
        assert_eq!(next_closed(&mut events).await, Some(Duration::from_secs(2)));

        tokio::time::sleep(Duration::from_secs(1)).await;
        client.connect();
        assert_eq!(next_closed(&mut events).await, Some(Duration::from_secs(2)));

        assert!(matches!(next_event(&mut events).await, FeedEvent::Opened));
        assert_eq!(Instant::now() - started, Duration::from_secs(3));
        assert_eq!(connector.attempts(), 3);
        assert_quiet(&mut events).await;
        assert_eq!(connector.attempts(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_worker() {
        initialize();
        let (client, mut events) =
            FeedClient::spawn(ScriptedConnector::default(), Default::default());
        drop(client);
        assert!(events.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_closes_open_feed() {
        initialize();
        let connector = ScriptedConnector::new([Script::Open {
            frames: vec![],
            stay_open: true,
        }]);
        let (client, mut events) = FeedClient::spawn(connector.clone(), Default::default());
        client.connect();
        assert!(matches!(next_event(&mut events).await, FeedEvent::Opened));

        drop(client);
        assert!(events.recv().await.is_none());
        assert_eq!(connector.closes(), 1);
    }
}
