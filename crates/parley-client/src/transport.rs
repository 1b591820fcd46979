//! Reconnecting transport for the conversation connection

use std::{fmt, pin::Pin, sync::Arc};

use async_stream::stream;
use async_trait::async_trait;
use futures::{Sink, SinkExt, StreamExt, future};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tokio_stream::Stream;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tokio_util::sync::CancellationToken;

use crate::{
    backoff::BackoffPolicy,
    error::{Error, Result},
};

/// State of the persistent connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    /// A connection attempt is in flight
    #[default]
    Connecting,
    /// Connected; sends are accepted
    Connected,
    /// Peer closed the connection; a reconnect is scheduled
    Disconnected,
    /// Transport-level failure; a reconnect is scheduled
    Error,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Outbound half of an established connection
pub type FrameSink = Pin<Box<dyn Sink<String, Error = Error> + Send>>;

/// Inbound half of an established connection. The stream ends on a clean close.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// An established connection, split into text-frame halves
pub struct Connection {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

/// Opens connections to the conversation server
#[async_trait]
pub trait Connector: Send + Sync {
    /// Establish one connection
    async fn connect(&self) -> Result<Connection>;
}

/// WebSocket connector
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    /// Create a connector for a `ws://` or `wss://` endpoint
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// Endpoint this connector dials
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self) -> Result<Connection> {
        tracing::debug!("Connecting to {}", self.url());
        let (socket, _response) = connect_async(self.url()).await?;
        let (write, mut read) = socket.split();

        let sink = write
            .sink_map_err(Error::from)
            .with(|text: String| future::ready(Ok::<_, Error>(WsMessage::text(text))));

        let frames = stream! {
            while let Some(message) = read.next().await {
                match message {
                    Ok(WsMessage::Text(text)) => yield Ok(text.as_str().to_owned()),
                    Ok(WsMessage::Binary(data)) => match String::from_utf8(data.to_vec()) {
                        Ok(text) => yield Ok(text),
                        Err(_) => tracing::warn!("Dropping non-UTF-8 binary frame ({} bytes)", data.len()),
                    },
                    Ok(WsMessage::Close(frame)) => {
                        tracing::debug!("Server closed connection: {:?}", frame);
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        yield Err(Error::from(e));
                        break;
                    }
                }
            }
        };

        Ok(Connection {
            sink: Box::pin(sink),
            stream: Box::pin(frames),
        })
    }
}

/// Persistent connection that reconnects with exponential backoff.
///
/// Inbound frames are forwarded verbatim to the channel given at spawn time.
pub struct Transport {
    status: watch::Receiver<ConnectionStatus>,
    outbound: Arc<Mutex<Option<mpsc::UnboundedSender<String>>>>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Transport {
    /// Start connecting in the background.
    ///
    /// The transport stops when `parent` is cancelled or [`Transport::close`] is called.
    pub fn spawn(
        connector: Arc<dyn Connector>,
        policy: BackoffPolicy,
        frames: mpsc::UnboundedSender<String>,
        parent: &CancellationToken,
    ) -> Self {
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Connecting);
        let outbound = Arc::new(Mutex::new(None));
        let cancel = parent.child_token();

        let supervisor = Supervisor {
            connector,
            policy,
            status: status_tx,
            outbound: Arc::clone(&outbound),
            frames,
            cancel: cancel.clone(),
            attempt: 0,
        };
        let task = tokio::spawn(supervisor.run());

        Self {
            status: status_rx,
            outbound,
            cancel,
            task: Mutex::new(Some(task)),
        }
    }

    /// Current connection status
    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// Subscribe to status transitions
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// Send a JSON payload. Fails with [`Error::NotConnected`] unless connected.
    pub fn send<T: Serialize + ?Sized>(&self, payload: &T) -> Result<()> {
        if self.status() != ConnectionStatus::Connected {
            return Err(Error::NotConnected);
        }
        let text = serde_json::to_string(payload)?;
        let outbound = self.outbound.lock();
        let Some(tx) = outbound.as_ref() else {
            return Err(Error::NotConnected);
        };
        tx.send(text).map_err(|_| Error::NotConnected)
    }

    /// Cancel any pending reconnect, close the live connection and wait for the
    /// supervisor to exit. No frame is forwarded after this returns.
    pub async fn close(&self) {
        self.cancel.cancel();
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!("Transport task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// How one connection cycle ended
enum CycleEnd {
    Cancelled,
    Closed,
    Failed,
}

/// Owns the connection loop; the only writer of status and attempt count
struct Supervisor {
    connector: Arc<dyn Connector>,
    policy: BackoffPolicy,
    status: watch::Sender<ConnectionStatus>,
    outbound: Arc<Mutex<Option<mpsc::UnboundedSender<String>>>>,
    frames: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
    attempt: u32,
}

impl Supervisor {
    async fn run(mut self) {
        loop {
            self.set_status(ConnectionStatus::Connecting);

            let connector = Arc::clone(&self.connector);
            let connected = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                result = connector.connect() => Some(result),
            };

            let end = match connected {
                None => CycleEnd::Cancelled,
                Some(Ok(connection)) => self.pump(connection).await,
                Some(Err(e)) => {
                    tracing::warn!("Connection attempt {} failed: {}", self.attempt + 1, e);
                    CycleEnd::Failed
                }
            };

            match end {
                CycleEnd::Cancelled => break,
                CycleEnd::Closed => self.set_status(ConnectionStatus::Disconnected),
                CycleEnd::Failed => self.set_status(ConnectionStatus::Error),
            }

            let delay = self.policy.delay_for_attempt(self.attempt);
            self.attempt = self.attempt.saturating_add(1);
            tracing::debug!("Reconnecting in {:?} (attempt {})", delay, self.attempt);

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.outbound.lock().take();
        self.set_status(ConnectionStatus::Disconnected);
        tracing::debug!("Transport stopped");
    }

    /// Shuttle frames until the connection ends or the transport is cancelled
    async fn pump(&mut self, connection: Connection) -> CycleEnd {
        let Connection {
            mut sink,
            mut stream,
        } = connection;
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        *self.outbound.lock() = Some(tx);
        self.attempt = 0;
        self.set_status(ConnectionStatus::Connected);
        tracing::info!("Connected");

        let end = loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    if let Err(e) = sink.close().await {
                        tracing::debug!("Error closing connection: {}", e);
                    }
                    break CycleEnd::Cancelled;
                }
                frame = stream.next() => match frame {
                    Some(Ok(text)) => {
                        if self.frames.send(text).is_err() {
                            tracing::debug!("Frame consumer gone, dropping frame");
                        }
                    }
                    Some(Err(e)) => {
                        tracing::warn!("Connection failed: {}", e);
                        break CycleEnd::Failed;
                    }
                    None => {
                        tracing::info!("Connection closed by server");
                        break CycleEnd::Closed;
                    }
                },
                Some(text) = rx.recv() => {
                    if let Err(e) = sink.send(text).await {
                        tracing::warn!("Write failed: {}", e);
                        break CycleEnd::Failed;
                    }
                }
            }
        };

        self.outbound.lock().take();
        end
    }

    fn set_status(&self, status: ConnectionStatus) {
        let previous = self.status.send_replace(status);
        if previous != status {
            tracing::debug!("Connection status: {} -> {}", previous, status);
        }
    }
}
