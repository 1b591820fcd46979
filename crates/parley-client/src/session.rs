//! Conversation session: transport, reconciler and send path wired together

use std::sync::Arc;

use parking_lot::Mutex;
use parley_proto::{ClientRequest, decode_frame};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;

use crate::{
    backoff::BackoffPolicy,
    error::{Error, Result},
    reconciler::Reconciler,
    transport::{ConnectionStatus, Connector, Transport, WsConnector},
    view::ChatView,
};

/// Default conversation endpoint
pub const DEFAULT_URL: &str = "ws://localhost:8000/messaging/ws";

/// Session configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ChatConfig {
    /// WebSocket endpoint
    pub url: String,
    /// Reconnect policy
    pub reconnect: BackoffPolicy,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            reconnect: BackoffPolicy::default(),
        }
    }
}

impl ChatConfig {
    /// Check the endpoint scheme and reconnect policy
    pub fn validate(&self) -> Result<()> {
        if !(self.url.starts_with("ws://") || self.url.starts_with("wss://")) {
            return Err(Error::Config(format!(
                "url must start with ws:// or wss://, got {}",
                self.url
            )));
        }
        self.reconnect.validate()
    }
}

/// State shared between the session handle and its inbound task
struct Shared {
    reconciler: Mutex<Reconciler>,
    status: watch::Receiver<ConnectionStatus>,
    view: watch::Sender<ChatView>,
}

impl Shared {
    /// Publish a fresh view. Called with the reconciler lock held so views
    /// are published in transition order.
    fn publish(&self, reconciler: &Reconciler) {
        let status = *self.status.borrow();
        self.view.send_replace(ChatView::capture(reconciler, status));
    }

    fn apply_frame(&self, frame: &str) {
        let event = match decode_frame(frame) {
            Ok(event) => event,
            Err(e) if e.is_malformed() => {
                tracing::warn!("Dropping inbound frame: {} ({})", e, preview(frame));
                return;
            }
            Err(e) => {
                tracing::debug!("Ignoring inbound frame: {}", e);
                return;
            }
        };
        let mut reconciler = self.reconciler.lock();
        if reconciler.apply(event) {
            self.publish(&reconciler);
        }
    }

    fn refresh_status(&self) {
        let reconciler = self.reconciler.lock();
        self.publish(&reconciler);
    }
}

/// A live conversation with the agent server.
///
/// Inbound frames are decoded and applied one at a time on a single task, so
/// each transition is committed before the next frame is read.
pub struct ChatSession {
    shared: Arc<Shared>,
    transport: Transport,
    cancel: CancellationToken,
    inbound: Mutex<Option<JoinHandle<()>>>,
}

impl ChatSession {
    /// Connect to a WebSocket endpoint. Must be called inside a Tokio runtime.
    pub fn connect(config: &ChatConfig) -> Result<Self> {
        config.validate()?;
        let connector = Arc::new(WsConnector::new(config.url.clone()));
        Ok(Self::with_connector(connector, config.reconnect))
    }

    /// Start a session over a custom connector
    pub fn with_connector(connector: Arc<dyn Connector>, policy: BackoffPolicy) -> Self {
        Self::with_reconciler(connector, policy, Reconciler::new())
    }

    /// Start a session with a pre-built reconciler (e.g. one with a fixed clock)
    pub fn with_reconciler(
        connector: Arc<dyn Connector>,
        policy: BackoffPolicy,
        reconciler: Reconciler,
    ) -> Self {
        let cancel = CancellationToken::new();
        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        let transport = Transport::spawn(connector, policy, frames_tx, &cancel);
        let status = transport.watch_status();

        let initial = ChatView::capture(&reconciler, *status.borrow());
        let (view_tx, _) = watch::channel(initial);
        let shared = Arc::new(Shared {
            reconciler: Mutex::new(reconciler),
            status: status.clone(),
            view: view_tx,
        });

        let inbound = tokio::spawn(run_inbound(
            Arc::clone(&shared),
            frames_rx,
            status,
            cancel.clone(),
        ));

        Self {
            shared,
            transport,
            cancel,
            inbound: Mutex::new(Some(inbound)),
        }
    }

    /// Send a user message.
    ///
    /// Empty or whitespace-only content is rejected with [`Error::EmptyMessage`]
    /// and changes nothing. If the transport is not connected the loading state
    /// is cleared, the failure is surfaced as the view's error and
    /// [`Error::NotConnected`] is returned.
    pub fn send_message(&self, content: &str) -> Result<()> {
        if content.trim().is_empty() {
            return Err(Error::EmptyMessage);
        }
        if self.cancel.is_cancelled() {
            return Err(Error::NotConnected);
        }

        let mut reconciler = self.shared.reconciler.lock();
        let request = ClientRequest::new(content, reconciler.conversation_id());
        reconciler.begin_request();
        let result = self.transport.send(&request);
        if let Err(e) = &result {
            tracing::warn!("Message not sent: {}", e);
            reconciler.reject_request(format!("Message not sent: {}", e));
        }
        self.shared.publish(&reconciler);
        result
    }

    /// Snapshot of the current state
    pub fn view(&self) -> ChatView {
        self.shared.view.borrow().clone()
    }

    /// Receiver that observes every published view
    pub fn subscribe(&self) -> watch::Receiver<ChatView> {
        self.shared.view.subscribe()
    }

    /// Stream of views, starting with the current one
    pub fn updates(&self) -> WatchStream<ChatView> {
        WatchStream::new(self.subscribe())
    }

    /// Current connection status
    pub fn connection_status(&self) -> ConnectionStatus {
        self.transport.status()
    }

    /// Server-assigned conversation id, once known
    pub fn conversation_id(&self) -> Option<i64> {
        self.shared.reconciler.lock().conversation_id()
    }

    /// Whether a sent message is still waiting for the agent
    pub fn is_loading(&self) -> bool {
        self.shared.reconciler.lock().is_awaiting_response()
    }

    /// Tear down: cancel reconnects, close the connection and stop applying
    /// frames. No view is published by the inbound side after this returns.
    pub async fn close(&self) {
        self.cancel.cancel();
        self.transport.close().await;
        let inbound = self.inbound.lock().take();
        if let Some(inbound) = inbound {
            if let Err(e) = inbound.await {
                tracing::warn!("Inbound task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Single consumer of inbound frames and status changes
async fn run_inbound(
    shared: Arc<Shared>,
    mut frames: mpsc::UnboundedReceiver<String>,
    mut status: watch::Receiver<ConnectionStatus>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            frame = frames.recv() => match frame {
                Some(frame) => shared.apply_frame(&frame),
                None => break,
            },
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                shared.refresh_status();
            }
        }
    }
    tracing::debug!("Inbound task stopped");
}

/// Short prefix of a frame for log lines
fn preview(frame: &str) -> &str {
    match frame.char_indices().nth(120) {
        Some((i, _)) => &frame[..i],
        None => frame,
    }
}
