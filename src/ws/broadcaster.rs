//! Topic fan-out to connected WebSocket clients.
//!
//! A single dispatch task owns delivery. Publishers and connections talk
//! to it over a bounded control channel (register, unregister, publish).
//! Each client has a bounded outbound buffer that the dispatcher fills with
//! `try_send`; a client whose buffer is full or closed is dropped on the
//! spot, so one slow consumer never holds up the rest.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::messages::{OutboundMessage, Topic};
use super::subscription::SubscriptionSet;
use crate::error::RewardsError;

/// Connection identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(Uuid);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Subscription set shared between a connection's read pump and the
/// dispatcher.
pub type SharedSubscriptions = Arc<RwLock<SubscriptionSet>>;

/// Broadcaster sizing.
#[derive(Debug, Clone, Copy)]
pub struct BroadcasterSettings {
    /// Capacity of the control channel.
    pub control_capacity: usize,
    /// Outbound slots per client.
    pub client_buffer: usize,
}

impl Default for BroadcasterSettings {
    fn default() -> Self {
        Self {
            control_capacity: 1_024,
            client_buffer: 256,
        }
    }
}

#[derive(Debug)]
struct ClientSlot {
    outbound: mpsc::Sender<Arc<str>>,
    subscriptions: SharedSubscriptions,
}

type Registry = Arc<Mutex<HashMap<ClientId, ClientSlot>>>;

#[derive(Debug)]
enum Control {
    Register(ClientId, ClientSlot),
    Unregister(ClientId),
    Publish {
        topic: Option<Topic>,
        payload: Arc<str>,
    },
}

/// A registered client's end of the broadcaster.
#[derive(Debug)]
pub struct ClientHandle {
    /// Registry key.
    pub id: ClientId,
    /// Serialized messages to write to the socket. Closed when the client
    /// is dropped or the broadcaster shuts down.
    pub outbound: mpsc::Receiver<Arc<str>>,
    /// Topics this client receives.
    pub subscriptions: SharedSubscriptions,
}

impl ClientHandle {
    /// Adds `topic` to this client's subscriptions.
    pub fn subscribe(&self, topic: Topic) {
        self.subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .subscribe(topic);
    }

    /// Removes `topic` from this client's subscriptions.
    pub fn unsubscribe(&self, topic: Topic) {
        self.subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .unsubscribe(topic);
    }
}

/// Cloneable handle to the dispatch task.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    control: mpsc::Sender<Control>,
    registry: Registry,
    shutdown: CancellationToken,
    client_buffer: usize,
}

impl Broadcaster {
    /// Spawns the dispatch task and returns a handle to it.
    ///
    /// The task exits on [`Broadcaster::shutdown`] or once every handle has
    /// been dropped.
    #[must_use]
    pub fn start(settings: BroadcasterSettings) -> (Self, JoinHandle<()>) {
        let (control, rx) = mpsc::channel(settings.control_capacity.max(1));
        let registry: Registry = Arc::new(Mutex::new(HashMap::new()));
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(dispatch(rx, Arc::clone(&registry), shutdown.clone()));
        (
            Self {
                control,
                registry,
                shutdown,
                client_buffer: settings.client_buffer.max(1),
            },
            task,
        )
    }

    /// Registers a new client with no subscriptions.
    ///
    /// # Errors
    ///
    /// Returns [`RewardsError::Internal`] once the broadcaster has shut down.
    pub async fn register(&self) -> Result<ClientHandle, RewardsError> {
        if self.shutdown.is_cancelled() {
            return Err(RewardsError::Internal("broadcaster is shut down".to_string()));
        }
        let id = ClientId(Uuid::new_v4());
        let (tx, outbound) = mpsc::channel(self.client_buffer);
        let subscriptions: SharedSubscriptions = Arc::new(RwLock::new(SubscriptionSet::new()));
        let slot = ClientSlot {
            outbound: tx,
            subscriptions: Arc::clone(&subscriptions),
        };
        self.control
            .send(Control::Register(id, slot))
            .await
            .map_err(|_| RewardsError::Internal("broadcaster is shut down".to_string()))?;
        Ok(ClientHandle {
            id,
            outbound,
            subscriptions,
        })
    }

    /// Removes a client; its outbound buffer is closed.
    pub async fn unregister(&self, id: ClientId) {
        if self.control.send(Control::Unregister(id)).await.is_err() {
            tracing::debug!(client = %id, "unregister after broadcaster stopped");
        }
    }

    /// Delivers `message` to clients subscribed to its topic.
    pub async fn publish(&self, message: &OutboundMessage) {
        self.send(Some(message.topic()), message).await;
    }

    /// Delivers `message` to every connected client regardless of
    /// subscriptions.
    pub async fn broadcast_all(&self, message: &OutboundMessage) {
        self.send(None, message).await;
    }

    async fn send(&self, topic: Option<Topic>, message: &OutboundMessage) {
        let payload: Arc<str> = match serde_json::to_string(message) {
            Ok(json) => json.into(),
            Err(e) => {
                tracing::error!(kind = message.kind(), error = %e, "failed to serialize outbound message");
                return;
            }
        };
        if self
            .control
            .send(Control::Publish { topic, payload })
            .await
            .is_err()
        {
            tracing::debug!(kind = message.kind(), "broadcaster stopped, message dropped");
        }
    }

    /// Number of registered clients.
    #[must_use]
    pub fn client_count(&self) -> usize {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Token cancelled on shutdown; connections derive their own from it.
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stops dispatch and closes every client buffer. Safe to call more
    /// than once.
    pub fn shutdown(&self) {
        if !self.shutdown.is_cancelled() {
            tracing::info!(clients = self.client_count(), "broadcaster shutting down");
        }
        self.shutdown.cancel();
    }
}

async fn dispatch(
    mut rx: mpsc::Receiver<Control>,
    registry: Registry,
    shutdown: CancellationToken,
) {
    loop {
        let control = tokio::select! {
            () = shutdown.cancelled() => break,
            next = rx.recv() => match next {
                Some(control) => control,
                None => break,
            },
        };
        let mut clients = registry.lock().unwrap_or_else(PoisonError::into_inner);
        match control {
            Control::Register(id, slot) => {
                clients.insert(id, slot);
                tracing::debug!(client = %id, clients = clients.len(), "client registered");
            }
            Control::Unregister(id) => {
                if clients.remove(&id).is_some() {
                    tracing::debug!(client = %id, clients = clients.len(), "client unregistered");
                }
            }
            Control::Publish { topic, payload } => {
                clients.retain(|id, slot| deliver(*id, slot, topic, &payload));
            }
        }
    }
    registry
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clear();
    tracing::info!("broadcaster stopped");
}

/// Offers `payload` to one client. Returns `false` if the client must be
/// dropped.
fn deliver(id: ClientId, slot: &ClientSlot, topic: Option<Topic>, payload: &Arc<str>) -> bool {
    let wanted = topic.is_none_or(|t| {
        slot.subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .matches(t)
    });
    if !wanted {
        return true;
    }
    match slot.outbound.try_send(Arc::clone(payload)) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            tracing::warn!(client = %id, "client buffer full, dropping slow client");
            false
        }
        Err(TrySendError::Closed(_)) => false,
    }
}
