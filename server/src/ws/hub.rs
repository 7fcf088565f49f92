//! Listener Hub
//!
//! Directory of channel name to the one observer connection receiving its
//! webhooks. The map lives inside a single control loop task; everything else
//! talks to it through the cloneable [`Hub`] handle, so the map needs no lock
//! and requests are applied one at a time in arrival order.
//!
//! Registering a channel that already has an observer replaces it. The old
//! handle is dropped, which closes that actor's queue and makes it send a
//! close frame to its peer.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::connection::{ConnectionError, ConnectionHandle};

/// Default capacity of the hub's request queue.
pub const DEFAULT_HUB_CAPACITY: usize = 1024;

/// Hub errors.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum HubError {
    /// The control loop is no longer running.
    #[error("Hub is not running")]
    Stopped,
}

/// Outcome of routing one payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Queued on the channel's observer.
    Queued,
    /// The observer's queue was full; the payload was dropped.
    Dropped,
    /// No observer is registered for the channel.
    NoObserver,
}

impl Delivery {
    /// Whether the channel had an observer.
    pub const fn reached_observer(self) -> bool {
        !matches!(self, Self::NoObserver)
    }
}

/// A registered channel, as listed to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListenerInfo {
    /// Channel name.
    pub listener: String,
    /// Connection id of the current observer.
    pub connection_id: Uuid,
    /// When the current observer connected.
    pub connected_at: DateTime<Utc>,
}

enum Command {
    Register(ConnectionHandle),
    Unregister {
        channel: String,
        id: Uuid,
    },
    Deliver {
        channel: String,
        payload: String,
        reply: oneshot::Sender<Delivery>,
    },
    Contains {
        channel: String,
        reply: oneshot::Sender<bool>,
    },
    Listeners {
        reply: oneshot::Sender<Vec<ListenerInfo>>,
    },
    Shutdown,
}

/// Handle to the hub control loop.
#[derive(Debug, Clone)]
pub struct Hub {
    tx: mpsc::Sender<Command>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Register(handle) => write!(f, "Register({})", handle.channel()),
            Self::Unregister { channel, .. } => write!(f, "Unregister({channel})"),
            Self::Deliver { channel, .. } => write!(f, "Deliver({channel})"),
            Self::Contains { channel, .. } => write!(f, "Contains({channel})"),
            Self::Listeners { .. } => write!(f, "Listeners"),
            Self::Shutdown => write!(f, "Shutdown"),
        }
    }
}

impl Hub {
    /// Start the control loop.
    ///
    /// The loop ends after [`Hub::shutdown`] or once every handle is dropped.
    pub fn spawn(capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let task = tokio::spawn(run(rx));
        (Self { tx }, task)
    }

    /// Make `conn` the observer of its channel, replacing any previous one.
    pub async fn register(&self, conn: ConnectionHandle) -> Result<(), HubError> {
        self.send(Command::Register(conn)).await
    }

    /// Forget the observer `id` of `channel`, unless it was already replaced.
    pub async fn unregister(&self, channel: &str, id: Uuid) -> Result<(), HubError> {
        self.send(Command::Unregister {
            channel: channel.to_string(),
            id,
        })
        .await
    }

    /// Route `payload` to the observer of `channel`.
    pub async fn try_deliver(
        &self,
        channel: &str,
        payload: impl Into<String>,
    ) -> Result<Delivery, HubError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Deliver {
            channel: channel.to_string(),
            payload: payload.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| HubError::Stopped)
    }

    /// Route `payload` to the observer of `channel`.
    ///
    /// Returns `false` when the channel has no observer. A stopped hub counts
    /// as having none.
    pub async fn deliver(&self, channel: &str, payload: impl Into<String>) -> bool {
        match self.try_deliver(channel, payload).await {
            Ok(delivery) => delivery.reached_observer(),
            Err(e) => {
                warn!(channel = %channel, error = %e, "Delivery skipped");
                false
            }
        }
    }

    /// Whether `channel` currently has an observer.
    pub async fn contains(&self, channel: &str) -> bool {
        let (reply, rx) = oneshot::channel();
        let sent = self
            .send(Command::Contains {
                channel: channel.to_string(),
                reply,
            })
            .await;
        sent.is_ok() && rx.await.unwrap_or(false)
    }

    /// Registered channels, sorted by name.
    pub async fn listeners(&self) -> Result<Vec<ListenerInfo>, HubError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Listeners { reply }).await?;
        rx.await.map_err(|_| HubError::Stopped)
    }

    /// Close every observer and stop the control loop.
    pub async fn shutdown(&self) {
        let _ = self.send(Command::Shutdown).await;
    }

    async fn send(&self, command: Command) -> Result<(), HubError> {
        self.tx.send(command).await.map_err(|_| HubError::Stopped)
    }
}

/// The control loop. Sole owner of the channel map.
async fn run(mut rx: mpsc::Receiver<Command>) {
    let mut observers: HashMap<String, ConnectionHandle> = HashMap::new();

    while let Some(command) = rx.recv().await {
        match command {
            Command::Register(conn) => {
                let channel = conn.channel().to_string();
                let id = conn.id();
                match observers.insert(channel.clone(), conn) {
                    Some(previous) => info!(
                        channel = %channel,
                        connection_id = %id,
                        replaced = %previous.id(),
                        "Observer replaced"
                    ),
                    None => info!(channel = %channel, connection_id = %id, "Observer registered"),
                }
            }
            Command::Unregister { channel, id } => {
                if observers.get(&channel).is_some_and(|c| c.id() == id) {
                    observers.remove(&channel);
                    info!(channel = %channel, connection_id = %id, "Observer unregistered");
                }
            }
            Command::Deliver {
                channel,
                payload,
                reply,
            } => {
                let outcome = deliver(&mut observers, &channel, payload);
                let _ = reply.send(outcome);
            }
            Command::Contains { channel, reply } => {
                let live = observers.get(&channel).is_some_and(ConnectionHandle::is_live);
                let _ = reply.send(live);
            }
            Command::Listeners { reply } => {
                let mut list: Vec<ListenerInfo> = observers
                    .values()
                    .filter(|c| c.is_live())
                    .map(|c| ListenerInfo {
                        listener: c.channel().to_string(),
                        connection_id: c.id(),
                        connected_at: c.connected_at(),
                    })
                    .collect();
                list.sort_by(|a, b| a.listener.cmp(&b.listener));
                let _ = reply.send(list);
            }
            Command::Shutdown => {
                info!(observers = observers.len(), "Hub shutting down");
                break;
            }
        }
    }

    // Dropping the handles closes every remaining queue.
    observers.clear();
    debug!("Hub stopped");
}

fn deliver(
    observers: &mut HashMap<String, ConnectionHandle>,
    channel: &str,
    payload: String,
) -> Delivery {
    let Some(conn) = observers.get(channel) else {
        return Delivery::NoObserver;
    };

    match conn.enqueue(payload) {
        Ok(()) => Delivery::Queued,
        Err(ConnectionError::QueueSaturated) => {
            warn!(
                channel = %channel,
                connection_id = %conn.id(),
                "Observer queue saturated, dropping payload"
            );
            Delivery::Dropped
        }
        Err(_) => {
            // The actor is gone but its unregister has not arrived yet.
            let id = conn.id();
            observers.remove(channel);
            debug!(channel = %channel, connection_id = %id, "Dropped stale observer");
            Delivery::NoObserver
        }
    }
}
