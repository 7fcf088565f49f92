//! Observer Connection Actor
//!
//! Each accepted observer gets one `Connection`, which owns the write half of
//! the socket. Other components only ever hold a [`ConnectionHandle`] and talk
//! to the actor through its bounded outbound queue.
//!
//! The drain loop waits on three things:
//! - the next queued payload, which is written together with everything else
//!   already queued as one newline-joined text frame;
//! - the keepalive tick, which sends a ping control frame;
//! - the shutdown watch, flipped by the read pump when the peer goes away.
//!
//! Every write carries a deadline. Any write error or missed deadline ends the
//! loop; the socket is released when the actor is dropped.

use std::fmt::Display;
use std::time::Instant;

use axum::extract::ws::Message;
use chrono::{DateTime, Utc};
use futures::{Sink, SinkExt};
use hooktap_common::protocol::push_message;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, timeout, MissedTickBehavior};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::ConnectionSettings;

/// Errors surfaced by a connection or its handle.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConnectionError {
    /// The outbound queue is full; the payload was dropped.
    #[error("Outbound queue is full")]
    QueueSaturated,

    /// The actor has terminated and no longer accepts payloads.
    #[error("Connection closed")]
    Closed,

    /// Writing to the peer failed.
    #[error("Write failed: {0}")]
    Write(String),

    /// Writing to the peer did not finish before the deadline.
    #[error("Write deadline exceeded")]
    DeadlineExceeded,
}

/// Liveness of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Accepting and flushing payloads.
    Open,
    /// Sending the close frame.
    Closing,
    /// Terminated; the socket has been released.
    Closed,
}

/// Why a drain loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionExit {
    /// The queue was closed (replaced or hub shutdown); a close frame was sent.
    QueueClosed,
    /// The read pump reported the peer gone.
    PeerGone,
    /// A write failed or missed its deadline.
    Failed(ConnectionError),
}

/// Cloneable sending side of a connection, held by the hub.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: Uuid,
    channel: String,
    connected_at: DateTime<Utc>,
    tx: mpsc::Sender<String>,
    state: watch::Receiver<ConnectionState>,
}

impl ConnectionHandle {
    /// Unique id of this connection.
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Channel this connection observes.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// When the observer connected.
    pub const fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Current liveness of the actor.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Whether the actor is still draining its queue.
    pub fn is_live(&self) -> bool {
        self.state() != ConnectionState::Closed && !self.tx.is_closed()
    }

    /// Queue a payload without waiting.
    ///
    /// A full queue drops the new payload (drop-newest) and reports
    /// [`ConnectionError::QueueSaturated`]; payloads already queued keep their
    /// order.
    pub fn enqueue(&self, payload: String) -> Result<(), ConnectionError> {
        self.tx.try_send(payload).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ConnectionError::QueueSaturated,
            mpsc::error::TrySendError::Closed(_) => ConnectionError::Closed,
        })
    }
}

/// The actor owning the write half of one observer socket.
pub struct Connection<S> {
    id: Uuid,
    channel: String,
    sink: S,
    rx: mpsc::Receiver<String>,
    shutdown: watch::Receiver<bool>,
    settings: ConnectionSettings,
    state: watch::Sender<ConnectionState>,
    last_activity: Instant,
}

impl<S> Connection<S>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    /// Create the actor and its handle.
    ///
    /// The actor stops on its own once every handle is dropped, so the hub
    /// closes an actor simply by forgetting its handle.
    pub fn new(
        channel: impl Into<String>,
        sink: S,
        settings: ConnectionSettings,
        shutdown: watch::Receiver<bool>,
    ) -> (ConnectionHandle, Self) {
        let id = Uuid::now_v7();
        let channel = channel.into();
        let (tx, rx) = mpsc::channel(settings.send_queue_capacity);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Open);

        let handle = ConnectionHandle {
            id,
            channel: channel.clone(),
            connected_at: Utc::now(),
            tx,
            state: state_rx,
        };
        let actor = Self {
            id,
            channel,
            sink,
            rx,
            shutdown,
            settings,
            state: state_tx,
            last_activity: Instant::now(),
        };

        (handle, actor)
    }

    /// Run the drain loop until the queue closes, the peer leaves, or a write
    /// fails.
    pub async fn run(mut self) -> ConnectionExit {
        let period = self.settings.ping_period();
        let mut keepalive = interval_at(tokio::time::Instant::now() + period, period);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let exit = loop {
            tokio::select! {
                payload = self.rx.recv() => {
                    let Some(first) = payload else {
                        self.set_state(ConnectionState::Closing);
                        // Best effort; the queue is closed either way.
                        let _ = self.write(Message::Close(None)).await;
                        break ConnectionExit::QueueClosed;
                    };
                    let frame = self.coalesce(first);
                    if let Err(e) = self.write(Message::Text(frame.into())).await {
                        break ConnectionExit::Failed(e);
                    }
                }
                _ = keepalive.tick() => {
                    if let Err(e) = self.write(Message::Ping(Vec::new().into())).await {
                        break ConnectionExit::Failed(e);
                    }
                }
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break ConnectionExit::PeerGone;
                    }
                }
            }
        };

        self.rx.close();
        self.set_state(ConnectionState::Closed);

        match &exit {
            ConnectionExit::Failed(e) => warn!(
                channel = %self.channel,
                connection_id = %self.id,
                idle_ms = self.last_activity.elapsed().as_millis() as u64,
                error = %e,
                "Observer connection failed"
            ),
            _ => debug!(
                channel = %self.channel,
                connection_id = %self.id,
                exit = ?exit,
                "Observer connection finished"
            ),
        }

        exit
    }

    /// Join `first` with every payload already waiting, in queue order.
    fn coalesce(&mut self, first: String) -> String {
        let mut frame = first;
        for _ in 1..self.settings.send_queue_capacity {
            match self.rx.try_recv() {
                Ok(next) => push_message(&mut frame, &next),
                Err(_) => break,
            }
        }
        frame
    }

    async fn write(&mut self, message: Message) -> Result<(), ConnectionError> {
        match timeout(self.settings.write_timeout, self.sink.send(message)).await {
            Ok(Ok(())) => {
                self.last_activity = Instant::now();
                Ok(())
            }
            Ok(Err(e)) => Err(ConnectionError::Write(e.to_string())),
            Err(_) => Err(ConnectionError::DeadlineExceeded),
        }
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }
}

#[cfg(test)]
impl<S> Connection<S> {
    /// Take the next queued payload without running the drain loop.
    pub(crate) fn try_next_queued(&mut self) -> Option<String> {
        self.rx.try_recv().ok()
    }

    /// Wait for the next queued payload without running the drain loop.
    pub(crate) async fn next_queued(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}
