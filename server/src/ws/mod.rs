//! WebSocket Observers
//!
//! Observers connect to `/ws/{channel}` and receive every webhook delivered
//! to that channel. The write side of each socket belongs to a
//! [`Connection`] actor registered in the [`Hub`]; a separate read pump
//! watches the peer and ends the actor when it goes silent or disconnects.

pub mod connection;
pub mod hub;

use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::stream::SplitStream;
use futures::StreamExt;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

pub use connection::{
    Connection, ConnectionError, ConnectionExit, ConnectionHandle, ConnectionState,
};
pub use hub::{Delivery, Hub, HubError, ListenerInfo, DEFAULT_HUB_CAPACITY};

use crate::api::AppState;

/// WebSocket upgrade handler.
///
/// GET /ws/{channel}
#[instrument(skip(state, ws))]
pub async fn handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(channel): Path<String>,
) -> Response {
    if channel.is_empty() {
        return (StatusCode::BAD_REQUEST, "Listener name is required").into_response();
    }

    let max_message_size = state.config.ws.max_message_size;
    ws.max_message_size(max_message_size)
        .max_frame_size(max_message_size)
        .on_upgrade(move |socket| serve_observer(socket, state, channel))
}

/// Drive one observer socket from registration to release.
async fn serve_observer(socket: WebSocket, state: AppState, channel: String) {
    let settings = state.config.ws;
    let (sink, stream) = socket.split();
    let (peer_gone_tx, peer_gone_rx) = watch::channel(false);

    let (handle, actor) = Connection::new(channel.clone(), sink, settings, peer_gone_rx);
    let connection_id = handle.id();

    if let Err(e) = state.hub.register(handle).await {
        warn!(channel = %channel, error = %e, "Could not register observer");
        return;
    }
    info!(channel = %channel, connection_id = %connection_id, "Observer connected");

    let reader = tokio::spawn(read_pump(stream, settings.pong_timeout, peer_gone_tx));
    let exit = actor.run().await;
    reader.abort();

    if let Err(e) = state.hub.unregister(&channel, connection_id).await {
        debug!(channel = %channel, error = %e, "Hub gone before unregister");
    }
    info!(
        channel = %channel,
        connection_id = %connection_id,
        exit = ?exit,
        "Observer disconnected"
    );
}

/// Consume frames from the peer until it closes, errors, or stays silent
/// past `pong_timeout`, then flip `peer_gone`.
///
/// Observers have nothing to say; any frame (usually a pong) only proves the
/// peer is alive. Oversized frames are rejected by the socket itself.
async fn read_pump(
    mut stream: SplitStream<WebSocket>,
    pong_timeout: Duration,
    peer_gone: watch::Sender<bool>,
) {
    loop {
        match timeout(pong_timeout, stream.next()).await {
            Ok(Some(Ok(Message::Close(_))) | None) => break,
            Ok(Some(Ok(_))) => {}
            Ok(Some(Err(e))) => {
                debug!(error = %e, "Observer read failed");
                break;
            }
            Err(_) => {
                debug!("Observer missed its pong deadline");
                break;
            }
        }
    }
    peer_gone.send_replace(true);
}
