//! axum server: the WebSocket endpoint and `/health`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use hive_tracker::{PeerSink, Session, Tracker};
use hive_types::events::OutboundEvent;
use hive_types::PeerId;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::session::SessionTable;
use crate::{frame, WireError};

/// Default WebSocket route.
pub const DEFAULT_WS_PATH: &str = "/ws";

/// Default per-session outbound queue depth.
pub const DEFAULT_OUTBOUND_QUEUE_DEPTH: usize = 64;

/// Default maximum inbound frame size (1 MiB).
pub const DEFAULT_MAX_FRAME_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub ws_path: String,
    pub outbound_queue_depth: usize,
    pub max_frame_bytes: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ws_path: DEFAULT_WS_PATH.to_string(),
            outbound_queue_depth: DEFAULT_OUTBOUND_QUEUE_DEPTH,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub tracker: Tracker,
    pub sessions: Arc<SessionTable>,
    pub config: Arc<TransportConfig>,
}

impl AppState {
    pub fn new(tracker: Tracker, sessions: Arc<SessionTable>, config: TransportConfig) -> Self {
        Self {
            tracker,
            sessions,
            config: Arc::new(config),
        }
    }
}

/// Build the router. A `ws_path` without a leading slash gets one.
pub fn router(state: AppState) -> Router {
    let ws_path = if state.config.ws_path.starts_with('/') {
        state.config.ws_path.clone()
    } else {
        format!("/{}", state.config.ws_path)
    };
    Router::new()
        .route(&ws_path, get(ws_handler))
        .route("/health", get(health))
        .with_state(state)
}

/// Serve until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    mut shutdown: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    info!("WebSocket server listening on {}{}", addr, state.config.ws_path);

    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        let _ = shutdown.recv().await;
    })
    .await?;

    info!("WebSocket server stopped");
    Ok(())
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({"status": "ok", "sessions": state.sessions.len()}))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, addr, state))
}

async fn handle_socket(socket: WebSocket, addr: SocketAddr, state: AppState) {
    let peer = match PeerId::new(Uuid::new_v4().to_string()) {
        Ok(peer) => peer,
        Err(e) => {
            error!("Failed to allocate session id: {}", e);
            return;
        }
    };

    // Into the table before the peer row goes active
    let (outbound_tx, outbound_rx) = mpsc::channel(state.config.outbound_queue_depth.max(1));
    state.sessions.insert(peer.clone(), outbound_tx);

    let dispatcher = &state.tracker.dispatcher;
    let mut session = dispatcher.connect(peer.clone(), addr.ip().to_string()).await;

    let (sink, mut stream) = socket.split();
    let writer = tokio::spawn(write_frames(peer.clone(), outbound_rx, sink));

    if session.is_active() {
        while let Some(message) = stream.next().await {
            let message = match message {
                Ok(message) => message,
                Err(e) => {
                    debug!(peer = %peer, %e, "read failed");
                    break;
                }
            };
            match message {
                Message::Text(text) => on_text(&state, &session, &text).await,
                Message::Binary(_) => warn!(peer = %peer, "Dropped frame: {}", WireError::Binary),
                Message::Ping(_) | Message::Pong(_) => {}
                Message::Close(_) => break,
            }
        }
    }

    // Out of the table before the purge, so the row is never active without a session
    state.sessions.remove(&peer);
    dispatcher.disconnect(&mut session).await;

    if let Err(e) = writer.await {
        debug!(peer = %peer, %e, "writer task ended abnormally");
    }
}

/// Decode and dispatch one text frame, queueing any reply to the sender.
pub(crate) async fn on_text(state: &AppState, session: &Session, text: &str) {
    let event = match frame::decode(text, state.config.max_frame_bytes) {
        Ok(event) => event,
        Err(e) => {
            warn!(peer = %session.peer(), "Dropped frame: {}", e);
            return;
        }
    };
    if let Some(reply) = state.tracker.dispatcher.handle(session, event).await {
        state.sessions.deliver(session.peer(), reply);
    }
}

/// Drain a session's outbound queue into its socket. Ends when every sender
/// is gone or the socket fails.
async fn write_frames(
    peer: PeerId,
    mut outbound: mpsc::Receiver<OutboundEvent>,
    mut sink: SplitSink<WebSocket, Message>,
) {
    while let Some(event) = outbound.recv().await {
        let text = match frame::encode(&event) {
            Ok(text) => text,
            Err(e) => {
                error!(peer = %peer, "Failed to encode outbound event: {}", e);
                continue;
            }
        };
        if let Err(e) = sink.send(Message::Text(text)).await {
            debug!(peer = %peer, %e, "write failed");
            break;
        }
    }
    let _ = sink.close().await;
}
