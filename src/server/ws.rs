//! Real-time chat connection handler.
//!
//! Each connection runs three tasks. The reader owns the receive half and
//! stays responsive to close frames at all times. A request task processes
//! chat frames one at a time, in arrival order. A writer task drains outbound
//! frames to the socket. When the reader sees the connection end it
//! deregisters the client at once; a backend call already in flight runs to
//! completion and its reply is discarded.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::protocol::{decode, ClientFrame, Decoded, ServerFrame};
use crate::app::AppState;
use crate::constants::{STATUS_ALREADY_CONNECTED, STATUS_HISTORY_CLEARED, STATUS_INVALID_FRAME};
use crate::runtime::{ChatReply, ChatRequest};

const OUTBOUND_BUFFER: usize = 32;
const INBOUND_BUFFER: usize = 32;

/// WebSocket upgrade handler for `/ws/{client_id}`
pub async fn ws_chat(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(client_id): Path<String>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state, client_id))
}

async fn handle_connection(socket: WebSocket, state: AppState, client_id: String) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    if !state.sessions.attach(&client_id) {
        warn!(client_id = %client_id, "Rejecting second connection for live client id");
        if let Ok(text) = serde_json::to_string(&ServerFrame::status(STATUS_ALREADY_CONNECTED)) {
            let _ = ws_sender.send(Message::Text(text.into())).await;
        }
        let _ = ws_sender.send(Message::Close(None)).await;
        return;
    }

    info!(client_id = %client_id, backend = %state.backend_name(), "Client connected");

    let (tx, mut rx) = mpsc::channel::<ServerFrame>(OUTBOUND_BUFFER);
    let writer_client = client_id.clone();
    tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let text = match serde_json::to_string(&frame) {
                Ok(text) => text,
                Err(e) => {
                    error!(error = %e, "Failed to serialize outbound frame");
                    continue;
                }
            };
            if ws_sender.send(Message::Text(text.into())).await.is_err() {
                debug!(client_id = %writer_client, "Client gone, dropping outbound frames");
                break;
            }
        }
        let _ = ws_sender.close().await;
    });

    let greeting = format!("Connected to {}, ready to chat!", state.backend_name());
    let _ = tx.send(ServerFrame::status(greeting)).await;

    let open = Arc::new(AtomicBool::new(true));
    let (inbound_tx, inbound_rx) = mpsc::channel::<String>(INBOUND_BUFFER);
    tokio::spawn(run_requests(
        state.clone(),
        client_id.clone(),
        inbound_rx,
        tx,
        open.clone(),
    ));

    while let Some(message) = ws_receiver.next().await {
        let message = match message {
            Ok(message) => message,
            Err(e) => {
                debug!(client_id = %client_id, error = %e, "WebSocket receive failed");
                break;
            }
        };

        match message {
            Message::Text(text) => {
                if inbound_tx.send(text.as_str().to_owned()).await.is_err() {
                    break;
                }
            }
            Message::Binary(_) => {
                warn!(client_id = %client_id, "Ignoring binary frame");
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    // Frames still queued belong to a connection that no longer exists
    open.store(false, Ordering::SeqCst);
    drop(inbound_tx);

    state.sessions.detach(&client_id, state.retain_sessions);
    info!(client_id = %client_id, "Client disconnected");
}

/// Process one connection's frames strictly in order
async fn run_requests(
    state: AppState,
    client_id: String,
    mut inbound: mpsc::Receiver<String>,
    outbound: mpsc::Sender<ServerFrame>,
    open: Arc<AtomicBool>,
) {
    while let Some(text) = inbound.recv().await {
        if !open.load(Ordering::SeqCst) {
            debug!(client_id = %client_id, "Connection closed, dropping queued frames");
            break;
        }

        let reply = process_frame(&state, &client_id, &text).await;

        if !open.load(Ordering::SeqCst) {
            debug!(client_id = %client_id, "Reply for disconnected client discarded");
            if !state.retain_sessions {
                // The call may have recreated the session after the reader detached
                state.sessions.drop_if_detached(&client_id);
            }
            break;
        }

        if let Some(frame) = reply {
            if outbound.send(frame).await.is_err() {
                debug!(client_id = %client_id, "Reply for disconnected client discarded");
                break;
            }
        }
    }
}

/// Handle one inbound text frame, returning the frame to send back if any
pub async fn process_frame(state: &AppState, client_id: &str, text: &str) -> Option<ServerFrame> {
    match decode(text) {
        Decoded::Frame(ClientFrame::Chat { content, category }) => {
            let mut request = ChatRequest::new(client_id, content);
            if let Some(category) = category.filter(|c| !c.trim().is_empty()) {
                request = request.with_category(category);
            }
            Some(state.orchestrator.respond(&request).await.into())
        }
        Decoded::Frame(ClientFrame::Clear) => {
            state.sessions.clear(client_id);
            debug!(client_id = %client_id, "History cleared");
            Some(ChatReply::status(STATUS_HISTORY_CLEARED).into())
        }
        Decoded::Frame(ClientFrame::Unknown) | Decoded::UnknownType(_) => {
            warn!(client_id = %client_id, frame = %text, "Ignoring frame with unrecognized type");
            None
        }
        Decoded::Invalid(reason) => {
            warn!(client_id = %client_id, error = %reason, "Malformed frame");
            Some(ChatReply::status(STATUS_INVALID_FRAME).into())
        }
    }
}
