//! services/studio/src/web/ws_handler.rs
//!
//! This is the entry point and control loop for an editor view's WebSocket
//! connection. Each connection receives the full draft on connect, then every
//! event the draft store publishes. Messages from the view become store signals.

use crate::web::{
    protocol::{ClientMessage, ServerMessage},
    state::AppState,
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use curriculum_core::snapshot::to_storable;
use curriculum_core::store::DraftStore;
use futures::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use std::sync::Arc;
use tokio::sync::{broadcast::error::RecvError, Mutex};
use tracing::{error, info, warn};

type WsSender = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>) {
    info!("New editor view connected.");

    // The sender is shared between the event forwarder and the message loop.
    let (sender, mut receiver) = socket.split();
    let ws_sender: WsSender = Arc::new(Mutex::new(sender));

    // Subscribe before the first snapshot so no event falls between the two.
    let mut events = app_state.store.subscribe();
    if send_draft(&app_state.store, &ws_sender).await.is_err() {
        error!("Failed to send the initial draft.");
        return;
    }

    // --- 1. Event Forwarding ---
    let forwarder = {
        let store = app_state.store.clone();
        let ws_sender = ws_sender.clone();
        tokio::spawn(async move {
            loop {
                let sent = match events.recv().await {
                    Ok(event) => send_message(&ws_sender, &ServerMessage::Event { event }).await,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Editor view missed {} events; resending the draft.", skipped);
                        send_draft(&store, &ws_sender).await
                    }
                    Err(RecvError::Closed) => break,
                };
                if sent.is_err() {
                    break;
                }
            }
        })
    };

    // --- 2. Main Message Loop ---
    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => {
                handle_text_message(text.as_str(), &app_state, &ws_sender).await;
            }
            Message::Close(_) => {
                info!("Editor view sent close frame.");
                break;
            }
            _ => {}
        }
    }

    forwarder.abort();
    info!("Editor view disconnected.");
}

async fn handle_text_message(text: &str, app_state: &AppState, ws_sender: &WsSender) {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            warn!("Failed to parse client message: {}", e);
            let _ = send_message(
                ws_sender,
                &ServerMessage::Error {
                    message: format!("Unrecognised message: {}", e),
                },
            )
            .await;
            return;
        }
    };

    let Some(signal) = message.signal() else {
        let _ = send_draft(&app_state.store, ws_sender).await;
        return;
    };
    if let Err(e) = app_state.store.observe(signal).await {
        error!("Failed to apply signal from editor view: {}", e);
        let _ = send_message(
            ws_sender,
            &ServerMessage::Error {
                message: e.to_string(),
            },
        )
        .await;
    }
}

async fn send_draft(store: &DraftStore, ws_sender: &WsSender) -> Result<(), axum::Error> {
    let view = store.state().await;
    let message = ServerMessage::Draft {
        course_id: view.course_id,
        phase: view.phase,
        dirty: view.dirty,
        curriculum: to_storable(&view.draft),
    };
    send_message(ws_sender, &message).await
}

async fn send_message(ws_sender: &WsSender, message: &ServerMessage) -> Result<(), axum::Error> {
    let json = match serde_json::to_string(message) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize server message: {}", e);
            return Ok(());
        }
    };
    ws_sender.lock().await.send(Message::Text(json.into())).await
}
