//! WebSocket connection handler

use std::sync::Arc;

use axum::{
    extract::{ws::{WebSocket, WebSocketUpgrade}, State},
    response::Response,
};

use super::hub::{new_session_id, Registration, SessionHandle, SessionKind};
use super::session::SubscriberSession;
use super::state::AppState;
use crate::utils::queue::bounded;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    let max_frame = state.config.session.max_frame_bytes;
    ws.max_frame_size(max_frame)
        .max_message_size(max_frame)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

/// Register the connection with the hub and run it until it closes
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let config = state.config.session.clone();
    let (tx, rx) = bounded(config.queue_capacity);

    let handle = SessionHandle::new(new_session_id(), SessionKind::Duplex, tx.clone());
    let activity = handle.activity();
    let registration = Registration::new(state.hub.clone(), handle);

    let session = SubscriberSession::new(
        registration.id().to_string(),
        config,
        state.control.clone(),
        tx,
        activity,
    );
    session.run(socket, rx).await;
}
