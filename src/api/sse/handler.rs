//! Event-stream handler for subscribers that cannot hold a WebSocket

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::State,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
};
use tracing::{debug, info};

use crate::api::websocket::hub::{new_session_id, Registration, SessionHandle, SessionKind};
use crate::api::websocket::state::AppState;
use crate::protocol::ServerMessage;
use crate::utils::queue::bounded;
use crate::utils::time::now_millis;

/// GET /events - one-way stream carrying the same messages as the WebSocket
pub async fn sse_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let config = &state.config.session;
    let (tx, mut rx) = bounded(config.queue_capacity);
    let session_id = new_session_id();

    let welcome = ServerMessage::Connected {
        session_id: session_id.clone(),
        timestamp: now_millis(),
    };
    if let Ok(frame) = welcome.to_frame() {
        let _ = tx.offer(frame);
    }

    let registration = Registration::new(
        state.hub.clone(),
        SessionHandle::new(session_id.clone(), SessionKind::Stream, tx),
    );
    info!("[{}] Stream session opened", session_id);

    let stream = async_stream::stream! {
        // Dropping the stream drops the registration, which unregisters the session
        let registration = registration;
        while let Some(frame) = rx.recv().await {
            yield Ok::<_, Infallible>(Event::default().event(frame.kind).data(frame.as_str()));
        }
        debug!("[{}] Stream session ended", registration.id());
    };

    Sse::new(stream).keep_alive(KeepAlive::default().interval(config.keep_alive()))
}
