//! Twilio Media Streams WebSocket endpoint.

use std::sync::Arc;

use axum::{
    extract::{
        Path, State,
        ws::{WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use tracing::{error, info, warn};

use crate::core::caller::TwilioMediaStream;
use crate::state::AppState;

/// Twilio media frames are small; anything near this size is not audio.
const MAX_WS_MESSAGE_SIZE: usize = 1024 * 1024;

pub async fn media_stream_handler(
    ws: WebSocketUpgrade,
    Path(call_sid): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Response {
    info!(call_sid = %call_sid, "Media stream connection upgrade requested");

    ws.max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_media_stream(socket, call_sid, state))
}

async fn handle_media_stream(socket: WebSocket, call_sid: String, state: Arc<AppState>) {
    let caller = Box::new(TwilioMediaStream::new(socket, call_sid.as_str()));

    match state.sessions.serve_caller(&call_sid, caller).await {
        Ok(()) => info!(call_sid = %call_sid, "Media stream finished"),
        Err(e) if e.is_fatal() => error!(call_sid = %call_sid, error = %e, "Media stream session failed"),
        Err(e) => warn!(call_sid = %call_sid, error = %e, "Media stream rejected"),
    }
}
