//! Media stream WebSocket route configuration

use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::handlers::media_stream::media_stream_handler;
use crate::state::AppState;

/// Create the media stream router
///
/// # Endpoint
///
/// `GET /media-stream/{call_sid}` - WebSocket upgrade for the Twilio Media
/// Stream of a call previously accepted on `/incoming-call`. Connections for
/// any other call are closed straight away.
pub fn create_media_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/media-stream/{call_sid}", get(media_stream_handler))
        .layer(TraceLayer::new_for_http())
}
