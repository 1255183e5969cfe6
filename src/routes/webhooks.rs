//! Twilio webhook route configuration

use axum::{Router, routing::post};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::handlers::twilio::{call_status_update, incoming_call};
use crate::state::AppState;

/// Create the webhook router
///
/// # Endpoints
///
/// - `POST /incoming-call` - Twilio voice URL; answers with `<Connect><Stream>` TwiML
/// - `POST /call-status-update` - Twilio status callback
///
/// Twilio posts `application/x-www-form-urlencoded` bodies to both.
pub fn create_webhook_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/incoming-call", post(incoming_call))
        .route("/call-status-update", post(call_status_update))
        .layer(TraceLayer::new_for_http())
}
