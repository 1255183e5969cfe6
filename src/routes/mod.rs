pub mod media;
pub mod webhooks;

use axum::{Router, routing::get};
use std::sync::Arc;

use crate::handlers::api::health_check;
use crate::state::AppState;

/// Public health route plus the webhook and media stream routers.
pub fn create_app_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(health_check))
        .merge(webhooks::create_webhook_router())
        .merge(media::create_media_router())
}
