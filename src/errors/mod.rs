//! Error types shared across the bridge.
//!
//! - `bridge_error` - failures of the channels and the session lifecycle
//! - `app_error` - HTTP-facing errors returned by the webhook handlers

pub mod app_error;
pub mod bridge_error;
