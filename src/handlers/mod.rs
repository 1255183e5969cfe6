//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check endpoint
//! - `twilio` - Voice webhooks (incoming call, status callback)
//! - `media_stream` - Twilio Media Streams WebSocket

pub mod api;
pub mod media_stream;
pub mod twilio;

pub use media_stream::media_stream_handler;
pub use twilio::{call_status_update, incoming_call};
