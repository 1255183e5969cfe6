//! Errors raised by the caller/assistant channels and the session bridge.

use thiserror::Error;

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors that can occur while setting up or running a bridged call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BridgeError {
    /// The assistant channel could not be opened. The pending call is rejected
    /// and no retry is attempted.
    #[error("Assistant connection failed: {0}")]
    Connect(String),

    /// A channel's transport failed after it was active. Tears the whole
    /// session down.
    #[error("Channel error: {0}")]
    Channel(String),

    /// A received event did not match the expected schema. Logged and dropped.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The computed heard duration would have been negative, or no speech stop
    /// has been recorded yet.
    #[error(
        "Invalid truncation: heard duration would be negative (elapsed {elapsed_ms}ms, last speech stop {speech_stop_ms:?}ms)"
    )]
    InvalidTruncation {
        elapsed_ms: u64,
        speech_stop_ms: Option<u64>,
    },

    /// A caller tried to attach before the assistant channel was open.
    #[error("Session not ready: assistant channel is not open")]
    SessionNotReady,

    /// A second assistant connection was attempted while one is open.
    #[error("Assistant channel already connected")]
    AlreadyConnected,

    /// An inbound call arrived while another session is still active.
    #[error("Another call is already in progress")]
    SessionBusy,
}

impl BridgeError {
    /// Errors that must collapse into a full session teardown.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BridgeError::Channel(_) | BridgeError::Connect(_))
    }
}
