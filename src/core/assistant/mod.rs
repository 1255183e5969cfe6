//! Realtime assistant channel.
//!
//! The assistant side of a call is a single long-lived WebSocket session with
//! the speech model. [`AssistantChannel`] abstracts it so the bridge can be
//! driven by a scripted fake in tests; [`OpenAIRealtimeChannel`] is the real
//! implementation.
//!
//! Events are pulled with [`AssistantChannel::recv`], which is backed by an
//! mpsc receiver and therefore safe to use inside `tokio::select!`.

pub mod config;
pub mod messages;
pub mod openai;
pub mod slot;

use async_trait::async_trait;

use crate::core::events::{AssistantEvent, AudioPayload};
use crate::errors::bridge_error::BridgeResult;

pub use config::{AudioFormat, OPENAI_REALTIME_URL, RealtimeModel, RealtimeVoice, SessionOptions};
pub use openai::{OpenAIConnector, OpenAIRealtimeChannel, OpenAIRealtimeSettings};
pub use slot::{AssistantSlot, SlotGuard};

/// Operations the bridge performs against the realtime assistant.
#[async_trait]
pub trait AssistantChannel: Send {
    /// Open the connection. Resolves once the socket is usable or fails with
    /// `Connect`. A second live connection fails with `AlreadyConnected`.
    async fn connect(&mut self) -> BridgeResult<()>;

    fn is_open(&self) -> bool;

    /// Append caller audio to the assistant's input buffer.
    async fn send_audio(&mut self, payload: AudioPayload) -> BridgeResult<()>;

    /// Ask the assistant to say `text` verbatim.
    async fn speak(&mut self, text: &str) -> BridgeResult<()>;

    /// Stop the assistant from producing any more audio for the current
    /// response.
    async fn clear_audio(&mut self) -> BridgeResult<()>;

    /// Cut the assistant's record of `item_id` down to its first `heard_ms`
    /// milliseconds.
    async fn truncate(&mut self, item_id: &str, heard_ms: u64) -> BridgeResult<()>;

    async fn configure_session(&mut self, options: &SessionOptions) -> BridgeResult<()>;

    /// Next event from the assistant. `None` once the channel is closed.
    /// A transport failure is yielded once as `Err(Channel)`.
    async fn recv(&mut self) -> Option<BridgeResult<AssistantEvent>>;

    async fn close(&mut self) -> BridgeResult<()>;
}

pub type BoxedAssistant = Box<dyn AssistantChannel>;

/// Creates unconnected assistant channels, one per accepted call.
pub trait AssistantConnector: Send + Sync {
    fn create(&self) -> BoxedAssistant;
}
