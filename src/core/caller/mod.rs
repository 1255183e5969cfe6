//! Telephony caller channel.
//!
//! [`CallerChannel`] is the bridge's view of the phone call's media stream;
//! [`TwilioMediaStream`] implements it over a Twilio Media Streams WebSocket.

pub mod messages;
pub mod twilio;

use async_trait::async_trait;

use crate::core::events::{AudioPayload, CallerEvent};
use crate::errors::bridge_error::BridgeResult;

pub use twilio::TwilioMediaStream;

/// Operations the bridge performs against the caller's media stream.
#[async_trait]
pub trait CallerChannel: Send {
    /// Play assistant audio to the caller.
    async fn send_audio(&mut self, payload: AudioPayload) -> BridgeResult<()>;

    /// Drop any audio buffered for playback on the caller's side.
    async fn clear_audio(&mut self) -> BridgeResult<()>;

    /// Next event from the stream, in arrival order. `None` once the stream
    /// has ended. Cancel-safe.
    async fn recv(&mut self) -> Option<BridgeResult<CallerEvent>>;

    async fn close(&mut self) -> BridgeResult<()>;
}

pub type BoxedCaller = Box<dyn CallerChannel>;
