pub mod assistant;
pub mod bridge;
pub mod caller;
pub mod events;
pub mod router;
pub mod session;
pub mod timing;

// Re-export commonly used types for convenience
pub use assistant::{
    AssistantChannel, AssistantConnector, AssistantSlot, AudioFormat, BoxedAssistant,
    OpenAIConnector, OpenAIRealtimeChannel, OpenAIRealtimeSettings, RealtimeModel, RealtimeVoice,
    SessionOptions,
};
pub use bridge::{BridgeAction, BridgeContext, BridgeSettings, SessionBridge};
pub use caller::{BoxedCaller, CallerChannel, TwilioMediaStream};
pub use events::{
    AssistantEvent, AudioFrame, AudioPayload, CallerEvent, Direction, EventKind, InboundEvent,
};
pub use router::EventRouter;
pub use session::{SessionManager, SessionSnapshot, SessionState};
pub use timing::TimingTracker;
