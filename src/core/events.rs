//! Inbound events produced by the two channels and the opaque audio payload
//! they carry.

use std::fmt;
use std::sync::Arc;

use serde::{Serialize, Serializer};

/// Opaque audio payload, kept in the transport's own encoding.
///
/// Both Twilio media frames and OpenAI audio deltas are base64 text with the
/// same G.711 u-law framing, so the bridge forwards the text as-is and never
/// decodes it. Cloning is a reference-count bump.
#[derive(Clone, PartialEq, Eq)]
pub struct AudioPayload(Arc<str>);

impl AudioPayload {
    pub fn new(payload: impl Into<Arc<str>>) -> Self {
        Self(payload.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for AudioPayload {
    fn from(value: String) -> Self {
        Self(value.into())
    }
}

impl From<&str> for AudioPayload {
    fn from(value: &str) -> Self {
        Self(value.into())
    }
}

impl Serialize for AudioPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl fmt::Debug for AudioPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AudioPayload({} bytes)", self.0.len())
    }
}

/// Logical direction of an audio frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ToCaller,
    ToAssistant,
}

/// An audio frame in flight through the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    pub payload: AudioPayload,
    pub direction: Direction,
}

/// Events received from the telephony media stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallerEvent {
    /// The media stream started and was assigned an identifier.
    StreamStart { stream_id: String },
    /// A frame of caller audio.
    Media { payload: AudioPayload },
}

/// Events received from the realtime assistant session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssistantEvent {
    /// The assistant's VAD detected the caller starting to speak.
    SpeechStarted,
    /// The assistant's VAD detected the caller stopping, at `audio_end_ms`
    /// into the input audio stream.
    SpeechStopped { audio_end_ms: u64 },
    /// The assistant created a new spoken item.
    ItemCreated { item_id: String },
    /// A chunk of assistant audio.
    AudioDelta { payload: AudioPayload },
    /// Final transcript of an assistant utterance.
    TranscriptDone { text: String },
}

/// Any event the bridge dispatches, tagged by its source channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    Caller(CallerEvent),
    Assistant(AssistantEvent),
}

/// Discriminant used by the router to register handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    StreamStart,
    Media,
    SpeechStarted,
    SpeechStopped,
    ItemCreated,
    AudioDelta,
    TranscriptDone,
}

impl EventKind {
    /// Every kind emitted by the assistant channel.
    pub const ASSISTANT: [EventKind; 5] = [
        EventKind::SpeechStarted,
        EventKind::SpeechStopped,
        EventKind::ItemCreated,
        EventKind::AudioDelta,
        EventKind::TranscriptDone,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::StreamStart => "start",
            EventKind::Media => "media",
            EventKind::SpeechStarted => "input_audio_buffer.speech_started",
            EventKind::SpeechStopped => "input_audio_buffer.speech_stopped",
            EventKind::ItemCreated => "conversation.item.created",
            EventKind::AudioDelta => "response.audio.delta",
            EventKind::TranscriptDone => "response.audio_transcript.done",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl InboundEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            InboundEvent::Caller(CallerEvent::StreamStart { .. }) => EventKind::StreamStart,
            InboundEvent::Caller(CallerEvent::Media { .. }) => EventKind::Media,
            InboundEvent::Assistant(AssistantEvent::SpeechStarted) => EventKind::SpeechStarted,
            InboundEvent::Assistant(AssistantEvent::SpeechStopped { .. }) => {
                EventKind::SpeechStopped
            }
            InboundEvent::Assistant(AssistantEvent::ItemCreated { .. }) => EventKind::ItemCreated,
            InboundEvent::Assistant(AssistantEvent::AudioDelta { .. }) => EventKind::AudioDelta,
            InboundEvent::Assistant(AssistantEvent::TranscriptDone { .. }) => {
                EventKind::TranscriptDone
            }
        }
    }

    /// Turn the event into the audio frame it carries, if any.
    pub fn into_audio_frame(self) -> Option<AudioFrame> {
        match self {
            InboundEvent::Caller(CallerEvent::Media { payload }) => Some(AudioFrame {
                payload,
                direction: Direction::ToAssistant,
            }),
            InboundEvent::Assistant(AssistantEvent::AudioDelta { payload }) => Some(AudioFrame {
                payload,
                direction: Direction::ToCaller,
            }),
            _ => None,
        }
    }
}

impl From<CallerEvent> for InboundEvent {
    fn from(event: CallerEvent) -> Self {
        InboundEvent::Caller(event)
    }
}

impl From<AssistantEvent> for InboundEvent {
    fn from(event: AssistantEvent) -> Self {
        InboundEvent::Assistant(event)
    }
}
