//! OpenAI Realtime API WebSocket message types.
//!
//! Only the events the bridge sends or reacts to are modelled. Every other
//! server event deserializes to [`ServerEvent::Unknown`] and is skipped.
//!
//! Client events (sent to server):
//! - session.update - Push the session configuration
//! - input_audio_buffer.append - Append caller audio
//! - conversation.item.create - Add a message to the conversation
//! - conversation.item.truncate - Cut an assistant item to what was heard
//! - response.create - Generate a response
//! - response.cancel - Stop the in-flight response
//!
//! Server events (received from server):
//! - input_audio_buffer.speech_started / speech_stopped - Caller VAD
//! - conversation.item.created - Item added to conversation
//! - response.audio.delta - Audio data chunk
//! - response.audio_transcript.done - Transcript complete
//! - error - Error occurred

use serde::{Deserialize, Serialize};

use super::config::SessionOptions;
use crate::core::events::{AssistantEvent, AudioPayload};

// =============================================================================
// Session Configuration
// =============================================================================

/// Session configuration sent with `session.update`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modalities: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_audio_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_transcription: Option<InputAudioTranscription>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn_detection: Option<TurnDetection>,
}

impl From<&SessionOptions> for SessionConfig {
    fn from(options: &SessionOptions) -> Self {
        Self {
            modalities: Some(vec!["text".to_string(), "audio".to_string()]),
            instructions: Some(options.instructions.clone()).filter(|s| !s.is_empty()),
            voice: Some(options.voice.as_str().to_string()),
            input_audio_format: Some(options.audio_format.as_str().to_string()),
            output_audio_format: Some(options.audio_format.as_str().to_string()),
            input_audio_transcription: options
                .transcription_model
                .as_ref()
                .map(|model| InputAudioTranscription {
                    model: model.clone(),
                }),
            turn_detection: Some(TurnDetection::ServerVad {
                threshold: None,
                prefix_padding_ms: None,
                silence_duration_ms: None,
            }),
        }
    }
}

/// Input audio transcription configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputAudioTranscription {
    pub model: String,
}

/// Turn detection configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TurnDetection {
    /// Server-side VAD; emits the speech started/stopped events barge-in needs.
    #[serde(rename = "server_vad")]
    ServerVad {
        #[serde(skip_serializing_if = "Option::is_none")]
        threshold: Option<f32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        prefix_padding_ms: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        silence_duration_ms: Option<u32>,
    },
}

// =============================================================================
// Conversation Items
// =============================================================================

/// Conversation item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub item_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// user, assistant or system
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<ContentPart>>,
}

impl ConversationItem {
    pub fn is_assistant(&self) -> bool {
        self.role.as_deref() == Some("assistant")
    }
}

/// Content part within a conversation item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentPart {
    /// input_text, input_audio, text or audio
    #[serde(rename = "type", default)]
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
}

// =============================================================================
// Client Events (sent to server)
// =============================================================================

/// Client events sent to the realtime API.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionConfig },

    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend {
        /// Base64-encoded audio, passed through untouched.
        audio: AudioPayload,
    },

    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate { item: ConversationItem },

    #[serde(rename = "conversation.item.truncate")]
    ConversationItemTruncate {
        item_id: String,
        content_index: u32,
        audio_end_ms: u64,
    },

    #[serde(rename = "response.create")]
    ResponseCreate,

    #[serde(rename = "response.cancel")]
    ResponseCancel,
}

impl ClientEvent {
    pub fn audio_append(payload: AudioPayload) -> Self {
        ClientEvent::InputAudioBufferAppend { audio: payload }
    }

    /// A system message asking the assistant to say `text` word for word.
    /// Must be followed by `response.create` for audio to be produced.
    pub fn say_verbatim(text: &str) -> Self {
        ClientEvent::ConversationItemCreate {
            item: ConversationItem {
                item_type: "message".to_string(),
                role: Some("system".to_string()),
                content: Some(vec![ContentPart {
                    content_type: "input_text".to_string(),
                    text: Some(format!("Say this verbatim: {text}")),
                    transcript: None,
                }]),
                ..Default::default()
            },
        }
    }

    pub fn truncate(item_id: &str, audio_end_ms: u64) -> Self {
        ClientEvent::ConversationItemTruncate {
            item_id: item_id.to_string(),
            content_index: 0,
            audio_end_ms,
        }
    }

    /// Wire name of the event, for logging.
    pub fn event_type(&self) -> &'static str {
        match self {
            ClientEvent::SessionUpdate { .. } => "session.update",
            ClientEvent::InputAudioBufferAppend { .. } => "input_audio_buffer.append",
            ClientEvent::ConversationItemCreate { .. } => "conversation.item.create",
            ClientEvent::ConversationItemTruncate { .. } => "conversation.item.truncate",
            ClientEvent::ResponseCreate => "response.create",
            ClientEvent::ResponseCancel => "response.cancel",
        }
    }
}

// =============================================================================
// Server Events (received from server)
// =============================================================================

/// Server events received from the realtime API.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "error")]
    Error { error: ApiError },

    #[serde(rename = "session.created")]
    SessionCreated { session: SessionInfo },

    #[serde(rename = "session.updated")]
    SessionUpdated { session: SessionInfo },

    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted {
        #[serde(default)]
        audio_start_ms: u64,
        #[serde(default)]
        item_id: Option<String>,
    },

    #[serde(rename = "input_audio_buffer.speech_stopped")]
    SpeechStopped {
        audio_end_ms: u64,
        #[serde(default)]
        item_id: Option<String>,
    },

    #[serde(rename = "conversation.item.created")]
    ConversationItemCreated { item: ConversationItem },

    #[serde(rename = "conversation.item.truncated")]
    ConversationItemTruncated { item_id: String, audio_end_ms: u64 },

    #[serde(rename = "response.audio.delta")]
    AudioDelta {
        delta: String,
        #[serde(default)]
        item_id: Option<String>,
    },

    #[serde(rename = "response.audio_transcript.done")]
    AudioTranscriptDone {
        transcript: String,
        #[serde(default)]
        item_id: Option<String>,
    },

    /// Any event type the bridge does not react to.
    #[serde(other)]
    Unknown,
}

impl ServerEvent {
    /// Map to the bridge's event, or `None` for events it does not route.
    pub fn into_assistant_event(self) -> Option<AssistantEvent> {
        match self {
            ServerEvent::SpeechStarted { .. } => Some(AssistantEvent::SpeechStarted),
            ServerEvent::SpeechStopped { audio_end_ms, .. } => {
                Some(AssistantEvent::SpeechStopped { audio_end_ms })
            }
            // Only assistant items are truncation targets.
            ServerEvent::ConversationItemCreated { item } if item.is_assistant() => {
                item.id.map(|item_id| AssistantEvent::ItemCreated { item_id })
            }
            ServerEvent::AudioDelta { delta, .. } => Some(AssistantEvent::AudioDelta {
                payload: delta.into(),
            }),
            ServerEvent::AudioTranscriptDone { transcript, .. } => {
                Some(AssistantEvent::TranscriptDone { text: transcript })
            }
            _ => None,
        }
    }
}

// =============================================================================
// Supporting Types
// =============================================================================

/// API error information.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiError {
    #[serde(rename = "type", default)]
    pub error_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
}

/// Session information returned by the server.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub voice: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::assistant::config::{AudioFormat, RealtimeVoice};
    use serde_json::{Value, json};

    #[test]
    fn test_audio_append_passes_payload_through() {
        let event = ClientEvent::audio_append(AudioPayload::from("f39/fw=="));
        let json: Value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            json!({"type": "input_audio_buffer.append", "audio": "f39/fw=="})
        );
    }

    #[test]
    fn test_truncate_serialization() {
        let json = serde_json::to_value(ClientEvent::truncate("item_a1", 400)).unwrap();
        assert_eq!(
            json,
            json!({
                "type": "conversation.item.truncate",
                "item_id": "item_a1",
                "content_index": 0,
                "audio_end_ms": 400
            })
        );
    }

    #[test]
    fn test_say_verbatim_is_system_message() {
        let json = serde_json::to_value(ClientEvent::say_verbatim("Hello there")).unwrap();
        assert_eq!(json["type"], "conversation.item.create");
        assert_eq!(json["item"]["type"], "message");
        assert_eq!(json["item"]["role"], "system");
        assert_eq!(json["item"]["content"][0]["type"], "input_text");
        assert_eq!(
            json["item"]["content"][0]["text"],
            "Say this verbatim: Hello there"
        );
        assert!(json["item"].get("id").is_none());
    }

    #[test]
    fn test_unit_events_serialization() {
        assert_eq!(
            serde_json::to_value(ClientEvent::ResponseCancel).unwrap(),
            json!({"type": "response.cancel"})
        );
        assert_eq!(
            serde_json::to_value(ClientEvent::ResponseCreate).unwrap(),
            json!({"type": "response.create"})
        );
    }

    #[test]
    fn test_session_update_from_options() {
        let options = SessionOptions {
            instructions: "Be brief.".to_string(),
            voice: RealtimeVoice::Shimmer,
            audio_format: AudioFormat::G711Ulaw,
            transcription_model: Some("whisper-1".to_string()),
        };
        let event = ClientEvent::SessionUpdate {
            session: SessionConfig::from(&options),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "session.update");
        assert_eq!(json["session"]["voice"], "shimmer");
        assert_eq!(json["session"]["instructions"], "Be brief.");
        assert_eq!(json["session"]["input_audio_format"], "g711_ulaw");
        assert_eq!(json["session"]["output_audio_format"], "g711_ulaw");
        assert_eq!(json["session"]["turn_detection"]["type"], "server_vad");
        assert_eq!(
            json["session"]["input_audio_transcription"]["model"],
            "whisper-1"
        );
    }

    #[test]
    fn test_speech_events_map() {
        let event: ServerEvent = serde_json::from_str(
            r#"{"type":"input_audio_buffer.speech_stopped","event_id":"e1","audio_end_ms":1200,"item_id":"u1"}"#,
        )
        .unwrap();
        assert_eq!(
            event.into_assistant_event(),
            Some(AssistantEvent::SpeechStopped { audio_end_ms: 1200 })
        );

        let event: ServerEvent = serde_json::from_str(
            r#"{"type":"input_audio_buffer.speech_started","audio_start_ms":900,"item_id":"u1"}"#,
        )
        .unwrap();
        assert_eq!(
            event.into_assistant_event(),
            Some(AssistantEvent::SpeechStarted)
        );
    }

    #[test]
    fn test_item_created_only_for_assistant_items() {
        let assistant: ServerEvent = serde_json::from_str(
            r#"{"type":"conversation.item.created","previous_item_id":null,
                "item":{"id":"item_a1","object":"realtime.item","type":"message","role":"assistant","content":[]}}"#,
        )
        .unwrap();
        assert_eq!(
            assistant.into_assistant_event(),
            Some(AssistantEvent::ItemCreated {
                item_id: "item_a1".to_string()
            })
        );

        let user: ServerEvent = serde_json::from_str(
            r#"{"type":"conversation.item.created","item":{"id":"item_u1","type":"message","role":"user"}}"#,
        )
        .unwrap();
        assert_eq!(user.into_assistant_event(), None);
    }

    #[test]
    fn test_audio_delta_and_transcript_map() {
        let delta: ServerEvent = serde_json::from_str(
            r#"{"type":"response.audio.delta","response_id":"r1","item_id":"a1","output_index":0,"content_index":0,"delta":"AAEC"}"#,
        )
        .unwrap();
        assert_eq!(
            delta.into_assistant_event(),
            Some(AssistantEvent::AudioDelta {
                payload: "AAEC".into()
            })
        );

        let done: ServerEvent = serde_json::from_str(
            r#"{"type":"response.audio_transcript.done","transcript":"Hi, how can I help?"}"#,
        )
        .unwrap();
        assert_eq!(
            done.into_assistant_event(),
            Some(AssistantEvent::TranscriptDone {
                text: "Hi, how can I help?".to_string()
            })
        );
    }

    #[test]
    fn test_unknown_and_error_events() {
        let event: ServerEvent =
            serde_json::from_str(r#"{"type":"rate_limits.updated","rate_limits":[]}"#).unwrap();
        assert!(matches!(event, ServerEvent::Unknown));
        assert!(event.into_assistant_event().is_none());

        let event: ServerEvent = serde_json::from_str(
            r#"{"type":"error","error":{"type":"invalid_request_error","message":"bad item"}}"#,
        )
        .unwrap();
        match event {
            ServerEvent::Error { error } => assert_eq!(error.message, "bad item"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_malformed_known_event_fails() {
        let result = serde_json::from_str::<ServerEvent>(
            r#"{"type":"input_audio_buffer.speech_stopped"}"#,
        );
        assert!(result.is_err());
    }
}
