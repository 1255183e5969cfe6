//! Twilio Media Streams WebSocket message types.
//!
//! Inbound (Twilio → bridge): `connected`, `start`, `media`, `mark`, `dtmf`,
//! `stop`. Outbound (bridge → Twilio): `media`, `clear`. Every message is a
//! JSON text frame tagged by its `event` field.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::events::{AudioPayload, CallerEvent};
use crate::errors::bridge_error::{BridgeError, BridgeResult};

/// Messages received from Twilio.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum TwilioInbound {
    Connected {
        #[serde(default)]
        protocol: Option<String>,
        #[serde(default)]
        version: Option<String>,
    },
    Start {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        start: StartMetadata,
    },
    Media {
        media: InboundMedia,
    },
    Mark {
        #[serde(default)]
        mark: Option<MarkPayload>,
    },
    Dtmf {
        #[serde(default)]
        dtmf: Option<DtmfPayload>,
    },
    Stop {},
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StartMetadata {
    pub account_sid: Option<String>,
    pub call_sid: Option<String>,
    pub tracks: Vec<String>,
    pub media_format: Option<MediaFormat>,
    pub custom_parameters: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaFormat {
    pub encoding: String,
    pub sample_rate: u32,
    pub channels: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InboundMedia {
    #[serde(default)]
    pub track: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    /// Base64 G.711 u-law audio.
    pub payload: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarkPayload {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DtmfPayload {
    #[serde(default)]
    pub track: Option<String>,
    pub digit: String,
}

/// What the reader does with one inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    Event(CallerEvent),
    /// Recognized but not routed.
    Ignored(&'static str),
    /// Twilio ended the stream.
    Stop,
}

impl TwilioInbound {
    pub fn into_frame(self) -> StreamFrame {
        match self {
            TwilioInbound::Connected { .. } => StreamFrame::Ignored("connected"),
            TwilioInbound::Start { stream_sid, .. } => StreamFrame::Event(CallerEvent::StreamStart {
                stream_id: stream_sid,
            }),
            TwilioInbound::Media { media } => StreamFrame::Event(CallerEvent::Media {
                payload: media.payload.into(),
            }),
            TwilioInbound::Mark { .. } => StreamFrame::Ignored("mark"),
            TwilioInbound::Dtmf { .. } => StreamFrame::Ignored("dtmf"),
            TwilioInbound::Stop {} => StreamFrame::Stop,
        }
    }
}

/// Parse one text frame from Twilio.
pub fn parse_frame(text: &str) -> BridgeResult<StreamFrame> {
    serde_json::from_str::<TwilioInbound>(text)
        .map(TwilioInbound::into_frame)
        .map_err(|e| BridgeError::Protocol(format!("unrecognized media stream message: {e}")))
}

/// Messages sent to Twilio.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum TwilioOutbound {
    Media {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        media: OutboundMedia,
    },
    /// Discard all audio Twilio has buffered for playback.
    Clear {
        #[serde(rename = "streamSid")]
        stream_sid: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct OutboundMedia {
    pub payload: AudioPayload,
}

impl TwilioOutbound {
    pub fn media(stream_sid: &str, payload: AudioPayload) -> Self {
        TwilioOutbound::Media {
            stream_sid: stream_sid.to_string(),
            media: OutboundMedia { payload },
        }
    }

    pub fn clear(stream_sid: &str) -> Self {
        TwilioOutbound::Clear {
            stream_sid: stream_sid.to_string(),
        }
    }
}
