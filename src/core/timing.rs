//! Call timing state used to compute how much of an assistant utterance the
//! caller actually heard.

use tokio::time::Instant;

use crate::errors::bridge_error::{BridgeError, BridgeResult};

/// Holds the call start time, the last speech-stop offset reported by the
/// assistant's VAD and the identifier of the assistant's current spoken item.
///
/// Pure state: every method takes the current instant from the caller, and the
/// only writer is the bridge's dispatch loop.
#[derive(Debug, Clone)]
pub struct TimingTracker {
    call_started_at: Instant,
    last_speech_stop_ms: Option<u64>,
    current_item_id: Option<String>,
}

impl TimingTracker {
    pub fn new(call_started_at: Instant) -> Self {
        Self {
            call_started_at,
            last_speech_stop_ms: None,
            current_item_id: None,
        }
    }

    pub fn call_started_at(&self) -> Instant {
        self.call_started_at
    }

    /// Milliseconds between call start and `now`.
    pub fn elapsed_ms(&self, now: Instant) -> u64 {
        now.saturating_duration_since(self.call_started_at)
            .as_millis()
            .try_into()
            .unwrap_or(u64::MAX)
    }

    pub fn last_speech_stop_ms(&self) -> Option<u64> {
        self.last_speech_stop_ms
    }

    pub fn record_speech_stop(&mut self, audio_end_ms: u64) {
        self.last_speech_stop_ms = Some(audio_end_ms);
    }

    pub fn current_item_id(&self) -> Option<&str> {
        self.current_item_id.as_deref()
    }

    pub fn set_current_item(&mut self, item_id: impl Into<String>) {
        self.current_item_id = Some(item_id.into());
    }

    /// Milliseconds of the current item heard by the caller at `now`:
    /// `elapsed_ms - last_speech_stop_ms`.
    ///
    /// Returns `InvalidTruncation` when no speech stop has been recorded yet or
    /// when the recorded stop lies after `now`. Callers clamp that case to zero.
    pub fn heard_ms(&self, now: Instant) -> BridgeResult<u64> {
        let elapsed_ms = self.elapsed_ms(now);
        self.last_speech_stop_ms
            .and_then(|stop| elapsed_ms.checked_sub(stop))
            .ok_or(BridgeError::InvalidTruncation {
                elapsed_ms,
                speech_stop_ms: self.last_speech_stop_ms,
            })
    }
}
