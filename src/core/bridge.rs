//! Per-call bridge between the caller's media stream and the assistant.
//!
//! Audio is relayed verbatim in both directions. When the assistant's VAD
//! reports that the caller started speaking, the bridge performs barge-in:
//!
//! 1. tell the assistant to stop producing audio,
//! 2. tell the caller's side to drop buffered playback,
//! 3. if an assistant item is current, truncate it to the part the caller
//!    actually heard: `elapsed_ms - last_speech_stop_ms`, clamped to zero.
//!
//! Both channels are drained by one `select!` loop, so every event is handled
//! to completion before the next one and the timing state needs no locking.

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::assistant::{BoxedAssistant, SessionOptions};
use super::caller::BoxedCaller;
use super::events::{
    AssistantEvent, AudioFrame, CallerEvent, Direction, EventKind, InboundEvent,
};
use super::router::EventRouter;
use super::timing::TimingTracker;
use crate::errors::bridge_error::{BridgeError, BridgeResult};

/// Side effects requested by routed handlers, performed in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeAction {
    Forward(AudioFrame),
    ClearAssistant,
    ClearCaller,
    Truncate { item_id: String, heard_ms: u64 },
    ConfigureAssistant,
    Speak(String),
}

/// Per-call settings applied once the caller's stream starts.
#[derive(Debug, Clone, Default)]
pub struct BridgeSettings {
    /// Spoken verbatim by the assistant when the stream starts.
    pub introduction: String,
    pub session: SessionOptions,
}

/// State the routed handlers read and update.
#[derive(Debug, Clone)]
pub struct BridgeContext {
    pub timing: TimingTracker,
    pub stream_id: Option<String>,
    pub introduction: String,
    /// Time at which the event being routed was received.
    pub now: Instant,
}

impl BridgeContext {
    pub fn new(introduction: impl Into<String>, now: Instant) -> Self {
        Self {
            timing: TimingTracker::new(now),
            stream_id: None,
            introduction: introduction.into(),
            now,
        }
    }
}

pub type BridgeRouter = EventRouter<BridgeContext, BridgeAction>;

/// Wire the handlers that implement relaying and barge-in.
pub fn build_router() -> BridgeRouter {
    let mut router = BridgeRouter::new();

    for kind in EventKind::ASSISTANT {
        if kind == EventKind::AudioDelta {
            continue;
        }
        router.on(kind, |ctx: &mut BridgeContext, event| {
            debug!(
                elapsed_ms = ctx.timing.elapsed_ms(ctx.now),
                event = %event.kind(),
                "Assistant event"
            );
            Vec::new()
        });
    }

    router
        .on(EventKind::StreamStart, |ctx, event| {
            let InboundEvent::Caller(CallerEvent::StreamStart { stream_id }) = event else {
                return Vec::new();
            };
            info!(stream_id = %stream_id, "Media stream started");
            ctx.stream_id = Some(stream_id.clone());

            // Configuring the session here rather than right after connecting
            // has made the assistant noticeably more responsive in practice.
            vec![
                BridgeAction::ConfigureAssistant,
                BridgeAction::Speak(ctx.introduction.clone()),
            ]
        })
        .on(EventKind::Media, forward_audio)
        .on(EventKind::AudioDelta, forward_audio)
        .on(EventKind::ItemCreated, |ctx, event| {
            if let InboundEvent::Assistant(AssistantEvent::ItemCreated { item_id }) = event {
                ctx.timing.set_current_item(item_id.as_str());
            }
            Vec::new()
        })
        .on(EventKind::SpeechStopped, |ctx, event| {
            if let InboundEvent::Assistant(AssistantEvent::SpeechStopped { audio_end_ms }) = event {
                ctx.timing.record_speech_stop(*audio_end_ms);
            }
            Vec::new()
        })
        .on(EventKind::SpeechStarted, |_, _| {
            info!("Caller started speaking");
            vec![BridgeAction::ClearAssistant, BridgeAction::ClearCaller]
        })
        .on(EventKind::SpeechStarted, |ctx, _| {
            let Some(item_id) = ctx.timing.current_item_id() else {
                return Vec::new();
            };
            let heard_ms = ctx.timing.heard_ms(ctx.now).unwrap_or_else(|e| {
                warn!(item_id = %item_id, error = %e, "Clamping heard duration to 0");
                0
            });
            vec![BridgeAction::Truncate {
                item_id: item_id.to_string(),
                heard_ms,
            }]
        })
        .on(EventKind::TranscriptDone, |_, event| {
            if let InboundEvent::Assistant(AssistantEvent::TranscriptDone { text }) = event {
                info!(transcript = %text, "Assistant transcript (final)");
            }
            Vec::new()
        });

    router
}

fn forward_audio(_: &mut BridgeContext, event: &InboundEvent) -> Vec<BridgeAction> {
    event
        .clone()
        .into_audio_frame()
        .map(BridgeAction::Forward)
        .into_iter()
        .collect()
}

/// Owns both channels of one call and the dispatch loop between them.
pub struct SessionBridge {
    call_id: String,
    assistant: BoxedAssistant,
    caller: Option<BoxedCaller>,
    ctx: BridgeContext,
    router: BridgeRouter,
    session_options: SessionOptions,
    closed: bool,
}

enum Next {
    Shutdown,
    Caller(Option<BridgeResult<CallerEvent>>),
    Assistant(Option<BridgeResult<AssistantEvent>>),
}

impl SessionBridge {
    /// Open the assistant channel for `call_id`. Resolves only once the channel
    /// is open, or with the error that prevented it.
    pub async fn start(
        call_id: impl Into<String>,
        mut assistant: BoxedAssistant,
        settings: BridgeSettings,
    ) -> BridgeResult<Self> {
        let call_id = call_id.into();
        assistant.connect().await?;
        info!(call_id = %call_id, "Assistant channel open");

        Ok(Self {
            call_id,
            assistant,
            caller: None,
            ctx: BridgeContext::new(settings.introduction, Instant::now()),
            router: build_router(),
            session_options: settings.session,
            closed: false,
        })
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub fn context(&self) -> &BridgeContext {
        &self.ctx
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Bind the caller's media stream. The call clock starts now.
    pub fn attach_caller(&mut self, caller: BoxedCaller) -> BridgeResult<()> {
        if self.closed || !self.assistant.is_open() {
            return Err(BridgeError::SessionNotReady);
        }
        if self.caller.is_some() {
            return Err(BridgeError::AlreadyConnected);
        }

        self.ctx.timing = TimingTracker::new(Instant::now());
        self.caller = Some(caller);
        info!(call_id = %self.call_id, "Caller attached");
        Ok(())
    }

    pub async fn on_caller_event(&mut self, event: CallerEvent) -> BridgeResult<()> {
        self.dispatch(event.into()).await
    }

    pub async fn on_assistant_event(&mut self, event: AssistantEvent) -> BridgeResult<()> {
        self.dispatch(event.into()).await
    }

    async fn dispatch(&mut self, event: InboundEvent) -> BridgeResult<()> {
        self.ctx.now = Instant::now();
        let actions = self.router.route(&mut self.ctx, &event);
        // A non-fatal failure must not cancel the actions queued after it.
        for action in actions {
            if let Err(e) = self.execute(action).await {
                if e.is_fatal() {
                    return Err(e);
                }
                warn!(call_id = %self.call_id, error = %e, "Bridge action failed");
            }
        }
        Ok(())
    }

    async fn execute(&mut self, action: BridgeAction) -> BridgeResult<()> {
        match action {
            BridgeAction::Forward(AudioFrame { payload, direction }) => match direction {
                Direction::ToCaller => self.caller_mut()?.send_audio(payload).await,
                Direction::ToAssistant => self.assistant.send_audio(payload).await,
            },
            BridgeAction::ClearAssistant => self.assistant.clear_audio().await,
            BridgeAction::ClearCaller => self.caller_mut()?.clear_audio().await,
            BridgeAction::Truncate { item_id, heard_ms } => {
                debug!(item_id = %item_id, heard_ms, "Truncating assistant item");
                self.assistant.truncate(&item_id, heard_ms).await
            }
            BridgeAction::ConfigureAssistant => {
                self.assistant
                    .configure_session(&self.session_options)
                    .await
            }
            BridgeAction::Speak(text) => self.assistant.speak(&text).await,
        }
    }

    fn caller_mut(&mut self) -> BridgeResult<&mut BoxedCaller> {
        self.caller.as_mut().ok_or(BridgeError::SessionNotReady)
    }

    /// Drain both channels until the caller's stream ends, a channel fails or
    /// `shutdown` fires. Always closes the bridge before returning.
    pub async fn run(&mut self, shutdown: CancellationToken) -> BridgeResult<()> {
        if self.caller.is_none() {
            return Err(BridgeError::SessionNotReady);
        }

        let result = loop {
            let next = {
                let Some(caller) = self.caller.as_mut() else {
                    break Ok(());
                };
                tokio::select! {
                    _ = shutdown.cancelled() => Next::Shutdown,
                    event = caller.recv() => Next::Caller(event),
                    event = self.assistant.recv() => Next::Assistant(event),
                }
            };

            let outcome = match next {
                Next::Shutdown => {
                    info!(call_id = %self.call_id, "Session shutdown requested");
                    break Ok(());
                }
                Next::Caller(None) => {
                    info!(call_id = %self.call_id, "Caller stream ended");
                    break Ok(());
                }
                Next::Assistant(None) => Err(BridgeError::Channel(
                    "assistant channel ended".to_string(),
                )),
                Next::Caller(Some(Ok(event))) => self.on_caller_event(event).await,
                Next::Assistant(Some(Ok(event))) => self.on_assistant_event(event).await,
                Next::Caller(Some(Err(e))) | Next::Assistant(Some(Err(e))) => Err(e),
            };

            match outcome {
                Ok(()) => {}
                Err(e) if e.is_fatal() => {
                    error!(call_id = %self.call_id, error = %e, "Tearing down session");
                    break Err(e);
                }
                Err(e) => warn!(call_id = %self.call_id, error = %e, "Dropping event"),
            }
        };

        self.close().await?;
        result
    }

    /// Tear down both channels. Later calls are no-ops.
    pub async fn close(&mut self) -> BridgeResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if let Some(mut caller) = self.caller.take()
            && let Err(e) = caller.close().await
        {
            warn!(call_id = %self.call_id, error = %e, "Failed to close caller channel");
        }
        if let Err(e) = self.assistant.close().await {
            warn!(call_id = %self.call_id, error = %e, "Failed to close assistant channel");
        }

        info!(call_id = %self.call_id, "Session bridge closed");
        Ok(())
    }
}
