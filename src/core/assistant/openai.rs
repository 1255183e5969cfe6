//! OpenAI Realtime API channel.
//!
//! - Endpoint: `wss://api.openai.com/v1/realtime?model=<model>`
//! - Protocol: WebSocket with JSON events
//! - Audio: G.711 u-law base64 text, passed through without decoding
//!
//! One spawned task owns the socket. Outgoing [`ClientEvent`]s reach it over
//! an mpsc channel; incoming server events are mapped to [`AssistantEvent`]s
//! and pushed to a second channel that [`AssistantChannel::recv`] drains.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tracing::{debug, error, info, trace, warn};
use zeroize::Zeroizing;

use super::config::{OPENAI_REALTIME_URL, RealtimeModel, SessionOptions};
use super::messages::{ClientEvent, ServerEvent, SessionConfig};
use super::slot::{AssistantSlot, SlotGuard};
use super::{AssistantChannel, AssistantConnector, BoxedAssistant};
use crate::core::events::{AssistantEvent, AudioPayload};
use crate::errors::bridge_error::{BridgeError, BridgeResult};

/// Channel capacity for WebSocket message sending.
const WS_CHANNEL_CAPACITY: usize = 256;

/// Channel capacity for events waiting to be dispatched by the bridge.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// How long `close` waits for the socket task to send its close frame.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Connection settings shared by every channel a connector creates.
#[derive(Clone)]
pub struct OpenAIRealtimeSettings {
    /// Wiped from memory when the settings are dropped.
    pub api_key: Zeroizing<String>,
    /// Base WebSocket URL; the model is appended as a query parameter.
    pub url: String,
    pub model: RealtimeModel,
    pub connect_timeout: Duration,
}

impl Default for OpenAIRealtimeSettings {
    fn default() -> Self {
        Self {
            api_key: Zeroizing::new(String::new()),
            url: OPENAI_REALTIME_URL.to_string(),
            model: RealtimeModel::default(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl OpenAIRealtimeSettings {
    /// Build the WebSocket URL with model parameter.
    pub fn ws_url(&self) -> String {
        format!("{}?model={}", self.url, self.model.as_str())
    }
}

impl std::fmt::Debug for OpenAIRealtimeSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIRealtimeSettings")
            .field("api_key", &"<redacted>")
            .field("url", &self.url)
            .field("model", &self.model)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

// =============================================================================
// OpenAI Realtime Channel
// =============================================================================

/// Assistant channel over the OpenAI Realtime WebSocket API.
pub struct OpenAIRealtimeChannel {
    settings: Arc<OpenAIRealtimeSettings>,
    slot: AssistantSlot,
    /// Held while connected; dropping it frees the process-wide slot.
    guard: Option<SlotGuard>,
    /// Shared with the socket task, cleared when the socket goes away.
    connected: Arc<AtomicBool>,
    ws_sender: Option<mpsc::Sender<ClientEvent>>,
    events: Option<mpsc::Receiver<BridgeResult<AssistantEvent>>>,
    connection_handle: Option<JoinHandle<()>>,
}

impl OpenAIRealtimeChannel {
    pub fn new(settings: Arc<OpenAIRealtimeSettings>, slot: AssistantSlot) -> Self {
        Self {
            settings,
            slot,
            guard: None,
            connected: Arc::new(AtomicBool::new(false)),
            ws_sender: None,
            events: None,
            connection_handle: None,
        }
    }

    async fn send_event(&self, event: ClientEvent) -> BridgeResult<()> {
        if !self.is_open() {
            return Err(BridgeError::Channel(
                "assistant channel is not connected".to_string(),
            ));
        }
        let Some(sender) = self.ws_sender.as_ref() else {
            return Err(BridgeError::Channel(
                "assistant channel is not connected".to_string(),
            ));
        };

        trace!(event_type = event.event_type(), "Queueing OpenAI client event");
        sender
            .send(event)
            .await
            .map_err(|e| BridgeError::Channel(format!("assistant socket task stopped: {e}")))
    }

    /// Log a server event and map it to a bridge event when it is routed.
    fn handle_server_event(event: ServerEvent) -> Option<AssistantEvent> {
        match &event {
            ServerEvent::Error { error } => {
                error!(
                    error_type = %error.error_type,
                    code = ?error.code,
                    "OpenAI Realtime error: {}",
                    error.message
                );
            }
            ServerEvent::SessionCreated { session } => {
                info!(session_id = %session.id, "OpenAI Realtime session created");
            }
            ServerEvent::SessionUpdated { session } => {
                debug!(session_id = %session.id, "OpenAI Realtime session updated");
            }
            ServerEvent::ConversationItemTruncated {
                item_id,
                audio_end_ms,
            } => {
                debug!(item_id = %item_id, audio_end_ms, "Conversation item truncated");
            }
            _ => {}
        }
        event.into_assistant_event()
    }
}

#[async_trait]
impl AssistantChannel for OpenAIRealtimeChannel {
    async fn connect(&mut self) -> BridgeResult<()> {
        if self.guard.is_some() {
            return Err(BridgeError::AlreadyConnected);
        }
        let guard = self.slot.try_acquire()?;

        let url = self.settings.ws_url();
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| BridgeError::Connect(format!("Invalid WebSocket URL: {e}")))?;

        let auth = HeaderValue::from_str(&format!("Bearer {}", self.settings.api_key.as_str()))
            .map_err(|e| BridgeError::Connect(format!("Invalid API key header: {e}")))?;
        let headers = request.headers_mut();
        headers.insert("Authorization", auth);
        headers.insert("OpenAI-Beta", HeaderValue::from_static("realtime=v1"));

        info!(url = %url, "Connecting to OpenAI Realtime API");

        let timeout = self.settings.connect_timeout;
        let (ws_stream, _response) =
            tokio::time::timeout(timeout, tokio_tungstenite::connect_async(request))
                .await
                .map_err(|_| {
                    BridgeError::Connect(format!(
                        "Connection timed out after {}ms",
                        timeout.as_millis()
                    ))
                })?
                .map_err(|e| BridgeError::Connect(format!("Failed to connect: {e}")))?;

        info!("Connected to OpenAI Realtime API");

        let (mut ws_sink, mut ws_stream) = ws_stream.split();
        let (tx, mut rx) = mpsc::channel::<ClientEvent>(WS_CHANNEL_CAPACITY);
        let (event_tx, event_rx) =
            mpsc::channel::<BridgeResult<AssistantEvent>>(EVENT_CHANNEL_CAPACITY);

        let connected = self.connected.clone();
        connected.store(true, Ordering::SeqCst);

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    outgoing = rx.recv() => {
                        let Some(event) = outgoing else {
                            // Channel side closed: say goodbye and stop.
                            let _ = ws_sink.send(Message::Close(None)).await;
                            break;
                        };

                        let json = match serde_json::to_string(&event) {
                            Ok(j) => j,
                            Err(e) => {
                                error!("Failed to serialize event: {}", e);
                                continue;
                            }
                        };

                        if let Err(e) = ws_sink.send(Message::Text(json.into())).await {
                            error!("Failed to send WebSocket message: {}", e);
                            let _ = event_tx
                                .send(Err(BridgeError::Channel(format!("send failed: {e}"))))
                                .await;
                            break;
                        }
                    }

                    incoming = ws_stream.next() => {
                        match incoming {
                            Some(Ok(Message::Text(text))) => {
                                let routed = match serde_json::from_str::<ServerEvent>(&text) {
                                    Ok(event) => Self::handle_server_event(event).map(Ok),
                                    Err(e) => Some(Err(BridgeError::Protocol(format!(
                                        "unparseable server event: {e}"
                                    )))),
                                };

                                if let Some(item) = routed
                                    && event_tx.send(item).await.is_err()
                                {
                                    break;
                                }
                            }
                            Some(Ok(Message::Ping(data))) => {
                                if let Err(e) = ws_sink.send(Message::Pong(data)).await {
                                    error!("Failed to send pong: {}", e);
                                }
                            }
                            Some(Ok(Message::Close(frame))) => {
                                info!(?frame, "WebSocket closed by server");
                                let _ = event_tx
                                    .send(Err(BridgeError::Channel(
                                        "assistant socket closed by server".to_string(),
                                    )))
                                    .await;
                                break;
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                error!("WebSocket error: {}", e);
                                let _ = event_tx
                                    .send(Err(BridgeError::Channel(format!("WebSocket error: {e}"))))
                                    .await;
                                break;
                            }
                            None => {
                                let _ = event_tx
                                    .send(Err(BridgeError::Channel(
                                        "assistant socket ended".to_string(),
                                    )))
                                    .await;
                                break;
                            }
                        }
                    }
                }
            }

            connected.store(false, Ordering::SeqCst);
            debug!("OpenAI Realtime socket task finished");
        });

        self.guard = Some(guard);
        self.ws_sender = Some(tx);
        self.events = Some(event_rx);
        self.connection_handle = Some(handle);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn send_audio(&mut self, payload: AudioPayload) -> BridgeResult<()> {
        self.send_event(ClientEvent::audio_append(payload)).await
    }

    async fn speak(&mut self, text: &str) -> BridgeResult<()> {
        self.send_event(ClientEvent::say_verbatim(text)).await?;
        self.send_event(ClientEvent::ResponseCreate).await
    }

    async fn clear_audio(&mut self) -> BridgeResult<()> {
        self.send_event(ClientEvent::ResponseCancel).await
    }

    async fn truncate(&mut self, item_id: &str, heard_ms: u64) -> BridgeResult<()> {
        self.send_event(ClientEvent::truncate(item_id, heard_ms))
            .await
    }

    async fn configure_session(&mut self, options: &SessionOptions) -> BridgeResult<()> {
        self.send_event(ClientEvent::SessionUpdate {
            session: SessionConfig::from(options),
        })
        .await
    }

    async fn recv(&mut self) -> Option<BridgeResult<AssistantEvent>> {
        self.events.as_mut()?.recv().await
    }

    async fn close(&mut self) -> BridgeResult<()> {
        // Dropping the sender makes the socket task send a close frame and exit.
        self.ws_sender = None;

        if let Some(mut handle) = self.connection_handle.take()
            && tokio::time::timeout(CLOSE_GRACE, &mut handle).await.is_err()
        {
            warn!("OpenAI Realtime socket task did not stop in time, aborting");
            handle.abort();
        }

        self.events = None;
        self.connected.store(false, Ordering::SeqCst);
        if self.guard.take().is_some() {
            info!("Disconnected from OpenAI Realtime API");
        }
        Ok(())
    }
}

impl Drop for OpenAIRealtimeChannel {
    fn drop(&mut self) {
        if let Some(handle) = self.connection_handle.take() {
            handle.abort();
        }
    }
}

/// Creates [`OpenAIRealtimeChannel`]s sharing one settings block and one
/// process-wide [`AssistantSlot`].
#[derive(Debug, Clone)]
pub struct OpenAIConnector {
    settings: Arc<OpenAIRealtimeSettings>,
    slot: AssistantSlot,
}

impl OpenAIConnector {
    pub fn new(settings: OpenAIRealtimeSettings, slot: AssistantSlot) -> Self {
        Self {
            settings: Arc::new(settings),
            slot,
        }
    }
}

impl AssistantConnector for OpenAIConnector {
    fn create(&self) -> BoxedAssistant {
        Box::new(OpenAIRealtimeChannel::new(
            self.settings.clone(),
            self.slot.clone(),
        ))
    }
}
