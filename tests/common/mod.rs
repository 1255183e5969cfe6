//! Shared test doubles: scripted caller/assistant channels, a connector for
//! them, and a mock OpenAI Realtime WebSocket server.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

use voice_bridge::config::ServerConfig;
use voice_bridge::core::assistant::{
    AssistantChannel, AssistantConnector, AudioFormat, BoxedAssistant, RealtimeModel,
    RealtimeVoice, SessionOptions,
};
use voice_bridge::core::bridge::BridgeSettings;
use voice_bridge::core::caller::CallerChannel;
use voice_bridge::core::events::{AssistantEvent, AudioPayload, CallerEvent};
use voice_bridge::errors::bridge_error::{BridgeError, BridgeResult};

pub const INTRODUCTION: &str = "Hello, you are talking to a test assistant.";

/// Everything the bridge asked either channel to do, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    AssistantConnect,
    AssistantAudio(String),
    AssistantSpeak(String),
    AssistantClear,
    AssistantTruncate { item_id: String, heard_ms: u64 },
    AssistantConfigure(SessionOptionsSummary),
    AssistantClose,
    CallerAudio(String),
    CallerClear,
    CallerClose,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptionsSummary {
    pub voice: RealtimeVoice,
    pub audio_format: AudioFormat,
}

impl From<&SessionOptions> for SessionOptionsSummary {
    fn from(options: &SessionOptions) -> Self {
        Self {
            voice: options.voice,
            audio_format: options.audio_format,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CommandLog(Arc<Mutex<Vec<Command>>>);

impl CommandLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, command: Command) {
        self.0.lock().push(command);
    }

    pub fn commands(&self) -> Vec<Command> {
        self.0.lock().clone()
    }

    pub fn count(&self, command: &Command) -> usize {
        self.0.lock().iter().filter(|c| *c == command).count()
    }
}

pub fn bridge_settings() -> BridgeSettings {
    BridgeSettings {
        introduction: INTRODUCTION.to_string(),
        session: SessionOptions {
            instructions: "Be helpful.".to_string(),
            voice: RealtimeVoice::Sage,
            ..SessionOptions::default()
        },
    }
}

pub fn test_server_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        public_host: "bridge.test".to_string(),
        tls: None,
        openai_api_key: Some("sk-test".to_string()),
        openai_realtime_url: "ws://127.0.0.1:1/v1/realtime".to_string(),
        openai_model: RealtimeModel::default(),
        openai_voice: RealtimeVoice::Sage,
        audio_format: AudioFormat::G711Ulaw,
        connect_timeout_secs: 2,
        assistant_instructions: "Be helpful.".to_string(),
        assistant_introduction: INTRODUCTION.to_string(),
    }
}

// =============================================================================
// Fake caller
// =============================================================================

pub struct FakeCaller {
    log: CommandLog,
    events: mpsc::UnboundedReceiver<BridgeResult<CallerEvent>>,
    closed: bool,
    /// Like a media stream before its `start` frame: outbound sends fail.
    unaddressed: bool,
}

/// Test-side handle that feeds events into a [`FakeCaller`]. Dropping it ends
/// the caller's stream.
pub struct CallerFeed {
    tx: mpsc::UnboundedSender<BridgeResult<CallerEvent>>,
}

impl FakeCaller {
    pub fn new(log: &CommandLog) -> (Self, CallerFeed) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                log: log.clone(),
                events: rx,
                closed: false,
                unaddressed: false,
            },
            CallerFeed { tx },
        )
    }

    /// A caller whose outbound sends fail with a non-fatal `Protocol` error.
    pub fn unaddressed(log: &CommandLog) -> (Self, CallerFeed) {
        let (mut caller, feed) = Self::new(log);
        caller.unaddressed = true;
        (caller, feed)
    }

    fn ensure_addressed(&self) -> BridgeResult<()> {
        if self.unaddressed {
            Err(BridgeError::Protocol("media stream has not started".to_string()))
        } else {
            Ok(())
        }
    }
}

impl CallerFeed {
    pub fn start(&self, stream_id: &str) {
        self.send(Ok(CallerEvent::StreamStart {
            stream_id: stream_id.to_string(),
        }));
    }

    pub fn media(&self, payload: &str) {
        self.send(Ok(CallerEvent::Media {
            payload: payload.into(),
        }));
    }

    pub fn send(&self, item: BridgeResult<CallerEvent>) {
        let _ = self.tx.send(item);
    }

    pub fn hang_up(self) {}
}

#[async_trait]
impl CallerChannel for FakeCaller {
    async fn send_audio(&mut self, payload: AudioPayload) -> BridgeResult<()> {
        self.ensure_addressed()?;
        self.log.push(Command::CallerAudio(payload.as_str().to_string()));
        Ok(())
    }

    async fn clear_audio(&mut self) -> BridgeResult<()> {
        self.ensure_addressed()?;
        self.log.push(Command::CallerClear);
        Ok(())
    }

    async fn recv(&mut self) -> Option<BridgeResult<CallerEvent>> {
        if self.closed {
            return None;
        }
        self.events.recv().await
    }

    async fn close(&mut self) -> BridgeResult<()> {
        self.closed = true;
        self.log.push(Command::CallerClose);
        Ok(())
    }
}

// =============================================================================
// Fake assistant
// =============================================================================

pub struct FakeAssistant {
    log: CommandLog,
    events: mpsc::UnboundedReceiver<BridgeResult<AssistantEvent>>,
    open: bool,
    connect_error: Option<BridgeError>,
    connect_delay: Duration,
}

/// Test-side handle that feeds events into a [`FakeAssistant`].
pub struct AssistantFeed {
    tx: mpsc::UnboundedSender<BridgeResult<AssistantEvent>>,
}

impl FakeAssistant {
    pub fn new(log: &CommandLog) -> (Self, AssistantFeed) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                log: log.clone(),
                events: rx,
                open: false,
                connect_error: None,
                connect_delay: Duration::ZERO,
            },
            AssistantFeed { tx },
        )
    }

    pub fn failing(log: &CommandLog, error: BridgeError) -> (Self, AssistantFeed) {
        let (mut assistant, feed) = Self::new(log);
        assistant.connect_error = Some(error);
        (assistant, feed)
    }

    fn ensure_open(&self) -> BridgeResult<()> {
        if self.open {
            Ok(())
        } else {
            Err(BridgeError::Channel("assistant not connected".to_string()))
        }
    }
}

impl AssistantFeed {
    pub fn send(&self, item: BridgeResult<AssistantEvent>) {
        let _ = self.tx.send(item);
    }

    pub fn event(&self, event: AssistantEvent) {
        self.send(Ok(event));
    }
}

#[async_trait]
impl AssistantChannel for FakeAssistant {
    async fn connect(&mut self) -> BridgeResult<()> {
        if !self.connect_delay.is_zero() {
            tokio::time::sleep(self.connect_delay).await;
        }
        if let Some(error) = self.connect_error.clone() {
            return Err(error);
        }
        if self.open {
            return Err(BridgeError::AlreadyConnected);
        }
        self.open = true;
        self.log.push(Command::AssistantConnect);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    async fn send_audio(&mut self, payload: AudioPayload) -> BridgeResult<()> {
        self.ensure_open()?;
        self.log
            .push(Command::AssistantAudio(payload.as_str().to_string()));
        Ok(())
    }

    async fn speak(&mut self, text: &str) -> BridgeResult<()> {
        self.ensure_open()?;
        self.log.push(Command::AssistantSpeak(text.to_string()));
        Ok(())
    }

    async fn clear_audio(&mut self) -> BridgeResult<()> {
        self.ensure_open()?;
        self.log.push(Command::AssistantClear);
        Ok(())
    }

    async fn truncate(&mut self, item_id: &str, heard_ms: u64) -> BridgeResult<()> {
        self.ensure_open()?;
        self.log.push(Command::AssistantTruncate {
            item_id: item_id.to_string(),
            heard_ms,
        });
        Ok(())
    }

    async fn configure_session(&mut self, options: &SessionOptions) -> BridgeResult<()> {
        self.ensure_open()?;
        self.log.push(Command::AssistantConfigure(options.into()));
        Ok(())
    }

    async fn recv(&mut self) -> Option<BridgeResult<AssistantEvent>> {
        self.events.recv().await
    }

    async fn close(&mut self) -> BridgeResult<()> {
        self.open = false;
        self.log.push(Command::AssistantClose);
        Ok(())
    }
}

/// Connector handing out [`FakeAssistant`]s that share one log. The feed of
/// every assistant created is kept so tests can drive it later.
pub struct FakeConnector {
    log: CommandLog,
    connect_error: Mutex<Option<BridgeError>>,
    connect_delay: Duration,
    feeds: Mutex<Vec<AssistantFeed>>,
}

impl FakeConnector {
    pub fn new(log: &CommandLog) -> Arc<Self> {
        Arc::new(Self {
            log: log.clone(),
            connect_error: Mutex::new(None),
            connect_delay: Duration::ZERO,
            feeds: Mutex::new(Vec::new()),
        })
    }

    pub fn with_delay(log: &CommandLog, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            log: log.clone(),
            connect_error: Mutex::new(None),
            connect_delay: delay,
            feeds: Mutex::new(Vec::new()),
        })
    }

    /// Make the next created assistant fail to connect.
    pub fn fail_next_connect(&self, error: BridgeError) {
        *self.connect_error.lock() = Some(error);
    }

    pub fn take_feed(&self) -> Option<AssistantFeed> {
        self.feeds.lock().pop()
    }

    pub fn created(&self) -> usize {
        self.feeds.lock().len()
    }
}

impl AssistantConnector for FakeConnector {
    fn create(&self) -> BoxedAssistant {
        let (mut assistant, feed) = match self.connect_error.lock().take() {
            Some(error) => FakeAssistant::failing(&self.log, error),
            None => FakeAssistant::new(&self.log),
        };
        assistant.connect_delay = self.connect_delay;
        self.feeds.lock().push(feed);
        Box::new(assistant)
    }
}

// =============================================================================
// Mock OpenAI Realtime server
// =============================================================================

/// What the mock server saw from the client.
#[derive(Debug, Clone, PartialEq)]
pub enum Received {
    Event(Value),
    Closed,
}

/// A single-connection WebSocket server speaking the Realtime wire format.
pub struct MockRealtimeServer {
    pub addr: SocketAddr,
    received: mpsc::UnboundedReceiver<Received>,
    outgoing: mpsc::UnboundedSender<String>,
    headers: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockRealtimeServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (received_tx, received) = mpsc::unbounded_channel();
        let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<String>();
        let headers = Arc::new(Mutex::new(Vec::new()));
        let captured = headers.clone();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let callback = move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
                let mut captured = captured.lock();
                for (name, value) in request.headers() {
                    captured.push((
                        name.as_str().to_string(),
                        value.to_str().unwrap_or_default().to_string(),
                    ));
                }
                captured.push(("uri".to_string(), request.uri().to_string()));
                Ok(response)
            };
            let ws = tokio_tungstenite::accept_hdr_async(stream, callback)
                .await
                .unwrap();
            let (mut sink, mut source) = ws.split();

            loop {
                tokio::select! {
                    message = source.next() => match message {
                        Some(Ok(Message::Text(text))) => {
                            let value: Value = serde_json::from_str(text.as_str()).unwrap();
                            let _ = received_tx.send(Received::Event(value));
                        }
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                            let _ = received_tx.send(Received::Closed);
                            break;
                        }
                        Some(Ok(_)) => {}
                    },
                    outgoing = outgoing_rx.recv() => match outgoing {
                        Some(text) => {
                            if sink.send(Message::Text(text.into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    },
                }
            }
        });

        Self {
            addr,
            received,
            outgoing,
            headers,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}/v1/realtime", self.addr)
    }

    /// Send one server event to the connected client.
    pub fn push(&self, event: Value) {
        self.outgoing.send(event.to_string()).unwrap();
    }

    /// Next thing the client did, failing the test after five seconds.
    pub async fn next(&mut self) -> Received {
        tokio::time::timeout(Duration::from_secs(5), self.received.recv())
            .await
            .expect("timed out waiting for the realtime client")
            .expect("mock realtime server stopped")
    }

    /// Next client event, which must have the given `type`.
    pub async fn expect_event(&mut self, event_type: &str) -> Value {
        match self.next().await {
            Received::Event(value) => {
                assert_eq!(value["type"], event_type, "unexpected event: {value}");
                value
            }
            Received::Closed => panic!("client closed while waiting for {event_type}"),
        }
    }

    pub fn header(&self, name: &str) -> Option<String> {
        self.headers
            .lock()
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.clone())
    }
}
