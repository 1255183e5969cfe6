//! Twilio Media Streams channel over an axum WebSocket.
//!
//! The socket is split into a reader task, which parses inbound frames into
//! [`CallerEvent`]s, and a writer task, which serializes outbound messages.
//! Both talk to the channel over mpsc queues so `recv` stays cancel-safe.

use std::time::Duration;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::CallerChannel;
use super::messages::{StreamFrame, TwilioOutbound, parse_frame};
use crate::core::events::{AudioPayload, CallerEvent};
use crate::errors::bridge_error::{BridgeError, BridgeResult};

/// Optimized channel buffer size for audio workloads
const CHANNEL_BUFFER_SIZE: usize = 1024;

/// How long `close` waits for the writer to flush and send its close frame.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Work items for the writer task.
#[derive(Debug)]
enum OutgoingRoute {
    Message(TwilioOutbound),
    Close,
}

/// A live Twilio media stream for one call.
pub struct TwilioMediaStream {
    call_sid: String,
    /// Learned from the `start` message; required for every outbound frame.
    stream_sid: Option<String>,
    outgoing: mpsc::Sender<OutgoingRoute>,
    incoming: mpsc::Receiver<BridgeResult<CallerEvent>>,
    reader_task: Option<JoinHandle<()>>,
    writer_task: Option<JoinHandle<()>>,
    closed: bool,
}

impl TwilioMediaStream {
    /// Take ownership of an upgraded socket and start its reader/writer tasks.
    pub fn new(socket: WebSocket, call_sid: impl Into<String>) -> Self {
        let call_sid = call_sid.into();
        let (mut sender, mut receiver) = socket.split();
        let (outgoing_tx, mut outgoing_rx) = mpsc::channel::<OutgoingRoute>(CHANNEL_BUFFER_SIZE);
        let (incoming_tx, incoming_rx) =
            mpsc::channel::<BridgeResult<CallerEvent>>(CHANNEL_BUFFER_SIZE);

        let writer_task = tokio::spawn(async move {
            while let Some(route) = outgoing_rx.recv().await {
                let result = match route {
                    OutgoingRoute::Message(message) => match serde_json::to_string(&message) {
                        Ok(json) => sender.send(Message::Text(json.into())).await,
                        Err(e) => {
                            error!("Failed to serialize media stream message: {}", e);
                            continue;
                        }
                    },
                    OutgoingRoute::Close => {
                        let _ = sender.send(Message::Close(None)).await;
                        break;
                    }
                };

                if let Err(e) = result {
                    error!("Failed to send media stream message: {}", e);
                    break;
                }
            }
        });

        let reader_call_sid = call_sid.clone();
        let reader_task = tokio::spawn(async move {
            while let Some(message) = receiver.next().await {
                let item = match message {
                    Ok(Message::Text(text)) => match parse_frame(text.as_str()) {
                        Ok(StreamFrame::Event(event)) => Ok(event),
                        Ok(StreamFrame::Ignored(kind)) => {
                            debug!(call_sid = %reader_call_sid, kind, "Ignoring media stream message");
                            continue;
                        }
                        Ok(StreamFrame::Stop) => {
                            info!(call_sid = %reader_call_sid, "Media stream stopped");
                            break;
                        }
                        Err(e) => Err(e),
                    },
                    Ok(Message::Close(_)) => {
                        info!(call_sid = %reader_call_sid, "Media stream socket closed by Twilio");
                        break;
                    }
                    Ok(Message::Binary(_)) => {
                        warn!(call_sid = %reader_call_sid, "Unexpected binary frame on media stream");
                        continue;
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        let _ = incoming_tx
                            .send(Err(BridgeError::Channel(format!(
                                "media stream socket error: {e}"
                            ))))
                            .await;
                        break;
                    }
                };

                if incoming_tx.send(item).await.is_err() {
                    break;
                }
            }
        });

        Self {
            call_sid,
            stream_sid: None,
            outgoing: outgoing_tx,
            incoming: incoming_rx,
            reader_task: Some(reader_task),
            writer_task: Some(writer_task),
            closed: false,
        }
    }

    pub fn call_sid(&self) -> &str {
        &self.call_sid
    }

    pub fn stream_sid(&self) -> Option<&str> {
        self.stream_sid.as_deref()
    }

    async fn send(&self, build: impl FnOnce(&str) -> TwilioOutbound) -> BridgeResult<()> {
        if self.closed {
            return Err(BridgeError::Channel("media stream is closed".to_string()));
        }
        // Frames before `start` have nowhere to go; drop them, keep the call.
        let Some(stream_sid) = self.stream_sid.as_deref() else {
            return Err(BridgeError::Protocol(
                "media stream has not started".to_string(),
            ));
        };

        self.outgoing
            .send(OutgoingRoute::Message(build(stream_sid)))
            .await
            .map_err(|_| BridgeError::Channel("media stream writer stopped".to_string()))
    }
}

#[async_trait]
impl CallerChannel for TwilioMediaStream {
    async fn send_audio(&mut self, payload: AudioPayload) -> BridgeResult<()> {
        self.send(|sid| TwilioOutbound::media(sid, payload)).await
    }

    async fn clear_audio(&mut self) -> BridgeResult<()> {
        self.send(TwilioOutbound::clear).await
    }

    async fn recv(&mut self) -> Option<BridgeResult<CallerEvent>> {
        let item = self.incoming.recv().await;
        if let Some(Ok(CallerEvent::StreamStart { stream_id })) = &item {
            self.stream_sid = Some(stream_id.clone());
        }
        item
    }

    async fn close(&mut self) -> BridgeResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let _ = self.outgoing.try_send(OutgoingRoute::Close);
        if let Some(mut writer) = self.writer_task.take()
            && tokio::time::timeout(CLOSE_GRACE, &mut writer).await.is_err()
        {
            writer.abort();
        }
        if let Some(reader) = self.reader_task.take() {
            reader.abort();
        }
        self.incoming.close();

        info!(call_sid = %self.call_sid, "Media stream closed");
        Ok(())
    }
}

impl Drop for TwilioMediaStream {
    fn drop(&mut self) {
        for task in [self.reader_task.take(), self.writer_task.take()]
            .into_iter()
            .flatten()
        {
            task.abort();
        }
    }
}
