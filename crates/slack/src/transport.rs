//! Socket Mode over a real WebSocket.
//!
//! Each `connect` asks Slack for a fresh `wss://` URL through
//! `apps.connections.open`, since those URLs are single use.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use secrecy::SecretString;
use serde_json::json;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::events::{parse_socket_message, SlackEnvelope, SocketMessage};
use crate::socket::{SocketTransport, TransportError};
use crate::web_api::SlackWebClient;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct WebSocketTransport {
    slack: SlackWebClient,
    app_token: SecretString,
    writer: Mutex<Option<SplitSink<WsStream, WsMessage>>>,
    reader: Mutex<Option<SplitStream<WsStream>>>,
}

impl WebSocketTransport {
    pub fn new(slack: SlackWebClient, app_token: SecretString) -> Self {
        Self { slack, app_token, writer: Mutex::new(None), reader: Mutex::new(None) }
    }

    async fn send(&self, message: WsMessage) -> Result<(), String> {
        let mut writer = self.writer.lock().await;
        let Some(sink) = writer.as_mut() else {
            return Err("socket is not connected".to_owned());
        };
        sink.send(message).await.map_err(|error| error.to_string())
    }
}

#[async_trait]
impl SocketTransport for WebSocketTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let url = self
            .slack
            .connections_open(&self.app_token)
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;

        let (stream, _response) = connect_async(url.as_str())
            .await
            .map_err(|error| TransportError::Connect(format!("websocket connect failed: {error}")))?;
        info!(event_name = "ingress.slack.connected", "websocket connected to slack socket mode");

        let (write, read) = stream.split();
        *self.writer.lock().await = Some(write);
        *self.reader.lock().await = Some(read);
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError> {
        let mut reader = self.reader.lock().await;
        let Some(stream) = reader.as_mut() else {
            return Err(TransportError::Receive("socket is not connected".to_owned()));
        };

        loop {
            let Some(frame) = stream.next().await else {
                info!("websocket stream ended");
                return Ok(None);
            };
            let frame = frame.map_err(|error| TransportError::Receive(error.to_string()))?;

            match frame {
                WsMessage::Text(text) => match parse_socket_message(&text) {
                    Ok(Some(SocketMessage::Envelope(envelope))) => return Ok(Some(envelope)),
                    Ok(Some(SocketMessage::Hello)) | Ok(None) => {}
                    Ok(Some(SocketMessage::Disconnect { reason })) => {
                        info!(
                            event_name = "ingress.slack.disconnect_requested",
                            reason = reason.as_deref().unwrap_or("unspecified"),
                            "slack requested a reconnect"
                        );
                        return Ok(None);
                    }
                    Err(error) => {
                        warn!(event_name = "ingress.slack.frame_invalid", error = %error, "dropping socket frame");
                    }
                },
                WsMessage::Ping(data) => {
                    self.send(WsMessage::Pong(data))
                        .await
                        .map_err(|error| TransportError::Receive(format!("pong send failed: {error}")))?;
                }
                WsMessage::Close(_) => {
                    info!("received websocket close frame");
                    return Ok(None);
                }
                _ => debug!("ignoring non-text websocket frame"),
            }
        }
    }

    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError> {
        let ack = json!({ "envelope_id": envelope_id }).to_string();
        self.send(WsMessage::Text(ack)).await.map_err(TransportError::Acknowledge)
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let writer = self.writer.lock().await.take();
        self.reader.lock().await.take();

        // the peer may already have closed the socket
        if let Some(mut sink) = writer {
            if let Err(error) = sink.send(WsMessage::Close(None)).await {
                debug!(error = %error, "websocket close frame not sent");
            }
        }
        Ok(())
    }
}
