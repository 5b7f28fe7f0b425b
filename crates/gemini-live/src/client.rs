use crate::types::{Blob, RealtimeInput, RealtimeInputRequest, ServerMessage, Setup, SetupRequest};
use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message, MaybeTlsStream, WebSocketStream};

mod config;
mod consts;

pub use config::{ClientConfig, ClientConfigBuilder};
pub use consts::DEFAULT_MODEL;

type WsWriter =
    futures_util::stream::SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsReader = futures_util::stream::SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// What the background reader reports after setup.
#[derive(Debug, Clone)]
pub enum LiveEvent {
    Message(ServerMessage),
    Closed { reason: Option<String> },
    Failed(String),
}

/// A client for one Gemini Live session. Server messages arrive on the
/// receiver returned by [`connect`].
pub struct GeminiClient {
    write: WsWriter,
    reader_task: JoinHandle<()>,
    closed: bool,
}

/// Parses a text or binary frame into a server message. Other frames yield `None`.
pub fn parse_frame(message: &Message) -> Option<Result<ServerMessage>> {
    match message {
        Message::Text(text) => Some(
            serde_json::from_str(text).context("Failed to deserialize server message"),
        ),
        Message::Binary(bytes) => Some(
            serde_json::from_slice(bytes).context("Failed to deserialize binary server message"),
        ),
        _ => None,
    }
}

/// Connects, sends the setup message and waits for `setupComplete`.
pub async fn connect(
    config: &ClientConfig,
    setup: Setup,
) -> Result<(GeminiClient, mpsc::Receiver<LiveEvent>)> {
    tracing::info!(model = %setup.model, "Connecting to Gemini Live at {}", config.base_url());
    let (ws_stream, _) = timeout(config.connect_timeout(), connect_async(config.url()))
        .await
        .context("Timed out connecting to Gemini WebSocket")?
        .context("Failed to connect to Gemini WebSocket")?;

    let (mut write, mut read) = ws_stream.split();

    let json = serde_json::to_string(&SetupRequest { setup })?;
    write
        .send(Message::Text(json))
        .await
        .context("Failed to send setup message")?;

    timeout(config.setup_timeout(), wait_for_setup_complete(&mut read))
        .await
        .context("Timed out waiting for setupComplete")??;
    tracing::info!("Gemini Live session set up.");

    let (tx, rx) = mpsc::channel(consts::EVENT_CHANNEL_CAPACITY);
    let reader_task = tokio::spawn(read_loop(read, tx));

    Ok((
        GeminiClient {
            write,
            reader_task,
            closed: false,
        },
        rx,
    ))
}

async fn wait_for_setup_complete(read: &mut WsReader) -> Result<()> {
    while let Some(message) = read.next().await {
        let message = message.context("Error reading from Gemini WebSocket during setup")?;
        if let Message::Close(frame) = &message {
            let reason = frame.as_ref().map(|f| f.reason.to_string()).unwrap_or_default();
            anyhow::bail!("Connection closed during setup: {}", reason);
        }
        match parse_frame(&message) {
            Some(Ok(server_message)) if server_message.setup_complete.is_some() => return Ok(()),
            Some(Ok(_)) => tracing::debug!("Ignoring message received before setupComplete"),
            Some(Err(e)) => tracing::warn!("{:#}", e),
            None => {}
        }
    }
    anyhow::bail!("Connection ended before setupComplete")
}

async fn read_loop(mut read: WsReader, tx: mpsc::Sender<LiveEvent>) {
    let last = loop {
        let Some(message) = read.next().await else {
            break LiveEvent::Closed { reason: None };
        };
        let message = match message {
            Ok(message) => message,
            Err(e) => {
                tracing::error!("Error reading from Gemini WebSocket: {}", e);
                break LiveEvent::Failed(e.to_string());
            }
        };
        if let Message::Close(frame) = &message {
            tracing::info!("Gemini WebSocket connection closed.");
            let reason = frame
                .as_ref()
                .map(|f| f.reason.to_string())
                .filter(|r| !r.is_empty());
            break LiveEvent::Closed { reason };
        }
        match parse_frame(&message) {
            Some(Ok(server_message)) => {
                if tx.send(LiveEvent::Message(server_message)).await.is_err() {
                    tracing::debug!("Gemini event receiver dropped, stopping reader.");
                    return;
                }
            }
            Some(Err(e)) => tracing::warn!("{:#}", e),
            None => {}
        }
    };
    let _ = tx.send(last).await;
}

impl GeminiClient {
    /// Streams one chunk of base64 PCM audio.
    pub async fn send_audio(&mut self, mime_type: &str, data: String) -> Result<()> {
        if self.closed {
            anyhow::bail!("Gemini session already closed");
        }
        let req = RealtimeInputRequest {
            realtime_input: RealtimeInput {
                audio: Blob {
                    mime_type: mime_type.to_string(),
                    data,
                },
            },
        };
        let json = serde_json::to_string(&req)?;
        self.write
            .send(Message::Text(json))
            .await
            .context("Failed to send audio chunk")
    }

    /// Sends a close frame and stops the reader. Idempotent.
    pub async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.reader_task.abort();
        let result = self.write.close().await;
        result.context("Failed to close Gemini WebSocket")
    }
}

impl Drop for GeminiClient {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_and_binary_frames_parse() {
        let text = Message::Text(r#"{"setupComplete":{}}"#.to_string());
        assert!(parse_frame(&text).unwrap().unwrap().setup_complete.is_some());

        let binary = Message::Binary(br#"{"serverContent":{"turnComplete":true}}"#.to_vec());
        let message = parse_frame(&binary).unwrap().unwrap();
        assert_eq!(message.server_content.unwrap().turn_complete, Some(true));
    }

    #[test]
    fn control_frames_are_skipped() {
        assert!(parse_frame(&Message::Ping(vec![])).is_none());
        assert!(parse_frame(&Message::Pong(vec![])).is_none());
    }

    #[test]
    fn malformed_json_is_an_error() {
        let text = Message::Text("{not json".to_string());
        assert!(parse_frame(&text).unwrap().is_err());
    }
}
