use crate::events::SessionSink;
use crate::generic_types::{AudioChunk, LiveConfig};
use anyhow::Result;
use async_trait::async_trait;

/// Opens live sessions against a real-time, bidirectional AI service.
/// Everything the session reports comes back through the given sink.
#[async_trait]
pub trait RealtimeConnector: Send + Sync {
    async fn open(&self, config: &LiveConfig, sink: SessionSink) -> Result<Box<dyn LiveSession>>;
}

/// Handle to one open duplex session.
#[async_trait]
pub trait LiveSession: Send {
    /// Streams one chunk of PCM16 microphone audio.
    async fn send_audio(&mut self, chunk: AudioChunk) -> Result<()>;

    /// Closes the connection. Calling it twice is harmless.
    async fn close(&mut self) -> Result<()>;
}
