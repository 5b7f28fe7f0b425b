pub mod capture;
pub mod codec;
pub mod controller;
pub mod error;
pub mod events;
pub mod generic_types;
pub mod platform;
pub mod playback;
pub mod realtime_api;
pub mod state;
pub mod transcript;

pub use controller::{ControllerSettings, SessionController, Snapshot};
pub use error::{AudioError, VoiceError};
pub use events::{SessionEvent, SessionEventKind, SessionId, SessionSink};
pub use state::AgentState;
pub use transcript::{AgentFinality, Message, Speaker};

/// Sample rate the remote service expects for microphone audio.
pub const INPUT_SAMPLE_RATE: u32 = 16000;
/// Sample rate of the audio the remote service sends back.
pub const OUTPUT_SAMPLE_RATE: u32 = 24000;
/// Number of samples per captured block handed to the session.
pub const CAPTURE_BLOCK_SIZE: usize = 4096;
/// Capacity of the controller's event queue.
pub const EVENT_QUEUE_CAPACITY: usize = 1024;
