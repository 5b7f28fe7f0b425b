use crate::codec::CodecError;

/// Failures reported by the audio platform (devices, streams, output clock).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AudioError {
    #[error("microphone access denied: {0}")]
    PermissionDenied(String),
    #[error("no audio input device found")]
    NoInputDevice,
    #[error("no audio output device found")]
    NoOutputDevice,
    #[error("unsupported audio configuration: {0}")]
    UnsupportedConfig(String),
    #[error("audio stream error: {0}")]
    Stream(String),
    #[error("audio context already closed")]
    Closed,
}

impl AudioError {
    /// True when the failure means the microphone cannot be used at all.
    pub fn is_permission(&self) -> bool {
        matches!(self, AudioError::PermissionDenied(_) | AudioError::NoInputDevice)
    }
}

/// Errors surfaced by the session controller.
#[derive(Debug, thiserror::Error)]
pub enum VoiceError {
    #[error("microphone unavailable: {0}")]
    Permission(String),
    #[error("failed to open session: {0}")]
    SessionOpen(String),
    #[error("session error: {0}")]
    SessionRuntime(String),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Audio(#[from] AudioError),
}

impl VoiceError {
    /// Short human-readable text shown in place of any previous error.
    pub fn user_message(&self) -> String {
        match self {
            VoiceError::Permission(_) => {
                "Could not access microphone. Please grant permission and try again.".to_string()
            }
            VoiceError::SessionOpen(reason) => {
                format!("Could not connect to the voice service: {}", reason)
            }
            VoiceError::SessionRuntime(reason) => format!("An error occurred: {}", reason),
            VoiceError::Codec(e) => format!("Received unplayable audio: {}", e),
            VoiceError::Audio(e) => format!("Audio device error: {}", e),
        }
    }
}
