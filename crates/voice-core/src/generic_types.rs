use crate::codec::INPUT_MIME_TYPE;
use crate::OUTPUT_SAMPLE_RATE;

/// Default system instruction for the assistant.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a friendly and helpful conversational AI assistant. Keep your responses concise and to the point.";

/// Modality the remote service should answer in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseModality {
    #[default]
    Audio,
    Text,
}

/// Provider-independent configuration for opening a live session.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveConfig {
    pub model: String,
    pub system_instruction: String,
    pub response_modality: ResponseModality,
    pub input_transcription: bool,
    pub output_transcription: bool,
    pub voice: Option<String>,
}

impl LiveConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system_instruction: DEFAULT_SYSTEM_PROMPT.to_string(),
            response_modality: ResponseModality::Audio,
            input_transcription: true,
            output_transcription: true,
            voice: None,
        }
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = instruction.into();
        self
    }

    pub fn with_voice(mut self, voice: Option<String>) -> Self {
        self.voice = voice;
        self
    }
}

/// One base64 PCM16 chunk of microphone audio, ready to send.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    pub mime_type: String,
    pub data: String,
}

impl AudioChunk {
    pub fn pcm16(data: String) -> Self {
        Self {
            mime_type: INPUT_MIME_TYPE.to_string(),
            data,
        }
    }
}

/// Incremental transcription text for one direction.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TranscriptFragment {
    pub text: String,
    pub is_final: bool,
}

/// Base64 audio returned by the remote service.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineAudio {
    pub mime_type: String,
    pub data: String,
}

impl InlineAudio {
    /// Sample rate declared by the MIME type (`audio/pcm;rate=24000`), or the default output rate.
    pub fn sample_rate(&self) -> u32 {
        self.mime_type
            .split(';')
            .filter_map(|param| param.trim().strip_prefix("rate="))
            .find_map(|rate| rate.trim().parse().ok())
            .unwrap_or(OUTPUT_SAMPLE_RATE)
    }
}

/// Content pushed by the remote service during a turn.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ServerContent {
    pub input_transcription: Option<TranscriptFragment>,
    pub output_transcription: Option<TranscriptFragment>,
    pub audio: Vec<InlineAudio>,
    pub turn_complete: bool,
    pub interrupted: bool,
}

/// Events any live provider reports back to the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteEvent {
    Opened,
    Content(ServerContent),
    Error(String),
    Closed(Option<String>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_audio_rate_comes_from_mime_type() {
        let audio = InlineAudio {
            mime_type: "audio/pcm;rate=22050".into(),
            data: String::new(),
        };
        assert_eq!(audio.sample_rate(), 22050);

        let audio = InlineAudio {
            mime_type: "audio/pcm".into(),
            data: String::new(),
        };
        assert_eq!(audio.sample_rate(), OUTPUT_SAMPLE_RATE);
    }

    #[test]
    fn live_config_defaults_to_audio_with_both_transcriptions() {
        let config = LiveConfig::new("models/test");
        assert_eq!(config.response_modality, ResponseModality::Audio);
        assert!(config.input_transcription);
        assert!(config.output_transcription);
        assert_eq!(config.system_instruction, DEFAULT_SYSTEM_PROMPT);
    }
}
