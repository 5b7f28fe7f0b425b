//! PCM conversions between the float samples used on the device side and the
//! base64 little-endian PCM16 payloads exchanged with the remote service.

use base64::Engine;

/// MIME type attached to every outgoing microphone chunk.
pub const INPUT_MIME_TYPE: &str = "audio/pcm;rate=16000";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CodecError {
    #[error("invalid base64 audio payload: {0}")]
    Decode(String),
    #[error("malformed PCM16 payload: {len} bytes for {channels} channel(s)")]
    AudioFormat { len: usize, channels: usize },
}

/// A decoded, de-interleaved block of audio ready to be scheduled.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub sample_rate: u32,
    pub channels: Vec<Vec<f32>>,
}

impl AudioBuffer {
    pub fn mono(sample_rate: u32, samples: Vec<f32>) -> Self {
        Self {
            sample_rate,
            channels: vec![samples],
        }
    }

    /// Frames per channel.
    pub fn frames(&self) -> usize {
        self.channels.first().map(Vec::len).unwrap_or(0)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }
}

/// Converts audio sample slices to their little-endian PCM16 byte form.
pub trait ToBinary {
    fn to_binary(&self) -> Vec<u8>;
}

impl ToBinary for [i16] {
    fn to_binary(&self) -> Vec<u8> {
        self.iter().flat_map(|sample| sample.to_le_bytes()).collect()
    }
}

impl ToBinary for [f32] {
    fn to_binary(&self) -> Vec<u8> {
        self.iter()
            .flat_map(|&sample| sample_to_i16(sample).to_le_bytes())
            .collect()
    }
}

/// Scales a float sample by 32768 and clamps it into the i16 range.
/// Truncates toward zero; NaN maps to 0.
pub fn sample_to_i16(sample: f32) -> i16 {
    (sample * 32768.0).clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

/// Encodes float samples as base64 PCM16 little-endian.
pub fn encode_chunk(samples: &[f32]) -> String {
    base64::engine::general_purpose::STANDARD.encode(samples.to_binary())
}

pub fn decode_bytes(payload: &str) -> Result<Vec<u8>, CodecError> {
    base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| CodecError::Decode(e.to_string()))
}

/// Interprets `bytes` as interleaved PCM16 little-endian and builds a playable buffer.
pub fn decode_audio_payload(
    bytes: &[u8],
    sample_rate: u32,
    channel_count: usize,
) -> Result<AudioBuffer, CodecError> {
    let frame_bytes = 2 * channel_count;
    if channel_count == 0 || bytes.len() % frame_bytes != 0 {
        return Err(CodecError::AudioFormat {
            len: bytes.len(),
            channels: channel_count,
        });
    }

    let frames = bytes.len() / frame_bytes;
    let mut channels = vec![Vec::with_capacity(frames); channel_count];
    for (i, pair) in bytes.chunks_exact(2).enumerate() {
        let value = i16::from_le_bytes([pair[0], pair[1]]);
        channels[i % channel_count].push(value as f32 / 32768.0);
    }

    Ok(AudioBuffer {
        sample_rate,
        channels,
    })
}

/// Base64 decode followed by PCM16 decode.
pub fn decode_base64_audio(
    payload: &str,
    sample_rate: u32,
    channel_count: usize,
) -> Result<AudioBuffer, CodecError> {
    let bytes = decode_bytes(payload)?;
    decode_audio_payload(&bytes, sample_rate, channel_count)
}
