//! PCM codec for the realtime wire format
//!
//! The Live API consumes 16-bit little-endian PCM wrapped in base64 text;
//! this module converts between that representation and the f32 samples
//! the rest of the pipeline works with.

use base64::Engine;
use serde::Serialize;
use thiserror::Error;

/// A base64-encoded PCM chunk tagged with its wire MIME type,
/// ready to be sent as `realtimeInput` media.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioBlob {
    pub mime_type: String,
    pub data: String,
}

/// Errors from decoding inbound audio payloads.
///
/// Non-terminal: the session logs these and skips the chunk.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid base64 audio payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Convert float samples in [-1, 1] to 16-bit little-endian PCM bytes.
///
/// Out-of-range samples are clamped to the representable range.
pub fn encode_pcm(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        let clamped = sample.clamp(-1.0, 1.0);
        let value = (clamped * i16::MAX as f32).round() as i16;
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Interpret 16-bit little-endian PCM bytes as normalized f32 samples.
///
/// A trailing incomplete sample (odd byte count) is truncated. Empty
/// input yields an empty sample buffer.
pub fn pcm_to_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|pair| {
            let value = i16::from_le_bytes([pair[0], pair[1]]);
            value as f32 / i16::MAX as f32
        })
        .collect()
}

/// Encode a block of capture samples as a transport-ready blob.
pub fn encode_blob(samples: &[f32], sample_rate: u32) -> AudioBlob {
    let bytes = encode_pcm(samples);
    AudioBlob {
        mime_type: format!("audio/pcm;rate={}", sample_rate),
        data: base64::engine::general_purpose::STANDARD.encode(bytes),
    }
}

/// Strict base64 decode of an inbound audio payload.
pub fn decode_base64(text: &str) -> Result<Vec<u8>, DecodeError> {
    Ok(base64::engine::general_purpose::STANDARD.decode(text)?)
}
