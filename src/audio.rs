//! Base64 → PCM16 → float waveform decoding.
//!
//! The speech API returns raw little-endian signed 16-bit PCM, base64
//! encoded, at 24 kHz mono.  Samples are normalised to `[-1.0, 1.0)` by
//! dividing by 32768 and de-interleaved per channel.

use std::time::Duration;

use base64::{engine::general_purpose, Engine as _};

use crate::error::{Error, Result};

/// Sample rate of the remote audio.
pub const SAMPLE_RATE: u32 = 24_000;

/// Channel count of the remote audio.
pub const CHANNELS: u16 = 1;

/// Scale between `i16` PCM and normalised floats.
pub(crate) const PCM_SCALE: f32 = 32_768.0;

/// Decoded float audio, one sample vector per channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

impl Waveform {
    /// Build a waveform from per-channel samples.
    ///
    /// All channels must have the same length and there must be at least one.
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> Result<Self> {
        let Some(first) = channels.first() else {
            return Err(Error::Decode("waveform needs at least one channel".into()));
        };
        if sample_rate == 0 {
            return Err(Error::Decode("sample rate must be positive".into()));
        }
        if channels.iter().any(|c| c.len() != first.len()) {
            return Err(Error::Decode("channels differ in length".into()));
        }
        Ok(Self { sample_rate, channels })
    }

    /// Single-channel waveform.
    ///
    /// Infallible, unlike [`Waveform::new`]: a `sample_rate` of 0 is clamped
    /// to 1 so that [`duration`](Waveform::duration) stays finite.
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self { sample_rate: sample_rate.max(1), channels: vec![samples] }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> u16 {
        self.channels.len() as u16
    }

    /// Samples per channel.
    pub fn frames(&self) -> usize {
        self.channels.first().map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    /// Samples interleaved frame by frame (`L R L R …`).
    pub fn interleaved(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.frames() * self.channels.len());
        for frame in 0..self.frames() {
            for channel in &self.channels {
                out.push(channel[frame]);
            }
        }
        out
    }
}

/// Decode a standard base64 string into raw bytes.
pub fn decode_base64(payload: &str) -> Result<Vec<u8>> {
    general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| Error::Decode(format!("invalid base64: {}", e)))
}

/// Interpret `bytes` as little-endian PCM16 and build a waveform.
///
/// Output length per channel is `bytes.len() / 2 / channels`; samples that
/// do not complete a frame are dropped.
pub fn decode_pcm16(bytes: &[u8], sample_rate: u32, channels: u16) -> Result<Waveform> {
    if channels == 0 {
        return Err(Error::Decode("channel count must be positive".into()));
    }
    if bytes.len() % 2 != 0 {
        return Err(Error::Decode(format!(
            "PCM16 payload has odd length ({} bytes)",
            bytes.len()
        )));
    }

    let n_channels = channels as usize;
    let frames = bytes.len() / 2 / n_channels;
    let mut data = vec![Vec::with_capacity(frames); n_channels];

    for (i, pair) in bytes.chunks_exact(2).take(frames * n_channels).enumerate() {
        let sample = i16::from_le_bytes([pair[0], pair[1]]);
        data[i % n_channels].push(sample as f32 / PCM_SCALE);
    }

    Waveform::new(sample_rate, data)
}

/// Decode a base64 PCM16 payload straight into a waveform.
pub fn decode_payload(payload: &str, sample_rate: u32, channels: u16) -> Result<Waveform> {
    let bytes = decode_base64(payload)?;
    if bytes.is_empty() {
        return Err(Error::Decode("empty audio payload".into()));
    }
    decode_pcm16(&bytes, sample_rate, channels)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
