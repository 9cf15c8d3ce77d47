//! WAV container writer / reader.
//!
//! Produces the canonical 44-byte RIFF/WAVE header followed by interleaved
//! 16-bit PCM:
//!
//! | Offset | Field           | Value                               |
//! |--------|-----------------|-------------------------------------|
//! | 0      | `RIFF` + size   | `36 + data_len`                     |
//! | 8      | `WAVE`          |                                     |
//! | 12     | `fmt ` + 16     | PCM (1), channels, rate             |
//! | 28     | byte rate       | `rate * channels * 2`               |
//! | 32     | block align     | `channels * 2`, bits = 16           |
//! | 36     | `data` + size   | `frames * channels * 2`             |
//!
//! All sizes are little-endian.  This layout holds for mono and stereo; with
//! more than two channels hound writes a `WAVE_FORMAT_EXTENSIBLE` header
//! (68 bytes) instead, which [`decode`] also reads.

use std::io::Cursor;
use std::path::Path;

use crate::audio::{Waveform, PCM_SCALE};
use crate::error::{Error, Result};

/// Size of the header written by [`encode`] for mono and stereo waveforms.
pub const HEADER_LEN: usize = 44;

fn spec_for(wave: &Waveform) -> hound::WavSpec {
    hound::WavSpec {
        channels: wave.channel_count(),
        sample_rate: wave.sample_rate(),
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

/// Re-quantise a normalised sample to PCM16.
fn quantize(sample: f32) -> i16 {
    (sample * PCM_SCALE).clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

fn write_samples<W>(writer: &mut hound::WavWriter<W>, wave: &Waveform) -> Result<()>
where
    W: std::io::Write + std::io::Seek,
{
    for s in wave.interleaved() {
        writer.write_sample(quantize(s))?;
    }
    Ok(())
}

/// Encode `wave` as an in-memory 16-bit PCM WAV file.
pub fn encode(wave: &Waveform) -> Result<Vec<u8>> {
    let mut buffer = Vec::with_capacity(HEADER_LEN + wave.frames() * wave.channel_count() as usize * 2);
    {
        let mut writer = hound::WavWriter::new(Cursor::new(&mut buffer), spec_for(wave))?;
        write_samples(&mut writer, wave)?;
        writer.finalize()?;
    }
    Ok(buffer)
}

/// Write `wave` to `output_path` as a 16-bit PCM WAV file.
pub fn write_file(wave: &Waveform, output_path: &Path) -> Result<()> {
    let mut writer = hound::WavWriter::create(output_path, spec_for(wave))?;
    write_samples(&mut writer, wave)?;
    writer.finalize()?;
    log::info!(
        "Saved {} samples ({:.2} s) to {}",
        wave.frames(),
        wave.duration().as_secs_f32(),
        output_path.display()
    );
    Ok(())
}

/// Read a 16-bit PCM WAV container back into a waveform.
pub fn decode(bytes: &[u8]) -> Result<Waveform> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();
    if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
        return Err(Error::Decode(format!(
            "expected 16-bit PCM, got {:?} {}-bit",
            spec.sample_format, spec.bits_per_sample
        )));
    }

    let n_channels = spec.channels.max(1) as usize;
    let mut data = vec![Vec::with_capacity(reader.duration() as usize); n_channels];
    for (i, sample) in reader.samples::<i16>().enumerate() {
        data[i % n_channels].push(sample? as f32 / PCM_SCALE);
    }
    Waveform::new(spec.sample_rate, data)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
