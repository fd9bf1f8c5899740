//! PCM decoding for synthesized speech.
//!
//! The synthesis service returns 16-bit little-endian PCM, 24kHz mono.

use std::time::Duration;

use crate::error::AudioError;

pub const SAMPLE_RATE: u32 = 24000;
pub const CHANNELS: u16 = 1;

/// Decoded, ready-to-play audio.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioBuffer {
    pub fn duration(&self) -> Duration {
        let frames = self.samples.len() as f64 / f64::from(self.channels.max(1));
        Duration::from_secs_f64(frames / f64::from(self.sample_rate.max(1)))
    }
}

/// Decode raw PCM16LE bytes. A trailing odd byte is ignored.
pub fn decode(bytes: &[u8]) -> Result<AudioBuffer, AudioError> {
    let samples: Vec<f32> = bytes
        .chunks_exact(2)
        .map(|pair| f32::from(i16::from_le_bytes([pair[0], pair[1]])) / 32768.0)
        .collect();

    if samples.is_empty() {
        return Err(AudioError::NoAudioReturned("empty PCM payload".into()));
    }

    Ok(AudioBuffer {
        samples,
        sample_rate: SAMPLE_RATE,
        channels: CHANNELS,
    })
}
