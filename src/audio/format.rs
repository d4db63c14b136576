use std::time::Duration;

use crate::error::StreamError;

/// PCM format of a waveform stream.
///
/// Fields are private so a descriptor can only be built through [`WaveFormat::new`],
/// which rejects zero values. Once a device is opened with a format it never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WaveFormat {
    channels: u16,
    sample_rate: u32,
    sample_width: u16,
}

impl WaveFormat {
    /// Create a new format descriptor
    ///
    /// `sample_width` is in bytes per sample (1 for 8-bit, 2 for 16-bit, ...).
    pub fn new(channels: u16, sample_rate: u32, sample_width: u16) -> Result<Self, StreamError> {
        if channels == 0 || sample_rate == 0 || sample_width == 0 {
            return Err(StreamError::InvalidFormat {
                channels,
                sample_rate,
                sample_width,
            });
        }

        Ok(Self {
            channels,
            sample_rate,
            sample_width,
        })
    }

    /// Create a format from a bit depth instead of a byte width
    pub fn from_bits(channels: u16, sample_rate: u32, bits_per_sample: u16) -> Result<Self, StreamError> {
        if bits_per_sample % 8 != 0 {
            return Err(StreamError::UnsupportedSampleWidth { bits: bits_per_sample });
        }
        Self::new(channels, sample_rate, bits_per_sample / 8)
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Bytes per sample
    pub fn sample_width(&self) -> u16 {
        self.sample_width
    }

    pub fn bits_per_sample(&self) -> u16 {
        self.sample_width * 8
    }

    /// Bytes per frame (one sample for every channel)
    pub fn block_align(&self) -> u32 {
        u32::from(self.sample_width) * u32::from(self.channels)
    }

    pub fn avg_bytes_per_sec(&self) -> u64 {
        u64::from(self.block_align()) * u64::from(self.sample_rate)
    }

    /// Number of whole frames that fit in `duration`
    pub fn frames_in(&self, duration: Duration) -> usize {
        (duration.as_secs_f64() * f64::from(self.sample_rate)) as usize
    }

    /// Playing time of `bytes` bytes of audio in this format
    pub fn duration_of(&self, bytes: usize) -> Duration {
        Duration::from_secs_f64(bytes as f64 / self.avg_bytes_per_sec() as f64)
    }

    /// Get a human-readable format description
    pub fn format_description(&self) -> String {
        format!(
            "PCM {}-bit/{} Hz - {} channel{}",
            self.bits_per_sample(),
            self.sample_rate,
            self.channels,
            if self.channels == 1 { "" } else { "s" }
        )
    }
}
