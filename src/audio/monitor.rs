use log::{debug, info, trace};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::format::WaveFormat;
use super::recording::{Consumer, RecordingDevice};
use super::subsystem::WaveDevice;
use crate::error::{CallbackError, StreamError};

/// RMS level of a chunk, normalised so full scale is about 0.5 for 8-bit and
/// 1.0 for 16-bit audio.
///
/// Only 8-bit unsigned and 16-bit signed little-endian samples are supported.
/// An empty chunk has level 0.
pub fn rms(format: &WaveFormat, chunk: &[u8]) -> Result<f64, StreamError> {
    let mean_square = match format.sample_width() {
        1 => mean(chunk.iter().map(|&byte| {
            let value = (f64::from(byte) - 128.0) / 256.0;
            value * value
        })),
        2 => mean(chunk.chunks_exact(2).map(|pair| {
            let value = f64::from(i16::from_le_bytes([pair[0], pair[1]])) / 32768.0;
            value * value
        })),
        _ => {
            return Err(StreamError::UnsupportedSampleWidth {
                bits: format.bits_per_sample(),
            })
        }
    };
    Ok(mean_square.sqrt())
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// When a monitored recording stops on its own
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordLimits {
    /// Stop once this many seconds have been kept
    pub max_seconds: Option<f64>,
    /// Stop after this many consecutive seconds of quiet chunks
    pub max_quiet_seconds: Option<f64>,
    /// RMS level below which a chunk counts as quiet
    pub quiet_threshold: f64,
    /// Drop quiet chunks until the first one above the threshold
    pub wait_for_sound: bool,
}

impl Default for RecordLimits {
    fn default() -> Self {
        Self {
            max_seconds: None,
            max_quiet_seconds: Some(1.0),
            quiet_threshold: 0.005,
            wait_for_sound: true,
        }
    }
}

impl RecordLimits {
    /// Build limits where zero or negative durations mean "no limit"
    pub fn new(max_seconds: Option<f64>, quiet_seconds: f64, quiet_threshold: f64, wait_for_sound: bool) -> Self {
        Self {
            max_seconds: max_seconds.filter(|seconds| *seconds > 0.0),
            max_quiet_seconds: Some(quiet_seconds).filter(|seconds| *seconds > 0.0),
            quiet_threshold,
            wait_for_sound,
        }
    }
}

/// Where a [`RecordMonitor`] keeps the chunks it accepts
pub trait ChunkSink {
    fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), CallbackError>;
}

impl ChunkSink for Vec<u8> {
    fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), CallbackError> {
        self.extend_from_slice(chunk);
        Ok(())
    }
}

type Observer = Box<dyn FnMut(&[u8]) + Send>;

/// Consumer that decides when a recording is finished.
///
/// Each chunk is first shown to the observer, if any. Leading quiet chunks
/// are dropped while `wait_for_sound` holds. Accepted chunks go to the sink
/// and count towards the time and silence limits.
pub struct RecordMonitor<S: ChunkSink> {
    sink: S,
    format: WaveFormat,
    limits: RecordLimits,
    observer: Option<Observer>,
    stop: Option<Arc<AtomicBool>>,
    waiting_for_sound: bool,
    seconds: f64,
    quiet_seconds: f64,
}

impl<S: ChunkSink> RecordMonitor<S> {
    pub fn new(sink: S, format: WaveFormat, limits: RecordLimits) -> Result<Self, StreamError> {
        // Level measurement needs a supported width
        rms(&format, &[])?;

        Ok(Self {
            sink,
            format,
            limits,
            observer: None,
            stop: None,
            waiting_for_sound: limits.wait_for_sound,
            seconds: 0.0,
            quiet_seconds: 0.0,
        })
    }

    /// Call `observer` with every raw chunk, kept or not
    pub fn with_observer<F>(mut self, observer: F) -> Self
    where
        F: FnMut(&[u8]) + Send + 'static,
    {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Stop after the next chunk once `flag` is set
    pub fn with_stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop = Some(flag);
        self
    }

    /// Seconds of audio written to the sink so far
    pub fn seconds_recorded(&self) -> f64 {
        self.seconds
    }

    pub fn is_waiting_for_sound(&self) -> bool {
        self.waiting_for_sound
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    fn stop_requested(&self) -> bool {
        self.stop
            .as_ref()
            .map(|flag| flag.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    fn track(&mut self, chunk: &[u8]) -> Result<bool, CallbackError> {
        let quiet = rms(&self.format, chunk)? < self.limits.quiet_threshold;

        if self.waiting_for_sound {
            if quiet {
                trace!("Dropping quiet chunk while waiting for sound");
                return Ok(true);
            }
            debug!("Sound detected, recording");
            self.waiting_for_sound = false;
        }

        self.sink.write_chunk(chunk)?;

        let seconds = self.format.duration_of(chunk.len()).as_secs_f64();
        self.seconds += seconds;

        if let Some(max_seconds) = self.limits.max_seconds {
            if self.seconds >= max_seconds {
                info!("Recorded {:.2}s, time limit reached", self.seconds);
                return Ok(false);
            }
        }

        let Some(max_quiet_seconds) = self.limits.max_quiet_seconds else {
            return Ok(true);
        };

        if quiet {
            self.quiet_seconds += seconds;
        } else {
            self.quiet_seconds = 0.0;
        }

        if self.quiet_seconds >= max_quiet_seconds {
            info!("Heard {:.2}s of silence, stopping", self.quiet_seconds);
            return Ok(false);
        }
        Ok(true)
    }
}

impl<S: ChunkSink> Consumer for RecordMonitor<S> {
    fn consume(&mut self, chunk: &[u8]) -> Result<bool, CallbackError> {
        if let Some(observer) = self.observer.as_mut() {
            observer(chunk);
        }

        let keep_going = self.track(chunk)?;
        if keep_going && self.stop_requested() {
            info!("Recording stopped by request");
            return Ok(false);
        }
        Ok(keep_going)
    }
}

/// Record a single chunk of `frames` frames and return its RMS level.
///
/// The result is a reasonable `quiet_threshold` for the current room.
pub fn measure_quiet_threshold<D: WaveDevice>(
    recorder: &mut RecordingDevice<D>,
    frames: usize,
) -> Result<f64, StreamError> {
    let format = *recorder.format();
    rms(&format, &[])?;

    let mut level = 0.0;
    recorder.record(frames, |chunk: &[u8]| -> Result<bool, CallbackError> {
        level = rms(&format, chunk)?;
        Ok(false)
    })?;

    debug!("Measured background level {:.5}", level);
    Ok(level)
}
