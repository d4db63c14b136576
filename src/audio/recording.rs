use log::debug;
use std::time::Duration;

use super::format::WaveFormat;
use super::slot::BufferSlot;
use super::stream::OpenStream;
use super::subsystem::{DeviceId, Direction, WaveDevice, WaveSubsystem};
use crate::error::{CallbackError, StreamError};
use crate::logging::{SessionStats, StreamSummary};

/// Destination for audio captured by [`RecordingDevice::record`].
///
/// Return `Ok(true)` to keep recording, `Ok(false)` to stop, or `Err` to abort.
/// A consumer must return within one chunk duration or the device runs out of
/// queued buffers and drops input.
pub trait Consumer {
    fn consume(&mut self, chunk: &[u8]) -> Result<bool, CallbackError>;
}

impl<F> Consumer for F
where
    F: FnMut(&[u8]) -> Result<bool, CallbackError>,
{
    fn consume(&mut self, chunk: &[u8]) -> Result<bool, CallbackError> {
        self(chunk)
    }
}

/// Double-buffered capture from one input device
pub struct RecordingDevice<D: WaveDevice> {
    stream: OpenStream<D>,
}

impl<D: WaveDevice> RecordingDevice<D> {
    /// Open an input device for `format`
    pub fn open<S>(subsystem: &S, device_id: DeviceId, format: WaveFormat) -> Result<Self, StreamError>
    where
        S: WaveSubsystem<Device = D>,
    {
        let stream = OpenStream::open(subsystem, device_id, format, Direction::Recording)?;
        Ok(Self { stream })
    }

    /// Set how long each wait on the completion event may block
    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.stream.set_wait_timeout(timeout);
        self
    }

    pub fn format(&self) -> &WaveFormat {
        self.stream.format()
    }

    pub fn device_id(&self) -> DeviceId {
        self.stream.device_id()
    }

    /// Frames in a chunk lasting `duration`, at least one
    pub fn frames_per_chunk(&self, duration: Duration) -> usize {
        self.format().frames_in(duration).max(1)
    }

    /// Record chunks of `frames_per_chunk` frames into `consumer`, blocking the
    /// calling thread until it asks to stop.
    ///
    /// The next buffer is always queued before waiting on the current one, so
    /// the device never runs without a buffer to fill. The device is stopped on
    /// every exit path.
    pub fn record<C: Consumer>(
        &mut self,
        frames_per_chunk: usize,
        mut consumer: C,
    ) -> Result<StreamSummary, StreamError> {
        if frames_per_chunk == 0 {
            return Err(StreamError::InvalidChunkSize);
        }
        let chunk_len = frames_per_chunk * self.format().block_align() as usize;
        debug!("Recording in chunks of {} frames ({} bytes)", frames_per_chunk, chunk_len);

        let mut stats = self.stream.new_session();
        let current = BufferSlot::zeroed(chunk_len);
        let next = BufferSlot::zeroed(chunk_len);

        self.stream.submit(&current)?;
        let captured = self.capture(current, next, &mut consumer, &mut stats);

        match (captured, self.stream.stop()) {
            (Ok(()), Ok(())) => Ok(stats.finish()),
            (Ok(()), Err(stop_err)) => Err(stop_err.into()),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(stop_err)) => Err(err.with_cleanup_failure(stop_err)),
        }
    }

    fn capture<C: Consumer>(
        &mut self,
        mut current: BufferSlot,
        mut next: BufferSlot,
        consumer: &mut C,
        stats: &mut SessionStats,
    ) -> Result<(), StreamError> {
        if let Err(err) = self.stream.start() {
            return Err(self.stream.abort(err.into(), &[&current]));
        }

        loop {
            if let Err(err) = self.stream.submit(&next) {
                return Err(self.stream.abort(err, &[&current]));
            }

            self.stream.wait_for(&current, stats);

            let verdict = current.read_recorded(|chunk| consumer.consume(chunk));
            let keep_going = match verdict {
                Ok(keep_going) => keep_going,
                Err(err) => {
                    return Err(self.stream.abort(StreamError::callback(err), &[&current, &next]));
                }
            };
            stats.record_chunk(current.bytes_recorded());

            if let Err(err) = self.stream.unprepare(&current) {
                return Err(self.stream.abort(err.into(), &[&current, &next]));
            }

            if !keep_going {
                return self.release_pending(&next);
            }

            std::mem::swap(&mut current, &mut next);
        }
    }

    // The slot queued ahead of a voluntary stop is still at the device
    fn release_pending(&mut self, pending: &BufferSlot) -> Result<(), StreamError> {
        let mut outcome = self.stream.reset().map_err(StreamError::from);

        if let Err(err) = self.stream.unprepare(pending) {
            outcome = match outcome {
                Ok(()) => Err(err.into()),
                Err(reset_err) => Err(reset_err.with_cleanup_failure(err)),
            };
        }
        outcome
    }

    /// Release the completion event and the device
    pub fn close(mut self) -> Result<(), StreamError> {
        self.stream.shutdown()
    }
}
