use log::debug;
use std::time::Duration;

use super::format::WaveFormat;
use super::slot::BufferSlot;
use super::stream::OpenStream;
use super::subsystem::{DeviceId, Direction, WaveDevice, WaveSubsystem};
use crate::error::{CallbackError, StreamError};
use crate::logging::StreamSummary;

/// Source of audio for [`PlaybackDevice::play`].
///
/// Return `Ok(Some(bytes))` to keep playing, `Ok(None)` (or an empty chunk)
/// to stop once everything queued has played, or `Err` to abort playback.
pub trait Producer {
    fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, CallbackError>;
}

impl<F> Producer for F
where
    F: FnMut() -> Result<Option<Vec<u8>>, CallbackError>,
{
    fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, CallbackError> {
        self()
    }
}

/// Double-buffered playback through one output device.
///
/// The device stays open until [`PlaybackDevice::close`] or drop.
pub struct PlaybackDevice<D: WaveDevice> {
    stream: OpenStream<D>,
}

impl<D: WaveDevice> PlaybackDevice<D> {
    /// Open an output device for `format`
    pub fn open<S>(subsystem: &S, device_id: DeviceId, format: WaveFormat) -> Result<Self, StreamError>
    where
        S: WaveSubsystem<Device = D>,
    {
        let stream = OpenStream::open(subsystem, device_id, format, Direction::Playback)?;
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

    pub fn wait_timeout(&self) -> Duration {
        self.stream.wait_timeout()
    }

    /// Play chunks from `producer` until it runs dry, blocking the calling thread.
    ///
    /// While one chunk plays the next one is produced and queued behind it, so
    /// the device never idles between chunks. If the producer fails, the device
    /// is reset and the in-flight slot unprepared before the producer's error is
    /// returned.
    pub fn play<P: Producer>(&mut self, mut producer: P) -> Result<StreamSummary, StreamError> {
        let mut stats = self.stream.new_session();

        let first = match pull(&mut producer) {
            Ok(Some(chunk)) => chunk,
            Ok(None) => {
                debug!("Producer had no data, nothing to play");
                return Ok(stats.finish());
            }
            Err(err) => return Err(StreamError::callback(err)),
        };

        let mut current = BufferSlot::with_data(first);
        self.stream.submit(&current)?;

        loop {
            let following = match pull(&mut producer) {
                Ok(chunk) => chunk,
                Err(err) => {
                    return Err(self.stream.abort(StreamError::callback(err), &[&current]));
                }
            };

            // None marks the final iteration; `current` still drains below
            let next = match following {
                Some(chunk) => {
                    let slot = BufferSlot::with_data(chunk);
                    if let Err(err) = self.stream.submit(&slot) {
                        return Err(self.stream.abort(err, &[&current]));
                    }
                    Some(slot)
                }
                None => None,
            };

            self.stream.wait_for(&current, &mut stats);

            if let Err(err) = self.stream.unprepare(&current) {
                let mut outstanding = vec![&current];
                outstanding.extend(next.as_ref());
                return Err(self.stream.abort(err.into(), &outstanding));
            }
            stats.record_chunk(current.bytes_recorded());

            match next {
                Some(slot) => current = slot,
                None => break,
            }
        }

        Ok(stats.finish())
    }

    /// Release the completion event and the device
    pub fn close(mut self) -> Result<(), StreamError> {
        self.stream.shutdown()
    }
}

// Empty chunks count as the end of the stream
fn pull<P: Producer>(producer: &mut P) -> Result<Option<Vec<u8>>, CallbackError> {
    Ok(producer.next_chunk()?.filter(|chunk| !chunk.is_empty()))
}
