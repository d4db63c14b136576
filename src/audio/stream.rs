use log::{debug, error, info, trace, warn};
use std::sync::Arc;
use std::time::Duration;

use super::event::CompletionEvent;
use super::format::WaveFormat;
use super::result_code::{translate, SubsystemResult};
use super::slot::BufferSlot;
use super::subsystem::{DeviceId, Direction, WaveDevice, WaveSubsystem};
use crate::error::{DeviceError, StreamError};
use crate::logging::SessionStats;

/// How long a single wait on the completion event may block
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_millis(500);

/// An open device handle plus the completion event it signals.
///
/// Both resources are released exactly once, by [`OpenStream::shutdown`] or by
/// `Drop` when a stream is abandoned without being closed.
pub(crate) struct OpenStream<D: WaveDevice> {
    device: D,
    event: Arc<CompletionEvent>,
    format: WaveFormat,
    direction: Direction,
    device_id: DeviceId,
    wait_timeout: Duration,
    closed: bool,
}

impl<D: WaveDevice> OpenStream<D> {
    pub fn open<S>(
        subsystem: &S,
        device_id: DeviceId,
        format: WaveFormat,
        direction: Direction,
    ) -> Result<Self, StreamError>
    where
        S: WaveSubsystem<Device = D>,
    {
        let event = Arc::new(CompletionEvent::new());
        let device = subsystem
            .open(device_id, &format, direction, Arc::clone(&event))
            .map_err(|code| {
                StreamError::DeviceOpen(translate(code, "open audio device", subsystem.error_text(code)))
            })?;

        info!(
            "Opened {} device {} ({})",
            direction.as_str(),
            device_id,
            format.format_description()
        );

        Ok(Self {
            device,
            event,
            format,
            direction,
            device_id,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            closed: false,
        })
    }

    pub fn format(&self) -> &WaveFormat {
        &self.format
    }

    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    pub fn wait_timeout(&self) -> Duration {
        self.wait_timeout
    }

    pub fn set_wait_timeout(&mut self, timeout: Duration) {
        // A zero timeout would turn the wait loop into a spin
        self.wait_timeout = timeout.max(Duration::from_millis(1));
    }

    pub fn new_session(&self) -> SessionStats {
        SessionStats::new(self.direction)
    }

    fn check(&self, result: SubsystemResult, cause: &str) -> Result<(), DeviceError> {
        result.map_err(|code| translate(code, cause, self.device.error_text(code)))
    }

    /// Prepare a slot and hand it to the device.
    ///
    /// If the device refuses the slot after it was prepared, the slot is
    /// unprepared again before the error is returned.
    pub fn submit(&mut self, slot: &BufferSlot) -> Result<(), StreamError> {
        let prepared = self.device.prepare(slot);
        self.check(prepared, "prepare buffer")?;

        let submitted = self.device.submit(slot);
        if let Err(err) = self.check(submitted, "submit buffer") {
            let mut err = StreamError::from(err);
            if let Err(cleanup) = self.unprepare(slot) {
                err = err.with_cleanup_failure(cleanup);
            }
            return Err(err);
        }

        trace!("Submitted {} slot {} ({} bytes)", self.direction.as_str(), slot.id(), slot.len());
        Ok(())
    }

    pub fn unprepare(&mut self, slot: &BufferSlot) -> Result<(), DeviceError> {
        let result = self.device.unprepare(slot);
        self.check(result, "unprepare buffer")
    }

    pub fn start(&mut self) -> Result<(), DeviceError> {
        let result = self.device.start();
        self.check(result, "start audio device")
    }

    pub fn stop(&mut self) -> Result<(), DeviceError> {
        let result = self.device.stop();
        self.check(result, "stop audio device")
    }

    pub fn reset(&mut self) -> Result<(), DeviceError> {
        let result = self.device.reset();
        self.check(result, "reset audio device")
    }

    /// Block until the driver marks `slot` done.
    ///
    /// The event is shared by both slots of the stream, so a signal may belong
    /// to the other slot, and a flag can be set moments before its signal
    /// arrives. The slot's own flag is therefore re-checked after every wait,
    /// whether the wait was signaled or timed out.
    pub fn wait_for(&mut self, slot: &BufferSlot, stats: &mut SessionStats) {
        while !slot.is_done() {
            if self.event.wait(self.wait_timeout) {
                self.event.reset();
            } else {
                stats.record_timeout();
                debug!(
                    "Slot {} still pending after {:?} ({} timeout(s) so far)",
                    slot.id(),
                    self.wait_timeout,
                    stats.wait_timeouts()
                );
            }
        }
        trace!("Slot {} completed ({} bytes)", slot.id(), slot.bytes_recorded());
    }

    /// Abort the stream after `cause`: reset the device so every queued slot
    /// completes, then unprepare each outstanding slot.
    ///
    /// Failures along the way are attached to `cause`, which is returned.
    pub fn abort(&mut self, cause: StreamError, outstanding: &[&BufferSlot]) -> StreamError {
        error!("Aborting {} stream: {}", self.direction.as_str(), cause);

        let mut cause = cause;
        if let Err(err) = self.reset() {
            warn!("{}", err);
            cause = cause.with_cleanup_failure(err);
        }
        for slot in outstanding {
            if let Err(err) = self.unprepare(slot) {
                warn!("{}", err);
                cause = cause.with_cleanup_failure(err);
            }
        }
        cause
    }

    /// Close the event, reset the device and release the handle
    pub fn shutdown(&mut self) -> Result<(), StreamError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        self.event.close();
        let reset = self.reset();
        let closed = self.device.close();
        let closed = self.check(closed, "close audio device");

        info!("Closed {} device {}", self.direction.as_str(), self.device_id);

        match (reset, closed) {
            (Ok(()), Ok(())) => Ok(()),
            (Err(err), Ok(())) | (Ok(()), Err(err)) => Err(err.into()),
            (Err(reset_err), Err(close_err)) => {
                Err(StreamError::from(reset_err).with_cleanup_failure(close_err))
            }
        }
    }
}

impl<D: WaveDevice> Drop for OpenStream<D> {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(err) = self.shutdown() {
                warn!("Failed to close {} device: {}", self.direction.as_str(), err);
            }
        }
    }
}
