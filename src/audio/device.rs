use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    BufferSize, BuildStreamError, Device, Host, PauseStreamError, PlayStreamError, SampleRate, Stream,
    StreamConfig, StreamError,
};
use log::{debug, error, warn};
use std::sync::Arc;

use super::driver::DriverQueue;
use super::event::CompletionEvent;
use super::format::WaveFormat;
use super::result_code::{ResultCode, SubsystemResult};
use super::slot::BufferSlot;
use super::subsystem::{
    DeviceId, Direction, PlaybackDeviceInfo, RecordingDeviceInfo, WaveDevice, WaveSubsystem,
};

/// Waveform subsystem backed by the platform's default cpal host.
///
/// Each open device owns one cpal stream. The stream callback runs on cpal's
/// audio thread and plays the driver role: it drains or fills queued slots in
/// order and signals the stream's completion event as each one finishes.
pub struct CpalSubsystem {
    host: Host,
}

impl CpalSubsystem {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    /// Name of the underlying audio host (ALSA, WASAPI, CoreAudio, ...)
    pub fn host_name(&self) -> &'static str {
        self.host.id().name()
    }

    fn find_device(&self, id: DeviceId, direction: Direction) -> Option<Device> {
        match (id, direction) {
            (DeviceId::Default, Direction::Playback) => self.host.default_output_device(),
            (DeviceId::Default, Direction::Recording) => self.host.default_input_device(),
            (DeviceId::Index(index), Direction::Playback) => {
                self.host.output_devices().ok()?.nth(index as usize)
            }
            (DeviceId::Index(index), Direction::Recording) => {
                self.host.input_devices().ok()?.nth(index as usize)
            }
        }
    }
}

impl Default for CpalSubsystem {
    fn default() -> Self {
        Self::new()
    }
}

impl WaveSubsystem for CpalSubsystem {
    type Device = CpalDevice;

    fn playback_devices(&self) -> Vec<PlaybackDeviceInfo> {
        let devices = match self.host.output_devices() {
            Ok(devices) => devices,
            Err(e) => {
                warn!("Failed to enumerate output devices: {}", e);
                return Vec::new();
            }
        };

        devices
            .enumerate()
            .map(|(index, device)| PlaybackDeviceInfo {
                name: device
                    .name()
                    .unwrap_or_else(|_| format!("Output device {}", index)),
                id: DeviceId::Index(index as u32),
            })
            .collect()
    }

    fn recording_devices(&self) -> Vec<RecordingDeviceInfo> {
        let devices = match self.host.input_devices() {
            Ok(devices) => devices,
            Err(e) => {
                warn!("Failed to enumerate input devices: {}", e);
                return Vec::new();
            }
        };

        devices
            .enumerate()
            .map(|(index, device)| RecordingDeviceInfo {
                name: device
                    .name()
                    .unwrap_or_else(|_| format!("Input device {}", index)),
                id: DeviceId::Index(index as u32),
                channels: device
                    .default_input_config()
                    .map(|config| config.channels())
                    .unwrap_or(1),
            })
            .collect()
    }

    fn open(
        &self,
        id: DeviceId,
        format: &WaveFormat,
        direction: Direction,
        event: Arc<CompletionEvent>,
    ) -> Result<CpalDevice, ResultCode> {
        let device = self.find_device(id, direction).ok_or(ResultCode::BAD_DEVICE_ID)?;

        let config = StreamConfig {
            channels: format.channels(),
            sample_rate: SampleRate(format.sample_rate()),
            buffer_size: BufferSize::Default,
        };

        let queue = Arc::new(DriverQueue::new(event));
        let stream = match format.sample_width() {
            1 => build_stream::<u8>(&device, &config, direction, &queue),
            2 => build_stream::<i16>(&device, &config, direction, &queue),
            4 => build_stream::<i32>(&device, &config, direction, &queue),
            _ => Err(ResultCode::BAD_FORMAT),
        }?;

        // Output runs from the start and plays silence until the first slot
        // arrives; input waits for `start`.
        if direction == Direction::Playback {
            stream.play().map_err(play_error_code)?;
        }

        debug!(
            "cpal {} stream opened on '{}'",
            direction.as_str(),
            device.name().unwrap_or_default()
        );

        Ok(CpalDevice {
            stream: Some(stream),
            queue,
            direction,
        })
    }
}

/// One open cpal stream driven as a waveform device
pub struct CpalDevice {
    stream: Option<Stream>,
    queue: Arc<DriverQueue>,
    direction: Direction,
}

impl CpalDevice {
    fn stream(&self) -> Result<&Stream, ResultCode> {
        self.stream.as_ref().ok_or(ResultCode::INVALID_HANDLE)
    }

    // A stream that reported an error stays failed until closed
    fn healthy_stream(&self) -> Result<&Stream, ResultCode> {
        let stream = self.stream()?;
        match self.queue.fault() {
            Some(code) => Err(code),
            None => Ok(stream),
        }
    }
}

impl WaveDevice for CpalDevice {
    fn prepare(&mut self, slot: &BufferSlot) -> SubsystemResult {
        self.stream()?;
        slot.mark_prepared()
    }

    fn unprepare(&mut self, slot: &BufferSlot) -> SubsystemResult {
        self.stream()?;
        slot.mark_unprepared()
    }

    fn submit(&mut self, slot: &BufferSlot) -> SubsystemResult {
        self.healthy_stream()?;
        slot.mark_queued()?;
        self.queue.push(slot.clone());
        Ok(())
    }

    fn start(&mut self) -> SubsystemResult {
        self.healthy_stream()?.play().map_err(play_error_code)
    }

    fn stop(&mut self) -> SubsystemResult {
        self.stream()?.pause().map_err(pause_error_code)
    }

    fn reset(&mut self) -> SubsystemResult {
        let stream = self.stream()?;
        let paused = match self.direction {
            Direction::Recording => stream.pause().map_err(pause_error_code),
            Direction::Playback => Ok(()),
        };
        // Queued slots are released even when the device refuses to pause
        let aborted = self.queue.abort_all();
        if aborted > 0 {
            debug!("Reset aborted {} queued slot(s)", aborted);
        }
        paused?;
        self.queue.fault().map_or(Ok(()), Err)
    }

    fn close(&mut self) -> SubsystemResult {
        self.stream()?;
        if !self.queue.is_empty() {
            debug!("Refusing to close with {} slot(s) queued", self.queue.len());
            return Err(ResultCode::STILL_PLAYING);
        }
        // Dropping the stream stops the callback thread
        self.stream = None;
        Ok(())
    }
}

/// Sample types the cpal streams are built with, converted to and from
/// little-endian PCM bytes
trait PcmSample: cpal::SizedSample + Send + 'static {
    const WIDTH: usize;
    const SILENCE: Self;

    fn from_le(bytes: &[u8]) -> Self;
    fn write_le(self, out: &mut [u8]);
}

impl PcmSample for u8 {
    const WIDTH: usize = 1;
    const SILENCE: Self = 128;

    fn from_le(bytes: &[u8]) -> Self {
        bytes[0]
    }

    fn write_le(self, out: &mut [u8]) {
        out[0] = self;
    }
}

impl PcmSample for i16 {
    const WIDTH: usize = 2;
    const SILENCE: Self = 0;

    fn from_le(bytes: &[u8]) -> Self {
        i16::from_le_bytes([bytes[0], bytes[1]])
    }

    fn write_le(self, out: &mut [u8]) {
        out.copy_from_slice(&self.to_le_bytes());
    }
}

impl PcmSample for i32 {
    const WIDTH: usize = 4;
    const SILENCE: Self = 0;

    fn from_le(bytes: &[u8]) -> Self {
        i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    fn write_le(self, out: &mut [u8]) {
        out.copy_from_slice(&self.to_le_bytes());
    }
}

fn build_stream<T: PcmSample>(
    device: &Device,
    config: &StreamConfig,
    direction: Direction,
    queue: &Arc<DriverQueue>,
) -> Result<Stream, ResultCode> {
    let queue = Arc::clone(queue);
    let failed = Arc::clone(&queue);
    let on_error = move |err: StreamError| {
        error!("Audio {} stream error: {}", direction.as_str(), err);
        let aborted = failed.fail(stream_error_code(&err));
        if aborted > 0 {
            warn!("Aborted {} queued slot(s) after stream error", aborted);
        }
    };
    // Reused across callbacks; only grows when cpal hands over a larger period
    let mut scratch: Vec<u8> = Vec::new();

    let stream = match direction {
        Direction::Playback => device.build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                scratch.resize(data.len() * T::WIDTH, 0);
                let bytes = scratch.as_mut_slice();
                let filled = queue.drain_into(bytes) / T::WIDTH;

                for (i, sample) in data.iter_mut().enumerate() {
                    *sample = if i < filled {
                        T::from_le(&bytes[i * T::WIDTH..(i + 1) * T::WIDTH])
                    } else {
                        T::SILENCE
                    };
                }
            },
            on_error,
            None,
        ),
        Direction::Recording => device.build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                scratch.resize(data.len() * T::WIDTH, 0);
                for (sample, out) in data.iter().zip(scratch.chunks_exact_mut(T::WIDTH)) {
                    sample.write_le(out);
                }
                queue.fill_from(&scratch);
            },
            on_error,
            None,
        ),
    };

    stream.map_err(build_error_code)
}

fn build_error_code(err: BuildStreamError) -> ResultCode {
    warn!("Failed to build audio stream: {}", err);
    match err {
        BuildStreamError::DeviceNotAvailable => ResultCode::NO_DRIVER,
        BuildStreamError::StreamConfigNotSupported => ResultCode::BAD_FORMAT,
        BuildStreamError::InvalidArgument => ResultCode::INVALID_PARAM,
        _ => ResultCode::GENERAL_ERROR,
    }
}

fn stream_error_code(err: &StreamError) -> ResultCode {
    match err {
        StreamError::DeviceNotAvailable => ResultCode::INVALID_HANDLE,
        _ => ResultCode::GENERAL_ERROR,
    }
}

fn play_error_code(err: PlayStreamError) -> ResultCode {
    warn!("Failed to start audio stream: {}", err);
    match err {
        PlayStreamError::DeviceNotAvailable => ResultCode::INVALID_HANDLE,
        _ => ResultCode::GENERAL_ERROR,
    }
}

fn pause_error_code(err: PauseStreamError) -> ResultCode {
    warn!("Failed to pause audio stream: {}", err);
    match err {
        PauseStreamError::DeviceNotAvailable => ResultCode::INVALID_HANDLE,
        _ => ResultCode::GENERAL_ERROR,
    }
}
