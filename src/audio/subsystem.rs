use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::event::CompletionEvent;
use super::format::WaveFormat;
use super::result_code::{ResultCode, SubsystemResult};
use super::slot::BufferSlot;

/// Which way audio flows through a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Playback,
    Recording,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Playback => "playback",
            Direction::Recording => "recording",
        }
    }
}

/// Device selector accepted by [`WaveSubsystem::open`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeviceId {
    /// Let the subsystem pick its preferred device
    #[default]
    Default,
    /// Position in the subsystem's device list
    Index(u32),
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceId::Default => write!(f, "default"),
            DeviceId::Index(index) => write!(f, "{}", index),
        }
    }
}

impl FromStr for DeviceId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("default") {
            return Ok(DeviceId::Default);
        }
        trimmed
            .parse::<u32>()
            .map(DeviceId::Index)
            .map_err(|_| format!("Invalid device id '{}': expected 'default' or a device number", s))
    }
}

impl From<Option<u32>> for DeviceId {
    fn from(index: Option<u32>) -> Self {
        index.map(DeviceId::Index).unwrap_or_default()
    }
}

/// An output device as reported by enumeration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackDeviceInfo {
    pub name: String,
    pub id: DeviceId,
}

/// An input device as reported by enumeration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingDeviceInfo {
    pub name: String,
    pub id: DeviceId,
    pub channels: u16,
}

/// Name of the synthetic entry that maps to [`DeviceId::Default`]
pub const DEFAULT_DEVICE_NAME: &str = "Default";

/// An audio subsystem able to enumerate and open waveform devices.
pub trait WaveSubsystem {
    type Device: WaveDevice;

    /// Hardware output devices, in subsystem order
    fn playback_devices(&self) -> Vec<PlaybackDeviceInfo>;

    /// Hardware input devices, in subsystem order
    fn recording_devices(&self) -> Vec<RecordingDeviceInfo>;

    /// Claim a device for one stream.
    ///
    /// The device signals `event` every time a submitted slot completes,
    /// always after setting that slot's completion flag.
    fn open(
        &self,
        id: DeviceId,
        format: &WaveFormat,
        direction: Direction,
        event: Arc<CompletionEvent>,
    ) -> Result<Self::Device, ResultCode>;

    /// Subsystem description of a result code, if it has one
    fn error_text(&self, _code: ResultCode) -> Option<String> {
        None
    }
}

/// An open waveform device handle.
///
/// Every call mirrors one blocking subsystem call and reports failure as a raw
/// [`ResultCode`]; translation into errors happens at the call site.
pub trait WaveDevice {
    /// Register a slot with the device
    fn prepare(&mut self, slot: &BufferSlot) -> SubsystemResult;

    /// Deregister a slot. Fails with `STILL_PLAYING` while it is in flight.
    fn unprepare(&mut self, slot: &BufferSlot) -> SubsystemResult;

    /// Queue a prepared slot for output, or for filling on input
    fn submit(&mut self, slot: &BufferSlot) -> SubsystemResult;

    /// Begin capturing. Output devices run from the first submission.
    fn start(&mut self) -> SubsystemResult;

    /// Stop the device. Queued slots stay queued.
    fn stop(&mut self) -> SubsystemResult;

    /// Abort all pending I/O, marking every queued slot done
    fn reset(&mut self) -> SubsystemResult;

    /// Release the handle. Fails with `STILL_PLAYING` if slots are queued.
    fn close(&mut self) -> SubsystemResult;

    /// Device description of a result code, if it has one
    fn error_text(&self, _code: ResultCode) -> Option<String> {
        None
    }
}

/// Output devices, prefixed with the synthetic default entry
pub fn list_playback_devices<S: WaveSubsystem>(subsystem: &S) -> Vec<PlaybackDeviceInfo> {
    let mut devices = vec![PlaybackDeviceInfo {
        name: DEFAULT_DEVICE_NAME.to_string(),
        id: DeviceId::Default,
    }];
    devices.extend(subsystem.playback_devices());
    devices
}

/// Input devices, prefixed with the synthetic default entry.
///
/// The default entry reports the channel count of the first hardware device,
/// or mono when there is none.
pub fn list_recording_devices<S: WaveSubsystem>(subsystem: &S) -> Vec<RecordingDeviceInfo> {
    let hardware = subsystem.recording_devices();
    let channels = hardware.first().map(|device| device.channels).unwrap_or(1);

    let mut devices = vec![RecordingDeviceInfo {
        name: DEFAULT_DEVICE_NAME.to_string(),
        id: DeviceId::Default,
        channels,
    }];
    devices.extend(hardware);
    devices
}
