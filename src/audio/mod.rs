pub mod device;
pub mod event;
pub mod format;
pub mod monitor;
pub mod playback;
pub mod recording;
pub mod result_code;
pub mod slot;
pub mod subsystem;
pub mod wav;

mod driver;
mod stream;

#[cfg(test)]
pub mod tests;

// Re-export the cpal backend
pub use device::{CpalDevice, CpalSubsystem};

// Re-export stream building blocks
pub use event::CompletionEvent;
pub use format::WaveFormat;
pub use result_code::{translate, ResultCode, SubsystemResult, UNKNOWN_ERROR};
pub use slot::BufferSlot;
pub use stream::DEFAULT_WAIT_TIMEOUT;
pub use subsystem::{
    list_playback_devices, list_recording_devices, DeviceId, Direction, PlaybackDeviceInfo,
    RecordingDeviceInfo, WaveDevice, WaveSubsystem, DEFAULT_DEVICE_NAME,
};

// Re-export the engines
pub use playback::{PlaybackDevice, Producer};
pub use recording::{Consumer, RecordingDevice};

// Re-export recording helpers and file adapters
pub use monitor::{measure_quiet_threshold, rms, ChunkSink, RecordLimits, RecordMonitor};
pub use wav::{play_wav, record_wav, WavChunkReader, WavChunkWriter, WavRecording};
