use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use log::{info, warn};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use super::format::WaveFormat;
use super::monitor::{ChunkSink, RecordLimits, RecordMonitor};
use super::playback::{PlaybackDevice, Producer};
use super::recording::{Consumer, RecordingDevice};
use super::subsystem::{DeviceId, WaveSubsystem};
use crate::error::{CallbackError, StreamError};
use crate::logging::StreamSummary;

/// Default playing time of one chunk read from a file
pub const DEFAULT_CHUNK_DURATION: Duration = Duration::from_millis(500);

/// Reads an integer PCM WAV file as chunks of raw little-endian frames.
///
/// 8-bit samples come out unsigned, wider ones signed, matching what a
/// waveform device expects for the file's format.
pub struct WavChunkReader<R: Read> {
    reader: WavReader<R>,
    format: WaveFormat,
    frames_per_chunk: usize,
}

impl WavChunkReader<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StreamError> {
        Self::from_reader(WavReader::open(path)?)
    }
}

impl<R: Read> WavChunkReader<R> {
    pub fn new(reader: R) -> Result<Self, StreamError> {
        Self::from_reader(WavReader::new(reader)?)
    }

    fn from_reader(reader: WavReader<R>) -> Result<Self, StreamError> {
        let spec = reader.spec();
        if spec.sample_format != SampleFormat::Int {
            return Err(StreamError::Wav(hound::Error::Unsupported));
        }

        let format = WaveFormat::from_bits(spec.channels, spec.sample_rate, spec.bits_per_sample)?;
        Ok(Self {
            reader,
            format,
            frames_per_chunk: format.frames_in(DEFAULT_CHUNK_DURATION).max(1),
        })
    }

    /// Read chunks lasting `duration` instead of half a second
    pub fn with_chunk_duration(mut self, duration: Duration) -> Self {
        self.frames_per_chunk = self.format.frames_in(duration).max(1);
        self
    }

    pub fn format(&self) -> WaveFormat {
        self.format
    }

    pub fn frames_per_chunk(&self) -> usize {
        self.frames_per_chunk
    }

    /// Total playing time of the file
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(f64::from(self.reader.duration()) / f64::from(self.format.sample_rate()))
    }

    fn read_chunk(&mut self) -> Result<Option<Vec<u8>>, StreamError> {
        let width = self.format.sample_width() as usize;
        let samples = self.frames_per_chunk * self.format.channels() as usize;

        let mut chunk = Vec::with_capacity(samples * width);
        for sample in self.reader.samples::<i32>().take(samples) {
            let sample = sample?;
            match width {
                1 => chunk.push((sample + 128) as u8),
                _ => chunk.extend_from_slice(&sample.to_le_bytes()[..width]),
            }
        }

        Ok(if chunk.is_empty() { None } else { Some(chunk) })
    }
}

impl<R: Read> Producer for WavChunkReader<R> {
    fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, CallbackError> {
        Ok(self.read_chunk()?)
    }
}

/// Writes raw PCM chunks into a WAV file
pub struct WavChunkWriter<W: Write + Seek> {
    writer: WavWriter<W>,
    format: WaveFormat,
}

impl WavChunkWriter<BufWriter<File>> {
    pub fn create<P: AsRef<Path>>(path: P, format: WaveFormat) -> Result<Self, StreamError> {
        let writer = WavWriter::create(path, wav_spec(&format)?)?;
        Ok(Self { writer, format })
    }
}

impl<W: Write + Seek> WavChunkWriter<W> {
    pub fn new(writer: W, format: WaveFormat) -> Result<Self, StreamError> {
        let writer = WavWriter::new(writer, wav_spec(&format)?)?;
        Ok(Self { writer, format })
    }

    pub fn format(&self) -> WaveFormat {
        self.format
    }

    /// Append little-endian PCM frames. A trailing partial sample is ignored.
    pub fn write_pcm(&mut self, chunk: &[u8]) -> Result<(), StreamError> {
        let width = self.format.sample_width() as usize;
        for bytes in chunk.chunks_exact(width) {
            let sample = match width {
                1 => i32::from(bytes[0]) - 128,
                2 => i32::from(i16::from_le_bytes([bytes[0], bytes[1]])),
                // Shift into the top bytes so the sign extends on the way back
                3 => i32::from_le_bytes([0, bytes[0], bytes[1], bytes[2]]) >> 8,
                _ => i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            };
            self.writer.write_sample(sample)?;
        }
        Ok(())
    }

    /// Write the final header lengths and flush
    pub fn finalize(self) -> Result<(), StreamError> {
        self.writer.finalize()?;
        Ok(())
    }
}

impl<W: Write + Seek> ChunkSink for WavChunkWriter<W> {
    fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), CallbackError> {
        Ok(self.write_pcm(chunk)?)
    }
}

fn wav_spec(format: &WaveFormat) -> Result<WavSpec, StreamError> {
    if format.sample_width() > 4 {
        return Err(StreamError::UnsupportedSampleWidth {
            bits: format.bits_per_sample(),
        });
    }
    Ok(WavSpec {
        channels: format.channels(),
        sample_rate: format.sample_rate(),
        bits_per_sample: format.bits_per_sample(),
        sample_format: SampleFormat::Int,
    })
}

/// Outcome of [`record_wav`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WavRecording {
    pub summary: StreamSummary,
    /// Seconds of audio kept in the file, leading silence excluded
    pub seconds: f64,
}

/// Play a whole WAV file through an output device and close it
pub fn play_wav<S, R>(
    subsystem: &S,
    device: DeviceId,
    reader: WavChunkReader<R>,
    chunk: Duration,
    wait_timeout: Duration,
) -> Result<StreamSummary, StreamError>
where
    S: WaveSubsystem,
    R: Read,
{
    let reader = reader.with_chunk_duration(chunk);
    info!(
        "Playing {:.2}s of {}",
        reader.duration().as_secs_f64(),
        reader.format().format_description()
    );

    let mut player = PlaybackDevice::open(subsystem, device, reader.format())?.with_wait_timeout(wait_timeout);
    let played = player.play(reader);
    finish(played, player.close())
}

/// Record from an input device into a WAV writer until `limits` or `stop`
/// end the recording, then finalize the file.
pub fn record_wav<S, W>(
    subsystem: &S,
    device: DeviceId,
    writer: WavChunkWriter<W>,
    limits: RecordLimits,
    seconds_per_chunk: f64,
    wait_timeout: Duration,
    stop: Option<Arc<AtomicBool>>,
) -> Result<WavRecording, StreamError>
where
    S: WaveSubsystem,
    W: Write + Seek,
{
    if seconds_per_chunk.is_nan() || seconds_per_chunk <= 0.0 {
        return Err(StreamError::InvalidChunkSize);
    }
    let chunk = Duration::try_from_secs_f64(seconds_per_chunk).map_err(|_| StreamError::InvalidChunkSize)?;
    let format = writer.format();

    let mut monitor = RecordMonitor::new(writer, format, limits)?;
    if let Some(stop) = stop {
        monitor = monitor.with_stop_flag(stop);
    }

    let mut recorder = RecordingDevice::open(subsystem, device, format)?.with_wait_timeout(wait_timeout);
    let frames = recorder.frames_per_chunk(chunk);
    let recorded = recorder.record(frames, |chunk: &[u8]| monitor.consume(chunk));
    let summary = finish(recorded, recorder.close())?;

    let seconds = monitor.seconds_recorded();
    monitor.into_sink().finalize()?;

    info!("Saved {:.2}s of {}", seconds, format.format_description());
    Ok(WavRecording { summary, seconds })
}

// The stream error stays primary; a close failure after it is attached as cleanup
fn finish<T>(result: Result<T, StreamError>, closed: Result<(), StreamError>) -> Result<T, StreamError> {
    match (result, closed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(close_err)) => Err(close_err),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(close_err)) => {
            let Some(failure) = close_err.device_error().cloned() else {
                warn!("Device close also failed: {}", close_err);
                return Err(err);
            };
            let err = close_err
                .cleanup_failures()
                .iter()
                .cloned()
                .fold(err.with_cleanup_failure(failure), StreamError::with_cleanup_failure);
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeviceError;
    use std::io::Cursor;

    fn write_wav(format: WaveFormat, pcm: &[u8]) -> Cursor<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavChunkWriter::new(&mut cursor, format).unwrap();
            writer.write_pcm(pcm).unwrap();
            writer.finalize().unwrap();
        }
        cursor.set_position(0);
        cursor
    }

    fn read_all<R: Read>(mut reader: WavChunkReader<R>) -> Vec<Vec<u8>> {
        let mut chunks = Vec::new();
        while let Some(chunk) = reader.next_chunk().unwrap() {
            chunks.push(chunk);
        }
        chunks
    }

    #[test]
    fn test_reader_chunks_whole_frames() {
        let format = WaveFormat::new(2, 8000, 2).unwrap();
        let pcm: Vec<u8> = (0..40u8).collect();
        let cursor = write_wav(format, &pcm);

        let reader = WavChunkReader::new(cursor)
            .unwrap()
            .with_chunk_duration(Duration::from_micros(500));
        assert_eq!(reader.format(), format);
        assert_eq!(reader.frames_per_chunk(), 4);

        let chunks = read_all(reader);
        let lengths: Vec<usize> = chunks.iter().map(Vec::len).collect();
        assert_eq!(lengths, vec![16, 16, 8]);
        assert_eq!(chunks.concat(), pcm);
    }

    #[test]
    fn test_eight_bit_stays_unsigned() {
        let format = WaveFormat::new(1, 11025, 1).unwrap();
        let pcm = vec![0u8, 1, 127, 128, 129, 255];
        let cursor = write_wav(format, &pcm);

        let reader = WavChunkReader::new(cursor).unwrap();
        assert_eq!(read_all(reader).concat(), pcm);
    }

    #[test]
    fn test_twenty_four_bit_keeps_sign() {
        let format = WaveFormat::new(1, 48000, 3).unwrap();
        // -2 and 0x123456
        let pcm = vec![0xFE, 0xFF, 0xFF, 0x56, 0x34, 0x12];
        let cursor = write_wav(format, &pcm);

        let mut raw = WavReader::new(cursor.clone()).unwrap();
        let samples: Vec<i32> = raw.samples::<i32>().map(Result::unwrap).collect();
        assert_eq!(samples, vec![-2, 0x123456]);

        let reader = WavChunkReader::new(cursor).unwrap();
        assert_eq!(read_all(reader).concat(), pcm);
    }

    #[test]
    fn test_duration() {
        let format = WaveFormat::new(1, 1000, 2).unwrap();
        let cursor = write_wav(format, &[0u8; 500]);
        let reader = WavChunkReader::new(cursor).unwrap();
        assert_eq!(reader.duration(), Duration::from_millis(250));
    }

    #[test]
    fn test_float_files_rejected() {
        let mut cursor = Cursor::new(Vec::new());
        {
            let spec = WavSpec {
                channels: 1,
                sample_rate: 44100,
                bits_per_sample: 32,
                sample_format: SampleFormat::Float,
            };
            let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
            writer.write_sample(0.5f32).unwrap();
            writer.finalize().unwrap();
        }
        cursor.set_position(0);

        assert!(matches!(
            WavChunkReader::new(cursor),
            Err(StreamError::Wav(hound::Error::Unsupported))
        ));
    }

    #[test]
    fn test_garbage_is_a_wav_error() {
        let result = WavChunkReader::new(Cursor::new(b"not a wav file".to_vec()));
        assert!(matches!(result, Err(StreamError::Wav(_))));
    }

    #[test]
    fn test_writer_rejects_wide_samples() {
        let format = WaveFormat::new(1, 8000, 8).unwrap();
        let result = WavChunkWriter::new(Cursor::new(Vec::new()), format);
        assert!(matches!(result, Err(StreamError::UnsupportedSampleWidth { bits: 64 })));
    }

    #[test]
    fn test_finish_prefers_stream_error() {
        let closed: Result<(), StreamError> = Err(StreamError::InvalidChunkSize);
        let result: Result<(), StreamError> = finish(Err(StreamError::UnsupportedSampleWidth { bits: 12 }), closed);
        assert!(matches!(result, Err(StreamError::UnsupportedSampleWidth { .. })));

        let result = finish(Ok(3), Err(StreamError::InvalidChunkSize));
        assert!(matches!(result, Err(StreamError::InvalidChunkSize)));
    }

    fn device_error(cause: &str, code: u32, name: &str) -> DeviceError {
        DeviceError {
            cause: cause.to_string(),
            code,
            name: name.to_string(),
            known: true,
        }
    }

    #[test]
    fn test_finish_keeps_close_failure() {
        let stream_err = StreamError::from(device_error("submit buffer", 5, "INVALID_HANDLE"));
        let close_err = StreamError::from(device_error("reset audio device", 1, "GENERAL_ERROR"))
            .with_cleanup_failure(device_error("close audio device", 12, "HANDLE_BUSY"));

        let result: Result<(), StreamError> = finish(Err(stream_err), Err(close_err));
        let err = result.unwrap_err();
        assert_eq!(err.device_error().map(|e| e.name.as_str()), Some("INVALID_HANDLE"));

        let cleanup: Vec<&str> = err.cleanup_failures().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(cleanup, vec!["GENERAL_ERROR", "HANDLE_BUSY"]);
    }
}
