use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use super::fake::{FakeSubsystem, Op};
use crate::audio::monitor::RecordLimits;
use crate::audio::wav::{play_wav, record_wav, WavChunkReader, WavChunkWriter};
use crate::audio::{DeviceId, ResultCode, WaveFormat};
use crate::error::StreamError;

const WAIT: Duration = Duration::from_millis(50);

#[test]
fn test_play_wav_plays_whole_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tone.wav");
    let format = WaveFormat::new(1, 1000, 2).unwrap();

    let pcm: Vec<u8> = (0..200u8).collect();
    let mut writer = WavChunkWriter::create(&path, format).unwrap();
    writer.write_pcm(&pcm).unwrap();
    writer.finalize().unwrap();

    let subsystem = FakeSubsystem::new();
    let reader = WavChunkReader::open(&path).unwrap();
    let summary = play_wav(&subsystem, DeviceId::Default, reader, Duration::from_millis(25), WAIT).unwrap();

    // 100 frames in chunks of 25
    assert_eq!(summary.chunks, 4);
    assert_eq!(summary.bytes, 200);
    assert_eq!(subsystem.played(), pcm);
    assert_eq!(subsystem.count(Op::Close), 1);
}

#[test]
fn test_record_wav_writes_kept_audio() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("take.wav");
    let format = WaveFormat::new(1, 100, 1).unwrap();

    let subsystem = FakeSubsystem::new().with_fill_byte(200);
    let writer = WavChunkWriter::create(&path, format).unwrap();
    let limits = RecordLimits::new(Some(0.3), 1.0, 0.005, true);

    let recording = record_wav(&subsystem, DeviceId::Default, writer, limits, 0.1, WAIT, None).unwrap();
    assert_eq!(recording.summary.chunks, 3);
    assert!((recording.seconds - 0.3).abs() < 1e-9);

    let reader = WavChunkReader::open(&path).unwrap();
    assert_eq!(reader.format(), format);
    assert!((reader.duration().as_secs_f64() - 0.3).abs() < 1e-6);
}

#[test]
fn test_record_wav_honours_stop_flag() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("stopped.wav");
    let format = WaveFormat::new(1, 100, 1).unwrap();

    let subsystem = FakeSubsystem::new().with_fill_byte(0);
    let writer = WavChunkWriter::create(&path, format).unwrap();
    let limits = RecordLimits::new(None, 0.0, 0.005, false);
    let stop = Arc::new(AtomicBool::new(true));

    let recording = record_wav(&subsystem, DeviceId::Default, writer, limits, 0.1, WAIT, Some(stop)).unwrap();
    assert_eq!(recording.summary.chunks, 1);

    let reader = WavChunkReader::open(&path).unwrap();
    assert!((reader.duration().as_secs_f64() - 0.1).abs() < 1e-6);
}

#[test]
fn test_record_wav_rejects_bad_chunk_length() {
    let dir = TempDir::new().unwrap();
    let format = WaveFormat::new(1, 100, 1).unwrap();

    for seconds in [-1.0, 0.0, f64::NAN] {
        let writer = WavChunkWriter::create(dir.path().join("bad.wav"), format).unwrap();
        let subsystem = FakeSubsystem::new();
        let result = record_wav(&subsystem, DeviceId::Default, writer, RecordLimits::default(), seconds, WAIT, None);
        assert!(
            matches!(result, Err(StreamError::InvalidChunkSize)),
            "{} seconds per chunk was accepted",
            seconds
        );
        assert!(subsystem.calls().is_empty());
    }
}

#[test]
fn test_play_wav_reports_close_failure_after_stream_failure() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tone.wav");
    let format = WaveFormat::new(1, 1000, 2).unwrap();

    let mut writer = WavChunkWriter::create(&path, format).unwrap();
    writer.write_pcm(&[0u8; 100]).unwrap();
    writer.finalize().unwrap();

    let subsystem = FakeSubsystem::new()
        .fail_on(Op::Submit, 1, ResultCode::INVALID_HANDLE)
        .fail_on(Op::Close, 1, ResultCode::HANDLE_BUSY);
    let reader = WavChunkReader::open(&path).unwrap();
    let err = play_wav(&subsystem, DeviceId::Default, reader, Duration::from_millis(25), WAIT).unwrap_err();

    assert_eq!(err.device_error().map(|e| e.code), Some(5));
    let cleanup: Vec<u32> = err.cleanup_failures().iter().map(|e| e.code).collect();
    assert!(cleanup.contains(&12), "close failure missing from {:?}", cleanup);
}
