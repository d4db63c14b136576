use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use super::fake::{FakeSubsystem, Op};
use crate::audio::monitor::{measure_quiet_threshold, RecordLimits, RecordMonitor};
use crate::audio::{Consumer, DeviceId, RecordingDevice, WaveFormat};

fn format() -> WaveFormat {
    // 100 bytes per second keeps the arithmetic readable
    WaveFormat::new(1, 100, 1).unwrap()
}

#[test]
fn test_measure_quiet_threshold_of_silence() {
    let subsystem = FakeSubsystem::new().with_fill_byte(128);
    let mut device = RecordingDevice::open(&subsystem, DeviceId::Default, format()).unwrap();

    let level = measure_quiet_threshold(&mut device, 10).unwrap();
    assert_eq!(level, 0.0);
    assert_eq!(subsystem.count(Op::Submit), 2);
}

#[test]
fn test_measure_quiet_threshold_of_loud_input() {
    let subsystem = FakeSubsystem::new().with_fill_byte(0);
    let mut device = RecordingDevice::open(&subsystem, DeviceId::Default, format()).unwrap();

    let level = measure_quiet_threshold(&mut device, 10).unwrap();
    assert!((level - 0.5).abs() < 1e-12);
}

#[test]
fn test_measure_rejects_wide_samples_before_recording() {
    let subsystem = FakeSubsystem::new();
    let wide = WaveFormat::new(1, 100, 4).unwrap();
    let mut device = RecordingDevice::open(&subsystem, DeviceId::Default, wide).unwrap();

    assert!(measure_quiet_threshold(&mut device, 10).is_err());
    assert_eq!(subsystem.count(Op::Submit), 0);
}

#[test]
fn test_monitored_recording_stops_on_time_limit() {
    let subsystem = FakeSubsystem::new().with_fill_byte(0);
    let mut device = RecordingDevice::open(&subsystem, DeviceId::Default, format()).unwrap();

    let limits = RecordLimits::new(Some(0.5), 0.0, 0.005, true);
    let mut monitor = RecordMonitor::new(Vec::new(), format(), limits).unwrap();
    let summary = device.record(10, |chunk: &[u8]| monitor.consume(chunk)).unwrap();

    assert_eq!(summary.chunks, 5);
    assert_eq!(monitor.into_sink(), vec![0u8; 50]);
    device.close().unwrap();
}

#[test]
fn test_monitored_recording_stops_on_silence() {
    let subsystem = FakeSubsystem::new().with_fill_byte(128);
    let mut device = RecordingDevice::open(&subsystem, DeviceId::Default, format()).unwrap();

    let stop = Arc::new(AtomicBool::new(false));
    let limits = RecordLimits::new(None, 0.3, 0.005, false);
    let mut monitor = RecordMonitor::new(Vec::new(), format(), limits)
        .unwrap()
        .with_stop_flag(stop);
    device.record(10, |chunk: &[u8]| monitor.consume(chunk)).unwrap();

    assert_eq!(monitor.sink().len(), 30);
}
