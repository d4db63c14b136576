use std::collections::VecDeque;
use std::time::Duration;

use super::fake::{Call, FakeSubsystem, Op};
use crate::audio::{DeviceId, PlaybackDevice, ResultCode, WaveFormat};
use crate::error::{CallbackError, StreamError};

fn mono_8bit() -> WaveFormat {
    WaveFormat::new(1, 8000, 1).unwrap()
}

/// Producer that hands out the given chunks, then signals end of stream
fn chunks(data: Vec<Vec<u8>>) -> impl FnMut() -> Result<Option<Vec<u8>>, CallbackError> {
    let mut remaining: VecDeque<Vec<u8>> = data.into();
    move || Ok(remaining.pop_front())
}

#[derive(Debug)]
struct SourceFailed;

impl std::fmt::Display for SourceFailed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "source failed")
    }
}

impl std::error::Error for SourceFailed {}

/// Producer that yields `good` chunks and then fails
fn failing_after(good: usize) -> impl FnMut() -> Result<Option<Vec<u8>>, CallbackError> {
    let mut produced = 0;
    move || {
        if produced == good {
            return Err(Box::new(SourceFailed));
        }
        produced += 1;
        Ok(Some(vec![produced as u8; 4]))
    }
}

#[test]
fn test_empty_producer_makes_no_device_calls() {
    let subsystem = FakeSubsystem::new();
    let mut device = PlaybackDevice::open(&subsystem, DeviceId::Default, mono_8bit()).unwrap();

    let summary = device.play(chunks(Vec::new())).unwrap();
    assert_eq!(summary.chunks, 0);
    assert_eq!(summary.bytes, 0);
    assert_eq!(subsystem.calls(), vec![Call::Open]);

    // An empty first chunk also counts as end of stream
    let summary = device.play(chunks(vec![Vec::new()])).unwrap();
    assert_eq!(summary.chunks, 0);
    assert_eq!(subsystem.calls(), vec![Call::Open]);

    device.close().unwrap();
}

#[test]
fn test_plays_every_chunk_in_order() {
    let subsystem = FakeSubsystem::new();
    let mut device = PlaybackDevice::open(&subsystem, DeviceId::Default, mono_8bit()).unwrap();

    let data = vec![vec![1u8; 4], vec![2u8; 4], vec![3u8; 6]];
    let summary = device.play(chunks(data.clone())).unwrap();

    assert_eq!(summary.chunks, 3);
    assert_eq!(summary.bytes, 14);
    assert_eq!(subsystem.played(), data.concat());

    let submitted = subsystem.slot_ids(Op::Submit);
    assert_eq!(submitted.len(), 3);
    assert_eq!(subsystem.slot_ids(Op::Prepare), submitted);
    assert_eq!(subsystem.slot_ids(Op::Unprepare), submitted);

    // Playback never starts or stops the device explicitly
    assert_eq!(subsystem.count(Op::Start), 0);
    assert_eq!(subsystem.count(Op::Stop), 0);
    assert_eq!(subsystem.count(Op::Reset), 0);

    device.close().unwrap();
}

#[test]
fn test_next_chunk_is_queued_before_waiting() {
    let subsystem = FakeSubsystem::new().with_latency(Duration::from_millis(5));
    let mut device = PlaybackDevice::open(&subsystem, DeviceId::Default, mono_8bit()).unwrap();

    device
        .play(chunks(vec![vec![1u8; 4], vec![2u8; 4]]))
        .unwrap();

    let calls = subsystem.calls();
    let submitted = subsystem.slot_ids(Op::Submit);
    let second_submit = calls.iter().position(|c| *c == Call::Submit(submitted[1])).unwrap();
    let first_unprepare = calls
        .iter()
        .position(|c| *c == Call::Unprepare(submitted[0]))
        .unwrap();
    assert!(second_submit < first_unprepare);

    device.close().unwrap();
}

#[test]
fn test_first_producer_error_touches_nothing() {
    let subsystem = FakeSubsystem::new();
    let mut device = PlaybackDevice::open(&subsystem, DeviceId::Default, mono_8bit()).unwrap();

    let err = device.play(failing_after(0)).unwrap_err();
    assert!(matches!(err, StreamError::Callback { .. }));
    assert_eq!(subsystem.calls(), vec![Call::Open]);
}

#[test]
fn test_producer_error_resets_and_unprepares() {
    let subsystem = FakeSubsystem::new();
    let mut device = PlaybackDevice::open(&subsystem, DeviceId::Default, mono_8bit()).unwrap();

    let err = device.play(failing_after(2)).unwrap_err();
    match &err {
        StreamError::Callback { source, cleanup } => {
            assert!(source.downcast_ref::<SourceFailed>().is_some());
            assert!(cleanup.is_empty());
        }
        other => panic!("Expected Callback error, got {:?}", other),
    }

    assert_eq!(subsystem.count(Op::Reset), 1);
    assert_eq!(subsystem.count(Op::Prepare), 2);
    assert_eq!(subsystem.count(Op::Unprepare), 2);

    let mut prepared = subsystem.slot_ids(Op::Prepare);
    let mut unprepared = subsystem.slot_ids(Op::Unprepare);
    prepared.sort_unstable();
    unprepared.sort_unstable();
    assert_eq!(prepared, unprepared);
}

#[test]
fn test_cleanup_failures_are_attached() {
    let subsystem = FakeSubsystem::new()
        .fail_on(Op::Reset, 1, ResultCode::GENERAL_ERROR)
        .fail_on(Op::Unprepare, 1, ResultCode::INVALID_HANDLE);
    let mut device = PlaybackDevice::open(&subsystem, DeviceId::Default, mono_8bit()).unwrap();

    let err = device.play(failing_after(1)).unwrap_err();
    assert!(matches!(err, StreamError::Callback { .. }));

    let cleanup = err.cleanup_failures();
    assert_eq!(cleanup.len(), 2);
    assert_eq!(cleanup[0].cause, "reset audio device");
    assert_eq!(cleanup[0].name, "GENERAL_ERROR");
    assert_eq!(cleanup[1].cause, "unprepare buffer");
    assert_eq!(cleanup[1].name, "INVALID_HANDLE");
}

#[test]
fn test_submit_failure_unprepares_the_slot() {
    let subsystem = FakeSubsystem::new().fail_on(Op::Submit, 1, ResultCode::INVALID_HANDLE);
    let mut device = PlaybackDevice::open(&subsystem, DeviceId::Default, mono_8bit()).unwrap();

    let err = device.play(chunks(vec![vec![1u8; 4]])).unwrap_err();
    let device_err = err.device_error().unwrap();
    assert_eq!(device_err.cause, "submit buffer");
    assert_eq!(device_err.name, "INVALID_HANDLE");
    assert_eq!(device_err.code, 5);

    let ids = subsystem.slot_ids(Op::Prepare);
    assert_eq!(
        subsystem.calls(),
        vec![Call::Open, Call::Prepare(ids[0]), Call::Submit(ids[0]), Call::Unprepare(ids[0])]
    );
}

#[test]
fn test_slow_device_counts_wait_timeouts() {
    let subsystem = FakeSubsystem::new().with_latency(Duration::from_millis(40));
    let mut device = PlaybackDevice::open(&subsystem, DeviceId::Default, mono_8bit())
        .unwrap()
        .with_wait_timeout(Duration::from_millis(5));
    assert_eq!(device.wait_timeout(), Duration::from_millis(5));

    let summary = device.play(chunks(vec![vec![9u8; 8]])).unwrap();
    assert_eq!(summary.chunks, 1);
    assert!(summary.wait_timeouts > 0);
    assert_eq!(subsystem.played(), vec![9u8; 8]);
}

#[test]
fn test_close_releases_event_and_device() {
    let subsystem = FakeSubsystem::new();
    let device = PlaybackDevice::open(&subsystem, DeviceId::Index(1), mono_8bit()).unwrap();
    assert_eq!(device.device_id(), DeviceId::Index(1));
    assert_eq!(device.format().sample_rate(), 8000);

    let event = subsystem.events()[0].clone();
    assert!(!event.is_closed());

    device.close().unwrap();
    assert!(event.is_closed());
    assert_eq!(subsystem.calls(), vec![Call::Open, Call::Reset, Call::Close]);
}

#[test]
fn test_drop_closes_device() {
    let subsystem = FakeSubsystem::new();
    {
        let mut device = PlaybackDevice::open(&subsystem, DeviceId::Default, mono_8bit()).unwrap();
        device.play(chunks(vec![vec![1u8; 2]])).unwrap();
    }

    assert_eq!(subsystem.count(Op::Close), 1);
    assert!(subsystem.events()[0].is_closed());
}

#[test]
fn test_close_failure_is_reported() {
    let subsystem = FakeSubsystem::new().fail_on(Op::Close, 1, ResultCode::HANDLE_BUSY);
    let device = PlaybackDevice::open(&subsystem, DeviceId::Default, mono_8bit()).unwrap();

    let err = device.close().unwrap_err();
    let device_err = err.device_error().unwrap();
    assert_eq!(device_err.cause, "close audio device");
    assert_eq!(device_err.name, "HANDLE_BUSY");

    // The handle is not closed a second time on drop
    assert_eq!(subsystem.count(Op::Close), 1);
}

#[test]
fn test_open_failure_is_translated() {
    let subsystem = FakeSubsystem::new().fail_open(ResultCode::BAD_DEVICE_ID);
    let err = match PlaybackDevice::open(&subsystem, DeviceId::Index(7), mono_8bit()) {
        Err(err) => err,
        Ok(_) => panic!("open should fail"),
    };

    match err {
        StreamError::DeviceOpen(device_err) => {
            assert_eq!(device_err.cause, "open audio device");
            assert_eq!(device_err.name, "BAD_DEVICE_ID");
            assert_eq!(device_err.code, 2);
            assert!(device_err.known);
        }
        other => panic!("Expected DeviceOpen, got {:?}", other),
    }
}

#[test]
fn test_unknown_open_failure_uses_device_text() {
    let subsystem = FakeSubsystem::new()
        .fail_open(ResultCode(77))
        .with_error_text("Device is on fire");
    let err = PlaybackDevice::open(&subsystem, DeviceId::Default, mono_8bit())
        .err()
        .unwrap();
    let device_err = err.device_error().unwrap();
    assert_eq!(device_err.name, "Device is on fire");
    assert_eq!(device_err.code, 77);
    assert!(!device_err.known);

    let subsystem = FakeSubsystem::new().fail_open(ResultCode(77));
    let err = PlaybackDevice::open(&subsystem, DeviceId::Default, mono_8bit())
        .err()
        .unwrap();
    assert_eq!(err.device_error().unwrap().name, "UNKNOWN_ERROR");
}
