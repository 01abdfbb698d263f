//! End-to-end tests driving a session against the fake device.

use crate::fake::{init_tracing, FakeOutput};
use playout_core::{AudioFormat, FrameRate, PixelFormat, PlayoutError, VideoFormat};
use playout_output::{
    AudioStreamKind, CompletionResult, PlayoutSession, ReconfigState, SessionConfig,
    SubmissionMode,
};
use std::sync::Arc;

fn format_1080p25() -> VideoFormat {
    VideoFormat {
        width: 1920,
        height: 1080,
        rate: FrameRate::FPS_25,
        interlaced: false,
        pixel_format: PixelFormat::Uyvy,
        stereo: false,
    }
}

fn format_720p50() -> VideoFormat {
    VideoFormat {
        width: 1280,
        height: 720,
        rate: FrameRate::FPS_50,
        interlaced: false,
        pixel_format: PixelFormat::Uyvy,
        stereo: false,
    }
}

fn scheduled_session(device: Arc<FakeOutput>) -> PlayoutSession {
    PlayoutSession::new(device, SessionConfig::default())
}

/// Submit one frame carrying `timestamp` and pump one completion so the
/// scheduling loop picks it up.
fn submit_timestamped(session: &PlayoutSession, device: &FakeOutput, timestamp: i64) {
    let mut handle = session.acquire_frame().unwrap();
    handle.frame_mut().timestamp = Some(timestamp);
    assert!(session.submit_frame(handle).unwrap());
    assert!(device.complete_next(CompletionResult::Completed));
}

#[test]
fn scheduled_pipeline_reaches_steady_state() {
    init_tracing();
    let device = Arc::new(FakeOutput::new());
    let session = scheduled_session(device.clone());
    session.reconfigure_video(format_1080p25()).unwrap();

    // preroll fills the minimum window and playback is running
    assert!(device.is_playing());
    assert_eq!(device.scheduled_slots(), vec![0, 1, 2, 3]);

    // two producer frames queue up, a completion drains them both
    for _ in 0..2 {
        let handle = session.acquire_frame().unwrap();
        assert!(session.submit_frame(handle).unwrap());
    }
    assert!(device.complete_next(CompletionResult::Completed));
    assert_eq!(device.scheduled_slots(), vec![1, 2, 3, 4, 5]);

    // queue empty at the minimum window: a completion schedules nothing
    assert!(device.complete_next(CompletionResult::Completed));
    assert_eq!(device.scheduled_slots(), vec![2, 3, 4, 5]);
}

#[test]
fn audio_follows_video_epoch() {
    init_tracing();
    let device = Arc::new(FakeOutput::new());
    let session = scheduled_session(device.clone());
    session.reconfigure_video(format_1080p25()).unwrap();
    session.reconfigure_audio(AudioFormat::default()).unwrap();
    device.set_audio_buffered(4800);

    // first timestamped frame lands at sequence 4 (after the preroll),
    // so the epoch is 90000 - 4 * 3600 = 75600
    submit_timestamped(&session, &device, 90_000);
    assert_eq!(
        device.audio_config().map(|(_, kind)| kind),
        Some(AudioStreamKind::Timestamped)
    );

    // one frame later in source time: 18000 ticks past the epoch
    let block = vec![0u8; 48 * 4];
    let accepted = session.write_audio(&block, 93_600).unwrap();
    assert_eq!(accepted, 48);
    assert_eq!(device.last_audio_block(), Some((48, 9_600)));
}

#[test]
fn audio_underflow_forces_new_epoch() {
    init_tracing();
    let device = Arc::new(FakeOutput::new());
    let session = scheduled_session(device.clone());
    session.reconfigure_video(format_1080p25()).unwrap();
    session.reconfigure_audio(AudioFormat::default()).unwrap();
    device.set_audio_buffered(4800);
    submit_timestamped(&session, &device, 90_000);

    // drained device buffer: the write still goes out on the old epoch
    // but a resynchronization is now pending
    device.set_audio_buffered(0);
    let block = vec![0u8; 48 * 4];
    assert_eq!(session.write_audio(&block, 93_600).unwrap(), 48);

    // the next timestamped frame (sequence 5) re-establishes the epoch
    // as 200000 - 5 * 3600 = 182000
    submit_timestamped(&session, &device, 200_000);
    device.set_audio_buffered(4800);
    session.write_audio(&block, 209_000).unwrap();
    assert_eq!(device.last_audio_block(), Some((48, 14_400)));
}

#[test]
fn audio_overflow_reports_partial_accept() {
    init_tracing();
    let device = Arc::new(FakeOutput::new());
    let session = scheduled_session(device.clone());
    session.reconfigure_video(format_1080p25()).unwrap();
    session.reconfigure_audio(AudioFormat::default()).unwrap();
    device.set_audio_buffered(4800);
    submit_timestamped(&session, &device, 90_000);

    device.set_audio_capacity(10);
    let block = vec![0u8; 48 * 4];
    assert_eq!(session.write_audio(&block, 93_600).unwrap(), 10);
}

#[test]
fn audio_writes_never_overlap_reconfiguration() {
    init_tracing();
    let device = Arc::new(FakeOutput::new());
    let session = Arc::new(scheduled_session(device.clone()));
    session.reconfigure_video(format_1080p25()).unwrap();
    session.reconfigure_audio(AudioFormat::default()).unwrap();
    device.set_audio_buffered(4800);
    submit_timestamped(&session, &device, 90_000);

    // the fake rejects audio while its audio output is disabled, so any
    // write slipping into a teardown window would surface as an error
    let writer = {
        let session = Arc::clone(&session);
        std::thread::spawn(move || {
            let block = vec![0u8; 48 * 4];
            let mut errors = 0;
            for _ in 0..300 {
                if session.write_audio(&block, 93_600).is_err() {
                    errors += 1;
                }
            }
            errors
        })
    };
    for _ in 0..30 {
        session.reconfigure_video(format_1080p25()).unwrap();
    }
    assert_eq!(writer.join().unwrap(), 0);
}

#[test]
fn queue_overflow_rejects_when_device_stalls() {
    init_tracing();
    let device = Arc::new(FakeOutput::new());
    let session = scheduled_session(device.clone());
    session.reconfigure_video(format_1080p25()).unwrap();

    // no completions fire, so every submission stays queued
    for _ in 0..10 {
        let handle = session.acquire_frame().unwrap();
        assert!(session.submit_frame(handle).unwrap());
    }
    let handle = session.acquire_frame().unwrap();
    assert!(!session.submit_frame(handle).unwrap());
    // the rejected frame went straight back to the pool
    assert_eq!(session.pool().len(), 1);
}

#[test]
fn starved_timeline_repeats_last_frame() {
    init_tracing();
    let device = Arc::new(FakeOutput::new());
    let session = scheduled_session(device.clone());
    session.reconfigure_video(format_1080p25()).unwrap();

    for _ in 0..4 {
        assert!(device.complete_next(CompletionResult::Completed));
    }
    // every completion re-submitted the last frame at the next slot
    assert_eq!(device.scheduled_slots(), vec![4, 5, 6, 7]);

    let frames = device.scheduled_frames();
    let ptr = frames[0].frame().buffer().data().as_ptr();
    assert!(frames
        .iter()
        .all(|f| f.frame().buffer().data().as_ptr() == ptr));
}

#[test]
fn reconfiguration_flushes_and_restarts_timeline() {
    init_tracing();
    let device = Arc::new(FakeOutput::new());
    let session = scheduled_session(device.clone());
    session.reconfigure_video(format_1080p25()).unwrap();
    for _ in 0..2 {
        let handle = session.acquire_frame().unwrap();
        session.submit_frame(handle).unwrap();
    }
    device.complete_next(CompletionResult::Completed);
    assert_eq!(device.scheduled_slots(), vec![1, 2, 3, 4, 5]);

    session.reconfigure_video(format_720p50()).unwrap();
    assert_eq!(session.reconfig_state(), ReconfigState::Active);
    assert!(device.is_playing());
    // sequence numbering restarted from zero for the new mode
    assert_eq!(device.scheduled_slots(), vec![0, 1, 2, 3]);

    // stale 1080p buffers are discarded, acquisitions match the new mode
    let handle = session.acquire_frame().unwrap();
    assert_eq!(handle.frame().desc().width, 1280);
}

#[test]
fn failed_reconfiguration_disables_all_outputs() {
    init_tracing();
    let device = Arc::new(FakeOutput::new());
    let session = scheduled_session(device.clone());
    session.reconfigure_video(format_1080p25()).unwrap();

    let unsupported = VideoFormat {
        pixel_format: PixelFormat::R10k,
        ..format_1080p25()
    };
    let err = session.reconfigure_video(unsupported).unwrap_err();
    assert!(matches!(err, PlayoutError::UnsupportedFormat(_)));
    assert_eq!(session.reconfig_state(), ReconfigState::Failed);
    assert!(!device.video_enabled());
    assert!(!device.is_playing());
    assert!(session.acquire_frame().is_err());
}

#[test]
fn low_latency_session_displays_synchronously() {
    init_tracing();
    let device = Arc::new(FakeOutput::new());
    let config = SessionConfig {
        mode: SubmissionMode::LowLatency,
        ..Default::default()
    };
    let session = PlayoutSession::new(device.clone(), config);
    session.reconfigure_video(format_1080p25()).unwrap();

    for _ in 0..3 {
        let handle = session.acquire_frame().unwrap();
        assert!(session.submit_frame(handle).unwrap());
    }
    assert_eq!(device.synced_frames(), 3);
    // no timeline: playback never started, one buffer recycled throughout
    assert!(!device.is_playing());
    assert_eq!(session.pool().len(), 1);
}

#[test]
fn timecode_rides_scheduled_frames() {
    init_tracing();
    let device = Arc::new(FakeOutput::new());
    let config = SessionConfig {
        emit_timecode: true,
        ..Default::default()
    };
    let session = PlayoutSession::new(device.clone(), config);
    session.reconfigure_video(format_1080p25()).unwrap();
    assert_eq!(device.video_flags().map(|f| f.timecode), Some(true));

    for _ in 0..2 {
        let handle = session.acquire_frame().unwrap();
        session.submit_frame(handle).unwrap();
    }
    device.complete_next(CompletionResult::Completed);

    let frames = device.scheduled_frames();
    let stamps: Vec<_> = frames.iter().map(|f| f.frame().timecode).collect();
    // preroll frames carry no stamp, producer frames count up from zero
    assert_eq!(stamps[0], None);
    assert_eq!(stamps[3].unwrap().frames, 0);
    assert_eq!(stamps[4].unwrap().frames, 1);
}

#[test]
fn device_options_applied_during_reconfigure() {
    init_tracing();
    let device = Arc::new(FakeOutput::new());
    let session = scheduled_session(device.clone());
    session.reconfigure_video(format_1080p25()).unwrap();

    let options = device.options_applied().unwrap();
    assert!(options.idle_shows_last_frame);
    assert_eq!(options.low_latency_video, Some(true));
}

#[test]
fn dropped_session_stops_the_device() {
    init_tracing();
    let device = Arc::new(FakeOutput::new());
    let session = scheduled_session(device.clone());
    session.reconfigure_video(format_1080p25()).unwrap();
    assert!(device.is_playing());

    drop(session);
    assert!(!device.is_playing());
    assert!(!device.video_enabled());
}
