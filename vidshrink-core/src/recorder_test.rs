use std::time::Duration;

use tokio::time::Instant;

use super::*;
use crate::host::HostCapabilities;
use crate::testing::{FakeHost, FakeHostConfig, RecorderMode, sample_source};

fn recorder_only() -> HostCapabilities {
    HostCapabilities {
        video_encoder: false,
        audio_encoder: false,
        stream_recorder: true,
    }
}

// ============================================================================
// Happy path
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_record_concatenates_chunks() {
    let host = FakeHost::new(FakeHostConfig {
        capabilities: recorder_only(),
        ..Default::default()
    });
    let artifact = record(&host, &sample_source(), &CompressionPreset::default())
        .await
        .unwrap();

    assert_eq!(artifact.name, "holiday-compressed.mp4");
    assert_eq!(artifact.mime_type, "video/mp4;codecs=h264");
    assert!(artifact.bytes.starts_with(b"chunk5;chunk10;"));
    assert!(artifact.bytes.ends_with(b"tail;"));
    assert_eq!(host.live(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_record_options_and_audio_wiring() {
    let host = FakeHost::new(FakeHostConfig {
        capabilities: recorder_only(),
        ..Default::default()
    });
    record(&host, &sample_source(), &CompressionPreset::default())
        .await
        .unwrap();

    let options = host.journal.recorders.lock().unwrap().clone();
    assert_eq!(
        options,
        vec![RecorderOptions {
            mime_type: "video/mp4;codecs=h264",
            video_bitrate_bps: 2_500_000,
            audio_bitrate_bps: Some(128_000),
            fps: 30,
            width: 1280,
            height: 720,
        }]
    );
    assert_eq!(*host.journal.recorder_with_audio.lock().unwrap(), vec![true]);
    assert_eq!(*host.journal.audio_hints.lock().unwrap(), vec![Some(48_000)]);
    assert_eq!(*host.journal.keep_alive_gains.lock().unwrap(), vec![0.0001]);
    assert_eq!(*host.journal.capture_gains.lock().unwrap(), vec![1.0]);
}

#[tokio::test(start_paused = true)]
async fn test_record_falls_back_to_webm() {
    let host = FakeHost::new(FakeHostConfig {
        capabilities: recorder_only(),
        recorder_types: vec!["video/webm;codecs=vp8", "video/webm"],
        ..Default::default()
    });
    let artifact = record(&host, &sample_source(), &CompressionPreset::default())
        .await
        .unwrap();
    assert_eq!(artifact.name, "holiday-compressed.webm");
    assert_eq!(artifact.mime_type, "video/webm;codecs=vp8");
}

#[tokio::test(start_paused = true)]
async fn test_record_keeps_odd_dimensions() {
    let host = FakeHost::new(FakeHostConfig {
        capabilities: recorder_only(),
        size: (1080, 1920),
        ..Default::default()
    });
    let preset = CompressionPreset {
        fps: 0,
        ..Default::default()
    };
    record(&host, &sample_source(), &preset).await.unwrap();

    let options = host.journal.recorders.lock().unwrap()[0].clone();
    assert_eq!((options.width, options.height), (405, 720));
    assert_eq!(options.fps, 30);
}

#[tokio::test(start_paused = true)]
async fn test_record_extreme_fps_clamps_draw_rate() {
    let host = FakeHost::new(FakeHostConfig {
        capabilities: recorder_only(),
        ..Default::default()
    });
    let preset = CompressionPreset {
        fps: 2_000_000_000,
        ..Default::default()
    };
    let artifact = record(&host, &sample_source(), &preset).await.unwrap();

    assert!(!artifact.bytes.is_empty());
    assert_eq!(host.journal.recorders.lock().unwrap()[0].fps, 2_000_000_000);
    // one draw per millisecond at most over a 500ms source
    let drawn = host.journal.recorded_frames.load(std::sync::atomic::Ordering::SeqCst);
    assert!(drawn <= 1_200, "drew {} frames", drawn);
    assert_eq!(host.live(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_record_without_audio() {
    let host = FakeHost::new(FakeHostConfig {
        capabilities: recorder_only(),
        fail_audio: true,
        ..Default::default()
    });
    record(&host, &sample_source(), &CompressionPreset::default())
        .await
        .unwrap();

    let options = host.journal.recorders.lock().unwrap()[0].clone();
    assert_eq!(options.audio_bitrate_bps, None);
    assert_eq!(*host.journal.recorder_with_audio.lock().unwrap(), vec![false]);
    assert_eq!(host.live(), 0);
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_record_unavailable() {
    let host = FakeHost::new(FakeHostConfig {
        capabilities: HostCapabilities::default(),
        ..Default::default()
    });
    let err = record(&host, &sample_source(), &CompressionPreset::default())
        .await
        .unwrap_err();
    assert!(matches!(err, TranscodeError::RecorderUnavailable));
    assert_eq!(host.journal.counters.playback.opened(), 0);
}

#[tokio::test]
async fn test_record_no_supported_type() {
    let host = FakeHost::new(FakeHostConfig {
        capabilities: recorder_only(),
        recorder_types: vec![],
        ..Default::default()
    });
    let err = record(&host, &sample_source(), &CompressionPreset::default())
        .await
        .unwrap_err();
    assert!(matches!(err, TranscodeError::RecorderUnavailable));
}

#[tokio::test(start_paused = true)]
async fn test_record_silent_recorder_is_empty_output() {
    let host = FakeHost::new(FakeHostConfig {
        capabilities: recorder_only(),
        recorder_mode: RecorderMode::Silent,
        ..Default::default()
    });
    let started = Instant::now();
    let err = record(&host, &sample_source(), &CompressionPreset::default())
        .await
        .unwrap_err();
    assert!(matches!(err, TranscodeError::EmptyOutput));
    // the first-chunk wait ran to its bound
    assert!(started.elapsed() >= Duration::from_secs(1));
    assert_eq!(host.live(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_record_error_event_fails_tier() {
    let host = FakeHost::new(FakeHostConfig {
        capabilities: recorder_only(),
        recorder_mode: RecorderMode::Error,
        ..Default::default()
    });
    let err = record(&host, &sample_source(), &CompressionPreset::default())
        .await
        .unwrap_err();
    assert!(matches!(err, TranscodeError::Host { context: "stream recorder error", .. }));
    assert_eq!(host.live(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_record_stall_aborts() {
    let host = FakeHost::new(FakeHostConfig {
        capabilities: recorder_only(),
        duration: Duration::from_secs(60),
        stall_at: Some(Duration::from_millis(200)),
        ..Default::default()
    });
    let err = record(&host, &sample_source(), &CompressionPreset::default())
        .await
        .unwrap_err();
    assert!(matches!(err, TranscodeError::PlaybackStalled { .. }));
    assert_eq!(host.live(), 0);
}

#[tokio::test]
async fn test_record_source_load_failure() {
    let host = FakeHost::new(FakeHostConfig {
        capabilities: recorder_only(),
        fail_open_source: true,
        ..Default::default()
    });
    let err = record(&host, &sample_source(), &CompressionPreset::default())
        .await
        .unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(host.live(), 0);
}
