// Integration tests for calibration runs
//
// Calibration uses its own connection, collects readings above the noise
// floor for a fixed window, and suggests thresholds.

mod common;

use common::{voice_channel, MockGateway, RecordingNotifier, RecordingProgress};
use std::sync::Arc;
use std::time::Duration;
use volume_monitor::voice::{ConnectionState, SessionKey};
use volume_monitor::{
    CalibrationOutcome, MonitorConfig, MonitorError, MonitorOptions, VolumeSessionManager,
};

fn setup() -> (VolumeSessionManager, Arc<MockGateway>) {
    let gateway = Arc::new(MockGateway::ready());
    let manager = VolumeSessionManager::new(
        MonitorConfig::default(),
        gateway.clone(),
        Arc::new(RecordingNotifier::default()),
    );
    (manager, gateway)
}

fn key() -> SessionKey {
    SessionKey::new(1u64, 9u64)
}

/// Start a calibration in the background and wait for its join
async fn spawn_calibration(
    manager: &VolumeSessionManager,
    duration_secs: u64,
    progress: Arc<RecordingProgress>,
) -> tokio::task::JoinHandle<Result<CalibrationOutcome, MonitorError>> {
    let manager = manager.clone();
    let handle = tokio::spawn(async move {
        manager
            .calibrate(key(), Some(voice_channel()), Some(duration_secs), progress)
            .await
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    handle
}

#[tokio::test(start_paused = true)]
async fn test_calibration_summary_from_known_readings() {
    let (manager, gateway) = setup();
    let progress = Arc::new(RecordingProgress::default());

    let run = spawn_calibration(&manager, 10, progress.clone()).await;
    let handle = gateway.last();

    handle.events.send(common::speaking(9)).await.unwrap();
    for percent in [10.0, 20.0, 30.0, 40.0, 50.0] {
        handle.events.send(common::audio(9, percent)).await.unwrap();
    }

    let outcome = run.await.unwrap().unwrap();
    let CalibrationOutcome::Summary(summary) = outcome else {
        panic!("expected a summary, got {:?}", outcome);
    };

    assert_eq!(summary.readings, 5);
    assert!((summary.average - 30.0).abs() < 0.1);
    assert!((summary.peak - 50.0).abs() < 0.1);
    assert!((summary.min - 10.0).abs() < 0.1);
    assert_eq!(summary.sensitive, 33);
    assert_eq!(summary.normal, 39);
    assert_eq!(summary.relaxed, 45);
    assert_eq!(summary.duration_secs, 10);

    assert!(handle.is_destroyed(), "calibration connection should be released");
    assert!(progress.count() >= 4, "expected a readout every 2s");

    let last = progress.reports.lock().unwrap().last().cloned().unwrap();
    assert_eq!(last.readings, 5);
    assert!(last.peak.unwrap() > 49.0);
}

#[tokio::test(start_paused = true)]
async fn test_calibration_below_noise_floor_reports_no_audio() {
    let (manager, gateway) = setup();

    let run = spawn_calibration(&manager, 10, Arc::new(RecordingProgress::default())).await;
    let handle = gateway.last();

    handle.events.send(common::speaking(9)).await.unwrap();
    for _ in 0..20 {
        handle.events.send(common::audio(9, 2.0)).await.unwrap();
    }

    let outcome = run.await.unwrap().unwrap();
    assert_eq!(
        outcome,
        CalibrationOutcome::NoAudioDetected { duration_secs: 10 }
    );
}

#[tokio::test(start_paused = true)]
async fn test_calibration_ignores_other_speakers() {
    let (manager, gateway) = setup();

    let run = spawn_calibration(&manager, 5, Arc::new(RecordingProgress::default())).await;
    let handle = gateway.last();

    handle.speak(4, 60.0).await;

    let outcome = run.await.unwrap().unwrap();
    assert!(matches!(outcome, CalibrationOutcome::NoAudioDetected { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_progress_failures_are_swallowed() {
    let (manager, gateway) = setup();
    let progress = Arc::new(RecordingProgress::failing());

    let run = spawn_calibration(&manager, 6, progress.clone()).await;
    gateway.last().speak(9, 40.0).await;

    let outcome = run.await.unwrap().unwrap();
    assert!(matches!(outcome, CalibrationOutcome::Summary(_)));
    assert!(progress.count() >= 2);
}

#[tokio::test(start_paused = true)]
async fn test_calibration_duration_is_clamped() {
    let (manager, _) = setup();

    let run = spawn_calibration(&manager, 1, Arc::new(RecordingProgress::default())).await;
    let outcome = run.await.unwrap().unwrap();

    assert_eq!(outcome, CalibrationOutcome::NoAudioDetected { duration_secs: 5 });
}

#[tokio::test(start_paused = true)]
async fn test_calibration_ends_early_on_permanent_disconnect() {
    let (manager, gateway) = setup();

    let started = tokio::time::Instant::now();
    let run = spawn_calibration(&manager, 60, Arc::new(RecordingProgress::default())).await;
    let handle = gateway.last();

    handle.speak(9, 30.0).await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    handle.set_state(ConnectionState::Disconnected);

    let outcome = run.await.unwrap().unwrap();
    assert!(matches!(outcome, CalibrationOutcome::Summary(ref s) if s.readings == 1));
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn test_calibration_window_holds_during_reconnect() {
    let (manager, gateway) = setup();

    let started = tokio::time::Instant::now();
    let run = spawn_calibration(&manager, 5, Arc::new(RecordingProgress::default())).await;
    let handle = gateway.last();

    handle.speak(9, 30.0).await;
    tokio::time::sleep(Duration::from_secs(4)).await;
    handle.set_state(ConnectionState::Disconnected);

    // Frames still count while the connection is waiting to recover
    tokio::time::sleep(Duration::from_millis(500)).await;
    handle.speak(9, 40.0).await;

    let outcome = run.await.unwrap().unwrap();
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_secs(5));
    assert!(elapsed < Duration::from_millis(5100), "window overran: {:?}", elapsed);
    assert!(matches!(outcome, CalibrationOutcome::Summary(ref s) if s.readings == 2));
    assert!(handle.is_destroyed());
}

#[tokio::test(start_paused = true)]
async fn test_calibration_does_not_touch_active_sessions() {
    let (manager, gateway) = setup();

    manager
        .start(key(), Some(voice_channel()), MonitorOptions::default())
        .await
        .unwrap();

    let run = spawn_calibration(&manager, 5, Arc::new(RecordingProgress::default())).await;
    assert_eq!(gateway.joins(), 2);

    run.await.unwrap().unwrap();

    let status = manager.status(key()).await.unwrap();
    assert_eq!(status.warning_count, 0);
    assert!(!gateway.handles()[0].is_destroyed());
    assert!(gateway.handles()[1].is_destroyed());
}

#[tokio::test]
async fn test_calibration_preconditions() {
    let (manager, gateway) = setup();
    let progress = Arc::new(RecordingProgress::default());

    let result = manager.calibrate(key(), None, Some(10), progress.clone()).await;
    assert!(matches!(result, Err(MonitorError::MissingVoicePresence)));

    let mut channel = voice_channel();
    channel.can_speak = false;
    let result = manager.calibrate(key(), Some(channel), Some(10), progress).await;
    assert!(matches!(result, Err(MonitorError::InsufficientPermission(_))));

    assert_eq!(gateway.joins(), 0);
}
