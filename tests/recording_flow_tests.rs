//! Recording state machine tests
//!
//! These drive the controller through complete attempts against the
//! simulated capture device, with tokio's clock paused so the 1 Hz timers
//! run in virtual time.

use recital::audio::SimulatedCaptureDevice;
use recital::integration::RecitalConfig;
use recital::recording::{
    NavigationLock, PermissionGate, RecordingController, RecordingState, SessionEvent,
    SimulatedPermissions, StartOutcome, TickOutcome, COUNTDOWN_TICKS,
};
use recital::{RecitalError, Task};
use std::sync::Arc;
use std::time::Duration;

struct Fixture {
    ctrl: RecordingController,
    device: Arc<SimulatedCaptureDevice>,
}

fn fixture(task: Task, config: RecitalConfig) -> Fixture {
    let device = Arc::new(SimulatedCaptureDevice::new());
    let gate = PermissionGate::new(Arc::new(SimulatedPermissions::granted()));
    let ctrl = RecordingController::new(&task, device.clone(), gate, &config);
    Fixture { ctrl, device }
}

fn read_aloud() -> Fixture {
    fixture(
        Task::read_aloud("read-1", "Read the passage aloud"),
        RecitalConfig::default().without_waveform(),
    )
}

async fn start_recording(ctrl: &mut RecordingController) {
    assert_eq!(ctrl.start().await.unwrap(), StartOutcome::CountdownStarted);
    for _ in 0..COUNTDOWN_TICKS {
        ctrl.next_tick().await.unwrap();
    }
    assert_eq!(ctrl.state(), RecordingState::Recording);
}

/// Run `seconds` duration ticks, ignoring waveform steps
async fn record_seconds(ctrl: &mut RecordingController, seconds: u64) {
    let mut ticks = 0;
    while ticks < seconds {
        match ctrl.next_tick().await.unwrap() {
            TickOutcome::Duration { .. } => ticks += 1,
            TickOutcome::Waveform(_) => {}
            other => panic!("unexpected tick while recording: {:?}", other),
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_record_pause_resume_finish() {
    let mut f = read_aloud();
    start_recording(&mut f.ctrl).await;

    record_seconds(&mut f.ctrl, 5).await;
    assert_eq!(f.ctrl.pause().await.unwrap(), 5);
    assert_eq!(f.ctrl.state(), RecordingState::Paused);

    f.ctrl.resume().await.unwrap();
    record_seconds(&mut f.ctrl, 3).await;
    let artifact = f.ctrl.finish().await.unwrap();

    let session = f.ctrl.session();
    assert_eq!(session.state, RecordingState::Finished);
    assert_eq!(session.elapsed_seconds, 8);
    assert_eq!(session.recording_uri, Some(artifact));
    assert!(!f.device.is_open());
}

#[tokio::test(start_paused = true)]
async fn test_elapsed_excludes_paused_time() {
    let mut f = read_aloud();
    start_recording(&mut f.ctrl).await;

    let mut recorded = 0;
    for (seconds, idle) in [(2, 30), (4, 5), (1, 120)] {
        record_seconds(&mut f.ctrl, seconds).await;
        recorded += seconds;
        assert_eq!(f.ctrl.pause().await.unwrap(), recorded);

        tokio::time::advance(Duration::from_secs(idle)).await;
        assert_eq!(f.ctrl.next_tick().await.unwrap(), TickOutcome::NoTimerArmed);
        assert_eq!(f.ctrl.elapsed_seconds(), recorded);

        f.ctrl.resume().await.unwrap();
    }

    f.ctrl.finish().await.unwrap();
    assert_eq!(f.ctrl.session().elapsed_seconds, 7);
}

#[tokio::test(start_paused = true)]
async fn test_short_segments_keep_sub_second_time() {
    let mut f = read_aloud();
    start_recording(&mut f.ctrl).await;

    for _ in 0..4 {
        tokio::time::advance(Duration::from_millis(900)).await;
        f.ctrl.pause().await.unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;
        f.ctrl.resume().await.unwrap();
    }
    assert_eq!(f.ctrl.pause().await.unwrap(), 3);
    f.ctrl.resume().await.unwrap();

    // 3.6s recorded, so the next duration tick is 400ms away
    let resumed_at = tokio::time::Instant::now();
    assert_eq!(
        f.ctrl.next_tick().await.unwrap(),
        TickOutcome::Duration { elapsed_seconds: 4 }
    );
    assert_eq!(resumed_at.elapsed(), Duration::from_millis(400));

    f.ctrl.finish().await.unwrap();
    let session = f.ctrl.session();
    assert_eq!(session.state, RecordingState::Finished);
    assert_eq!(session.elapsed_seconds, 4);
    assert!(session.recording_uri.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_repeated_record_taps_start_capture_once() {
    let mut f = read_aloud();

    assert_eq!(f.ctrl.start().await.unwrap(), StartOutcome::CountdownStarted);
    assert_eq!(f.ctrl.session().countdown_remaining, Some(3));

    assert_eq!(f.ctrl.start().await.unwrap(), StartOutcome::AlreadyActive);
    assert_eq!(
        f.ctrl.next_tick().await.unwrap(),
        TickOutcome::Countdown { remaining: 2 }
    );
    assert_eq!(f.ctrl.start().await.unwrap(), StartOutcome::AlreadyActive);
    assert_eq!(
        f.ctrl.next_tick().await.unwrap(),
        TickOutcome::Countdown { remaining: 1 }
    );
    assert_eq!(f.ctrl.next_tick().await.unwrap(), TickOutcome::RecordingStarted);
    assert_eq!(f.ctrl.start().await.unwrap(), StartOutcome::AlreadyActive);

    assert_eq!(f.device.calls().start, 1);
    assert_eq!(f.ctrl.state(), RecordingState::Recording);
}

#[tokio::test(start_paused = true)]
async fn test_countdown_takes_three_seconds() {
    let mut f = read_aloud();
    let started = tokio::time::Instant::now();

    start_recording(&mut f.ctrl).await;

    let waited = started.elapsed();
    assert!(waited >= Duration::from_secs(3) && waited < Duration::from_secs(4));
    assert_eq!(f.ctrl.elapsed_seconds(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_topic_limit_auto_pauses() {
    let mut f = fixture(
        Task::speech_on_topic("topic-1", "Describe your town", 10),
        RecitalConfig::default().with_waveform_seed(42),
    );
    start_recording(&mut f.ctrl).await;

    let mut duration_ticks = 0;
    let elapsed = loop {
        match f.ctrl.next_tick().await.unwrap() {
            TickOutcome::Duration { .. } => duration_ticks += 1,
            TickOutcome::Waveform(_) => {}
            TickOutcome::AutoPaused { elapsed_seconds } => break elapsed_seconds,
            other => panic!("unexpected tick: {:?}", other),
        }
    };

    assert_eq!(duration_ticks, 9);
    assert_eq!(elapsed, 10);
    let session = f.ctrl.session();
    assert_eq!(session.state, RecordingState::Paused);
    assert_eq!(session.elapsed_seconds, 10);
    assert!(session.auto_paused);
    assert!(!f.ctrl.armed_timers().any());
    assert!(!f.device.is_capturing());
}

#[tokio::test(start_paused = true)]
async fn test_topic_limit_fires_once() {
    let mut f = fixture(
        Task::speech_on_topic("topic-1", "Describe your town", 30),
        RecitalConfig::default().without_waveform(),
    );
    let events = f.ctrl.event_receiver();
    start_recording(&mut f.ctrl).await;

    let mut auto_pauses = 0;
    for _ in 0..30 {
        if let TickOutcome::AutoPaused { .. } = f.ctrl.next_tick().await.unwrap() {
            auto_pauses += 1;
        }
    }
    assert_eq!(auto_pauses, 1);
    assert_eq!(f.ctrl.state(), RecordingState::Paused);

    f.ctrl.resume().await.unwrap();
    assert!(!f.ctrl.session().auto_paused);
    for _ in 0..15 {
        assert!(matches!(
            f.ctrl.next_tick().await.unwrap(),
            TickOutcome::Duration { .. }
        ));
    }
    assert_eq!(f.ctrl.elapsed_seconds(), 45);

    let auto_paused_events = events
        .try_iter()
        .filter(|e| matches!(e, SessionEvent::AutoPaused { .. }))
        .count();
    assert_eq!(auto_paused_events, 1);
}

#[tokio::test(start_paused = true)]
async fn test_read_aloud_ignores_duration_limit() {
    let mut task = Task::read_aloud("read-2", "Read the passage aloud");
    task.max_duration_seconds = Some(2);
    let mut f = fixture(task, RecitalConfig::default().without_waveform());
    start_recording(&mut f.ctrl).await;

    record_seconds(&mut f.ctrl, 5).await;
    assert_eq!(f.ctrl.state(), RecordingState::Recording);
}

#[tokio::test(start_paused = true)]
async fn test_finish_rejected_in_idle_and_countdown() {
    let mut f = read_aloud();

    let err = f.ctrl.finish().await.unwrap_err();
    assert_eq!(
        err,
        RecitalError::InvalidTransition {
            action: "finish",
            state: RecordingState::Idle,
        }
    );
    assert!(f.ctrl.state().is_idle());

    f.ctrl.start().await.unwrap();
    f.ctrl.next_tick().await.unwrap();
    let err = f.ctrl.finish().await.unwrap_err();
    assert_eq!(
        err,
        RecitalError::InvalidTransition {
            action: "finish",
            state: RecordingState::Countdown,
        }
    );
    assert_eq!(f.ctrl.state(), RecordingState::Countdown);
    assert!(f.ctrl.artifact().is_none());
    assert_eq!(f.device.calls().stop, 0);
}

#[tokio::test(start_paused = true)]
async fn test_finish_directly_from_recording() {
    let mut f = read_aloud();
    start_recording(&mut f.ctrl).await;
    record_seconds(&mut f.ctrl, 2).await;

    f.ctrl.finish().await.unwrap();

    assert!(f.ctrl.state().is_finished());
    assert_eq!(f.ctrl.elapsed_seconds(), 2);
    assert!(!f.ctrl.armed_timers().any());
    assert_eq!(f.device.calls().pause, 0);
}

#[tokio::test(start_paused = true)]
async fn test_stop_without_artifact_returns_to_idle() {
    let mut f = read_aloud();
    start_recording(&mut f.ctrl).await;
    record_seconds(&mut f.ctrl, 3).await;
    f.ctrl.pause().await.unwrap();

    f.device.produce_no_artifact();
    let err = f.ctrl.finish().await.unwrap_err();

    assert_eq!(err, RecitalError::RecordingUriMissing);
    let session = f.ctrl.session();
    assert_eq!(session.state, RecordingState::Idle);
    assert_eq!(session.recording_uri, None);
    assert_eq!(session.elapsed_seconds, 0);
    assert_eq!(session.last_error, Some(RecitalError::RecordingUriMissing));
}

#[tokio::test(start_paused = true)]
async fn test_start_failure_clears_countdown() {
    let mut f = read_aloud();
    let events = f.ctrl.event_receiver();
    f.device.fail_next_start("microphone busy");

    f.ctrl.start().await.unwrap();
    f.ctrl.next_tick().await.unwrap();
    f.ctrl.next_tick().await.unwrap();
    let err = f.ctrl.next_tick().await.unwrap_err();

    assert_eq!(
        err,
        RecitalError::RecordingStartFailed("microphone busy".to_string())
    );
    assert!(f.ctrl.state().is_idle());
    assert_eq!(f.ctrl.session().countdown_remaining, None);
    assert!(events
        .try_iter()
        .any(|e| e == SessionEvent::Failed(err.clone())));

    // A fresh attempt works
    start_recording(&mut f.ctrl).await;
    assert_eq!(f.ctrl.session().last_error, None);
}

#[tokio::test(start_paused = true)]
async fn test_permission_denied_stays_idle() {
    let device = Arc::new(SimulatedCaptureDevice::new());
    let permissions = Arc::new(SimulatedPermissions::denied());
    let mut ctrl = RecordingController::new(
        &Task::read_aloud("read-1", "Read"),
        device.clone(),
        PermissionGate::new(permissions.clone()),
        &RecitalConfig::default(),
    );

    assert_eq!(ctrl.start().await.unwrap_err(), RecitalError::PermissionDenied);
    assert!(ctrl.state().is_idle());
    assert!(!ctrl.armed_timers().any());
    assert_eq!(device.calls().prepare, 0);
    assert_eq!(permissions.prompts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_navigation_blocked_while_recording() {
    let lock = NavigationLock::new();
    let mut f = read_aloud();
    f.ctrl = f.ctrl.with_navigation_guard(Arc::new(lock.clone()));
    let abortable = f.ctrl.subscribe_abortable();

    assert!(!lock.is_blocked());
    f.ctrl.start().await.unwrap();
    assert!(lock.is_blocked());
    assert!(!*abortable.borrow());

    for _ in 0..COUNTDOWN_TICKS {
        f.ctrl.next_tick().await.unwrap();
    }
    f.ctrl.pause().await.unwrap();
    assert!(lock.is_blocked());

    f.ctrl.finish().await.unwrap();
    assert!(!lock.is_blocked());
    assert!(*abortable.borrow());
    assert!(f.ctrl.is_abortable());
}

#[tokio::test(start_paused = true)]
async fn test_timers_follow_state() {
    let mut f = fixture(
        Task::read_aloud("read-1", "Read"),
        RecitalConfig::default().with_waveform_seed(1),
    );

    assert!(!f.ctrl.armed_timers().any());

    f.ctrl.start().await.unwrap();
    let timers = f.ctrl.armed_timers();
    assert!(timers.countdown && !timers.duration && !timers.waveform);

    for _ in 0..COUNTDOWN_TICKS {
        f.ctrl.next_tick().await.unwrap();
    }
    let timers = f.ctrl.armed_timers();
    assert!(!timers.countdown && timers.duration && timers.waveform);

    f.ctrl.pause().await.unwrap();
    assert!(!f.ctrl.armed_timers().any());

    f.ctrl.resume().await.unwrap();
    assert!(f.ctrl.armed_timers().duration);

    f.ctrl.finish().await.unwrap();
    assert!(!f.ctrl.armed_timers().any());
}
