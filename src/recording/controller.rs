//! Recording state machine
//!
//! The controller is the single writer of the recording session. It owns the
//! duration tracker, the waveform simulator and the capture session, and it
//! arms exactly the timers the current phase needs:
//!
//! ```text
//! Idle -> Countdown (3, 2, 1) -> Recording <-> Paused -> Finished -> Idle
//! ```
//!
//! Any hard failure releases the capture device and returns to `Idle`.
//! Timers are driven by the caller through [`RecordingController::next_tick`],
//! which keeps the controller single-threaded and cooperative.

use crate::audio::device::{ArtifactHandle, AudioCaptureDevice, CaptureHandle};
use crate::audio::playback::PlaybackController;
use crate::audio::waveform::{WaveformFrame, WaveformSimulator};
use crate::exercise::Task;
use crate::integration::config::RecitalConfig;
use crate::recording::navigation::{NavigationGuard, NavigationState};
use crate::recording::permission::PermissionGate;
use crate::recording::state::{
    emit, RecordingSession, RecordingState, SessionEvent, SharedSession,
};
use crate::recording::tracker::DurationTracker;
use crate::{RecitalError, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Countdown ticks before capture starts
pub const COUNTDOWN_TICKS: u8 = 3;

const EVENT_CAPACITY: usize = 100;

/// Result of a record request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    CountdownStarted,
    /// A countdown or recording is already running; nothing changed
    AlreadyActive,
}

/// What a timer wakeup did
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Countdown { remaining: u8 },
    RecordingStarted,
    Duration { elapsed_seconds: u64 },
    AutoPaused { elapsed_seconds: u64 },
    Waveform(WaveformFrame),
    /// The current state has no scheduled work
    NoTimerArmed,
}

/// Timers armed right now
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArmedTimers {
    pub countdown: bool,
    pub duration: bool,
    pub waveform: bool,
}

impl ArmedTimers {
    pub fn any(&self) -> bool {
        self.countdown || self.duration || self.waveform
    }
}

enum Phase {
    Idle,
    Countdown {
        remaining: u8,
        ticker: Interval,
    },
    Recording {
        capture: CaptureHandle,
        duration_ticker: Interval,
        waveform_ticker: Option<Interval>,
    },
    Paused {
        capture: CaptureHandle,
    },
    Finished {
        artifact: ArtifactHandle,
    },
    /// A side-effecting transition is awaiting a collaborator
    Transitioning {
        from: RecordingState,
    },
}

impl Phase {
    fn state(&self) -> RecordingState {
        match self {
            Phase::Idle => RecordingState::Idle,
            Phase::Countdown { .. } => RecordingState::Countdown,
            Phase::Recording { .. } => RecordingState::Recording,
            Phase::Paused { .. } => RecordingState::Paused,
            Phase::Finished { .. } => RecordingState::Finished,
            Phase::Transitioning { from } => *from,
        }
    }

    /// A capture session may be open with the device
    fn may_hold_capture(&self) -> bool {
        match self {
            Phase::Recording { .. } | Phase::Paused { .. } => true,
            Phase::Transitioning { from } => !from.is_idle() && !from.is_finished(),
            _ => false,
        }
    }
}

fn arm_timer(period: Duration) -> Interval {
    arm_timer_after(period, period)
}

fn arm_timer_after(first: Duration, period: Duration) -> Interval {
    let mut interval = interval_at(Instant::now() + first, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Recording state machine for one task
pub struct RecordingController {
    task_id: String,
    capture: Arc<dyn AudioCaptureDevice>,
    permissions: PermissionGate,
    phase: Phase,
    tracker: DurationTracker,
    waveform: Option<WaveformSimulator>,
    tick_interval: Duration,
    waveform_interval: Duration,
    auto_paused: bool,
    last_error: Option<RecitalError>,
    published_state: RecordingState,
    shared: SharedSession,
    navigation: NavigationState,
    event_tx: Sender<SessionEvent>,
    event_rx: Receiver<SessionEvent>,
}

impl RecordingController {
    pub fn new(
        task: &Task,
        capture: Arc<dyn AudioCaptureDevice>,
        permissions: PermissionGate,
        config: &RecitalConfig,
    ) -> Self {
        let (event_tx, event_rx) = bounded(EVENT_CAPACITY);

        let limit_task = task.id.clone();
        let tracker = DurationTracker::new()
            .with_limit(task.duration_limit())
            .on_limit(move |elapsed| {
                info!("Time limit reached for task {} at {}s", limit_task, elapsed);
            });

        let waveform = config
            .waveform
            .enabled
            .then(|| WaveformSimulator::new(&config.waveform));

        Self {
            task_id: task.id.clone(),
            capture,
            permissions,
            phase: Phase::Idle,
            tracker,
            waveform,
            tick_interval: config.recording.tick_interval(),
            waveform_interval: config.waveform.interval(),
            auto_paused: false,
            last_error: None,
            published_state: RecordingState::Idle,
            shared: SharedSession::new(),
            navigation: NavigationState::new(),
            event_tx,
            event_rx,
        }
    }

    /// Report "blocked" changes to the navigation layer
    pub fn with_navigation_guard(mut self, guard: Arc<dyn NavigationGuard>) -> Self {
        self.navigation.set_guard(guard);
        self
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn state(&self) -> RecordingState {
        self.phase.state()
    }

    /// Current snapshot of the session
    pub fn session(&self) -> RecordingSession {
        self.shared.snapshot()
    }

    /// Read-only view to hand to UI readers
    pub fn shared(&self) -> SharedSession {
        self.shared.clone()
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.tracker.elapsed_seconds()
    }

    /// The finished artifact, only present in `Finished`
    pub fn artifact(&self) -> Option<&ArtifactHandle> {
        match &self.phase {
            Phase::Finished { artifact } => Some(artifact),
            _ => None,
        }
    }

    /// Last waveform frame, if the waveform is enabled
    pub fn waveform_frame(&self) -> Option<&[f32]> {
        self.waveform.as_ref().map(|w| w.frame())
    }

    pub fn armed_timers(&self) -> ArmedTimers {
        match &self.phase {
            Phase::Countdown { .. } => ArmedTimers {
                countdown: true,
                ..ArmedTimers::default()
            },
            Phase::Recording {
                waveform_ticker, ..
            } => ArmedTimers {
                countdown: false,
                duration: true,
                waveform: waveform_ticker.is_some(),
            },
            _ => ArmedTimers::default(),
        }
    }

    /// Safe to navigate away without losing work in flight
    pub fn is_abortable(&self) -> bool {
        !self.phase.state().blocks_navigation()
    }

    /// Watch the "is abortable" predicate
    pub fn subscribe_abortable(&self) -> watch::Receiver<bool> {
        self.navigation.subscribe()
    }

    pub fn event_receiver(&self) -> Receiver<SessionEvent> {
        self.event_rx.clone()
    }

    pub(crate) fn event_sender(&self) -> Sender<SessionEvent> {
        self.event_tx.clone()
    }

    /// Record button
    ///
    /// Asks for microphone permission and starts the countdown. Repeated taps
    /// while a countdown or recording is running are ignored. The controller
    /// stays `Idle` while the prompt is up, so dropping this future leaves it
    /// ready for another attempt.
    pub async fn start(&mut self) -> Result<StartOutcome> {
        match &self.phase {
            Phase::Idle => {}
            Phase::Countdown { .. } | Phase::Recording { .. } | Phase::Paused { .. } => {
                debug!("Record request ignored while {}", self.state());
                return Ok(StartOutcome::AlreadyActive);
            }
            Phase::Finished { .. } => {
                return Err(RecitalError::InvalidTransition {
                    action: "record",
                    state: RecordingState::Finished,
                });
            }
            Phase::Transitioning { .. } => return Err(RecitalError::TransitionInFlight),
        }

        self.last_error = None;
        if !self.permissions.request().await {
            let err = RecitalError::PermissionDenied;
            self.last_error = Some(err.clone());
            self.sync();
            emit(&self.event_tx, SessionEvent::Failed(err.clone()));
            return Err(err);
        }

        self.phase = Phase::Countdown {
            remaining: COUNTDOWN_TICKS,
            ticker: arm_timer(self.tick_interval),
        };
        info!("Countdown started for task {}", self.task_id);
        self.sync();
        Ok(StartOutcome::CountdownStarted)
    }

    /// Wait for the next armed timer and apply it
    ///
    /// Returns [`TickOutcome::NoTimerArmed`] immediately in states without
    /// scheduled work. Cancelling the wait is safe; cancelling it while a
    /// capture start is pending leaves the controller in flight until
    /// [`abort`](Self::abort).
    pub async fn next_tick(&mut self) -> Result<TickOutcome> {
        enum Due {
            Countdown,
            Duration,
            Waveform,
        }

        let due = match &mut self.phase {
            Phase::Countdown { ticker, .. } => {
                ticker.tick().await;
                Due::Countdown
            }
            Phase::Recording {
                duration_ticker,
                waveform_ticker: Some(waveform_ticker),
                ..
            } => {
                tokio::select! {
                    biased;
                    _ = duration_ticker.tick() => Due::Duration,
                    _ = waveform_ticker.tick() => Due::Waveform,
                }
            }
            Phase::Recording {
                duration_ticker, ..
            } => {
                duration_ticker.tick().await;
                Due::Duration
            }
            _ => return Ok(TickOutcome::NoTimerArmed),
        };

        match due {
            Due::Countdown => self.on_countdown_tick().await,
            Due::Duration => self.on_duration_tick().await,
            Due::Waveform => Ok(self.on_waveform_tick()),
        }
    }

    async fn on_countdown_tick(&mut self) -> Result<TickOutcome> {
        let remaining = match &mut self.phase {
            Phase::Countdown { remaining, .. } => {
                *remaining = remaining.saturating_sub(1);
                *remaining
            }
            _ => return Ok(TickOutcome::NoTimerArmed),
        };

        if remaining > 0 {
            emit(&self.event_tx, SessionEvent::CountdownTick { remaining });
            self.sync();
            return Ok(TickOutcome::Countdown { remaining });
        }

        self.begin_recording().await?;
        Ok(TickOutcome::RecordingStarted)
    }

    async fn begin_recording(&mut self) -> Result<()> {
        self.phase = Phase::Transitioning {
            from: RecordingState::Countdown,
        };

        if let Err(e) = self.capture.prepare().await {
            return Err(self.fail(RecitalError::RecordingStartFailed(e.to_string())));
        }
        let capture = match self.capture.start().await {
            Ok(handle) => handle,
            Err(e) => return Err(self.fail(RecitalError::RecordingStartFailed(e.to_string()))),
        };

        if let Some(waveform) = self.waveform.as_mut() {
            waveform.reset();
        }
        self.tracker.start();
        self.enter_recording(capture);
        info!("Recording started for task {}", self.task_id);
        Ok(())
    }

    fn enter_recording(&mut self, capture: CaptureHandle) {
        self.auto_paused = false;
        // Ticks land where elapsed crosses a whole interval, even after a
        // pause in the middle of one.
        let first_tick = self.tracker.until_next_boundary(self.tick_interval);
        self.phase = Phase::Recording {
            capture,
            duration_ticker: arm_timer_after(first_tick, self.tick_interval),
            waveform_ticker: self
                .waveform
                .is_some()
                .then(|| arm_timer(self.waveform_interval)),
        };
        self.sync();
    }

    async fn on_duration_tick(&mut self) -> Result<TickOutcome> {
        let tick = self.tracker.tick();
        emit(
            &self.event_tx,
            SessionEvent::DurationTick {
                elapsed_seconds: tick.elapsed_seconds,
            },
        );

        if tick.limit_reached {
            let elapsed_seconds = self.pause_recording(true).await?;
            return Ok(TickOutcome::AutoPaused { elapsed_seconds });
        }

        self.sync();
        Ok(TickOutcome::Duration {
            elapsed_seconds: tick.elapsed_seconds,
        })
    }

    fn on_waveform_tick(&mut self) -> TickOutcome {
        match self.waveform.as_mut() {
            Some(waveform) => TickOutcome::Waveform(waveform.step()),
            None => TickOutcome::NoTimerArmed,
        }
    }

    /// User pause; only valid while recording
    pub async fn pause(&mut self) -> Result<u64> {
        match self.state() {
            RecordingState::Recording => self.pause_recording(false).await,
            RecordingState::Paused if !self.in_flight() => Ok(self.tracker.elapsed_seconds()),
            _ => Err(self.reject("pause")),
        }
    }

    async fn pause_recording(&mut self, auto: bool) -> Result<u64> {
        let capture = match std::mem::replace(
            &mut self.phase,
            Phase::Transitioning {
                from: RecordingState::Recording,
            },
        ) {
            Phase::Recording { capture, .. } => capture,
            other => {
                self.phase = other;
                return Err(self.reject("pause"));
            }
        };

        // Elapsed is frozen before the device is touched.
        let elapsed_seconds = self.tracker.pause();

        if let Err(e) = self.capture.pause(&capture).await {
            return Err(self.fail(RecitalError::RecordingStopFailed(e.to_string())));
        }

        self.auto_paused = auto;
        self.phase = Phase::Paused { capture };
        if auto {
            info!(
                "Recording auto-paused at the {}s limit for task {}",
                elapsed_seconds, self.task_id
            );
            emit(&self.event_tx, SessionEvent::AutoPaused { elapsed_seconds });
        } else {
            info!("Recording paused at {}s", elapsed_seconds);
        }
        self.sync();
        Ok(elapsed_seconds)
    }

    /// Resume a paused recording
    pub async fn resume(&mut self) -> Result<()> {
        let capture = match std::mem::replace(
            &mut self.phase,
            Phase::Transitioning {
                from: RecordingState::Paused,
            },
        ) {
            Phase::Paused { capture } => capture,
            other => {
                self.phase = other;
                return Err(self.reject("resume"));
            }
        };

        if let Err(e) = self.capture.resume(&capture).await {
            return Err(self.fail(RecitalError::RecordingStartFailed(e.to_string())));
        }

        self.tracker.start();
        self.enter_recording(capture);
        info!("Recording resumed at {}s", self.tracker.elapsed_seconds());
        Ok(())
    }

    /// Close the capture session and keep the artifact for review
    pub async fn finish(&mut self) -> Result<ArtifactHandle> {
        let from = self.state();
        let capture = match std::mem::replace(&mut self.phase, Phase::Transitioning { from }) {
            Phase::Recording { capture, .. } => {
                self.tracker.pause();
                capture
            }
            Phase::Paused { capture } => capture,
            Phase::Finished { artifact } => {
                self.phase = Phase::Finished {
                    artifact: artifact.clone(),
                };
                return Ok(artifact);
            }
            other => {
                self.phase = other;
                return Err(self.reject("finish"));
            }
        };

        let artifact = match self.capture.stop(capture).await {
            Ok(Some(artifact)) => artifact,
            Ok(None) => return Err(self.fail(RecitalError::RecordingUriMissing)),
            Err(e) => return Err(self.fail(RecitalError::RecordingStopFailed(e.to_string()))),
        };

        let elapsed_seconds = self.tracker.elapsed_seconds();
        info!(
            "Recording finished for task {}: {}s at {}",
            self.task_id, elapsed_seconds, artifact
        );
        self.auto_paused = false;
        self.phase = Phase::Finished {
            artifact: artifact.clone(),
        };
        self.sync();
        emit(
            &self.event_tx,
            SessionEvent::Finished {
                artifact: artifact.clone(),
                elapsed_seconds,
            },
        );
        Ok(artifact)
    }

    /// Discard a finished recording and return to `Idle`
    ///
    /// Review playback is stopped and released first.
    pub async fn retry(&mut self, playback: &mut PlaybackController) -> Result<()> {
        match &self.phase {
            Phase::Idle => return Ok(()),
            Phase::Finished { .. } => {}
            _ => return Err(self.reject("retry")),
        }

        if let Err(e) = playback.release().await {
            warn!("Playback release failed during retry: {}", e);
        }
        info!("Discarding recording for task {}", self.task_id);
        self.reset();
        Ok(())
    }

    /// Return a submitted session to `Idle`
    pub fn mark_submitted(&mut self) -> Result<()> {
        if !matches!(self.phase, Phase::Finished { .. }) {
            return Err(self.reject("complete submission"));
        }
        self.reset();
        Ok(())
    }

    /// Forced teardown
    ///
    /// Clears every timer, releases the capture session best-effort and
    /// returns to `Idle` from any state.
    pub fn abort(&mut self) {
        if self.phase.may_hold_capture() {
            self.capture.abort();
        }
        if !self.phase.state().is_idle() {
            info!("Recording aborted while {}", self.state());
        }
        self.reset();
    }

    fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.tracker.reset();
        if let Some(waveform) = self.waveform.as_mut() {
            waveform.reset();
        }
        self.auto_paused = false;
        self.last_error = None;
        self.sync();
    }

    /// Hard failure: release resources, go to `Idle` and surface the error
    fn fail(&mut self, err: RecitalError) -> RecitalError {
        error!("Recording failed while {}: {}", self.state(), err);
        self.capture.abort();
        self.reset();
        self.last_error = Some(err.clone());
        self.sync();
        emit(&self.event_tx, SessionEvent::Failed(err.clone()));
        err
    }

    fn in_flight(&self) -> bool {
        matches!(self.phase, Phase::Transitioning { .. })
    }

    fn reject(&self, action: &'static str) -> RecitalError {
        if self.in_flight() {
            return RecitalError::TransitionInFlight;
        }
        let state = self.state();
        debug!("Rejected {} while {}", action, state);
        RecitalError::InvalidTransition { action, state }
    }

    fn sync(&mut self) {
        let state = self.phase.state();
        let session = RecordingSession {
            state,
            countdown_remaining: match &self.phase {
                Phase::Countdown { remaining, .. } => Some(*remaining),
                _ => None,
            },
            elapsed_seconds: self.tracker.elapsed_seconds(),
            recording_uri: self.artifact().cloned(),
            auto_paused: self.auto_paused,
            last_error: self.last_error.clone(),
        };
        self.shared.publish(session);

        if state != self.published_state {
            debug!("Recording state {} -> {}", self.published_state, state);
            emit(
                &self.event_tx,
                SessionEvent::StateChanged {
                    from: self.published_state,
                    to: state,
                },
            );
            self.published_state = state;
        }
        self.navigation.update(state.blocks_navigation());
    }
}

impl Drop for RecordingController {
    fn drop(&mut self) {
        if self.phase.may_hold_capture() {
            warn!("Recording controller dropped with an open capture session");
            self.capture.abort();
        }
    }
}
