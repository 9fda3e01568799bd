//! Orchestrator for one exercise attempt
//!
//! Connects all components: Permission -> Recording -> Review -> Submission

use crate::audio::device::{ArtifactHandle, AudioCaptureDevice, AudioPlaybackDevice};
use crate::audio::playback::{PlaybackController, PlaybackState};
use crate::exercise::Task;
use crate::integration::config::RecitalConfig;
use crate::recording::navigation::NavigationGuard;
use crate::recording::permission::{PermissionGate, PermissionsProvider};
use crate::recording::state::{emit, RecordingSession, RecordingState, SessionEvent, SharedSession};
use crate::recording::{RecordingController, StartOutcome, TickOutcome};
use crate::submission::http::{HttpTokenService, HttpUploadService, UreqHttpClient};
use crate::submission::pipeline::{SubmissionPipeline, SubmissionReceipt};
use crate::submission::services::{SubmissionScope, TokenService, UploadService};
use crate::{RecitalError, Result};
use crossbeam_channel::Receiver;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

/// Platform and network collaborators for an attempt
#[derive(Clone)]
pub struct Collaborators {
    pub capture: Arc<dyn AudioCaptureDevice>,
    pub playback: Arc<dyn AudioPlaybackDevice>,
    pub permissions: Arc<dyn PermissionsProvider>,
    pub tokens: Arc<dyn TokenService>,
    pub uploads: Arc<dyn UploadService>,
}

impl Collaborators {
    /// Wire the HTTP token and upload services for the configured server
    pub fn with_http(
        capture: Arc<dyn AudioCaptureDevice>,
        playback: Arc<dyn AudioPlaybackDevice>,
        permissions: Arc<dyn PermissionsProvider>,
        config: &RecitalConfig,
        session_token: impl Into<String>,
    ) -> Self {
        let client = Arc::new(UreqHttpClient::new(config.submission.timeout()));
        Self {
            capture,
            playback,
            permissions,
            tokens: Arc::new(HttpTokenService::new(
                client.clone(),
                &config.submission,
                session_token,
            )),
            uploads: Arc::new(HttpUploadService::new(client, &config.submission)),
        }
    }
}

/// Drives a task from the record button to an accepted submission
pub struct AttemptOrchestrator {
    scope: SubmissionScope,
    recording: RecordingController,
    playback: PlaybackController,
    pipeline: SubmissionPipeline,
}

impl AttemptOrchestrator {
    /// Create an orchestrator for `task`
    pub fn new(
        task: &Task,
        scope: SubmissionScope,
        collaborators: Collaborators,
        config: &RecitalConfig,
    ) -> Result<Self> {
        config.validate()?;

        let recording = RecordingController::new(
            task,
            collaborators.capture,
            PermissionGate::new(collaborators.permissions),
            config,
        );
        let playback = PlaybackController::new(collaborators.playback);
        let pipeline =
            SubmissionPipeline::new(collaborators.tokens, collaborators.uploads, &config.submission);

        info!("Attempt ready for task {} ({})", task.id, task.kind);
        Ok(Self {
            scope,
            recording,
            playback,
            pipeline,
        })
    }

    pub fn with_navigation_guard(mut self, guard: Arc<dyn NavigationGuard>) -> Self {
        self.recording = self.recording.with_navigation_guard(guard);
        self
    }

    pub fn state(&self) -> RecordingState {
        self.recording.state()
    }

    pub fn session(&self) -> RecordingSession {
        self.recording.session()
    }

    pub fn shared(&self) -> SharedSession {
        self.recording.shared()
    }

    pub fn events(&self) -> Receiver<SessionEvent> {
        self.recording.event_receiver()
    }

    pub fn recording(&self) -> &RecordingController {
        &self.recording
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.playback.state()
    }

    pub fn is_abortable(&self) -> bool {
        self.recording.is_abortable()
    }

    pub fn subscribe_abortable(&self) -> watch::Receiver<bool> {
        self.recording.subscribe_abortable()
    }

    pub fn has_armed_timer(&self) -> bool {
        self.recording.armed_timers().any()
    }

    pub async fn record(&mut self) -> Result<StartOutcome> {
        self.recording.start().await
    }

    pub async fn next_tick(&mut self) -> Result<TickOutcome> {
        self.recording.next_tick().await
    }

    pub async fn pause(&mut self) -> Result<u64> {
        self.recording.pause().await
    }

    pub async fn resume(&mut self) -> Result<()> {
        self.recording.resume().await
    }

    pub async fn finish(&mut self) -> Result<ArtifactHandle> {
        self.recording.finish().await
    }

    /// Start or continue review playback of the finished recording
    pub async fn review_play(&mut self) -> Result<()> {
        let artifact = self.finished_artifact("play back")?;
        self.playback.load(&artifact).await?;
        self.playback.play().await
    }

    pub async fn review_pause(&mut self) -> Result<()> {
        self.finished_artifact("pause playback")?;
        self.playback.pause().await
    }

    pub async fn review_stop(&mut self) -> Result<()> {
        self.finished_artifact("stop playback")?;
        self.playback.stop().await
    }

    pub async fn review_seek(&mut self, to_seconds: f64) -> Result<()> {
        let artifact = self.finished_artifact("seek")?;
        self.playback.load(&artifact).await?;
        self.playback.seek(to_seconds).await
    }

    /// Finished and no submission running
    pub fn can_submit(&self) -> bool {
        self.recording.state().is_finished() && !self.pipeline.is_in_flight()
    }

    /// Submit the finished recording
    ///
    /// On success the session returns to `Idle`. On failure it stays
    /// `Finished` with the same artifact so the student can submit again.
    pub async fn submit(&mut self) -> Result<SubmissionReceipt> {
        let artifact = self.recording.artifact().cloned();
        let elapsed_seconds = self.recording.elapsed_seconds();
        let events = self.recording.event_sender();

        SubmissionPipeline::validate(artifact.as_ref(), elapsed_seconds, &self.scope)?;

        if let Err(e) = self.playback.release().await {
            warn!("Playback release before submission failed: {}", e);
        }

        emit(&events, SessionEvent::SubmissionStarted);
        match self
            .pipeline
            .submit(artifact.as_ref(), elapsed_seconds, &self.scope)
            .await
        {
            Ok(receipt) => {
                self.recording.mark_submitted()?;
                emit(
                    &events,
                    SessionEvent::Submitted {
                        duration_seconds: receipt.duration_seconds,
                    },
                );
                Ok(receipt)
            }
            Err(e) => {
                emit(&events, SessionEvent::SubmissionFailed(e.clone()));
                Err(e)
            }
        }
    }

    /// Discard the finished recording and start over
    pub async fn retry(&mut self) -> Result<()> {
        self.recording.retry(&mut self.playback).await
    }

    /// Screen teardown: release playback and abort any recording in flight
    pub async fn teardown(&mut self) {
        if let Err(e) = self.playback.release().await {
            warn!("Playback release during teardown failed: {}", e);
        }
        self.recording.abort();
    }

    fn finished_artifact(&self, action: &'static str) -> Result<ArtifactHandle> {
        self.recording
            .artifact()
            .cloned()
            .ok_or(RecitalError::InvalidTransition {
                action,
                state: self.recording.state(),
            })
    }
}
