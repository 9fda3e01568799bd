use anyhow::Result;
use recital::audio::{
    AudioCaptureDevice, AudioPlaybackDevice, SimulatedCaptureDevice, SimulatedPlaybackDevice,
};
use recital::integration::{AttemptOrchestrator, Collaborators, RecitalConfig};
use recital::recording::{PermissionsProvider, SimulatedPermissions, TickOutcome};
use recital::submission::{ScriptedTokenService, ScriptedUploadService, SubmissionScope};
use recital::Task;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Tick the attempt until `seconds` of recording have elapsed
async fn record_seconds(attempt: &mut AttemptOrchestrator, seconds: u64) -> Result<()> {
    let target = attempt.session().elapsed_seconds + seconds;
    while attempt.session().elapsed_seconds < target {
        match attempt.next_tick().await? {
            TickOutcome::NoTimerArmed | TickOutcome::AutoPaused { .. } => break,
            _ => {}
        }
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "recital=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => RecitalConfig::load(path)?,
        None => RecitalConfig::default(),
    };

    info!("Starting simulated exercise attempt");

    let mut capture = SimulatedCaptureDevice::new();
    if let Some(dir) = &config.artifact_dir {
        std::fs::create_dir_all(dir)?;
        capture = capture.with_output_dir(dir);
    }

    let capture: Arc<dyn AudioCaptureDevice> = Arc::new(capture);
    let playback: Arc<dyn AudioPlaybackDevice> = Arc::new(SimulatedPlaybackDevice::new());
    let permissions: Arc<dyn PermissionsProvider> = Arc::new(SimulatedPermissions::undetermined());

    // Submit to the configured server when a session token is provided
    let collaborators = match std::env::var("RECITAL_SESSION_TOKEN") {
        Ok(session_token) => {
            info!("Submitting to {}", config.submission.base_url);
            Collaborators::with_http(capture, playback, permissions, &config, session_token)
        }
        Err(_) => Collaborators {
            capture,
            playback,
            permissions,
            tokens: Arc::new(ScriptedTokenService::new()),
            uploads: Arc::new(ScriptedUploadService::new()),
        },
    };
    let task = Task::speech_on_topic("topic-1", "Describe your favourite place", 10);
    let scope = SubmissionScope::new("assignment-1", &task.id, "student-1");
    let mut attempt = AttemptOrchestrator::new(&task, scope, collaborators, &config)?;

    attempt.record().await?;
    record_seconds(&mut attempt, 5).await?;
    attempt.pause().await?;
    attempt.resume().await?;
    record_seconds(&mut attempt, 3).await?;
    let artifact = attempt.finish().await?;
    info!(
        "Finished {} after {}s",
        artifact,
        attempt.session().elapsed_seconds
    );

    attempt.review_play().await?;
    attempt.review_seek(1.5).await?;
    attempt.review_stop().await?;

    let receipt = attempt.submit().await?;
    info!(
        "Submitted {}s recording at {}",
        receipt.duration_seconds, receipt.submitted_at
    );

    Ok(())
}
