//! Two-phase submission: token issuance, then upload

use crate::audio::ArtifactHandle;
use crate::error::Prerequisite;
use crate::integration::config::SubmissionConfig;
use crate::submission::services::{
    ExerciseToken, SubmissionScope, TokenRequest, TokenService, UploadService,
};
use crate::{RecitalError, Result};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Accepted submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReceipt {
    pub duration_seconds: u64,
    pub submitted_at: DateTime<Utc>,
    /// Server message, if any
    pub message: Option<String>,
}

/// Submits finished recordings, one at a time
pub struct SubmissionPipeline {
    tokens: Arc<dyn TokenService>,
    uploads: Arc<dyn UploadService>,
    role: String,
    environment: String,
    in_flight: AtomicBool,
}

impl SubmissionPipeline {
    pub fn new(
        tokens: Arc<dyn TokenService>,
        uploads: Arc<dyn UploadService>,
        config: &SubmissionConfig,
    ) -> Self {
        Self {
            tokens,
            uploads,
            role: config.role.clone(),
            environment: config.environment.clone(),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Check the local preconditions without touching the network
    pub fn validate<'a>(
        artifact: Option<&'a ArtifactHandle>,
        elapsed_seconds: u64,
        scope: &'a SubmissionScope,
    ) -> Result<(&'a ArtifactHandle, &'a str)> {
        let artifact = artifact.ok_or(RecitalError::MissingSubmissionPrerequisite(
            Prerequisite::Artifact,
        ))?;
        if elapsed_seconds == 0 {
            return Err(RecitalError::MissingSubmissionPrerequisite(
                Prerequisite::Duration,
            ));
        }
        let student_id = scope
            .resolved_student_id()
            .ok_or(RecitalError::MissingSubmissionPrerequisite(
                Prerequisite::StudentId,
            ))?;
        Ok((artifact, student_id))
    }

    /// Issue a token and upload the artifact with it
    ///
    /// Fails with [`RecitalError::SubmissionInFlight`] while another call
    /// on this pipeline has not returned. Nothing is retried.
    pub async fn submit(
        &self,
        artifact: Option<&ArtifactHandle>,
        elapsed_seconds: u64,
        scope: &SubmissionScope,
    ) -> Result<SubmissionReceipt> {
        let (artifact, student_id) = Self::validate(artifact, elapsed_seconds, scope)?;

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(RecitalError::SubmissionInFlight);
        }
        let _guard = scopeguard::guard(&self.in_flight, |flag| {
            flag.store(false, Ordering::SeqCst);
        });

        let request = TokenRequest::new(scope, student_id, &self.role, &self.environment);
        let token = self.issue_token(&request).await?;
        info!("Exercise token issued for task {}", scope.task_id);

        let response = self
            .uploads
            .submit(artifact, elapsed_seconds, token)
            .await
            .map_err(|e| {
                warn!("Upload failed: {}", e);
                RecitalError::UploadFailed(e.to_string())
            })?;

        if !response.is_success() {
            let message = response
                .message
                .unwrap_or_else(|| "Upload was not accepted".to_string());
            warn!("Upload rejected: {}", message);
            return Err(RecitalError::UploadFailed(message));
        }

        info!(
            "Submitted {}s recording for task {}",
            elapsed_seconds, scope.task_id
        );
        Ok(SubmissionReceipt {
            duration_seconds: elapsed_seconds,
            submitted_at: Utc::now(),
            message: response.message,
        })
    }

    async fn issue_token(&self, request: &TokenRequest) -> Result<ExerciseToken> {
        let response = self.tokens.issue(request).await.map_err(|e| {
            warn!("Token issuance failed: {}", e);
            RecitalError::TokenIssuanceFailed(e.to_string())
        })?;

        match response.usable_token() {
            Some(token) => Ok(ExerciseToken::new(token)),
            None => {
                let message = response
                    .message
                    .unwrap_or_else(|| "No exercise token in response".to_string());
                warn!("Token issuance returned no token: {}", message);
                Err(RecitalError::TokenIssuanceFailed(message))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::submission::simulated::{ScriptedTokenService, ScriptedUploadService};
    use crate::submission::services::{TokenResponse, UploadResponse};

    fn pipeline() -> (
        SubmissionPipeline,
        Arc<ScriptedTokenService>,
        Arc<ScriptedUploadService>,
    ) {
        let tokens = Arc::new(ScriptedTokenService::new());
        let uploads = Arc::new(ScriptedUploadService::new());
        let pipeline =
            SubmissionPipeline::new(tokens.clone(), uploads.clone(), &SubmissionConfig::default());
        (pipeline, tokens, uploads)
    }

    fn scope() -> SubmissionScope {
        SubmissionScope::new("assign-1", "task-1", "stu-1")
    }

    #[tokio::test]
    async fn test_missing_prerequisites_never_hit_network() {
        let (pipeline, tokens, uploads) = pipeline();
        let artifact = ArtifactHandle::new("sim://capture/1.wav");

        let cases = [
            (None, 5, scope(), Prerequisite::Artifact),
            (Some(&artifact), 0, scope(), Prerequisite::Duration),
            (Some(&artifact), 5, scope().without_student(), Prerequisite::StudentId),
        ];
        for (artifact, elapsed, scope, missing) in cases {
            let err = pipeline.submit(artifact, elapsed, &scope).await.unwrap_err();
            assert_eq!(err, RecitalError::MissingSubmissionPrerequisite(missing));
        }
        assert!(tokens.requests().is_empty());
        assert!(uploads.uploads().is_empty());
    }

    #[tokio::test]
    async fn test_token_then_upload() {
        let (pipeline, tokens, uploads) = pipeline();
        let artifact = ArtifactHandle::new("sim://capture/1.wav");

        let receipt = pipeline.submit(Some(&artifact), 8, &scope()).await.unwrap();

        assert_eq!(receipt.duration_seconds, 8);
        let requests = tokens.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].role, "student");
        assert_eq!(requests[0].student_id, "stu-1");
        let uploads = uploads.uploads();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].duration_seconds, 8);
        assert_eq!(uploads[0].token, "token-1");
        assert!(!pipeline.is_in_flight());
    }

    #[tokio::test]
    async fn test_blank_token_fails_fast() {
        let (pipeline, tokens, uploads) = pipeline();
        tokens.respond_next(TokenResponse {
            token: Some("  ".to_string()),
            message: None,
        });

        let err = pipeline
            .submit(Some(&ArtifactHandle::new("sim://a.wav")), 3, &scope())
            .await
            .unwrap_err();

        assert!(matches!(err, RecitalError::TokenIssuanceFailed(_)));
        assert!(uploads.uploads().is_empty());
        assert!(!pipeline.is_in_flight());
    }

    #[tokio::test]
    async fn test_upload_without_marker_is_failure() {
        let (pipeline, _, uploads) = pipeline();
        uploads.respond_next(UploadResponse {
            success: None,
            status: None,
            message: Some("Audio too short".to_string()),
        });

        let err = pipeline
            .submit(Some(&ArtifactHandle::new("sim://a.wav")), 3, &scope())
            .await
            .unwrap_err();

        assert_eq!(err, RecitalError::UploadFailed("Audio too short".to_string()));
    }

    #[tokio::test]
    async fn test_concurrent_submit_is_single_flight() {
        let (pipeline, tokens, _) = pipeline();
        tokens.delay_responses(std::time::Duration::from_millis(50));
        let artifact = ArtifactHandle::new("sim://a.wav");
        let scope = scope();

        let (first, second) = tokio::join!(
            pipeline.submit(Some(&artifact), 3, &scope),
            pipeline.submit(Some(&artifact), 3, &scope),
        );

        assert!(first.is_ok());
        assert_eq!(second.unwrap_err(), RecitalError::SubmissionInFlight);
        assert_eq!(tokens.requests().len(), 1);
    }
}
