//! Error types for the recording core
//!
//! Every failure the hosting screen can observe is a variant of
//! [`RecitalError`]. Collaborator failures (devices, network) keep their
//! original message so it can be shown verbatim.

use crate::recording::RecordingState;
use std::fmt;
use thiserror::Error;

/// A submission precondition that was not met
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Prerequisite {
    /// No finished artifact to upload
    Artifact,
    /// The recording has zero elapsed seconds
    Duration,
    /// The student identifier could not be resolved
    StudentId,
}

impl fmt::Display for Prerequisite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prerequisite::Artifact => write!(f, "recording artifact"),
            Prerequisite::Duration => write!(f, "recording duration"),
            Prerequisite::StudentId => write!(f, "student identifier"),
        }
    }
}

/// Recital errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecitalError {
    /// Microphone access was denied by the OS
    #[error("Microphone permission denied")]
    PermissionDenied,

    /// The capture device failed to prepare or start
    #[error("Recording failed to start: {0}")]
    RecordingStartFailed(String),

    /// The capture device failed to pause, resume or stop
    #[error("Recording failed to stop: {0}")]
    RecordingStopFailed(String),

    /// Stop succeeded but produced no artifact
    #[error("Recording finished without an audio artifact")]
    RecordingUriMissing,

    /// Local validation failed before any network request
    #[error("Missing submission prerequisite: {0}")]
    MissingSubmissionPrerequisite(Prerequisite),

    /// The token service returned an error or no usable token
    #[error("Exercise token issuance failed: {0}")]
    TokenIssuanceFailed(String),

    /// The upload was rejected or could not be sent
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    /// The requested action is not valid in the current state
    #[error("Cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: RecordingState,
    },

    /// Another side-effecting transition has not completed
    #[error("Another recording transition is still in flight")]
    TransitionInFlight,

    /// A submission is already running for this session
    #[error("A submission is already in flight")]
    SubmissionInFlight,

    /// Review playback failed
    #[error("Playback error: {0}")]
    PlaybackError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// File system I/O error
    #[error("IO error: {0}")]
    IOError(String),

    /// Transport-level HTTP failure
    #[error("HTTP error: {0}")]
    HttpError(String),
}

impl From<std::io::Error> for RecitalError {
    fn from(e: std::io::Error) -> Self {
        RecitalError::IOError(e.to_string())
    }
}

impl RecitalError {
    /// Check if this error is recoverable
    ///
    /// Recoverable errors leave the user a path forward inside the app
    /// (record again, resubmit). Non-recoverable ones need action outside
    /// the core, such as changing OS settings.
    pub fn is_recoverable(&self) -> bool {
        match self {
            // Fixed only in OS settings
            RecitalError::PermissionDenied => false,
            // User re-initiates the recording
            RecitalError::RecordingStartFailed(_) => true,
            RecitalError::RecordingStopFailed(_) => true,
            RecitalError::RecordingUriMissing => true,
            // User returns to review
            RecitalError::MissingSubmissionPrerequisite(_) => true,
            // The artifact is preserved for resubmission
            RecitalError::TokenIssuanceFailed(_) => true,
            RecitalError::UploadFailed(_) => true,
            RecitalError::InvalidTransition { .. } => true,
            RecitalError::TransitionInFlight => true,
            RecitalError::SubmissionInFlight => true,
            RecitalError::PlaybackError(_) => true,
            RecitalError::ConfigError(_) => false,
            RecitalError::IOError(_) => false,
            RecitalError::HttpError(_) => true,
        }
    }

    /// Check if this error came from the network half of the flow
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            RecitalError::TokenIssuanceFailed(_)
                | RecitalError::UploadFailed(_)
                | RecitalError::HttpError(_)
        )
    }

    /// Get a user-friendly description of the error
    pub fn user_message(&self) -> String {
        match self {
            RecitalError::PermissionDenied => {
                "Microphone access is off. Enable it in Settings to record.".to_string()
            }
            RecitalError::RecordingStartFailed(_) => {
                "Could not start recording. Please try again.".to_string()
            }
            RecitalError::RecordingStopFailed(_) | RecitalError::RecordingUriMissing => {
                "The recording could not be saved. Please record again.".to_string()
            }
            RecitalError::MissingSubmissionPrerequisite(what) => {
                format!("Cannot submit yet: missing {}.", what)
            }
            RecitalError::TokenIssuanceFailed(msg) | RecitalError::UploadFailed(msg) => {
                if msg.is_empty() {
                    "Submission failed. Your recording is kept, please try again.".to_string()
                } else {
                    msg.clone()
                }
            }
            RecitalError::InvalidTransition { .. } | RecitalError::TransitionInFlight => {
                "Please wait for the current action to finish.".to_string()
            }
            RecitalError::SubmissionInFlight => "Submission already in progress.".to_string(),
            RecitalError::PlaybackError(_) => "Playback failed.".to_string(),
            RecitalError::ConfigError(_) => {
                "Configuration error. Please check settings.".to_string()
            }
            RecitalError::IOError(_) => "File system error occurred.".to_string(),
            RecitalError::HttpError(_) => {
                "Network error. Check your connection and try again.".to_string()
            }
        }
    }
}

/// Result type alias for recital operations
pub type Result<T> = std::result::Result<T, RecitalError>;
