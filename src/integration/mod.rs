//! Attempt-level integration
//!
//! Wires permission, recording, review playback and submission for a single
//! exercise attempt: Permission -> Recording -> Review -> Submission

pub mod config;
mod orchestrator;

pub use config::{RecitalConfig, RecordingConfig, SubmissionConfig, WaveformConfig};
pub use orchestrator::{AttemptOrchestrator, Collaborators};
