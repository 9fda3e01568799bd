//! Recording capture-and-submission core for assigned speech exercises
//!
//! A student records a spoken answer to a prompt: countdown, recording with
//! pause/resume, automatic time-boxing for topic tasks, review playback, then
//! a two-phase submission (exercise token, then upload).

pub mod audio;
pub mod error;
pub mod exercise;
pub mod integration;
pub mod recording;
pub mod submission;

pub use error::{Prerequisite, RecitalError, Result};
pub use exercise::{Task, TaskKind};
pub use integration::{AttemptOrchestrator, Collaborators, RecitalConfig};
pub use recording::{RecordingController, RecordingSession, RecordingState, SessionEvent};
pub use submission::{SubmissionPipeline, SubmissionReceipt, SubmissionScope};
