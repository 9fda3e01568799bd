//! Observable recording session state
//!
//! The controller is the only writer. UI readers get:
//! - **Snapshots** through [`SharedSession`], queried synchronously
//! - **Events** through a bounded channel, for repaint and logging
//!
//! State should be read from the snapshot rather than rebuilt from events,
//! since events may be dropped when the receiver falls behind.

use crate::audio::ArtifactHandle;
use crate::RecitalError;
use crossbeam_channel::Sender;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Recording state machine states
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RecordingState {
    /// Nothing in progress
    #[default]
    Idle,
    /// Counting down to capture start
    Countdown,
    /// Capturing audio
    Recording,
    /// Capture session open, audio not flowing
    Paused,
    /// Capture closed, artifact available for review and submission
    Finished,
}

impl RecordingState {
    pub fn is_idle(&self) -> bool {
        matches!(self, RecordingState::Idle)
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, RecordingState::Recording)
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, RecordingState::Finished)
    }

    /// States in which leaving the screen would lose work in flight
    pub fn blocks_navigation(&self) -> bool {
        matches!(
            self,
            RecordingState::Countdown | RecordingState::Recording | RecordingState::Paused
        )
    }
}

impl fmt::Display for RecordingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordingState::Idle => write!(f, "Idle"),
            RecordingState::Countdown => write!(f, "Countdown"),
            RecordingState::Recording => write!(f, "Recording"),
            RecordingState::Paused => write!(f, "Paused"),
            RecordingState::Finished => write!(f, "Finished"),
        }
    }
}

/// Immutable snapshot of the recording session
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecordingSession {
    pub state: RecordingState,
    /// Only set in `Countdown`
    pub countdown_remaining: Option<u8>,
    pub elapsed_seconds: u64,
    /// Only set in `Finished`
    pub recording_uri: Option<ArtifactHandle>,
    /// The current pause was triggered by the duration limit
    pub auto_paused: bool,
    /// Most recent failure, cleared when a new attempt starts
    pub last_error: Option<RecitalError>,
}

impl RecordingSession {
    pub fn is_abortable(&self) -> bool {
        !self.state.blocks_navigation()
    }
}

/// Read-only shared view of the session
#[derive(Clone, Default)]
pub struct SharedSession {
    inner: Arc<RwLock<RecordingSession>>,
}

impl SharedSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn publish(&self, session: RecordingSession) {
        *self.inner.write() = session;
    }

    /// Get a snapshot of current state (no lock held after return)
    pub fn snapshot(&self) -> RecordingSession {
        self.inner.read().clone()
    }

    pub fn state(&self) -> RecordingState {
        self.inner.read().state
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.inner.read().elapsed_seconds
    }

    pub fn countdown_remaining(&self) -> Option<u8> {
        self.inner.read().countdown_remaining
    }

    pub fn recording_uri(&self) -> Option<ArtifactHandle> {
        self.inner.read().recording_uri.clone()
    }

    pub fn is_abortable(&self) -> bool {
        self.inner.read().is_abortable()
    }
}

/// Events emitted by the recording core
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    StateChanged {
        from: RecordingState,
        to: RecordingState,
    },
    CountdownTick {
        remaining: u8,
    },
    DurationTick {
        elapsed_seconds: u64,
    },
    /// The topic time limit paused the recording
    AutoPaused {
        elapsed_seconds: u64,
    },
    Finished {
        artifact: ArtifactHandle,
        elapsed_seconds: u64,
    },
    /// A transition failed and the session reverted to `Idle`
    Failed(RecitalError),
    SubmissionStarted,
    Submitted {
        duration_seconds: u64,
    },
    SubmissionFailed(RecitalError),
}

/// Non-blocking event emission; a full or closed channel only drops the event
pub(crate) fn emit(tx: &Sender<SessionEvent>, event: SessionEvent) {
    if let Err(e) = tx.try_send(event) {
        debug!("Session event dropped: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    #[test]
    fn test_navigation_blocking_states() {
        assert!(!RecordingState::Idle.blocks_navigation());
        assert!(RecordingState::Countdown.blocks_navigation());
        assert!(RecordingState::Recording.blocks_navigation());
        assert!(RecordingState::Paused.blocks_navigation());
        assert!(!RecordingState::Finished.blocks_navigation());
    }

    #[test]
    fn test_snapshot_is_independent() {
        let shared = SharedSession::new();
        let before = shared.snapshot();

        shared.publish(RecordingSession {
            state: RecordingState::Recording,
            elapsed_seconds: 4,
            ..RecordingSession::default()
        });

        assert!(before.state.is_idle());
        assert_eq!(shared.state(), RecordingState::Recording);
        assert_eq!(shared.elapsed_seconds(), 4);
        assert!(!shared.is_abortable());
    }

    #[test]
    fn test_emit_drops_when_full() {
        let (tx, rx) = bounded(1);
        emit(&tx, SessionEvent::CountdownTick { remaining: 3 });
        emit(&tx, SessionEvent::CountdownTick { remaining: 2 });
        assert_eq!(rx.len(), 1);
        assert_eq!(
            rx.try_recv().unwrap(),
            SessionEvent::CountdownTick { remaining: 3 }
        );
    }
}
