//! Review playback of a finished recording

use crate::audio::device::{ArtifactHandle, AudioPlaybackDevice};
use crate::{RecitalError, Result};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Audio playback state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlaybackState {
    /// No artifact loaded
    #[default]
    Unloaded,
    /// Artifact loaded, positioned at the start
    Stopped,
    Playing,
    Paused,
}

impl PlaybackState {
    pub fn is_active(&self) -> bool {
        matches!(self, PlaybackState::Playing | PlaybackState::Paused)
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::Unloaded => write!(f, "Unloaded"),
            PlaybackState::Stopped => write!(f, "Stopped"),
            PlaybackState::Playing => write!(f, "Playing"),
            PlaybackState::Paused => write!(f, "Paused"),
        }
    }
}

/// Sole owner of the playback device
///
/// Artifacts only exist once a capture session has been stopped, so loading
/// one here cannot contend with an open microphone session.
pub struct PlaybackController {
    device: Arc<dyn AudioPlaybackDevice>,
    state: PlaybackState,
    loaded: Option<ArtifactHandle>,
    position_seconds: f64,
}

impl PlaybackController {
    pub fn new(device: Arc<dyn AudioPlaybackDevice>) -> Self {
        Self {
            device,
            state: PlaybackState::Unloaded,
            loaded: None,
            position_seconds: 0.0,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn loaded(&self) -> Option<&ArtifactHandle> {
        self.loaded.as_ref()
    }

    /// Last position requested through `seek`, reset by `stop`
    pub fn position_seconds(&self) -> f64 {
        self.position_seconds
    }

    /// Load an artifact, replacing any other one
    pub async fn load(&mut self, artifact: &ArtifactHandle) -> Result<()> {
        if self.loaded.as_ref() == Some(artifact) {
            return Ok(());
        }
        if self.loaded.is_some() {
            self.release().await?;
        }

        self.device
            .load(artifact)
            .await
            .map_err(|e| RecitalError::PlaybackError(e.to_string()))?;

        debug!("Loaded {} for review", artifact);
        self.loaded = Some(artifact.clone());
        self.state = PlaybackState::Stopped;
        self.position_seconds = 0.0;
        Ok(())
    }

    pub async fn play(&mut self) -> Result<()> {
        match self.state {
            PlaybackState::Unloaded => Err(RecitalError::PlaybackError(
                "No recording loaded".to_string(),
            )),
            PlaybackState::Playing => Ok(()),
            PlaybackState::Stopped | PlaybackState::Paused => {
                self.device
                    .play()
                    .await
                    .map_err(|e| RecitalError::PlaybackError(e.to_string()))?;
                self.state = PlaybackState::Playing;
                Ok(())
            }
        }
    }

    pub async fn pause(&mut self) -> Result<()> {
        if self.state != PlaybackState::Playing {
            return Ok(());
        }
        self.device
            .pause()
            .await
            .map_err(|e| RecitalError::PlaybackError(e.to_string()))?;
        self.state = PlaybackState::Paused;
        Ok(())
    }

    /// Stop and rewind to the start
    pub async fn stop(&mut self) -> Result<()> {
        if !self.state.is_active() {
            return Ok(());
        }
        self.device
            .stop()
            .await
            .map_err(|e| RecitalError::PlaybackError(e.to_string()))?;
        self.state = PlaybackState::Stopped;
        self.position_seconds = 0.0;
        Ok(())
    }

    pub async fn seek(&mut self, to_seconds: f64) -> Result<()> {
        if self.state == PlaybackState::Unloaded {
            return Err(RecitalError::PlaybackError(
                "No recording loaded".to_string(),
            ));
        }
        let to_seconds = if to_seconds.is_finite() {
            to_seconds.max(0.0)
        } else {
            0.0
        };
        self.device
            .seek(to_seconds)
            .await
            .map_err(|e| RecitalError::PlaybackError(e.to_string()))?;
        self.position_seconds = to_seconds;
        Ok(())
    }

    /// Play/pause toggle for a single review button
    pub async fn toggle(&mut self) -> Result<()> {
        match self.state {
            PlaybackState::Playing => self.pause().await,
            _ => self.play().await,
        }
    }

    /// Stop and release the device
    ///
    /// The controller always ends up `Unloaded`, even if the device fails to
    /// stop; the failure is still reported.
    pub async fn release(&mut self) -> Result<()> {
        if self.state == PlaybackState::Unloaded {
            return Ok(());
        }

        let stopped = self.stop().await;
        if let Err(e) = &stopped {
            warn!("Playback did not stop cleanly before release: {}", e);
        }

        let unloaded = self
            .device
            .unload()
            .await
            .map_err(|e| RecitalError::PlaybackError(e.to_string()));

        self.state = PlaybackState::Unloaded;
        self.loaded = None;
        self.position_seconds = 0.0;
        debug!("Playback released");

        stopped.and(unloaded)
    }
}
