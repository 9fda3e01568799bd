//! Audio device contracts
//!
//! Capture and playback hardware sit behind these traits. The recording core
//! is single-threaded and cooperative, so the futures are not required to be
//! `Send`; this also lets platform streams that are pinned to their thread
//! back an implementation directly.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const FILE_SCHEME: &str = "file://";

/// Opaque handle to a captured audio artifact
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactHandle {
    uri: String,
}

impl ArtifactHandle {
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }

    /// Handle for a file on the local file system
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        Self {
            uri: format!("{}{}", FILE_SCHEME, path.as_ref().display()),
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Local path behind the handle, if it points at a file
    ///
    /// Bare paths are accepted as well as `file://` URIs.
    pub fn local_path(&self) -> Option<PathBuf> {
        if let Some(path) = self.uri.strip_prefix(FILE_SCHEME) {
            return Some(PathBuf::from(path));
        }
        if self.uri.contains("://") {
            return None;
        }
        Some(PathBuf::from(&self.uri))
    }

    /// Last path segment, used as the upload file name
    pub fn file_name(&self) -> String {
        self.uri
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .unwrap_or("recording.wav")
            .to_string()
    }

    /// MIME type guessed from the file extension
    pub fn mime_type(&self) -> &'static str {
        let name = self.file_name().to_ascii_lowercase();
        match name.rsplit_once('.').map(|(_, ext)| ext) {
            Some("wav") => "audio/wav",
            Some("m4a") => "audio/m4a",
            Some("mp4") => "audio/mp4",
            Some("aac") => "audio/aac",
            Some("mp3") => "audio/mpeg",
            Some("ogg") | Some("opus") => "audio/ogg",
            _ => "application/octet-stream",
        }
    }
}

impl fmt::Display for ArtifactHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uri)
    }
}

/// Capability for an open capture session
///
/// Only a capture device mints these, from `start()`. The handle is not
/// `Clone`: pause and resume borrow it, stop consumes it, so a session
/// cannot be stopped twice or driven after it ended.
#[derive(Debug, PartialEq, Eq)]
pub struct CaptureHandle {
    id: Uuid,
}

impl CaptureHandle {
    pub fn new() -> Self {
        Self { id: Uuid::new_v4() }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Default for CaptureHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Platform microphone
#[async_trait(?Send)]
pub trait AudioCaptureDevice {
    /// Acquire whatever the platform needs before `start`
    async fn prepare(&self) -> Result<()>;

    /// Open a capture session
    async fn start(&self) -> Result<CaptureHandle>;

    async fn pause(&self, handle: &CaptureHandle) -> Result<()>;

    async fn resume(&self, handle: &CaptureHandle) -> Result<()>;

    /// Close the session; `None` means nothing was written
    async fn stop(&self, handle: CaptureHandle) -> Result<Option<ArtifactHandle>>;

    /// Best-effort release of any open session, used on forced teardown.
    /// Must not block and must tolerate being called with nothing open.
    fn abort(&self) {}
}

/// Speaker output for reviewing an artifact
#[async_trait(?Send)]
pub trait AudioPlaybackDevice {
    async fn load(&self, artifact: &ArtifactHandle) -> Result<()>;

    async fn play(&self) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    async fn stop(&self) -> Result<()>;

    async fn seek(&self, to_seconds: f64) -> Result<()>;

    /// Release the loaded artifact and the output device
    async fn unload(&self) -> Result<()>;
}
