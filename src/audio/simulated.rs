//! In-process stand-ins for the platform audio devices
//!
//! Used by the demo binary and the test suites. Both devices record every
//! call they receive and can be scripted to fail the next call of a kind.
//! The capture device also acts as a tripwire: starting a second session
//! while one is open is reported as an error, the way a real microphone
//! refuses to be opened twice.

use crate::audio::device::{ArtifactHandle, AudioCaptureDevice, AudioPlaybackDevice, CaptureHandle};
use crate::audio::wav::write_wav;
use anyhow::{bail, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::f32::consts::PI;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

const SAMPLE_RATE: u32 = 16000;

/// Number of calls the capture device has received, per primitive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureCalls {
    pub prepare: usize,
    pub start: usize,
    pub pause: usize,
    pub resume: usize,
    pub stop: usize,
    pub abort: usize,
}

#[derive(Debug, Default)]
struct CaptureScript {
    fail_prepare: Option<String>,
    fail_start: Option<String>,
    fail_pause: Option<String>,
    fail_resume: Option<String>,
    fail_stop: Option<String>,
    no_artifact: bool,
}

#[derive(Debug)]
struct OpenSession {
    id: Uuid,
    /// Set while audio is flowing
    running_since: Option<Instant>,
    captured: Duration,
}

#[derive(Debug, Default)]
struct CaptureInner {
    calls: CaptureCalls,
    script: CaptureScript,
    session: Option<OpenSession>,
    produced: u64,
}

/// Simulated microphone
///
/// Without an output directory artifacts are `sim://` handles; with one, the
/// device writes a WAV tone whose length matches the time spent capturing.
#[derive(Debug, Default)]
pub struct SimulatedCaptureDevice {
    inner: Mutex<CaptureInner>,
    output_dir: Option<PathBuf>,
}

impl SimulatedCaptureDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn calls(&self) -> CaptureCalls {
        self.inner.lock().calls
    }

    pub fn is_open(&self) -> bool {
        self.inner.lock().session.is_some()
    }

    pub fn is_capturing(&self) -> bool {
        self.inner
            .lock()
            .session
            .as_ref()
            .is_some_and(|s| s.running_since.is_some())
    }

    pub fn fail_next_prepare(&self, message: impl Into<String>) {
        self.inner.lock().script.fail_prepare = Some(message.into());
    }

    pub fn fail_next_start(&self, message: impl Into<String>) {
        self.inner.lock().script.fail_start = Some(message.into());
    }

    pub fn fail_next_pause(&self, message: impl Into<String>) {
        self.inner.lock().script.fail_pause = Some(message.into());
    }

    pub fn fail_next_resume(&self, message: impl Into<String>) {
        self.inner.lock().script.fail_resume = Some(message.into());
    }

    pub fn fail_next_stop(&self, message: impl Into<String>) {
        self.inner.lock().script.fail_stop = Some(message.into());
    }

    /// Make the next successful stop return no artifact
    pub fn produce_no_artifact(&self) {
        self.inner.lock().script.no_artifact = true;
    }

    fn check_handle(session: &Option<OpenSession>, handle: &CaptureHandle) -> Result<()> {
        match session {
            Some(open) if open.id == handle.id() => Ok(()),
            Some(_) => bail!("capture handle does not match the open session"),
            None => bail!("no capture session is open"),
        }
    }

    fn write_artifact(&self, index: u64, captured: Duration) -> Result<ArtifactHandle> {
        let Some(dir) = &self.output_dir else {
            return Ok(ArtifactHandle::new(format!("sim://capture/{}.wav", index)));
        };

        let count = (captured.as_secs_f64() * SAMPLE_RATE as f64) as usize;
        let samples: Vec<f32> = (0..count)
            .map(|i| (2.0 * PI * 440.0 * i as f32 / SAMPLE_RATE as f32).sin() * 0.3)
            .collect();
        let path = dir.join(format!("capture-{}.wav", index));
        write_wav(&path, &samples, SAMPLE_RATE, 1)?;
        Ok(ArtifactHandle::from_path(path))
    }
}

#[async_trait(?Send)]
impl AudioCaptureDevice for SimulatedCaptureDevice {
    async fn prepare(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.calls.prepare += 1;
        if let Some(msg) = inner.script.fail_prepare.take() {
            bail!(msg);
        }
        Ok(())
    }

    async fn start(&self) -> Result<CaptureHandle> {
        let mut inner = self.inner.lock();
        inner.calls.start += 1;
        if let Some(msg) = inner.script.fail_start.take() {
            bail!(msg);
        }
        if inner.session.is_some() {
            bail!("capture session already open");
        }

        let handle = CaptureHandle::new();
        inner.session = Some(OpenSession {
            id: handle.id(),
            running_since: Some(Instant::now()),
            captured: Duration::ZERO,
        });
        debug!("Simulated capture started");
        Ok(handle)
    }

    async fn pause(&self, handle: &CaptureHandle) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.calls.pause += 1;
        if let Some(msg) = inner.script.fail_pause.take() {
            bail!(msg);
        }
        Self::check_handle(&inner.session, handle)?;
        if let Some(open) = inner.session.as_mut() {
            if let Some(since) = open.running_since.take() {
                open.captured += since.elapsed();
            }
        }
        Ok(())
    }

    async fn resume(&self, handle: &CaptureHandle) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.calls.resume += 1;
        if let Some(msg) = inner.script.fail_resume.take() {
            bail!(msg);
        }
        Self::check_handle(&inner.session, handle)?;
        if let Some(open) = inner.session.as_mut() {
            open.running_since.get_or_insert_with(Instant::now);
        }
        Ok(())
    }

    async fn stop(&self, handle: CaptureHandle) -> Result<Option<ArtifactHandle>> {
        let (captured, index, no_artifact) = {
            let mut inner = self.inner.lock();
            inner.calls.stop += 1;
            if let Some(msg) = inner.script.fail_stop.take() {
                bail!(msg);
            }
            Self::check_handle(&inner.session, &handle)?;
            let Some(open) = inner.session.take() else {
                bail!("no capture session is open");
            };
            let captured = open.captured + open.running_since.map(|s| s.elapsed()).unwrap_or_default();
            inner.produced += 1;
            let no_artifact = std::mem::take(&mut inner.script.no_artifact);
            (captured, inner.produced, no_artifact)
        };

        if no_artifact {
            return Ok(None);
        }
        self.write_artifact(index, captured).map(Some)
    }

    fn abort(&self) {
        let mut inner = self.inner.lock();
        inner.calls.abort += 1;
        if inner.session.take().is_some() {
            debug!("Simulated capture session discarded");
        }
    }
}

/// A call received by the simulated playback device
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackCall {
    Load(ArtifactHandle),
    Play,
    Pause,
    Stop,
    Seek(f64),
    Unload,
}

#[derive(Debug, Default)]
struct PlaybackInner {
    calls: Vec<PlaybackCall>,
    loaded: Option<ArtifactHandle>,
    fail_play: Option<String>,
    fail_stop: Option<String>,
}

/// Simulated speaker
#[derive(Debug, Default)]
pub struct SimulatedPlaybackDevice {
    inner: Mutex<PlaybackInner>,
}

impl SimulatedPlaybackDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<PlaybackCall> {
        self.inner.lock().calls.clone()
    }

    pub fn loaded(&self) -> Option<ArtifactHandle> {
        self.inner.lock().loaded.clone()
    }

    pub fn fail_next_play(&self, message: impl Into<String>) {
        self.inner.lock().fail_play = Some(message.into());
    }

    pub fn fail_next_stop(&self, message: impl Into<String>) {
        self.inner.lock().fail_stop = Some(message.into());
    }

    fn require_loaded(inner: &PlaybackInner) -> Result<()> {
        if inner.loaded.is_none() {
            bail!("nothing loaded");
        }
        Ok(())
    }
}

#[async_trait(?Send)]
impl AudioPlaybackDevice for SimulatedPlaybackDevice {
    async fn load(&self, artifact: &ArtifactHandle) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.calls.push(PlaybackCall::Load(artifact.clone()));
        inner.loaded = Some(artifact.clone());
        Ok(())
    }

    async fn play(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.calls.push(PlaybackCall::Play);
        if let Some(msg) = inner.fail_play.take() {
            bail!(msg);
        }
        Self::require_loaded(&inner)
    }

    async fn pause(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.calls.push(PlaybackCall::Pause);
        Self::require_loaded(&inner)
    }

    async fn stop(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.calls.push(PlaybackCall::Stop);
        if let Some(msg) = inner.fail_stop.take() {
            bail!(msg);
        }
        Self::require_loaded(&inner)
    }

    async fn seek(&self, to_seconds: f64) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.calls.push(PlaybackCall::Seek(to_seconds));
        Self::require_loaded(&inner)
    }

    async fn unload(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.calls.push(PlaybackCall::Unload);
        inner.loaded = None;
        Ok(())
    }
}
