use crate::audio::device::{ArtifactHandle, AudioPlaybackDevice};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use rodio::{Decoder, OutputStream, Sink};
use std::fs::File;
use std::io::BufReader;
use std::time::Duration;
use tracing::{debug, info};

struct LoadedArtifact {
    _stream: OutputStream,
    sink: Sink,
}

/// Default system output for review playback
pub struct RodioPlaybackDevice {
    loaded: Mutex<Option<LoadedArtifact>>,
}

impl RodioPlaybackDevice {
    pub fn new() -> Self {
        Self {
            loaded: Mutex::new(None),
        }
    }

    fn with_sink<T>(&self, f: impl FnOnce(&Sink) -> Result<T>) -> Result<T> {
        let loaded = self.loaded.lock();
        let artifact = loaded.as_ref().ok_or_else(|| anyhow!("nothing loaded"))?;
        f(&artifact.sink)
    }
}

impl Default for RodioPlaybackDevice {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait(?Send)]
impl AudioPlaybackDevice for RodioPlaybackDevice {
    async fn load(&self, artifact: &ArtifactHandle) -> Result<()> {
        let path = artifact
            .local_path()
            .ok_or_else(|| anyhow!("artifact {} is not a local file", artifact))?;

        let (stream, handle) = OutputStream::try_default().context("No output device available")?;
        let sink = Sink::try_new(&handle).context("Failed to create output sink")?;

        let file = File::open(&path).with_context(|| format!("Failed to open {}", path.display()))?;
        let source = Decoder::new(BufReader::new(file)).context("Failed to decode artifact")?;

        sink.pause();
        sink.append(source);

        *self.loaded.lock() = Some(LoadedArtifact {
            _stream: stream,
            sink,
        });
        info!("Loaded {} for playback", artifact);
        Ok(())
    }

    async fn play(&self) -> Result<()> {
        self.with_sink(|sink| {
            sink.play();
            Ok(())
        })
    }

    async fn pause(&self) -> Result<()> {
        self.with_sink(|sink| {
            sink.pause();
            Ok(())
        })
    }

    /// Pause and rewind; the source stays queued for the next play
    async fn stop(&self) -> Result<()> {
        self.with_sink(|sink| {
            sink.pause();
            sink.try_seek(Duration::ZERO)
                .map_err(|e| anyhow!("Failed to rewind: {}", e))
        })
    }

    async fn seek(&self, to_seconds: f64) -> Result<()> {
        self.with_sink(|sink| {
            sink.try_seek(Duration::from_secs_f64(to_seconds.max(0.0)))
                .map_err(|e| anyhow!("Failed to seek: {}", e))
        })
    }

    async fn unload(&self) -> Result<()> {
        if let Some(artifact) = self.loaded.lock().take() {
            artifact.sink.stop();
            debug!("Playback output released");
        }
        Ok(())
    }
}
