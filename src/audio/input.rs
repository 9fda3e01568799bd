use crate::audio::device::{ArtifactHandle, AudioCaptureDevice, CaptureHandle};
use crate::audio::wav::{downmix_to_mono, write_wav};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

struct CaptureSession {
    id: Uuid,
    stream: Stream,
    capturing: Arc<AtomicBool>,
    samples: Arc<Mutex<Vec<f32>>>,
    sample_rate: u32,
}

/// Default system microphone
///
/// Samples are downmixed to mono while audio is flowing and written to a
/// WAV artifact in `output_dir` on stop.
pub struct CpalCaptureDevice {
    output_dir: PathBuf,
    input: Mutex<Option<(Device, StreamConfig)>>,
    session: Mutex<Option<CaptureSession>>,
}

impl CpalCaptureDevice {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            input: Mutex::new(None),
            session: Mutex::new(None),
        }
    }

    fn with_session<T>(
        &self,
        handle: &CaptureHandle,
        f: impl FnOnce(&CaptureSession) -> Result<T>,
    ) -> Result<T> {
        let session = self.session.lock();
        match session.as_ref() {
            Some(open) if open.id == handle.id() => f(open),
            Some(_) => bail!("capture handle does not match the open session"),
            None => bail!("no capture session is open"),
        }
    }
}

#[async_trait(?Send)]
impl AudioCaptureDevice for CpalCaptureDevice {
    async fn prepare(&self) -> Result<()> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| anyhow!("No input device available"))?;

        info!(
            "Using input device: {}",
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );

        let config: StreamConfig = device
            .default_input_config()
            .context("Failed to get input config")?
            .into();

        std::fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("Failed to create {}", self.output_dir.display()))?;

        *self.input.lock() = Some((device, config));
        Ok(())
    }

    async fn start(&self) -> Result<CaptureHandle> {
        let mut session = self.session.lock();
        if session.is_some() {
            bail!("capture session already open");
        }
        let input = self.input.lock();
        let Some((device, config)) = input.as_ref() else {
            bail!("capture device not prepared");
        };

        let channels = config.channels as usize;
        let capturing = Arc::new(AtomicBool::new(true));
        let samples = Arc::new(Mutex::new(Vec::new()));
        let flowing = Arc::clone(&capturing);
        let sink = Arc::clone(&samples);

        let err_fn = |err| {
            error!("Audio input stream error: {}", err);
        };

        let stream = device
            .build_input_stream(
                config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if !flowing.load(Ordering::Relaxed) {
                        return;
                    }
                    sink.lock().extend(downmix_to_mono(data, channels));
                },
                err_fn,
                None,
            )
            .context("Failed to build input stream")?;

        stream.play().context("Failed to start input stream")?;

        let handle = CaptureHandle::new();
        *session = Some(CaptureSession {
            id: handle.id(),
            stream,
            capturing,
            samples,
            sample_rate: config.sample_rate.0,
        });

        info!("Started audio capture");
        Ok(handle)
    }

    async fn pause(&self, handle: &CaptureHandle) -> Result<()> {
        self.with_session(handle, |open| {
            open.capturing.store(false, Ordering::Relaxed);
            open.stream.pause().context("Failed to pause input stream")?;
            debug!("Audio capture paused");
            Ok(())
        })
    }

    async fn resume(&self, handle: &CaptureHandle) -> Result<()> {
        self.with_session(handle, |open| {
            open.stream.play().context("Failed to resume input stream")?;
            open.capturing.store(true, Ordering::Relaxed);
            debug!("Audio capture resumed");
            Ok(())
        })
    }

    async fn stop(&self, handle: CaptureHandle) -> Result<Option<ArtifactHandle>> {
        self.with_session(&handle, |_| Ok(()))?;
        let Some(open) = self.session.lock().take() else {
            bail!("no capture session is open");
        };

        open.capturing.store(false, Ordering::Relaxed);
        drop(open.stream);
        let samples = std::mem::take(&mut *open.samples.lock());
        info!("Stopped audio capture, {} samples", samples.len());

        if samples.is_empty() {
            return Ok(None);
        }
        let path = self.output_dir.join(format!("recording-{}.wav", open.id.simple()));
        write_wav(&path, &samples, open.sample_rate, 1)?;
        Ok(Some(ArtifactHandle::from_path(path)))
    }

    fn abort(&self) {
        if let Some(open) = self.session.lock().take() {
            open.capturing.store(false, Ordering::Relaxed);
            drop(open.stream);
            info!("Audio capture discarded");
        }
    }
}

impl Drop for CpalCaptureDevice {
    fn drop(&mut self) {
        self.abort();
    }
}
