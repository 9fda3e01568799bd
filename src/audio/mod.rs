pub mod device;
#[cfg(feature = "audio-io")]
pub mod input;
#[cfg(feature = "audio-io")]
pub mod output;
pub mod playback;
pub mod simulated;
pub mod wav;
pub mod waveform;

pub use device::{ArtifactHandle, AudioCaptureDevice, AudioPlaybackDevice, CaptureHandle};
#[cfg(feature = "audio-io")]
pub use input::CpalCaptureDevice;
#[cfg(feature = "audio-io")]
pub use output::RodioPlaybackDevice;
pub use playback::{PlaybackController, PlaybackState};
pub use simulated::{SimulatedCaptureDevice, SimulatedPlaybackDevice};
pub use wav::{read_wav, write_wav};
pub use waveform::{WaveformFrame, WaveformSimulator};
