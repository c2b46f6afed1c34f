//! Audio output trait and error types.

use thiserror::Error;

/// Error type for audio operations.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no audio output device available")]
    NoDevice,
    #[error("failed to query device configuration: {0}")]
    DeviceConfig(#[from] cpal::DefaultStreamConfigError),
    #[error("failed to create audio stream: {0}")]
    StreamCreate(#[from] cpal::BuildStreamError),
    #[error("failed to start playback: {0}")]
    Play(#[from] cpal::PlayStreamError),
    #[error("failed to pause playback: {0}")]
    Pause(#[from] cpal::PauseStreamError),
}

/// An output device fed from a [`RingBuffer`](crate::RingBuffer).
pub trait AudioOutput {
    /// Device sample rate in Hz.
    fn sample_rate(&self) -> u32;

    /// Start pulling audio.
    fn start(&mut self) -> Result<(), AudioError>;

    /// Pause the device. Buffered audio stays queued.
    fn stop(&mut self) -> Result<(), AudioError>;
}
