//! CPAL-based audio output backend.

use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};

use crate::ring_buffer::RingBuffer;
use crate::traits::{AudioError, AudioOutput};

/// Stereo output on the default device.
pub struct CpalOutput {
    device: Device,
    config: StreamConfig,
    stream: Option<Stream>,
    ring: Arc<RingBuffer>,
}

impl CpalOutput {
    /// Open the default output device. Nothing plays until
    /// [`build_stream`](Self::build_stream) and [`start`](AudioOutput::start).
    pub fn new(ring: Arc<RingBuffer>) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoDevice)?;
        let mut config = device.default_output_config()?.config();
        // The ring buffer carries interleaved stereo.
        config.channels = 2;
        if let Ok(name) = device.name() {
            log::info!("audio device {name} at {} Hz", config.sample_rate.0);
        }
        Ok(Self { device, config, stream: None, ring })
    }

    /// Build the device stream pulling from the ring buffer.
    pub fn build_stream(&mut self) -> Result<(), AudioError> {
        let ring = self.ring.clone();
        let stream = self.device.build_output_stream(
            &self.config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                ring.take(data);
            },
            |err| log::error!("audio stream error: {err}"),
            None,
        )?;
        self.stream = Some(stream);
        Ok(())
    }

    pub fn ring(&self) -> &Arc<RingBuffer> {
        &self.ring
    }
}

impl AudioOutput for CpalOutput {
    fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    fn start(&mut self) -> Result<(), AudioError> {
        if let Some(ref stream) = self.stream {
            stream.play()?;
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        if let Some(ref stream) = self.stream {
            stream.pause()?;
        }
        Ok(())
    }
}
