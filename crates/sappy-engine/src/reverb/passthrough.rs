use sappy_ir::AudioBuffer;

use super::Reverb;

/// No reverb.
#[derive(Clone, Debug, Default)]
pub struct PassthroughReverb {
    intensity: f32,
}

impl PassthroughReverb {
    pub fn new(intensity: f32) -> Self {
        Self { intensity }
    }
}

impl Reverb for PassthroughReverb {
    fn process(&mut self, _buffer: &mut AudioBuffer) {}

    fn set_intensity(&mut self, intensity: f32) {
        self.intensity = intensity;
    }

    fn intensity(&self) -> f32 {
        self.intensity
    }
}
