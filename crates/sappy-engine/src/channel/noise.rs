//! LFSR noise generator.

use alloc::vec::Vec;

use sappy_ir::{NoisePattern, VoiceType};

use super::psg::Waveform;
use crate::frequency::noise_frequency;

pub struct NoiseGenerator {
    state: u16,
    /// Feedback taps applied when a one is shifted out.
    mask: u16,
    freq: f32,
}

impl NoiseGenerator {
    pub fn new(pattern: NoisePattern) -> Self {
        let (state, mask) = match pattern {
            NoisePattern::Fine => (0x4000, 0x6000),
            NoisePattern::Rough => (0x40, 0x60),
        };
        Self { state, mask, freq: 0.0 }
    }

    fn next(&mut self) -> f32 {
        if self.state & 1 != 0 {
            self.state = (self.state >> 1) ^ self.mask;
            0.5
        } else {
            self.state >>= 1;
            -0.5
        }
    }

    pub fn frequency(&self) -> f32 {
        self.freq
    }
}

impl Waveform for NoiseGenerator {
    fn voice_type(&self) -> VoiceType {
        VoiceType::Noise
    }

    fn set_pitch(&mut self, key: u8, pitch: i16) {
        self.freq = noise_frequency(key, pitch);
    }

    fn phase_inc(&self, sample_rate: f32) -> f32 {
        self.freq / sample_rate
    }

    fn fetch(&mut self, buf: &mut Vec<f32>, required: usize) {
        while buf.len() < required {
            let s = self.next();
            buf.push(s);
        }
    }
}
