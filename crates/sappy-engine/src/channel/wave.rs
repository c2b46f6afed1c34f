//! Programmable 4-bit wave generator.

use alloc::vec::Vec;

use sappy_ir::VoiceType;

use super::psg::Waveform;
use crate::envelope::VolumeFade;
use crate::frequency::{period_register, psg_frequency, register_frequency, SQUARE_CLOCK, WAVE_CLOCK, WAVE_STEPS};

/// Snap a gain in 1/32 units to the wave channel's output levels of 0, 25,
/// 50, 75 and 100 %.
pub fn quantize_wave_volume(x: f32) -> f32 {
    let level = if x < 1.5 / 32.0 {
        0.0
    } else if x < 5.5 / 32.0 {
        4.0
    } else if x < 9.5 / 32.0 {
        8.0
    } else if x < 13.5 / 32.0 {
        12.0
    } else {
        16.0
    };
    level / 32.0
}

pub struct WaveGenerator {
    samples: [f32; WAVE_STEPS as usize],
    pos: usize,
    period: u16,
}

impl WaveGenerator {
    /// Unpack 32 nibbles, high nibble first, removing the DC offset.
    pub fn new(wave: &[u8; 16]) -> Self {
        let mut samples = [0.0; WAVE_STEPS as usize];
        for (i, byte) in wave.iter().enumerate() {
            samples[2 * i] = (byte >> 4) as f32 / 16.0;
            samples[2 * i + 1] = (byte & 0x0F) as f32 / 16.0;
        }
        let mean = samples.iter().sum::<f32>() / WAVE_STEPS as f32;
        for s in &mut samples {
            *s -= mean;
        }
        Self { samples, pos: 0, period: 0 }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }
}

impl Waveform for WaveGenerator {
    const STAIRSTEP: bool = true;

    fn voice_type(&self) -> VoiceType {
        VoiceType::Wave
    }

    fn set_pitch(&mut self, key: u8, pitch: i16) {
        // The driver tunes the shared period register for the square clock,
        // so the wave channel sounds an octave lower.
        self.period = period_register(psg_frequency(key, pitch), SQUARE_CLOCK);
    }

    fn phase_inc(&self, sample_rate: f32) -> f32 {
        register_frequency(self.period, WAVE_CLOCK) * WAVE_STEPS as f32 / sample_rate
    }

    fn fetch(&mut self, buf: &mut Vec<f32>, required: usize) {
        while buf.len() < required {
            buf.push(self.samples[self.pos]);
            self.pos = (self.pos + 1) % self.samples.len();
        }
    }

    fn shape(&self, fade: VolumeFade) -> VolumeFade {
        fade.map(quantize_wave_volume)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_snaps_to_quarters() {
        assert_eq!(quantize_wave_volume(0.0), 0.0);
        assert_eq!(quantize_wave_volume(1.0 / 32.0), 0.0);
        assert_eq!(quantize_wave_volume(3.0 / 32.0), 0.125);
        assert_eq!(quantize_wave_volume(8.0 / 32.0), 0.25);
        assert_eq!(quantize_wave_volume(11.0 / 32.0), 0.375);
        assert_eq!(quantize_wave_volume(15.0 / 32.0), 0.5);
    }

    #[test]
    fn unpacks_nibbles_without_dc() {
        let mut wave = [0u8; 16];
        wave[..8].fill(0xFF);
        let gen = WaveGenerator::new(&wave);
        assert_eq!(gen.samples()[0], 15.0 / 32.0);
        assert_eq!(gen.samples()[31], -15.0 / 32.0);
        assert!(gen.samples().iter().sum::<f32>().abs() < 1e-5);
    }

    #[test]
    fn wave_plays_an_octave_below_square() {
        let mut gen = WaveGenerator::new(&[0x0F; 16]);
        gen.set_pitch(69, 0);
        let cycle_hz = gen.phase_inc(48000.0) * 48000.0 / WAVE_STEPS as f32;
        assert!((cycle_hz - 220.0).abs() < 1.0);
    }
}
