//! Smoothed RMS and peak level meter.

use sappy_ir::AudioBuffer;

/// Default smoothing cutoff in Hz.
pub const DEFAULT_LOWPASS_HZ: f32 = 20.0;

/// Peak hold decay per second, as a gain factor.
const PEAK_DECAY_PER_SECOND: f32 = 0.05;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Loudness {
    pub rms_left: f32,
    pub rms_right: f32,
    pub peak_left: f32,
    pub peak_right: f32,
}

#[derive(Clone, Debug)]
pub struct LoudnessMeter {
    alpha: f32,
    peak_decay: f32,
    avg_sq: [f32; 2],
    level: Loudness,
}

impl LoudnessMeter {
    pub fn new(sample_rate: u32, lowpass_hz: f32) -> Self {
        let dt = 1.0 / sample_rate.max(1) as f32;
        let rc = 1.0 / (2.0 * core::f32::consts::PI * lowpass_hz);
        Self {
            alpha: dt / (rc + dt),
            peak_decay: libm::powf(PEAK_DECAY_PER_SECOND, dt),
            avg_sq: [0.0; 2],
            level: Loudness::default(),
        }
    }

    pub fn reset(&mut self) {
        self.avg_sq = [0.0; 2];
        self.level = Loudness::default();
    }

    /// Feed one rendered block.
    pub fn update(&mut self, buffer: &AudioBuffer) {
        let sides = [buffer.left(), buffer.right()];
        let mut peaks = [self.level.peak_left, self.level.peak_right];
        for (side, samples) in sides.iter().enumerate() {
            let mut avg = self.avg_sq[side];
            let mut peak = peaks[side];
            for &x in samples.iter() {
                avg += self.alpha * (x * x - avg);
                peak = libm::fmaxf(peak * self.peak_decay, libm::fabsf(x));
            }
            self.avg_sq[side] = avg;
            peaks[side] = peak;
        }
        self.level = Loudness {
            rms_left: libm::sqrtf(self.avg_sq[0]) * core::f32::consts::SQRT_2,
            rms_right: libm::sqrtf(self.avg_sq[1]) * core::f32::consts::SQRT_2,
            peak_left: peaks[0],
            peak_right: peaks[1],
        };
    }

    pub fn loudness(&self) -> Loudness {
        self.level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_block(frames: usize, amp: f32, phase: &mut f32) -> AudioBuffer {
        let mut buf = AudioBuffer::new(frames);
        let (l, r) = buf.split_mut();
        for (a, b) in l.iter_mut().zip(r.iter_mut()) {
            *a = amp * libm::sinf(*phase);
            *b = 0.0;
            *phase += 2.0 * core::f32::consts::PI * 440.0 / 48000.0;
        }
        buf
    }

    #[test]
    fn sine_settles_at_its_amplitude() {
        let mut meter = LoudnessMeter::new(48000, DEFAULT_LOWPASS_HZ);
        let mut phase = 0.0;
        for _ in 0..480 {
            let block = sine_block(200, 0.5, &mut phase);
            meter.update(&block);
        }
        let level = meter.loudness();
        assert!((level.rms_left - 0.5).abs() < 0.05, "{}", level.rms_left);
        assert!((level.peak_left - 0.5).abs() < 0.01);
        assert_eq!(level.rms_right, 0.0);
    }

    #[test]
    fn peak_decays_in_silence() {
        let mut meter = LoudnessMeter::new(48000, DEFAULT_LOWPASS_HZ);
        let mut phase = 0.0;
        meter.update(&sine_block(200, 1.0, &mut phase));
        let peak = meter.loudness().peak_left;
        let silent = AudioBuffer::new(48000);
        meter.update(&silent);
        assert!(meter.loudness().peak_left < peak * 0.1);
        meter.reset();
        assert_eq!(meter.loudness(), Loudness::default());
    }
}
