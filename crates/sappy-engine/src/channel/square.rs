//! Square wave generator with the channel 1 frequency sweep.

use alloc::vec::Vec;

use sappy_ir::{DutyCycle, VoiceType};

use super::psg::Waveform;
use super::MixContext;
use crate::frequency::{period_register, psg_frequency, register_frequency, SQUARE_CLOCK, SQUARE_STEPS};

/// Sweep unit clock in Hz.
const SWEEP_CLOCK: f32 = 128.0;
const PERIOD_MAX: u32 = 2047;

/// Hardware frequency sweep of square channel 1.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sweep {
    /// Sweep clocks between period updates.
    time: u8,
    shift: u8,
    ascending: bool,
    clock: f32,
}

impl Sweep {
    /// Decode the instrument's sweep byte. `None` when the sweep is off.
    pub fn from_register(value: u8) -> Option<Self> {
        let time = (value & 0x70) >> 4;
        let shift = value & 0x07;
        if value >= 0x80 || time == 0 || shift == 0 {
            return None;
        }
        Some(Self { time, shift, ascending: value & 0x08 == 0, clock: 0.0 })
    }

    /// Apply every sweep step that falls into `seconds`. Returns the new
    /// period, or `None` on overflow.
    fn advance(&mut self, period: u16, seconds: f32) -> Option<u16> {
        let mut period = period as u32;
        self.clock += seconds * SWEEP_CLOCK;
        while self.clock >= self.time as f32 {
            self.clock -= self.time as f32;
            let delta = period >> self.shift;
            period = if self.ascending { period + delta } else { period - delta };
            if period > PERIOD_MAX {
                return None;
            }
        }
        Some(period as u16)
    }
}

pub struct SquareGenerator {
    voice_type: VoiceType,
    pattern: [f32; SQUARE_STEPS as usize],
    pos: usize,
    period: u16,
    sweep: Option<Sweep>,
    /// Sweeping channels keep the period latched at note start.
    latched: bool,
}

impl SquareGenerator {
    pub fn new(voice_type: VoiceType, duty: DutyCycle, sweep: Option<Sweep>) -> Self {
        let high = duty.high_steps();
        let level = high as f32 / SQUARE_STEPS as f32;
        let mut pattern = [-level; SQUARE_STEPS as usize];
        for step in pattern.iter_mut().take(high) {
            *step = 1.0 - level;
        }
        Self { voice_type, pattern, pos: 0, period: 0, sweep, latched: false }
    }

    pub fn period(&self) -> u16 {
        self.period
    }

    pub fn pattern(&self) -> &[f32] {
        &self.pattern
    }
}

impl Waveform for SquareGenerator {
    fn voice_type(&self) -> VoiceType {
        self.voice_type
    }

    fn set_pitch(&mut self, key: u8, pitch: i16) {
        if self.latched {
            return;
        }
        self.period = period_register(psg_frequency(key, pitch), SQUARE_CLOCK);
        self.latched = self.sweep.is_some();
    }

    fn phase_inc(&self, sample_rate: f32) -> f32 {
        register_frequency(self.period, SQUARE_CLOCK) * SQUARE_STEPS as f32 / sample_rate
    }

    fn fetch(&mut self, buf: &mut Vec<f32>, required: usize) {
        while buf.len() < required {
            buf.push(self.pattern[self.pos]);
            self.pos = (self.pos + 1) % self.pattern.len();
        }
    }

    fn end_block(&mut self, ctx: &MixContext) -> bool {
        let Some(sweep) = self.sweep.as_mut() else {
            return true;
        };
        match sweep.advance(self.period, 1.0 / ctx.frames_per_second) {
            Some(period) => {
                self.period = period;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::tests::context;

    #[test]
    fn duty_patterns_have_no_dc() {
        for duty in [DutyCycle::Eighth, DutyCycle::Quarter, DutyCycle::Half, DutyCycle::ThreeQuarters] {
            let square = SquareGenerator::new(VoiceType::Square2, duty, None);
            let sum: f32 = square.pattern().iter().sum();
            assert!(sum.abs() < 1e-6, "{duty:?}");
        }
    }

    #[test]
    fn sweep_register_decoding() {
        assert_eq!(Sweep::from_register(0x00), None);
        assert_eq!(Sweep::from_register(0x80 | 0x17), None);
        assert_eq!(Sweep::from_register(0x70), None);
        let sweep = Sweep::from_register(0x1A).unwrap();
        assert_eq!((sweep.time, sweep.shift, sweep.ascending), (1, 2, false));
    }

    #[test]
    fn ascending_sweep_overflows() {
        let mut square = SquareGenerator::new(VoiceType::Square1, DutyCycle::Half, Sweep::from_register(0x11));
        square.set_pitch(69, 0);
        let start = square.period();
        let ctx = context();
        // +50% per sweep step leaves the register range on the first step.
        let mut alive = true;
        for _ in 0..240 {
            alive = square.end_block(&ctx);
            if !alive {
                break;
            }
            assert!(square.period() >= start);
        }
        assert!(!alive);
    }

    #[test]
    fn sweep_ignores_later_pitch_changes() {
        let mut square = SquareGenerator::new(VoiceType::Square1, DutyCycle::Half, Sweep::from_register(0x19));
        square.set_pitch(69, 0);
        let period = square.period();
        square.set_pitch(81, 0);
        assert_eq!(square.period(), period);
    }

    #[test]
    fn plain_square_follows_pitch() {
        let mut square = SquareGenerator::new(VoiceType::Square2, DutyCycle::Half, None);
        square.set_pitch(69, 0);
        let a4 = square.period();
        square.set_pitch(81, 0);
        assert!(square.period() > a4);
        // A5, eight duty steps per cycle.
        let inc = square.phase_inc(48000.0);
        assert!((inc * 48000.0 / 8.0 - 880.0).abs() < 2.0);
    }
}
