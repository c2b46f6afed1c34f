//! Golden Sun synth voices, generated in place of sample data.
//!
//! The pulse sweeps its duty cycle once per hardware frame and ramps the
//! threshold across the sub-frames in between. The saw reproduces the
//! driver's integer filter, so it is not a clean ramp.

use sappy_ir::{PulseSweep, SynthWaveform};

/// Synth phase advances this many times slower than sample playback.
const PHASE_DIVISOR: f32 = 64.0;
const SAW_OFFSET: u32 = 0x70;

#[derive(Clone, Debug)]
pub struct SynthOscillator {
    waveform: SynthWaveform,
    /// Phase in `0.0..1.0`.
    phase: f32,
    /// Pulse sweep position, or the saw filter state.
    acc: u32,
}

impl SynthOscillator {
    pub fn new(waveform: SynthWaveform) -> Self {
        Self { waveform, phase: 0.0, acc: 0 }
    }

    /// Fill `out` with samples in `-1.0..=1.0`. `step` is the playback rate
    /// over the output rate; `sub_frame` of `interframes` locates the block
    /// in its hardware frame.
    pub fn render(&mut self, out: &mut [f32], step: f32, sub_frame: u32, interframes: u32) {
        let step = step / PHASE_DIVISOR;
        match self.waveform {
            SynthWaveform::Pulse(sweep) => self.pulse(out, step, &sweep, sub_frame, interframes.max(1)),
            SynthWaveform::Saw => self.saw(out, step),
            SynthWaveform::Triangle => self.triangle(out, step),
        }
    }

    fn pulse(&mut self, out: &mut [f32], step: f32, sweep: &PulseSweep, sub_frame: u32, interframes: u32) {
        let sweep_step = (sweep.duty_step as u32) << 24;
        if sub_frame == 0 {
            self.acc = self.acc.wrapping_add(sweep_step);
        }
        let from = pulse_threshold(self.acc, sweep);
        let to = pulse_threshold(self.acc.wrapping_add(sweep_step), sweep);

        let n = interframes as f32;
        let delta = to - from;
        let mut threshold = from + delta * (sub_frame as f32 / n);
        let threshold_step = delta / n / out.len().max(1) as f32;
        for s in out.iter_mut() {
            let base = if self.phase < threshold { 0.5 } else { -0.5 };
            // Centered on zero whatever the duty.
            *s = base + 0.5 - threshold;
            threshold += threshold_step;
            self.advance(step);
        }
    }

    fn saw(&mut self, out: &mut [f32], step: f32) {
        for s in out.iter_mut() {
            self.advance(step);
            let coarse = ((self.phase * 256.0) as u32).wrapping_sub(SAW_OFFSET);
            let fine = ((self.phase * 65536.0) as u32) << 17;
            let target = coarse.wrapping_sub(fine >> 27);
            self.acc = target.wrapping_add(((self.acc as i32) >> 1) as u32);
            *s = self.acc as i32 as f32 / 256.0;
        }
    }

    fn triangle(&mut self, out: &mut [f32], step: f32) {
        for s in out.iter_mut() {
            self.advance(step);
            *s = if self.phase < 0.5 { 4.0 * self.phase - 1.0 } else { 3.0 - 4.0 * self.phase };
        }
    }

    fn advance(&mut self, step: f32) {
        self.phase += step;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
    }
}

/// Duty threshold in `0.0..1.0` at sweep position `pos`.
fn pulse_threshold(pos: u32, sweep: &PulseSweep) -> f32 {
    let raw = ((sweep.init_duty as u32) << 24).wrapping_add(pos);
    // Fold the sweep into a triangle.
    let folded = if (raw as i32) < 0 { !raw >> 8 } else { raw >> 8 };
    let threshold = folded.wrapping_mul(sweep.depth as u32).wrapping_add((sweep.duty_base as u32) << 24);
    threshold as f32 / 4_294_967_296.0
}
