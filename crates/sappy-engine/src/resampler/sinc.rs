//! Windowed-sinc interpolation.

use alloc::sync::Arc;

use super::{convolve, FetchFn, KernelTables, Lookahead, Resampler, CUTOFF, SINC_TAPS, WINDOW};

/// 32-tap Hann-windowed sinc. Above the cutoff the kernel is widened to act
/// as an anti-aliasing lowpass.
#[derive(Clone, Debug)]
pub struct SincResampler {
    lookahead: Lookahead,
    tables: Arc<KernelTables>,
}

impl SincResampler {
    pub fn new(tables: Arc<KernelTables>) -> Self {
        Self { lookahead: Lookahead::new(WINDOW - 1), tables }
    }
}

impl Resampler for SincResampler {
    fn process(&mut self, out: &mut [f32], phase_inc: f32, fetch: &mut FetchFn<'_>) -> bool {
        let step = if phase_inc > CUTOFF { CUTOFF / phase_inc } else { 1.0 };
        let tables = &self.tables;
        self.lookahead.process(out, phase_inc, SINC_TAPS, fetch, |window, phase| {
            convolve(window, |offset| {
                let t = offset - phase;
                tables.sinc(t * step) * tables.window(t)
            })
        })
    }

    fn reset(&mut self) {
        self.lookahead.reset();
    }
}
