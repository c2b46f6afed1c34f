//! Band-limited step interpolation.
//!
//! Treats the input as a zero-order hold and weights every sample by the
//! band-limited step response over the span it covers, which keeps square
//! and noise edges free of aliasing.

use alloc::sync::Arc;

use super::{
    FetchFn, KernelTables, Lookahead, Resampler, CUTOFF, MIN_PHASE_INC, SINC_TAPS, WINDOW,
};

#[derive(Clone, Debug)]
pub struct BlepResampler {
    lookahead: Lookahead,
    tables: Arc<KernelTables>,
}

impl BlepResampler {
    pub fn new(tables: Arc<KernelTables>) -> Self {
        Self { lookahead: Lookahead::new(WINDOW - 1), tables }
    }
}

impl Resampler for BlepResampler {
    fn process(&mut self, out: &mut [f32], phase_inc: f32, fetch: &mut FetchFn<'_>) -> bool {
        let step = CUTOFF / phase_inc.max(MIN_PHASE_INC);
        let tables = &self.tables;
        self.lookahead.process(out, phase_inc, SINC_TAPS, fetch, |window, phase| {
            let first = -((WINDOW - 1) as f32) - phase;
            let mut left = tables.si((first - 0.5) * step);
            let mut sum = 0.0;
            let mut kernel_sum = 0.0;
            for (i, &s) in window.iter().enumerate() {
                let right = tables.si((first + i as f32 + 0.5) * step);
                let k = right - left;
                sum += k * s;
                kernel_sum += k;
                left = right;
            }
            if kernel_sum == 0.0 {
                0.0
            } else {
                sum / kernel_sum
            }
        })
    }

    fn reset(&mut self) {
        self.lookahead.reset();
    }
}
