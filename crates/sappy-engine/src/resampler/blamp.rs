//! Band-limited ramp interpolation.
//!
//! Treats the input as linearly interpolated; the kernel is the second
//! difference of the doubly integrated windowed sinc.

use alloc::sync::Arc;

use super::{
    FetchFn, KernelTables, Lookahead, Resampler, CUTOFF, MIN_PHASE_INC, SINC_TAPS, WINDOW,
};

#[derive(Clone, Debug)]
pub struct BlampResampler {
    lookahead: Lookahead,
    tables: Arc<KernelTables>,
}

impl BlampResampler {
    pub fn new(tables: Arc<KernelTables>) -> Self {
        Self { lookahead: Lookahead::new(WINDOW - 1), tables }
    }
}

impl Resampler for BlampResampler {
    fn process(&mut self, out: &mut [f32], phase_inc: f32, fetch: &mut FetchFn<'_>) -> bool {
        let step = CUTOFF / phase_inc.max(MIN_PHASE_INC);
        let tables = &self.tables;
        self.lookahead.process(out, phase_inc, SINC_TAPS, fetch, |window, phase| {
            let first = -((WINDOW - 1) as f32) - phase;
            let mut left = tables.ti((first - 1.0) * step);
            let mut mid = tables.ti(first * step);
            let mut sum = 0.0;
            let mut kernel_sum = 0.0;
            for (i, &s) in window.iter().enumerate() {
                let right = tables.ti((first + i as f32 + 1.0) * step);
                let k = right - 2.0 * mid + left;
                sum += k * s;
                kernel_sum += k;
                left = mid;
                mid = right;
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
