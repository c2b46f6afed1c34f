//! Two-tap linear interpolation.

use super::{FetchFn, Lookahead, Resampler};

#[derive(Clone, Debug)]
pub struct LinearResampler {
    lookahead: Lookahead,
}

impl Default for LinearResampler {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearResampler {
    pub fn new() -> Self {
        Self { lookahead: Lookahead::new(0) }
    }
}

impl Resampler for LinearResampler {
    fn process(&mut self, out: &mut [f32], phase_inc: f32, fetch: &mut FetchFn<'_>) -> bool {
        self.lookahead.process(out, phase_inc, 2, fetch, |window, phase| {
            window[0] + phase * (window[1] - window[0])
        })
    }

    fn reset(&mut self) {
        self.lookahead.reset();
    }
}
