//! Zero-order hold.

use super::{FetchFn, Lookahead, Resampler};

#[derive(Clone, Debug)]
pub struct NearestResampler {
    lookahead: Lookahead,
}

impl Default for NearestResampler {
    fn default() -> Self {
        Self::new()
    }
}

impl NearestResampler {
    pub fn new() -> Self {
        Self { lookahead: Lookahead::new(0) }
    }
}

impl Resampler for NearestResampler {
    fn process(&mut self, out: &mut [f32], phase_inc: f32, fetch: &mut FetchFn<'_>) -> bool {
        self.lookahead.process(out, phase_inc, 1, fetch, |window, _phase| window[0])
    }

    fn reset(&mut self) {
        self.lookahead.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resampler::tests::counter;

    #[test]
    fn holds_each_sample() {
        let mut r = NearestResampler::new();
        let mut out = [0.0; 6];
        r.process(&mut out, 0.5, &mut counter());
        assert_eq!(out, [0.0, 0.0, 1.0, 1.0, 2.0, 2.0]);
    }

    #[test]
    fn skips_samples_when_decimating() {
        let mut r = NearestResampler::new();
        let mut fetch = counter();
        let mut out = [0.0; 3];
        r.process(&mut out, 2.0, &mut fetch);
        assert_eq!(out, [0.0, 2.0, 4.0]);
        r.process(&mut out, 2.0, &mut fetch);
        assert_eq!(out, [6.0, 8.0, 10.0]);
    }
}
