//! Sample-rate conversion kernels.
//!
//! A resampler pulls raw input through a fetch closure into its lookahead
//! buffer and writes interpolated output at an arbitrary phase increment
//! (input samples per output sample).

mod blamp;
mod blep;
mod linear;
mod nearest;
mod sinc;
mod tables;

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::config::ResamplerKind;

pub use blamp::BlampResampler;
pub use blep::BlepResampler;
pub use linear::LinearResampler;
pub use nearest::NearestResampler;
pub use sinc::SincResampler;
pub use tables::{KernelTables, WINDOW};

/// Input source of a resampler.
///
/// Called with the lookahead buffer and the length it must reach. Appends
/// samples and returns `false` once the source is exhausted (the missing
/// tail is zero-padded).
pub type FetchFn<'a> = dyn FnMut(&mut Vec<f32>, usize) -> bool + 'a;

/// Lowpass cutoff as a fraction of the output Nyquist rate.
const CUTOFF: f32 = 0.9;

/// Smallest phase increment the integrated kernels scale against.
const MIN_PHASE_INC: f32 = 1.0e-4;

pub trait Resampler: Send {
    /// Fill `out` with samples advancing `phase_inc` input samples each.
    ///
    /// Returns the fetch closure's end-of-stream flag.
    fn process(&mut self, out: &mut [f32], phase_inc: f32, fetch: &mut FetchFn<'_>) -> bool;

    /// Drop buffered input and return to phase 0.
    fn reset(&mut self);
}

/// Create a boxed resampler of the given kind.
pub fn create_resampler(kind: ResamplerKind, tables: &Arc<KernelTables>) -> Box<dyn Resampler> {
    match kind {
        ResamplerKind::Nearest => Box::new(NearestResampler::new()),
        ResamplerKind::Linear => Box::new(LinearResampler::new()),
        ResamplerKind::Sinc => Box::new(SincResampler::new(tables.clone())),
        ResamplerKind::Blep => Box::new(BlepResampler::new(tables.clone())),
        ResamplerKind::Blamp => Box::new(BlampResampler::new(tables.clone())),
    }
}

/// Input history plus fractional read position shared by all kernels.
#[derive(Clone, Debug)]
struct Lookahead {
    buffer: Vec<f32>,
    phase: f32,
    /// Leading zeros inserted on reset so the first output is centered on
    /// the first input sample.
    history: usize,
}

impl Lookahead {
    fn new(history: usize) -> Self {
        let mut lookahead = Self { buffer: Vec::new(), phase: 0.0, history };
        lookahead.reset();
        lookahead
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.buffer.resize(self.history, 0.0);
        self.phase = 0.0;
    }

    /// Pull enough input for `frames` outputs, each reading `taps` samples.
    fn fill(&mut self, frames: usize, phase_inc: f32, taps: usize, fetch: &mut FetchFn<'_>) -> bool {
        let required = (self.phase + phase_inc * frames as f32) as usize + taps + 1;
        let more = fetch(&mut self.buffer, required);
        if self.buffer.len() < required {
            self.buffer.resize(required, 0.0);
        }
        more
    }

    /// Run `kernel` over a `taps`-wide window for every output sample.
    fn render(
        &mut self,
        out: &mut [f32],
        phase_inc: f32,
        taps: usize,
        mut kernel: impl FnMut(&[f32], f32) -> f32,
    ) {
        let mut fi = 0;
        for sample in out.iter_mut() {
            if fi + taps > self.buffer.len() {
                self.buffer.resize(fi + taps, 0.0);
            }
            *sample = kernel(&self.buffer[fi..fi + taps], self.phase);
            self.phase += phase_inc;
            let step = self.phase as usize;
            self.phase -= step as f32;
            fi += step;
        }
        let consumed = fi.min(self.buffer.len());
        self.buffer.drain(..consumed);
    }

    /// Shared driver: fetch, then render.
    fn process(
        &mut self,
        out: &mut [f32],
        phase_inc: f32,
        taps: usize,
        fetch: &mut FetchFn<'_>,
        kernel: impl FnMut(&[f32], f32) -> f32,
    ) -> bool {
        if out.is_empty() {
            return true;
        }
        // Also rejects NaN.
        let phase_inc = if phase_inc > 0.0 { phase_inc } else { 0.0 };
        let more = self.fill(out.len(), phase_inc, taps, fetch);
        self.render(out, phase_inc, taps, kernel);
        more
    }
}

/// Taps of the sinc family: `-(WINDOW - 1)..=WINDOW` around the read position.
const SINC_TAPS: usize = 2 * WINDOW;

/// Offset of tap `i` of a sinc-family window relative to the read position.
fn tap_offset(i: usize) -> f32 {
    i as f32 - (WINDOW - 1) as f32
}

/// Normalized weighted sum over a sinc-family window.
fn convolve(window: &[f32], mut weight: impl FnMut(f32) -> f32) -> f32 {
    let mut sum = 0.0;
    let mut kernel_sum = 0.0;
    for (i, &s) in window.iter().enumerate() {
        let k = weight(tap_offset(i));
        sum += k * s;
        kernel_sum += k;
    }
    if kernel_sum == 0.0 {
        0.0
    } else {
        sum / kernel_sum
    }
}
