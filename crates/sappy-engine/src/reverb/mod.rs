//! Per-track reverb networks.
//!
//! Every network is a circular delay line sized from the driver's PCM DMA
//! ring (`samples_per_frame * dma_buffers`) and processes a track buffer in
//! place. An intensity of zero leaves the buffer untouched while the delay
//! lines keep recording.

mod gs;
mod normal;
mod passthrough;
mod spu;

use alloc::boxed::Box;

use sappy_ir::AudioBuffer;

use crate::config::ReverbKind;
use crate::frame::Frame;

pub use gs::{Gs1Reverb, Gs2Reverb};
pub use normal::NormalReverb;
pub use passthrough::PassthroughReverb;
pub use spu::SpuReverb;

/// Driver frame rate the delay lengths are derived from.
const AGB_FPS: u32 = 60;

pub trait Reverb: Send {
    fn process(&mut self, buffer: &mut AudioBuffer);

    /// Wet level in `0.0..=1.0`, effective from the next sample.
    fn set_intensity(&mut self, intensity: f32);

    fn intensity(&self) -> f32;
}

/// Convert a driver reverb byte to an intensity.
pub fn intensity_from_byte(byte: u8) -> f32 {
    (byte & 0x7F) as f32 / 128.0
}

/// Create the network for `kind`. Zero intensity or [`ReverbKind::None`]
/// gives a passthrough.
pub fn create_reverb(
    kind: ReverbKind,
    intensity: f32,
    sample_rate: u32,
    dma_buffers: u32,
) -> Box<dyn Reverb> {
    if intensity <= 0.0 {
        return Box::new(PassthroughReverb::new(0.0));
    }
    match kind {
        ReverbKind::Normal => Box::new(NormalReverb::new(intensity, sample_rate, dma_buffers)),
        ReverbKind::Gs1 => Box::new(Gs1Reverb::new(intensity, sample_rate, dma_buffers)),
        ReverbKind::Gs2 => Box::new(Gs2Reverb::new(intensity, sample_rate, dma_buffers)),
        ReverbKind::Mgat => Box::new(Gs2Reverb::mgat(intensity, sample_rate, dma_buffers)),
        ReverbKind::Spu => Box::new(SpuReverb::new(intensity, sample_rate)),
        ReverbKind::None => Box::new(PassthroughReverb::new(intensity)),
    }
}

/// Samples per driver frame at `sample_rate`.
fn frame_len(sample_rate: u32) -> usize {
    (sample_rate / AGB_FPS).max(1) as usize
}

/// Run `f` over every stereo frame of `buffer`, writing back its result.
fn for_each_frame(buffer: &mut AudioBuffer, mut f: impl FnMut(Frame) -> Frame) {
    let (left, right) = buffer.split_mut();
    for (l, r) in left.iter_mut().zip(right.iter_mut()) {
        let out = f(Frame::new(*l, *r));
        *l = out.left;
        *r = out.right;
    }
}
