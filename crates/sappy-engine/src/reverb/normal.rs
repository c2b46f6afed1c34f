//! The driver's built-in reverb.
//!
//! Two taps one DMA buffer apart over the mixed output history. Their four
//! samples are averaged, scaled by the intensity, added to both sides and
//! written back, so the echo feeds itself.

use alloc::vec;
use alloc::vec::Vec;

use sappy_ir::AudioBuffer;

use super::{for_each_frame, frame_len, Reverb};
use crate::frame::Frame;

pub struct NormalReverb {
    history: Vec<Frame>,
    pos: usize,
    pos2: usize,
    intensity: f32,
}

impl NormalReverb {
    pub fn new(intensity: f32, sample_rate: u32, dma_buffers: u32) -> Self {
        let frame_len = frame_len(sample_rate);
        let len = frame_len * dma_buffers.max(1) as usize;
        Self { history: vec![Frame::silence(); len], pos: 0, pos2: frame_len % len, intensity }
    }
}

impl Reverb for NormalReverb {
    fn process(&mut self, buffer: &mut AudioBuffer) {
        let len = self.history.len();
        let intensity = self.intensity;
        for_each_frame(buffer, |input| {
            // A muted network still records its input.
            let out = if intensity == 0.0 {
                input
            } else {
                let taps = self.history[self.pos].sum() + self.history[self.pos2].sum();
                input + Frame::mono(taps * intensity * 0.25)
            };
            self.history[self.pos] = out;
            self.pos = (self.pos + 1) % len;
            self.pos2 = (self.pos2 + 1) % len;
            out
        });
    }

    fn set_intensity(&mut self, intensity: f32) {
        self.intensity = intensity;
    }

    fn intensity(&self) -> f32 {
        self.intensity
    }
}
