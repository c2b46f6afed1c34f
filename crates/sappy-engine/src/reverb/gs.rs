//! Reverb networks from two game-specific driver variants.
//!
//! Both feed a short secondary delay line from cross-mixed history taps and
//! add it to the input on its next lap. They run at fixed coefficients; the
//! intensity only switches them on or off.

use alloc::vec;
use alloc::vec::Vec;

use sappy_ir::AudioBuffer;

use super::{for_each_frame, frame_len, Reverb};
use crate::frame::Frame;

const GS1_FEEDBACK: f32 = 0.25;

const GS2_PRIMARY: f32 = 0.4140625;
const GS2_SECONDARY: f32 = -0.0625;
const GS2_CROSS: f32 = 0.25;

const MGAT_PRIMARY: f32 = 0.25;
const MGAT_SECONDARY: f32 = -0.046875;

pub struct Gs1Reverb {
    history: Vec<Frame>,
    pos: usize,
    gs: Vec<Frame>,
    gs_pos: usize,
    intensity: f32,
}

impl Gs1Reverb {
    pub fn new(intensity: f32, sample_rate: u32, dma_buffers: u32) -> Self {
        let frame_len = frame_len(sample_rate);
        Self {
            history: vec![Frame::silence(); frame_len * dma_buffers.max(1) as usize],
            pos: 0,
            gs: vec![Frame::silence(); frame_len],
            gs_pos: 0,
            intensity,
        }
    }
}

impl Reverb for Gs1Reverb {
    fn process(&mut self, buffer: &mut AudioBuffer) {
        let muted = self.intensity == 0.0;
        for_each_frame(buffer, |input| {
            let mix = input + self.gs[self.gs_pos];
            let old = self.history[self.pos];
            self.history[self.pos] = mix;
            self.gs[self.gs_pos] = (mix + old.swapped()) * GS1_FEEDBACK;
            self.pos = (self.pos + 1) % self.history.len();
            self.gs_pos = (self.gs_pos + 1) % self.gs.len();
            if muted {
                input
            } else {
                mix
            }
        });
    }

    fn set_intensity(&mut self, intensity: f32) {
        self.intensity = intensity;
    }

    fn intensity(&self) -> f32 {
        self.intensity
    }
}

pub struct Gs2Reverb {
    history: Vec<Frame>,
    pos: usize,
    pos2: usize,
    gs: Vec<Frame>,
    gs_pos: usize,
    primary: f32,
    secondary: f32,
    intensity: f32,
}

impl Gs2Reverb {
    pub fn new(intensity: f32, sample_rate: u32, dma_buffers: u32) -> Self {
        Self::with_coefficients(intensity, sample_rate, dma_buffers, GS2_PRIMARY, GS2_SECONDARY)
    }

    /// The variant used by the Mario Golf and Mario Tennis drivers.
    pub fn mgat(intensity: f32, sample_rate: u32, dma_buffers: u32) -> Self {
        Self::with_coefficients(intensity, sample_rate, dma_buffers, MGAT_PRIMARY, MGAT_SECONDARY)
    }

    /// `primary` scales the same side of the reflected history frame,
    /// `secondary` the opposite side.
    pub fn with_coefficients(
        intensity: f32,
        sample_rate: u32,
        dma_buffers: u32,
        primary: f32,
        secondary: f32,
    ) -> Self {
        let frame_len = frame_len(sample_rate);
        let len = frame_len * dma_buffers.max(1) as usize;
        Self {
            history: vec![Frame::silence(); len],
            pos: 0,
            pos2: (len - frame_len / 3) % len,
            gs: vec![Frame::silence(); (frame_len / 2).max(1)],
            gs_pos: 0,
            primary,
            secondary,
            intensity,
        }
    }
}

impl Reverb for Gs2Reverb {
    fn process(&mut self, buffer: &mut AudioBuffer) {
        let muted = self.intensity == 0.0;
        let len = self.history.len();
        for_each_frame(buffer, |input| {
            let mix = input + self.gs[self.gs_pos];
            let old = self.history[self.pos];
            self.history[self.pos] = mix;

            let reflected = old * self.primary + old.swapped() * self.secondary;
            let cross = Frame::new(self.history[self.pos2].right, mix.right) * GS2_CROSS;
            self.gs[self.gs_pos] = reflected + cross;

            self.pos = (self.pos + 1) % len;
            self.pos2 = (self.pos2 + 1) % len;
            self.gs_pos = (self.gs_pos + 1) % self.gs.len();
            if muted {
                input
            } else {
                mix
            }
        });
    }

    fn set_intensity(&mut self, intensity: f32) {
        self.intensity = intensity;
    }

    fn intensity(&self) -> f32 {
        self.intensity
    }
}
