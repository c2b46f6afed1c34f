//! Stereo f32 audio buffer with planar layout.

use alloc::vec;
use alloc::vec::Vec;

/// Number of output channels every render block carries.
pub const STEREO: usize = 2;

/// A stereo f32 audio buffer in planar layout.
///
/// `data[..frames]` is the left plane and `data[frames..]` the right plane.
#[derive(Clone, Debug, Default)]
pub struct AudioBuffer {
    data: Vec<f32>,
    frames: usize,
}

impl AudioBuffer {
    /// Create a new silent buffer holding `frames` stereo frames.
    pub fn new(frames: usize) -> Self {
        Self { data: vec![0.0; STEREO * frames], frames }
    }

    /// Change the frame count and silence every sample.
    ///
    /// The backing allocation is reused when it is already large enough.
    pub fn resize(&mut self, frames: usize) {
        self.frames = frames;
        self.data.clear();
        self.data.resize(STEREO * frames, 0.0);
    }

    /// Fill all samples with zero.
    pub fn silence(&mut self) {
        self.data.fill(0.0);
    }

    /// Number of frames.
    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn left(&self) -> &[f32] {
        &self.data[..self.frames]
    }

    pub fn right(&self) -> &[f32] {
        &self.data[self.frames..]
    }

    /// Mutable access to both planes at once.
    pub fn split_mut(&mut self) -> (&mut [f32], &mut [f32]) {
        self.data.split_at_mut(self.frames)
    }

    /// Sum `source` into this buffer.
    pub fn mix_from(&mut self, source: &AudioBuffer) {
        self.mix_from_ramped(source, 1.0, 1.0);
    }

    /// Sum `source` into this buffer with a gain moving linearly from
    /// `from_gain` at the first frame towards `to_gain` at the end of the block.
    pub fn mix_from_ramped(&mut self, source: &AudioBuffer, from_gain: f32, to_gain: f32) {
        let frames = self.frames.min(source.frames);
        if frames == 0 {
            return;
        }
        let step = (to_gain - from_gain) / frames as f32;
        let (dst_l, dst_r) = self.split_mut();
        let (src_l, src_r) = (source.left(), source.right());
        let mut gain = from_gain;
        for i in 0..frames {
            dst_l[i] += src_l[i] * gain;
            dst_r[i] += src_r[i] * gain;
            gain += step;
        }
    }

    /// Add a mono signal with independent left/right gain ramps.
    pub fn mix_mono_ramped(&mut self, source: &[f32], from: [f32; STEREO], to: [f32; STEREO]) {
        let frames = self.frames.min(source.len());
        if frames == 0 {
            return;
        }
        let step_l = (to[0] - from[0]) / frames as f32;
        let step_r = (to[1] - from[1]) / frames as f32;
        let (dst_l, dst_r) = self.split_mut();
        let (mut gain_l, mut gain_r) = (from[0], from[1]);
        for (i, &s) in source[..frames].iter().enumerate() {
            dst_l[i] += s * gain_l;
            dst_r[i] += s * gain_r;
            gain_l += step_l;
            gain_r += step_r;
        }
    }

    /// Scale all samples by `gain`.
    pub fn apply_gain(&mut self, gain: f32) {
        for s in &mut self.data {
            *s *= gain;
        }
    }

    /// Append the buffer as interleaved `L R L R ...` samples.
    pub fn interleave_into(&self, out: &mut Vec<f32>) {
        out.reserve(STEREO * self.frames);
        for (&l, &r) in self.left().iter().zip(self.right()) {
            out.push(l);
            out.push(r);
        }
    }
}
