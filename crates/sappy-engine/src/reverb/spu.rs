//! Multi-tap IIR reverb modeled on a console sound processor.
//!
//! The work area is a single mono ring shared by both sides. Each sample
//! runs same-side and cross-side IIR reflections, four comb taps and two
//! all-pass stages, then advances one cursor. Register offsets are in units
//! of four samples at 22050 Hz and scaled to the output rate.

use alloc::vec;
use alloc::vec::Vec;

use sappy_ir::AudioBuffer;

use super::{for_each_frame, Reverb};
use crate::frame::Frame;

const SPU_RATE: f32 = 22050.0;

/// Work area size of the "Room" preset in bytes of 16-bit samples.
const ROOM_SIZE_BYTES: u32 = 0x26C0;

/// Register block in hardware order.
#[derive(Clone, Copy, Debug)]
struct Preset {
    d_apf1: u16,
    d_apf2: u16,
    v_iir: u16,
    v_comb: [u16; 4],
    v_wall: u16,
    v_apf1: u16,
    v_apf2: u16,
    m_same: [u16; 2],
    m_comb1: [u16; 2],
    m_comb2: [u16; 2],
    d_same: [u16; 2],
    m_diff: [u16; 2],
    m_comb3: [u16; 2],
    m_comb4: [u16; 2],
    d_diff: [u16; 2],
    m_apf1: [u16; 2],
    m_apf2: [u16; 2],
    v_in: [u16; 2],
}

const ROOM: Preset = Preset {
    d_apf1: 0x007D,
    d_apf2: 0x005B,
    v_iir: 0x6D80,
    v_comb: [0x54B8, 0xBED0, 0x0000, 0x0000],
    v_wall: 0xBA80,
    v_apf1: 0x5800,
    v_apf2: 0x5300,
    m_same: [0x04D6, 0x0333],
    m_comb1: [0x03F0, 0x0227],
    m_comb2: [0x0374, 0x01EF],
    d_same: [0x0334, 0x01B5],
    m_diff: [0x0000, 0x0000],
    m_comb3: [0x0000, 0x0000],
    m_comb4: [0x0000, 0x0000],
    d_diff: [0x0000, 0x0000],
    m_apf1: [0x01B4, 0x0136],
    m_apf2: [0x00B8, 0x005C],
    v_in: [0x8000, 0x8000],
};

fn volume(reg: u16) -> f32 {
    reg as i16 as f32 / 32768.0
}

/// Per-side tap offsets in output samples.
#[derive(Clone, Copy, Debug, Default)]
struct Side {
    same: usize,
    comb: [usize; 4],
    d_same: usize,
    diff: usize,
    d_diff: usize,
    apf1: usize,
    apf2: usize,
    v_in: f32,
}

pub struct SpuReverb {
    work: Vec<f32>,
    cursor: usize,
    sides: [Side; 2],
    d_apf1: usize,
    d_apf2: usize,
    v_iir: f32,
    v_comb: [f32; 4],
    v_wall: f32,
    v_apf1: f32,
    v_apf2: f32,
    intensity: f32,
}

impl SpuReverb {
    pub fn new(intensity: f32, sample_rate: u32) -> Self {
        let ratio = sample_rate as f32 / SPU_RATE;
        let offset = |reg: u16| libm::roundf(reg as f32 * 4.0 * ratio) as usize;
        let len = (libm::roundf((ROOM_SIZE_BYTES / 2) as f32 * ratio) as usize).max(1);
        let p = ROOM;
        let side = |i: usize| Side {
            same: offset(p.m_same[i]),
            comb: [
                offset(p.m_comb1[i]),
                offset(p.m_comb2[i]),
                offset(p.m_comb3[i]),
                offset(p.m_comb4[i]),
            ],
            d_same: offset(p.d_same[i]),
            diff: offset(p.m_diff[i]),
            // Cross-side reflections read the other side's delay tap.
            d_diff: offset(p.d_diff[1 - i]),
            apf1: offset(p.m_apf1[i]),
            apf2: offset(p.m_apf2[i]),
            v_in: volume(p.v_in[i]),
        };
        Self {
            work: vec![0.0; len],
            cursor: 0,
            sides: [side(0), side(1)],
            d_apf1: offset(p.d_apf1),
            d_apf2: offset(p.d_apf2),
            v_iir: volume(p.v_iir),
            v_comb: p.v_comb.map(volume),
            v_wall: volume(p.v_wall),
            v_apf1: volume(p.v_apf1),
            v_apf2: volume(p.v_apf2),
            intensity,
        }
    }

    /// Index of `offset` samples ahead of the cursor, minus `back`.
    fn at(&self, offset: usize, back: usize) -> usize {
        let len = self.work.len();
        (self.cursor + offset % len + len - back % len) % len
    }

    fn read(&self, offset: usize, back: usize) -> f32 {
        self.work[self.at(offset, back)]
    }

    fn write(&mut self, offset: usize, value: f32) {
        let i = self.at(offset, 0);
        self.work[i] = value;
    }

    /// IIR reflection into `dst` from the delay tap at `src`.
    fn reflect(&mut self, input: f32, dst: usize, src: usize) {
        let prev = self.read(dst, 1);
        let value = (input + self.read(src, 0) * self.v_wall - prev) * self.v_iir + prev;
        self.write(dst, value);
    }

    fn all_pass(&mut self, input: f32, dst: usize, delay: usize, gain: f32) -> f32 {
        let delayed = self.read(dst, delay);
        let stored = input - gain * delayed;
        self.write(dst, stored);
        stored * gain + delayed
    }

    fn step(&mut self, input: Frame) -> Frame {
        let inputs = [input.left, input.right];
        let mut wet = [0.0f32; 2];
        for (i, &x) in inputs.iter().enumerate() {
            let side = self.sides[i];
            let x = x * side.v_in;
            self.reflect(x, side.same, side.d_same);
            self.reflect(x, side.diff, side.d_diff);
        }
        for (i, out) in wet.iter_mut().enumerate() {
            let side = self.sides[i];
            let mut acc = 0.0;
            for (tap, gain) in side.comb.iter().zip(self.v_comb) {
                acc += self.read(*tap, 0) * gain;
            }
            let acc = self.all_pass(acc, side.apf1, self.d_apf1, self.v_apf1);
            *out = self.all_pass(acc, side.apf2, self.d_apf2, self.v_apf2);
        }
        self.cursor = (self.cursor + 1) % self.work.len();
        input + Frame::new(wet[0], wet[1]) * self.intensity
    }
}

impl Reverb for SpuReverb {
    fn process(&mut self, buffer: &mut AudioBuffer) {
        let muted = self.intensity == 0.0;
        for_each_frame(buffer, |input| {
            let out = self.step(input);
            if muted {
                input
            } else {
                out
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
