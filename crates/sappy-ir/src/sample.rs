//! Direct-sound sample headers.
//!
//! A sample is a 16-byte header followed by its data:
//!
//! | offset | size | field |
//! |--------|------|-------|
//! | 0 | 1 | encoding (0 = 8-bit PCM, 1 = Game Freak DPCM) |
//! | 3 | 1 | flags, bit 6 or 7 = looped |
//! | 4 | 4 | pitch at middle C, Hz × 1024 |
//! | 8 | 4 | loop start (samples) |
//! | 12 | 4 | length (samples) |
//!
//! A header with both loop start and length zero marks a Golden Sun synth
//! voice; its data then holds the synthesizer parameters.

use crate::error::{Error, Result};
use crate::rom::Rom;

/// Size of the header preceding the sample data.
pub const SAMPLE_HEADER_SIZE: usize = 16;

/// Samples decoded from one DPCM block.
pub const DPCM_BLOCK_SAMPLES: usize = 64;
/// Bytes of one DPCM block: an absolute first sample, then 63 four-bit
/// deltas with the second sample in the low nibble of byte 1.
pub const DPCM_BLOCK_SIZE: usize = 33;

const DPCM_DELTAS: [i8; 16] = [0, 1, 4, 9, 16, 25, 36, 49, -64, -49, -36, -25, -16, -9, -4, -1];

const SAMPLE_LOOP_MASK: u8 = 0xC0;

const ENCODING_PCM8: u8 = 0;
const ENCODING_DPCM: u8 = 1;

/// Parameter bytes read for a synth voice.
const SYNTH_PARAMS_SIZE: usize = 8;

/// Sweep of the Golden Sun pulse-width-modulated square.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PulseSweep {
    pub duty_base: u8,
    /// Added to the sweep position once per hardware frame.
    pub duty_step: u8,
    pub depth: u8,
    pub init_duty: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SynthWaveform {
    Pulse(PulseSweep),
    Saw,
    Triangle,
}

/// How the data after the header is stored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SampleFormat {
    /// Signed 8-bit PCM.
    #[default]
    Pcm8,
    /// Game Freak's block-wise delta encoding.
    Dpcm,
    /// Waveform generated by the driver instead of read.
    Synth(SynthWaveform),
}

impl SampleFormat {
    /// Bytes holding `length` samples.
    pub fn data_size(self, length: usize) -> usize {
        match self {
            SampleFormat::Pcm8 => length,
            SampleFormat::Dpcm => length.div_ceil(DPCM_BLOCK_SAMPLES) * DPCM_BLOCK_SIZE,
            SampleFormat::Synth(_) => SYNTH_PARAMS_SIZE,
        }
    }
}

/// Location and playback parameters of a sample inside the ROM.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SampleInfo {
    /// File offset of the first data byte.
    pub data_pos: usize,
    /// Number of samples.
    pub length: usize,
    pub loop_enabled: bool,
    pub loop_start: usize,
    /// Native rate of the sample when played at key 60.
    pub mid_c_freq: f32,
    pub format: SampleFormat,
}

impl SampleInfo {
    /// Parse the header at `pos` and validate that the data fits the image.
    pub fn read(rom: &Rom, pos: usize) -> Result<Self> {
        let encoding = rom.read_u8(pos)?;
        let flags = rom.read_u8(pos + 3)?;
        let freq = rom.read_u32(pos + 4)?;
        let loop_start = rom.read_u32(pos + 8)? as usize;
        let length = rom.read_u32(pos + 12)? as usize;
        let data_pos = pos + SAMPLE_HEADER_SIZE;

        let format = match encoding {
            ENCODING_PCM8 | ENCODING_DPCM if loop_start == 0 && length == 0 => {
                let params = rom.slice(data_pos, SYNTH_PARAMS_SIZE)?;
                let waveform = match params[1] {
                    0 => SynthWaveform::Pulse(PulseSweep {
                        duty_base: params[2],
                        duty_step: params[3],
                        depth: params[4],
                        init_duty: params[5],
                    }),
                    1 => SynthWaveform::Saw,
                    _ => SynthWaveform::Triangle,
                };
                SampleFormat::Synth(waveform)
            }
            ENCODING_PCM8 => SampleFormat::Pcm8,
            ENCODING_DPCM => SampleFormat::Dpcm,
            _ => return Err(Error::MalformedInstrument { pos, reason: "unsupported sample encoding" }),
        };
        rom.slice(data_pos, format.data_size(length))?;

        let synth = matches!(format, SampleFormat::Synth(_));
        let loop_enabled = !synth && flags & SAMPLE_LOOP_MASK != 0;
        if loop_enabled && loop_start >= length {
            return Err(Error::MalformedInstrument { pos, reason: "loop start beyond sample end" });
        }

        Ok(Self {
            data_pos,
            length,
            loop_enabled,
            loop_start,
            mid_c_freq: freq as f32 / 1024.0,
            format,
        })
    }

    /// Length of the looped section, or `None` for one-shot samples.
    pub fn loop_length(&self) -> Option<usize> {
        self.loop_enabled.then(|| self.length - self.loop_start)
    }

    /// Bytes of sample data following the header.
    pub fn data_size(&self) -> usize {
        self.format.data_size(self.length)
    }
}

/// Decode DPCM block `block` of `data`. A block past the end of `data`
/// decodes to silence.
pub fn decode_dpcm_block(data: &[u8], block: usize) -> [i8; DPCM_BLOCK_SAMPLES] {
    let mut out = [0i8; DPCM_BLOCK_SAMPLES];
    let start = block * DPCM_BLOCK_SIZE;
    let Some(bytes) = data.get(start..start + DPCM_BLOCK_SIZE) else {
        return out;
    };

    let mut acc = bytes[0] as i8;
    out[0] = acc;
    acc = acc.wrapping_add(DPCM_DELTAS[(bytes[1] & 0x0F) as usize]);
    out[1] = acc;
    for (pair, &byte) in out[2..].chunks_exact_mut(2).zip(&bytes[2..]) {
        acc = acc.wrapping_add(DPCM_DELTAS[(byte >> 4) as usize]);
        pair[0] = acc;
        acc = acc.wrapping_add(DPCM_DELTAS[(byte & 0x0F) as usize]);
        pair[1] = acc;
    }
    out
}
