//! Direct-sound channel playing a sample from the ROM.
//!
//! 8-bit PCM is read directly and DPCM one decoded block at a time. Synth
//! voices are generated and ignore the fixed-rate flag.

use alloc::boxed::Box;
use alloc::vec::Vec;

use sappy_ir::{
    decode_dpcm_block, Adsr, AudioBuffer, Note, Rom, SampleFormat, SampleInfo, VoiceType, DPCM_BLOCK_SAMPLES,
};

use super::synth::SynthOscillator;
use super::{channel_volume, Channel, MixContext};
use crate::envelope::{EnvState, PcmEnvelope};
use crate::frequency::pcm_frequency;
use crate::resampler::Resampler;

pub struct PcmChannel {
    note: Note,
    serial: u64,
    rom: Rom,
    sample: SampleInfo,
    fixed_rate: bool,
    env: PcmEnvelope,
    vol_left: u8,
    vol_right: u8,
    prev_left: u8,
    prev_right: u8,
    freq: f32,
    /// Next sample index to fetch.
    pos: usize,
    resampler: Box<dyn Resampler>,
    scratch: Vec<f32>,
    /// Index and samples of the last decoded DPCM block.
    dpcm_block: Option<(usize, [i8; DPCM_BLOCK_SAMPLES])>,
    synth: Option<SynthOscillator>,
}

impl PcmChannel {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        note: Note,
        serial: u64,
        rom: Rom,
        sample: SampleInfo,
        fixed_rate: bool,
        adsr: Adsr,
        resampler: Box<dyn Resampler>,
        interframes: u32,
        volume: (u8, u8),
        pitch: i16,
    ) -> Self {
        let env = PcmEnvelope::new(adsr, note.echo_volume, note.echo_length, interframes);
        let (vol_left, vol_right) = channel_volume(&note, volume.0, volume.1);
        Self {
            note,
            serial,
            rom,
            sample,
            fixed_rate,
            env,
            vol_left,
            vol_right,
            prev_left: vol_left,
            prev_right: vol_right,
            freq: pcm_frequency(sample.mid_c_freq, note.play_key, pitch),
            pos: 0,
            resampler,
            scratch: Vec::new(),
            dpcm_block: None,
            synth: match sample.format {
                SampleFormat::Synth(waveform) => Some(SynthOscillator::new(waveform)),
                _ => None,
            },
        }
    }

    pub fn envelope(&self) -> &PcmEnvelope {
        &self.env
    }

    pub fn frequency(&self) -> f32 {
        self.freq
    }
}

impl Channel for PcmChannel {
    fn voice_type(&self) -> VoiceType {
        VoiceType::Pcm
    }

    fn note(&self) -> &Note {
        &self.note
    }

    fn note_mut(&mut self) -> &mut Note {
        &mut self.note
    }

    fn serial(&self) -> u64 {
        self.serial
    }

    fn state(&self) -> EnvState {
        self.env.state()
    }

    fn is_released(&self) -> bool {
        self.env.is_released()
    }

    fn set_volume(&mut self, vol_left: u8, vol_right: u8) {
        if !self.env.is_released() {
            (self.vol_left, self.vol_right) = channel_volume(&self.note, vol_left, vol_right);
        }
    }

    fn set_pitch(&mut self, pitch: i16) {
        self.freq = pcm_frequency(self.sample.mid_c_freq, self.note.play_key, pitch);
    }

    fn release(&mut self) {
        self.env.release();
    }

    fn fast_release(&mut self) {
        self.env.fast_release();
    }

    fn kill(&mut self) {
        self.env.kill();
    }

    fn process(&mut self, out: &mut AudioBuffer, ctx: &MixContext) {
        self.env.step();
        if self.env.state() == EnvState::Dead {
            return;
        }

        let (level_from, level_to) = self.env.ramp();
        let scale = ctx.master_gain / 65536.0;
        let from = [
            self.prev_left as f32 * level_from * scale,
            self.prev_right as f32 * level_from * scale,
        ];
        let to = [
            self.vol_left as f32 * level_to * scale,
            self.vol_right as f32 * level_to * scale,
        ];
        self.prev_left = self.vol_left;
        self.prev_right = self.vol_right;

        self.scratch.clear();
        self.scratch.resize(out.frames(), 0.0);
        let running = match self.synth.as_mut() {
            Some(synth) => {
                let (sub_frame, interframes) = self.env.sub_frame();
                synth.render(&mut self.scratch, self.freq / ctx.sample_rate, sub_frame, interframes);
                true
            }
            None => {
                let rate = if self.fixed_rate { ctx.fixed_rate_hz } else { self.freq };
                match self.stream(rate / ctx.sample_rate) {
                    Some(running) => running,
                    None => return,
                }
            }
        };
        out.mix_mono_ramped(&self.scratch, from, to);

        if !running {
            log::debug!("channel {}: sample ended", self.serial);
            self.env.kill();
        }
    }
}

impl PcmChannel {
    /// Resample stored sample data into the scratch buffer. Returns whether
    /// the sample is still playing, or `None` if its data cannot be read.
    fn stream(&mut self, inc: f32) -> Option<bool> {
        let sample = &self.sample;
        let data = match self.rom.slice(sample.data_pos, sample.data_size()) {
            Ok(data) => data,
            Err(err) => {
                log::warn!("channel {}: {err}", self.serial);
                self.env.kill();
                return None;
            }
        };
        let pos = &mut self.pos;
        let cache = &mut self.dpcm_block;
        let mut fetch = |buf: &mut Vec<f32>, required: usize| -> bool {
            while buf.len() < required {
                if *pos >= sample.length {
                    if !sample.loop_enabled {
                        return false;
                    }
                    *pos = sample.loop_start;
                }
                let value = match sample.format {
                    SampleFormat::Dpcm => {
                        let (block, offset) = (*pos / DPCM_BLOCK_SAMPLES, *pos % DPCM_BLOCK_SAMPLES);
                        match cache {
                            Some((index, decoded)) if *index == block => decoded[offset],
                            _ => {
                                let decoded = decode_dpcm_block(data, block);
                                *cache = Some((block, decoded));
                                decoded[offset]
                            }
                        }
                    }
                    _ => data[*pos] as i8,
                };
                buf.push(value as f32 / 128.0);
                *pos += 1;
            }
            true
        };
        Some(self.resampler.process(&mut self.scratch, inc, &mut fetch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::sync::Arc;
    use alloc::vec;
    use sappy_ir::Gate;

    use crate::channel::tests::{context, note};
    use crate::config::ResamplerKind;
    use crate::resampler::{create_resampler, KernelTables};

    fn channel(data: &[i8], looped: bool, adsr: Adsr, gate: Gate) -> PcmChannel {
        let bytes: Vec<u8> = data.iter().map(|&s| s as u8).collect();
        let sample = SampleInfo {
            data_pos: 0,
            length: bytes.len(),
            loop_enabled: looped,
            loop_start: 0,
            mid_c_freq: 48000.0,
            format: SampleFormat::Pcm8,
        };
        with_sample(bytes, sample, adsr, gate)
    }

    fn with_sample(bytes: Vec<u8>, sample: SampleInfo, adsr: Adsr, gate: Gate) -> PcmChannel {
        let tables = Arc::new(KernelTables::new());
        PcmChannel::new(
            note(60, gate),
            1,
            Rom::new(bytes),
            sample,
            false,
            adsr,
            create_resampler(ResamplerKind::Nearest, &tables),
            4,
            (254, 254),
            0,
        )
    }

    #[test]
    fn looped_sample_keeps_playing() {
        let mut ch = channel(&[64; 16], true, Adsr::new(0, 0, 0xFF, 0), Gate::Tie);
        let ctx = context();
        let mut out = AudioBuffer::new(200);
        for _ in 0..10 {
            out.silence();
            ch.process(&mut out, &ctx);
        }
        assert_eq!(ch.state(), EnvState::Sustain);
        let expected = 0.5 * 250.0 * 255.0 / 65536.0;
        assert!(out.left().iter().all(|&s| (s - expected).abs() < 1e-4));
    }

    #[test]
    fn one_shot_sample_dies_at_end() {
        let mut ch = channel(&[64; 16], false, Adsr::new(0, 0, 0xFF, 0), Gate::Tie);
        let mut out = AudioBuffer::new(200);
        ch.process(&mut out, &context());
        assert_eq!(ch.state(), EnvState::Dead);
        assert!(out.left()[20..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn gate_expiry_releases() {
        let mut ch = channel(&[64; 16], true, Adsr::new(0, 0, 0xFF, 0), Gate::Ticks(2));
        assert!(ch.tick_note());
        assert!(!ch.tick_note());
        assert!(ch.is_released());
        assert!(!ch.tick_note());
    }

    #[test]
    fn volume_is_frozen_after_release() {
        let mut ch = channel(&[64; 16], true, Adsr::new(0, 0, 0xFF, 0x80), Gate::Tie);
        ch.release();
        ch.set_volume(0, 0);
        assert_eq!((ch.vol_left, ch.vol_right), (250, 252));
    }

    #[test]
    fn dpcm_sample_plays_decoded_blocks() {
        // Two blocks: a constant 32, then a constant -32.
        let mut bytes = vec![0u8; 2 * sappy_ir::DPCM_BLOCK_SIZE];
        bytes[0] = 32;
        bytes[sappy_ir::DPCM_BLOCK_SIZE] = (-32i8) as u8;
        let sample = SampleInfo {
            data_pos: 0,
            length: 2 * DPCM_BLOCK_SAMPLES,
            loop_enabled: false,
            loop_start: 0,
            mid_c_freq: 48000.0,
            format: SampleFormat::Dpcm,
        };
        let mut ch = with_sample(bytes, sample, Adsr::new(0, 0, 0xFF, 0), Gate::Tie);
        let mut out = AudioBuffer::new(200);
        ch.process(&mut out, &context());
        let left = out.left();
        assert!(left[10] > 0.0);
        assert!(left[100] < 0.0);
        assert!((left[10] + left[100]).abs() < 1e-6);
        assert!(left[150..].iter().all(|&s| s == 0.0));
        assert_eq!(ch.state(), EnvState::Dead);
    }

    #[test]
    fn synth_voice_plays_without_sample_data() {
        // Only the parameter bytes follow the header.
        let bytes = vec![0, 2, 0, 0, 0, 0, 0, 0];
        let sample = SampleInfo {
            data_pos: 0,
            length: 0,
            loop_enabled: false,
            loop_start: 0,
            mid_c_freq: 48000.0,
            format: SampleFormat::Synth(sappy_ir::SynthWaveform::Triangle),
        };
        let mut ch = with_sample(bytes, sample, Adsr::new(0, 0, 0xFF, 0), Gate::Tie);
        let ctx = context();
        let mut out = AudioBuffer::new(200);
        for _ in 0..4 {
            out.silence();
            ch.process(&mut out, &ctx);
        }
        assert_eq!(ch.state(), EnvState::Sustain);
        assert!(out.left().iter().any(|&s| s > 0.0) && out.left().iter().any(|&s| s < 0.0));
    }
}
