//! Shared shell of the square, wave and noise channels.

use alloc::boxed::Box;
use alloc::vec::Vec;

use sappy_ir::{Adsr, AudioBuffer, Note, VoiceType};

use super::{channel_volume, Channel, MixContext};
use crate::envelope::{EnvState, PsgEnvelope, VolumeFade};
use crate::resampler::Resampler;

/// Tone source of a PSG channel.
pub trait Waveform: Send {
    /// Render with stairstep envelope interpolation.
    const STAIRSTEP: bool = false;

    fn voice_type(&self) -> VoiceType;

    /// Retune for `key` with the track's pitch offset.
    fn set_pitch(&mut self, key: u8, pitch: i16);

    /// Input samples consumed per output sample.
    fn phase_inc(&self, sample_rate: f32) -> f32;

    /// Append raw samples until `buf` holds `required`.
    fn fetch(&mut self, buf: &mut Vec<f32>, required: usize);

    /// Adjust the envelope gains to what the hardware can output.
    fn shape(&self, fade: VolumeFade) -> VolumeFade {
        fade
    }

    /// Hook run after every rendered block. Returning `false` silences the
    /// channel for good.
    fn end_block(&mut self, _ctx: &MixContext) -> bool {
        true
    }
}

/// A PSG channel: CGB envelope plus a waveform generator.
pub struct PsgChannel<W: Waveform> {
    note: Note,
    serial: u64,
    env: PsgEnvelope,
    waveform: W,
    resampler: Box<dyn Resampler>,
    scratch: Vec<f32>,
}

impl<W: Waveform> PsgChannel<W> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        note: Note,
        serial: u64,
        adsr: Adsr,
        mut waveform: W,
        resampler: Box<dyn Resampler>,
        interframes: u32,
        sustain_bug: bool,
        volume: (u8, u8),
        pitch: i16,
    ) -> Self {
        let env = PsgEnvelope::new(adsr, note.echo_volume, note.echo_length, interframes, sustain_bug, W::STAIRSTEP);
        waveform.set_pitch(note.play_key, pitch);
        let mut channel = Self { note, serial, env, waveform, resampler, scratch: Vec::new() };
        channel.set_volume(volume.0, volume.1);
        channel
    }

    pub fn waveform(&self) -> &W {
        &self.waveform
    }

    pub fn envelope(&self) -> &PsgEnvelope {
        &self.env
    }
}

impl<W: Waveform> Channel for PsgChannel<W> {
    fn voice_type(&self) -> VoiceType {
        self.waveform.voice_type()
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
        if self.env.is_released() {
            return;
        }
        let (left, right) = channel_volume(&self.note, vol_left, vol_right);
        self.env.set_volume(left, right);
    }

    fn set_pitch(&mut self, pitch: i16) {
        if !self.env.is_released() {
            self.waveform.set_pitch(self.note.play_key, pitch);
        }
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
        let fade = self.waveform.shape(self.env.fade());

        self.scratch.clear();
        self.scratch.resize(out.frames(), 0.0);
        let inc = self.waveform.phase_inc(ctx.sample_rate);
        let waveform = &mut self.waveform;
        self.resampler.process(&mut self.scratch, inc, &mut |buf: &mut Vec<f32>, required: usize| {
            waveform.fetch(buf, required);
            true
        });
        out.mix_mono_ramped(&self.scratch, fade.from(), fade.to());

        if !self.waveform.end_block(ctx) {
            log::debug!("channel {} silenced by its generator", self.serial);
            self.env.kill();
        }
    }
}
