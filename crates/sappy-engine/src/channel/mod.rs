//! Sound channels: one playing note each.
//!
//! PCM channels stream sample data from the ROM, or generate it for synth
//! instruments. The three PSG variants
//! (square, wave, noise) synthesize a waveform and share the CGB envelope
//! through [`PsgChannel`].

mod noise;
mod pcm;
mod pools;
mod psg;
mod square;
mod synth;
mod wave;

use sappy_ir::{AudioBuffer, Gate, Note, TrackRef, VoiceType};

use crate::envelope::EnvState;

pub use noise::NoiseGenerator;
pub use pcm::PcmChannel;
pub use pools::{ChannelKey, ChannelPools};
pub use psg::{PsgChannel, Waveform};
pub use square::{SquareGenerator, Sweep};
pub use synth::SynthOscillator;
pub use wave::{quantize_wave_volume, WaveGenerator};

pub type SquareChannel = PsgChannel<SquareGenerator>;
pub type WaveChannel = PsgChannel<WaveGenerator>;
pub type NoiseChannel = PsgChannel<NoiseGenerator>;

/// Per-block rendering parameters shared by every channel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MixContext {
    pub sample_rate: f32,
    /// Render blocks per second.
    pub frames_per_second: f32,
    /// Direct-sound master volume (PSG channels ignore it).
    pub master_gain: f32,
    /// Playback rate of fixed-rate samples.
    pub fixed_rate_hz: f32,
}

/// Uniform capability set of every channel variant.
pub trait Channel: Send {
    fn voice_type(&self) -> VoiceType;

    /// The note this channel was spawned for.
    fn note(&self) -> &Note;

    fn note_mut(&mut self) -> &mut Note;

    /// Creation order; larger is newer.
    fn serial(&self) -> u64;

    fn state(&self) -> EnvState;

    /// Note-off or preemption received.
    fn is_released(&self) -> bool;

    /// Track volume after pan, as computed by the sequencer.
    fn set_volume(&mut self, vol_left: u8, vol_right: u8);

    /// Pitch offset in 1/256 semitone.
    fn set_pitch(&mut self, pitch: i16);

    fn release(&mut self);

    fn fast_release(&mut self);

    fn kill(&mut self);

    /// Render one block, adding into `out`.
    fn process(&mut self, out: &mut AudioBuffer, ctx: &MixContext);

    fn owner(&self) -> TrackRef {
        self.note().owner
    }

    /// Count the gate down by one tick, releasing on expiry. Returns whether
    /// the note is still held.
    fn tick_note(&mut self) -> bool {
        if self.is_released() {
            return false;
        }
        let note = self.note_mut();
        match note.gate {
            Gate::Tie => true,
            Gate::Ticks(ticks) => {
                let left = ticks.saturating_sub(1);
                note.gate = Gate::Ticks(left);
                if left == 0 {
                    self.release();
                    false
                } else {
                    true
                }
            }
        }
    }
}

/// Channel volumes from the track volume, note velocity and drum pan bias.
pub fn channel_volume(note: &Note, vol_left: u8, vol_right: u8) -> (u8, u8) {
    let bias = note.pan_bias as i32;
    let velocity = note.velocity as i32;
    let right = ((bias + 128) * velocity * vol_right as i32) >> 14;
    let left = ((127 - bias) * velocity * vol_left as i32) >> 14;
    (left.clamp(0, 255) as u8, right.clamp(0, 255) as u8)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn note(key: u8, gate: Gate) -> Note {
        Note {
            midi_key: key,
            play_key: key,
            velocity: 127,
            priority: 0,
            gate,
            owner: TrackRef::new(0, 0),
            pan_bias: 0,
            echo_volume: 0,
            echo_length: 0,
        }
    }

    pub(crate) fn context() -> MixContext {
        MixContext {
            sample_rate: 48000.0,
            frames_per_second: 240.0,
            master_gain: 1.0,
            fixed_rate_hz: 13379.0,
        }
    }

    #[test]
    fn full_velocity_passes_track_volume() {
        let n = note(60, Gate::Tie);
        assert_eq!(channel_volume(&n, 200, 100), (196, 99));
    }

    #[test]
    fn pan_bias_shifts_balance() {
        let mut n = note(60, Gate::Tie);
        n.pan_bias = 127;
        let (left, right) = channel_volume(&n, 200, 200);
        assert_eq!(left, 0);
        assert!(right > 200);
    }

    #[test]
    fn silent_velocity_is_silent() {
        let mut n = note(60, Gate::Tie);
        n.velocity = 0;
        assert_eq!(channel_volume(&n, 255, 255), (0, 0));
    }
}
