//! Per-track sequencer state.

use alloc::boxed::Box;

use arrayvec::ArrayVec;
use sappy_ir::{AudioBuffer, PROGRAM_UNDEFINED};

use crate::loudness::LoudnessMeter;
use crate::reverb::Reverb;

/// Nesting limit of `PATT` calls.
pub const CALL_STACK_DEPTH: usize = 3;

/// Default range of the pitch bend wheel in semitones.
const DEFAULT_BEND_RANGE: u8 = 2;
const DEFAULT_LFO_SPEED: u8 = 22;

/// Target of the track LFO.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ModulationType {
    #[default]
    Pitch,
    Volume,
    Pan,
}

impl ModulationType {
    pub fn from_byte(value: u8) -> Self {
        match value {
            1 => ModulationType::Volume,
            2 => ModulationType::Pan,
            _ => ModulationType::Pitch,
        }
    }
}

/// Envelope values forced by extension commands for the current program.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AdsrOverride {
    pub attack: Option<u8>,
    pub decay: Option<u8>,
    pub sustain: Option<u8>,
    pub release: Option<u8>,
}

impl AdsrOverride {
    pub fn apply(&self, adsr: sappy_ir::Adsr) -> sappy_ir::Adsr {
        sappy_ir::Adsr {
            attack: self.attack.unwrap_or(adsr.attack),
            decay: self.decay.unwrap_or(adsr.decay),
            sustain: self.sustain.unwrap_or(adsr.sustain),
            release: self.release.unwrap_or(adsr.release),
        }
    }
}

pub struct Track {
    /// Byte offset of the next command.
    pub pos: usize,
    pub(crate) return_stack: ArrayVec<usize, CALL_STACK_DEPTH>,
    pub(crate) repeat_count: u8,
    /// Ticks until the next command is read.
    pub(crate) delay: u16,
    pub(crate) last_cmd: u8,
    pub(crate) last_key: u8,
    pub(crate) last_velocity: u8,
    pub(crate) last_gate: u8,

    pub(crate) lfo_speed: u8,
    pub(crate) lfo_phase: u8,
    pub(crate) lfo_delay: u8,
    pub(crate) lfo_delay_count: u8,
    pub(crate) mod_depth: u8,
    pub(crate) mod_type: ModulationType,
    pub(crate) mod_value: i8,

    pub(crate) volume: u8,
    pub(crate) pan: i8,
    pub(crate) bend: i8,
    pub(crate) bend_range: u8,
    pub(crate) tune: i8,
    pub(crate) key_shift: i8,
    pub(crate) priority: u8,
    pub(crate) program: u8,
    pub(crate) echo_volume: u8,
    pub(crate) echo_length: u8,
    pub(crate) adsr_override: AdsrOverride,

    pub(crate) running: bool,
    pub(crate) muted: bool,
    pub(crate) update_volume: bool,
    pub(crate) update_pitch: bool,

    pub(crate) buffer: AudioBuffer,
    pub(crate) reverb: Box<dyn Reverb>,
    pub(crate) meter: LoudnessMeter,
}

impl Track {
    pub fn new(pos: usize, reverb: Box<dyn Reverb>, frames: usize, meter: LoudnessMeter) -> Self {
        Self {
            pos,
            return_stack: ArrayVec::new(),
            repeat_count: 0,
            delay: 0,
            last_cmd: 0,
            last_key: 0,
            last_velocity: 0,
            last_gate: 0,
            lfo_speed: DEFAULT_LFO_SPEED,
            lfo_phase: 0,
            lfo_delay: 0,
            lfo_delay_count: 0,
            mod_depth: 0,
            mod_type: ModulationType::Pitch,
            mod_value: 0,
            volume: 0,
            pan: 0,
            bend: 0,
            bend_range: DEFAULT_BEND_RANGE,
            tune: 0,
            key_shift: 0,
            priority: 0,
            program: PROGRAM_UNDEFINED,
            echo_volume: 0,
            echo_length: 0,
            adsr_override: AdsrOverride::default(),
            running: true,
            muted: false,
            update_volume: true,
            update_pitch: true,
            buffer: AudioBuffer::new(frames),
            reverb,
            meter,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn call_depth(&self) -> usize {
        self.return_stack.len()
    }

    pub fn program(&self) -> u8 {
        self.program
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn pan(&self) -> i8 {
        self.pan
    }

    pub fn mod_depth(&self) -> u8 {
        self.mod_depth
    }

    pub fn lfo_value(&self) -> i8 {
        self.mod_value
    }

    pub fn buffer(&self) -> &AudioBuffer {
        &self.buffer
    }

    pub fn meter(&self) -> &LoudnessMeter {
        &self.meter
    }

    /// Left and right track volume after pan and volume/pan modulation.
    pub fn volume_pan(&self) -> (u8, u8) {
        let mut x = (self.volume as i32 * 64) >> 5;
        if self.mod_type == ModulationType::Volume {
            x = (x * (self.mod_value as i32 + 128)) >> 7;
        }
        let mut y = 2 * self.pan as i32;
        if self.mod_type == ModulationType::Pan {
            y += self.mod_value as i32;
        }
        let y = y.clamp(-128, 127);
        let right = ((y + 128) * x) >> 8;
        let left = ((127 - y) * x) >> 8;
        (left.clamp(0, 255) as u8, right.clamp(0, 255) as u8)
    }

    /// Pitch offset in 1/256 semitone.
    pub fn pitch(&self) -> i16 {
        let mut pitch = (self.tune as i32 + self.bend as i32 * self.bend_range as i32) * 4 + self.key_shift as i32 * 256;
        if self.mod_type == ModulationType::Pitch {
            pitch += 16 * self.mod_value as i32;
        }
        pitch.clamp(i16::MIN as i32, i16::MAX as i32) as i16
    }

    fn mark_modulation_dirty(&mut self) {
        if self.mod_type == ModulationType::Pitch {
            self.update_pitch = true;
        } else {
            self.update_volume = true;
        }
    }

    /// Zero the LFO output.
    pub(crate) fn reset_lfo_value(&mut self) {
        self.lfo_phase = 0;
        self.mod_value = 0;
        self.mark_modulation_dirty();
    }

    /// Restart the LFO delay for a new note.
    pub(crate) fn note_on_lfo(&mut self) {
        self.lfo_delay_count = self.lfo_delay;
        if self.lfo_delay != 0 {
            self.reset_lfo_value();
        }
    }

    /// Advance the LFO by one tick.
    pub(crate) fn tick_lfo(&mut self) {
        if self.lfo_speed == 0 || self.mod_depth == 0 {
            return;
        }
        if self.lfo_delay_count != 0 {
            self.lfo_delay_count -= 1;
            return;
        }
        self.lfo_phase = self.lfo_phase.wrapping_add(self.lfo_speed);
        let t = if self.lfo_phase.wrapping_sub(64) as i8 >= 0 {
            128 - self.lfo_phase as i32
        } else {
            self.lfo_phase as i8 as i32
        };
        let value = ((self.mod_depth as i32 * t) >> 6) as i8;
        if value != self.mod_value {
            self.mod_value = value;
            self.mark_modulation_dirty();
        }
    }

    /// Stop reading commands.
    pub(crate) fn stop(&mut self) {
        self.running = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reverb::PassthroughReverb;

    fn track() -> Track {
        Track::new(0, Box::new(PassthroughReverb::new(0.0)), 16, LoudnessMeter::new(48000, 20.0))
    }

    #[test]
    fn defaults_match_driver() {
        let t = track();
        assert_eq!(t.program, PROGRAM_UNDEFINED);
        assert_eq!(t.bend_range, 2);
        assert_eq!(t.lfo_speed, 22);
        assert_eq!(t.volume_pan(), (0, 0));
        assert!(t.is_running());
    }

    #[test]
    fn centered_volume_splits_evenly() {
        let mut t = track();
        t.volume = 127;
        // x = 254, right = 128 * 254 >> 8, left = 127 * 254 >> 8
        assert_eq!(t.volume_pan(), (126, 127));
        t.pan = 63;
        let (left, right) = t.volume_pan();
        assert_eq!(left, 0);
        assert_eq!(right, 252);
    }

    #[test]
    fn pitch_combines_tune_bend_and_key_shift() {
        let mut t = track();
        t.tune = 10;
        t.bend = -64;
        t.bend_range = 12;
        t.key_shift = 2;
        assert_eq!(t.pitch(), (10 - 64 * 12) * 4 + 512);
    }

    #[test]
    fn lfo_traces_triangle() {
        let mut t = track();
        t.mod_depth = 64;
        t.lfo_speed = 32;
        let mut values = [0i8; 8];
        for v in &mut values {
            t.tick_lfo();
            *v = t.mod_value;
        }
        assert_eq!(values, [32, 64, 32, 0, -32, -64, -32, 0]);
        assert!(t.update_pitch);
    }

    #[test]
    fn lfo_waits_for_delay() {
        let mut t = track();
        t.mod_depth = 64;
        t.lfo_speed = 32;
        t.lfo_delay = 2;
        t.tick_lfo();
        t.note_on_lfo();
        assert_eq!(t.mod_value, 0);
        t.tick_lfo();
        t.tick_lfo();
        assert_eq!(t.mod_value, 0);
        t.tick_lfo();
        assert_eq!(t.mod_value, 32);
    }

    #[test]
    fn volume_lfo_scales_volume() {
        let mut t = track();
        t.volume = 100;
        t.mod_type = ModulationType::Volume;
        let base = t.volume_pan();
        t.mod_value = -64;
        let (left, right) = t.volume_pan();
        assert!(left < base.0 && right < base.1);
    }
}
