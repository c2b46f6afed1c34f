//! Read-only view of the engine state for displays.

use alloc::vec::Vec;

use crate::loudness::Loudness;

/// State of one track at the end of the last rendered block.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrackSnapshot {
    /// Byte offset of the next command.
    pub pos: usize,
    /// Bit `n` set while a held note with MIDI key `n` plays.
    pub active_notes: u128,
    pub program: u8,
    pub volume: u8,
    pub pan: i8,
    /// Pitch offset in 1/256 semitone.
    pub pitch: i16,
    pub mod_depth: u8,
    pub lfo_value: i8,
    pub call_depth: usize,
    pub running: bool,
    pub muted: bool,
    pub loudness: Loudness,
}

impl TrackSnapshot {
    pub fn is_note_active(&self, key: u8) -> bool {
        key < 128 && self.active_notes & (1u128 << key) != 0
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PlayerSnapshot {
    pub playing: bool,
    pub song_ended: bool,
    pub song_pos: Option<usize>,
    /// Tempo in beats per minute.
    pub bpm: u16,
    pub loops: u32,
    pub fade_gain: f32,
    pub tracks: Vec<TrackSnapshot>,
}

#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EngineSnapshot {
    pub players: Vec<PlayerSnapshot>,
    pub master: Loudness,
    /// Channels not yet pruned.
    pub channels: usize,
}

impl EngineSnapshot {
    /// Number of held notes across every track.
    pub fn active_note_count(&self) -> u32 {
        self.players
            .iter()
            .flat_map(|p| p.tracks.iter())
            .map(|t| t.active_notes.count_ones())
            .sum()
    }
}
