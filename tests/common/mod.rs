//! In-memory ROM images for the integration tests.

#![allow(dead_code)]

use sappy_engine::{EngineConfig, PlaybackEngine};
use sappy_ir::{pos_to_pointer, PlayerTableInfo, Rom, SongTableInfo, SoundMode};

pub const HEADER_POS: usize = 0x10;
pub const VOICE_GROUP_POS: usize = 0x100;
pub const SAMPLE_POS: usize = 0x200;
pub const TRACKS_POS: usize = 0x400;

const SAMPLE_LEN: usize = 64;

pub const VOICE: u8 = 0xBD;
pub const VOL: u8 = 0xBE;
pub const FINE: u8 = 0xB1;
pub const GOTO: u8 = 0xB2;
pub const N04: u8 = 0xD3;
pub const C4: u8 = 60;
pub const E4: u8 = 64;
pub const G4: u8 = 67;

/// Wait command for `ticks` (exact lengths 0..=24 only).
pub fn wait(ticks: u8) -> u8 {
    assert!(ticks <= 24);
    0x80 + ticks
}

/// Square 2 voice at 50 % duty.
pub fn square2(adsr: [u8; 4]) -> [u8; 12] {
    let mut entry = [0u8; 12];
    entry[0] = 0x02;
    entry[1] = C4;
    entry[4..8].copy_from_slice(&2u32.to_le_bytes());
    entry[8..12].copy_from_slice(&adsr);
    entry
}

/// Direct sound voice playing the looped test sample.
pub fn direct_sound(adsr: [u8; 4]) -> [u8; 12] {
    let mut entry = [0u8; 12];
    entry[0] = 0x00;
    entry[1] = C4;
    entry[4..8].copy_from_slice(&pos_to_pointer(SAMPLE_POS).to_le_bytes());
    entry[8..12].copy_from_slice(&adsr);
    entry
}

/// Builds a one-song image: song table at 0, header at [`HEADER_POS`],
/// voices at [`VOICE_GROUP_POS`], a looped square-ish sample at
/// [`SAMPLE_POS`] and tracks from [`TRACKS_POS`].
pub struct RomBuilder {
    voices: Vec<[u8; 12]>,
    tracks: Vec<Vec<u8>>,
    reverb: u8,
    priority: u8,
}

impl RomBuilder {
    pub fn new() -> Self {
        Self { voices: Vec::new(), tracks: Vec::new(), reverb: 0, priority: 0 }
    }

    pub fn voice(mut self, entry: [u8; 12]) -> Self {
        self.voices.push(entry);
        self
    }

    /// Track bytecode. Track-relative `GOTO` targets are not rewritten.
    pub fn track(mut self, code: &[u8]) -> Self {
        self.tracks.push(code.to_vec());
        self
    }

    pub fn reverb(mut self, reverb: u8) -> Self {
        self.reverb = reverb;
        self
    }

    pub fn priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// File offset track `index` will be placed at.
    pub fn track_pos(&self, index: usize) -> usize {
        TRACKS_POS + self.tracks[..index].iter().map(Vec::len).sum::<usize>()
    }

    pub fn build(self) -> Rom {
        let code_len: usize = self.tracks.iter().map(Vec::len).sum();
        let mut bytes = vec![0u8; TRACKS_POS + code_len + 16];

        bytes[0..4].copy_from_slice(&pos_to_pointer(HEADER_POS).to_le_bytes());

        bytes[HEADER_POS] = self.tracks.len() as u8;
        bytes[HEADER_POS + 2] = self.priority;
        bytes[HEADER_POS + 3] = self.reverb;
        bytes[HEADER_POS + 4..HEADER_POS + 8].copy_from_slice(&pos_to_pointer(VOICE_GROUP_POS).to_le_bytes());
        for i in 0..self.tracks.len() {
            let at = HEADER_POS + 8 + i * 4;
            bytes[at..at + 4].copy_from_slice(&pos_to_pointer(self.track_pos(i)).to_le_bytes());
        }

        for (i, entry) in self.voices.iter().enumerate() {
            let at = VOICE_GROUP_POS + i * 12;
            bytes[at..at + 12].copy_from_slice(entry);
        }

        // Looped sample, 8 kHz at middle C.
        bytes[SAMPLE_POS + 3] = 0x40;
        bytes[SAMPLE_POS + 4..SAMPLE_POS + 8].copy_from_slice(&(8000u32 * 1024).to_le_bytes());
        bytes[SAMPLE_POS + 12..SAMPLE_POS + 16].copy_from_slice(&(SAMPLE_LEN as u32).to_le_bytes());
        for i in 0..SAMPLE_LEN {
            bytes[SAMPLE_POS + 16 + i] = if i < SAMPLE_LEN / 2 { 0x40 } else { 0xC0 };
        }

        let mut at = TRACKS_POS;
        for code in &self.tracks {
            bytes[at..at + code.len()].copy_from_slice(code);
            at += code.len();
        }
        Rom::new(bytes)
    }
}

impl Default for RomBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// One block per sequencer tick.
pub fn tick_config() -> EngineConfig {
    EngineConfig { interframes: 1, ..EngineConfig::default() }
}

/// Engine with song 0 started.
pub fn start(rom: Rom, config: EngineConfig) -> PlaybackEngine {
    let mut engine =
        PlaybackEngine::new(rom, SongTableInfo::new(0, 1), &PlayerTableInfo::default(), SoundMode::default(), config);
    engine.start_song_number(0).unwrap();
    engine
}

pub fn energy(samples: &[f32]) -> f32 {
    samples.iter().map(|s| s * s).sum()
}
