//! Song table, song header and player table types.

use alloc::vec;
use alloc::vec::Vec;

use crate::error::{Error, Result};
use crate::rom::Rom;

/// Size of one song table entry: header pointer, player index, unused.
pub const SONG_ENTRY_SIZE: usize = 8;

/// Default number of tracks a player may drive.
pub const DEFAULT_TRACK_LIMIT: usize = 16;

/// Location of the song table, as found by an external scanner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SongTableInfo {
    pub pos: usize,
    pub count: usize,
}

/// One entry of the song table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SongEntry {
    pub header_pos: usize,
    pub player: usize,
}

impl SongTableInfo {
    pub fn new(pos: usize, count: usize) -> Self {
        Self { pos, count }
    }

    /// Read entry `index` of the table.
    pub fn entry(&self, rom: &Rom, index: usize) -> Result<SongEntry> {
        if index >= self.count {
            return Err(Error::InvalidSongIndex { index, count: self.count });
        }
        let pos = self.pos + index * SONG_ENTRY_SIZE;
        Ok(SongEntry {
            header_pos: rom.read_agb_ptr(pos)?,
            player: rom.read_u16(pos + 4)? as usize,
        })
    }
}

/// Per-player limits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlayerInfo {
    pub track_limit: usize,
    /// Refuse songs of lower priority than the one playing.
    pub use_priority: bool,
}

impl Default for PlayerInfo {
    fn default() -> Self {
        Self { track_limit: DEFAULT_TRACK_LIMIT, use_priority: false }
    }
}

/// The game's music player table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlayerTableInfo {
    pub players: Vec<PlayerInfo>,
}

impl Default for PlayerTableInfo {
    fn default() -> Self {
        Self { players: vec![PlayerInfo::default(); 4] }
    }
}

impl PlayerTableInfo {
    pub fn new(players: Vec<PlayerInfo>) -> Self {
        Self { players }
    }
}

/// Header shared by every track of a song.
///
/// Layout: track count, block count, priority, reverb, voice-group pointer,
/// then one pointer per track.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SongHeader {
    pub pos: usize,
    pub blocks: u8,
    pub priority: u8,
    pub reverb: u8,
    pub voice_group: usize,
    pub tracks: Vec<usize>,
}

impl SongHeader {
    pub fn read(rom: &Rom, pos: usize) -> Result<Self> {
        let track_count = rom.read_u8(pos)? as usize;
        let tracks = (0..track_count)
            .map(|i| rom.read_agb_ptr(pos + 8 + 4 * i))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            pos,
            blocks: rom.read_u8(pos + 1)?,
            priority: rom.read_u8(pos + 2)?,
            reverb: rom.read_u8(pos + 3)?,
            voice_group: if track_count == 0 { 0 } else { rom.read_agb_ptr(pos + 4)? },
            tracks,
        })
    }
}
