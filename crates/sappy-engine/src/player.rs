//! Music players: the tracks of one song sharing tempo, voices and fade.

use alloc::vec::Vec;

use sappy_ir::{PlayerInfo, Rom, SongHeader, VoiceGroup};

use crate::fade::FadeController;
use crate::track::Track;

/// Tempo in driver units before the first `TEMPO` command (75 bpm × 2).
pub const DEFAULT_TEMPO: u16 = 150;

pub struct Player {
    pub(crate) info: PlayerInfo,
    pub(crate) tracks: Vec<Track>,
    pub(crate) song_pos: Option<usize>,
    pub(crate) bank: Option<VoiceGroup>,
    pub(crate) tempo: u16,
    pub(crate) tempo_acc: u32,
    pub(crate) priority: u8,
    pub(crate) reverb: u8,
    pub(crate) playing: bool,
    pub(crate) song_ended: bool,
    /// Times track 0 has jumped back with `GOTO`.
    pub(crate) loops: u32,
    pub(crate) fade: FadeController,
}

impl Player {
    pub fn new(info: PlayerInfo) -> Self {
        Self {
            info,
            tracks: Vec::new(),
            song_pos: None,
            bank: None,
            tempo: DEFAULT_TEMPO,
            tempo_acc: 0,
            priority: 0,
            reverb: 0,
            playing: false,
            song_ended: false,
            loops: 0,
            fade: FadeController::new(),
        }
    }

    /// Reset to the start of `header`. Tracks past the player's limit are
    /// ignored.
    pub(crate) fn load(&mut self, rom: &Rom, header: &SongHeader, mut make_track: impl FnMut(usize) -> Track) {
        let count = header.tracks.len().min(self.info.track_limit);
        if count < header.tracks.len() {
            log::warn!(
                "song at {:#x} has {} tracks, player limit is {}",
                header.pos,
                header.tracks.len(),
                self.info.track_limit
            );
        }
        self.tracks = header.tracks[..count].iter().map(|&pos| make_track(pos)).collect();
        self.song_pos = Some(header.pos);
        self.bank = Some(VoiceGroup::new(rom.clone(), header.voice_group));
        self.tempo = DEFAULT_TEMPO;
        self.tempo_acc = 0;
        self.priority = header.priority;
        self.reverb = header.reverb;
        self.playing = !self.tracks.is_empty();
        self.song_ended = self.tracks.is_empty();
        self.loops = 0;
        self.fade.reset();
    }

    pub fn info(&self) -> PlayerInfo {
        self.info
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track(&self, index: usize) -> &Track {
        &self.tracks[index]
    }

    pub fn song_pos(&self) -> Option<usize> {
        self.song_pos
    }

    /// Current tempo in beats per minute.
    pub fn bpm(&self) -> u16 {
        self.tempo / 2
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn song_ended(&self) -> bool {
        self.song_ended
    }

    pub fn loops(&self) -> u32 {
        self.loops
    }

    pub fn fade(&self) -> &FadeController {
        &self.fade
    }

    /// Nothing left to render for this player.
    pub fn is_finished(&self) -> bool {
        !self.playing || (self.song_ended && self.fade.is_done())
    }

    pub(crate) fn all_tracks_stopped(&self) -> bool {
        self.tracks.iter().all(|t| !t.running)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::boxed::Box;
    use alloc::vec;

    use crate::loudness::LoudnessMeter;
    use crate::reverb::PassthroughReverb;

    fn make_track(pos: usize) -> Track {
        Track::new(pos, Box::new(PassthroughReverb::new(0.0)), 8, LoudnessMeter::new(48000, 20.0))
    }

    fn header(tracks: usize) -> SongHeader {
        SongHeader {
            pos: 0x100,
            blocks: 0,
            priority: 3,
            reverb: 0,
            voice_group: 0x200,
            tracks: (0..tracks).map(|i| 0x300 + i * 0x10).collect(),
        }
    }

    #[test]
    fn load_resets_state() {
        let rom = Rom::new(vec![0u8; 16]);
        let mut player = Player::new(PlayerInfo::default());
        player.loops = 3;
        player.tempo = 300;
        player.load(&rom, &header(2), make_track);
        assert!(player.is_playing());
        assert!(!player.song_ended());
        assert_eq!(player.tracks().len(), 2);
        assert_eq!(player.track(1).pos, 0x310);
        assert_eq!(player.bpm(), 75);
        assert_eq!(player.loops(), 0);
        assert_eq!(player.priority(), 3);
    }

    #[test]
    fn tracks_beyond_limit_are_dropped() {
        let rom = Rom::new(vec![0u8; 16]);
        let mut player = Player::new(PlayerInfo { track_limit: 1, use_priority: false });
        player.load(&rom, &header(3), make_track);
        assert_eq!(player.tracks().len(), 1);
    }

    #[test]
    fn empty_song_is_finished_immediately() {
        let rom = Rom::new(vec![0u8; 16]);
        let mut player = Player::new(PlayerInfo::default());
        player.load(&rom, &header(0), make_track);
        assert!(player.is_finished());
    }
}
