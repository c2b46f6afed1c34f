//! The public playback engine.

use alloc::sync::Arc;
use alloc::vec::Vec;

use sappy_ir::{AudioBuffer, PlayerTableInfo, Result, Rom, SongHeader, SongTableInfo, SoundMode, TrackRef};

use crate::channel::{Channel, ChannelPools, MixContext};
use crate::config::EngineConfig;
use crate::envelope::EnvState;
use crate::loudness::{LoudnessMeter, DEFAULT_LOWPASS_HZ};
use crate::mixer::Mixer;
use crate::player::Player;
use crate::resampler::KernelTables;
use crate::reverb::{create_reverb, intensity_from_byte};
use crate::sequence::{advance_player, Sequencer, MEMACC_MEMORY_SIZE};
use crate::snapshot::{EngineSnapshot, PlayerSnapshot, TrackSnapshot};
use crate::track::Track;

/// Sequencer, synthesizer and mixer for every music player of a game.
///
/// Each call to [`advance_one_frame`](Self::advance_one_frame) runs the
/// sequencer for one render block and renders
/// [`EngineConfig::samples_per_buffer`] frames into the master buffer.
pub struct PlaybackEngine {
    rom: Rom,
    song_table: SongTableInfo,
    sound_mode: SoundMode,
    config: EngineConfig,
    players: Vec<Player>,
    pools: ChannelPools,
    mixer: Mixer,
    /// `MEMACC` scratch memory, shared so songs on different players can
    /// signal each other.
    memory: [u8; MEMACC_MEMORY_SIZE],
}

impl PlaybackEngine {
    pub fn new(
        rom: Rom,
        song_table: SongTableInfo,
        player_table: &PlayerTableInfo,
        sound_mode: SoundMode,
        config: EngineConfig,
    ) -> Self {
        let tables = Arc::new(KernelTables::new());
        let pools = ChannelPools::new(&config, tables);
        let mixer = Mixer::new(config.samples_per_buffer(), config.sample_rate);
        let players = player_table.players.iter().map(|&info| Player::new(info)).collect();
        Self { rom, song_table, sound_mode, config, players, pools, mixer, memory: [0; MEMACC_MEMORY_SIZE] }
    }

    pub fn rom(&self) -> &Rom {
        &self.rom
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn sound_mode(&self) -> SoundMode {
        self.sound_mode
    }

    pub fn song_table(&self) -> SongTableInfo {
        self.song_table
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, index: usize) -> &Player {
        &self.players[index]
    }

    pub fn channels(&self) -> &ChannelPools {
        &self.pools
    }

    pub fn memory(&self) -> &[u8; MEMACC_MEMORY_SIZE] {
        &self.memory
    }

    fn mix_context(&self) -> MixContext {
        MixContext {
            sample_rate: self.config.sample_rate as f32,
            frames_per_second: self.config.frames_per_second() as f32,
            master_gain: self.sound_mode.master_gain(),
            fixed_rate_hz: self.sound_mode.fixed_rate_hz() as f32,
        }
    }

    /// Reverb byte in effect for a song whose header carries `song_reverb`.
    fn reverb_byte(&self, song_reverb: u8) -> u8 {
        match self.sound_mode.reverb_override() {
            Some(level) => level,
            None if song_reverb & 0x80 != 0 => song_reverb & 0x7F,
            None => 0,
        }
    }

    /// Sequence and render one block.
    pub fn advance_one_frame(&mut self) {
        let mut seq =
            Sequencer { rom: &self.rom, pools: &mut self.pools, config: &self.config, memory: &mut self.memory };
        for (index, player) in self.players.iter_mut().enumerate() {
            advance_player(&mut seq, player, index);
        }
        for player in self.players.iter_mut() {
            player.fade.update();
        }

        let ctx = self.mix_context();
        let dac_bits = self.config.dac_emulation.then_some(self.sound_mode.dac_bits);
        self.mixer.render(&mut self.players, &mut self.pools, &ctx, dac_bits);

        for (index, player) in self.players.iter_mut().enumerate() {
            if player.playing && player.fade.is_faded_out() {
                log::debug!("player {index}: faded out");
                player.playing = false;
                self.pools.kill_player(index);
            }
        }
    }

    /// Mixed output of the last block.
    pub fn master_buffer(&self) -> &AudioBuffer {
        self.mixer.master()
    }

    /// Output of one track in the last block, before fade and mute.
    pub fn track_buffer(&self, player: usize, track: usize) -> &AudioBuffer {
        self.players[player].tracks[track].buffer()
    }

    /// Start the song whose header is at `song_pos` on `player`.
    ///
    /// A player in priority mode ignores songs of lower priority than the
    /// one it is playing.
    pub fn start_song(&mut self, player: usize, song_pos: usize) -> Result<()> {
        let header = SongHeader::read(&self.rom, song_pos)?;
        let current = &self.players[player];
        if current.info.use_priority && current.playing && header.priority < current.priority {
            log::debug!(
                "player {player}: song at {song_pos:#x} (priority {}) refused, playing priority {}",
                header.priority,
                current.priority
            );
            return Ok(());
        }

        self.pools.kill_player(player);
        let intensity = intensity_from_byte(self.reverb_byte(header.reverb));
        let config = &self.config;
        let dma_buffers = self.sound_mode.dma_buffer_count();
        let frames = config.samples_per_buffer();
        self.players[player].load(&self.rom, &header, |pos| {
            let reverb = create_reverb(config.reverb_kind, intensity, config.sample_rate, dma_buffers);
            Track::new(pos, reverb, frames, LoudnessMeter::new(config.sample_rate, DEFAULT_LOWPASS_HZ))
        });
        log::debug!(
            "player {player}: song at {song_pos:#x}, {} tracks, reverb {intensity:.2}",
            self.players[player].tracks.len()
        );
        Ok(())
    }

    /// Start song `number` of the song table on the player it names.
    pub fn start_song_number(&mut self, number: usize) -> Result<()> {
        let entry = self.song_table.entry(&self.rom, number)?;
        let player = if entry.player < self.players.len() {
            entry.player
        } else {
            log::warn!("song {number} names player {}, using player 0", entry.player);
            0
        };
        self.start_song(player, entry.header_pos)
    }

    /// Pause `player`, releasing its notes.
    pub fn stop_song(&mut self, player: usize) {
        let p = &mut self.players[player];
        p.playing = false;
        for track in 0..p.tracks.len() {
            self.pools.release_track(TrackRef::new(player, track));
        }
    }

    /// Resume a stopped song from where it was stopped.
    pub fn continue_song(&mut self, player: usize) {
        let p = &mut self.players[player];
        if p.song_pos.is_some() && !p.all_tracks_stopped() && !p.fade.is_faded_out() {
            p.playing = true;
        }
    }

    pub fn fade_out(&mut self, player: usize, ms: u32) {
        let frames = self.config.ms_to_frames(ms);
        self.players[player].fade.start_out(frames);
    }

    pub fn fade_in(&mut self, player: usize, ms: u32) {
        let frames = self.config.ms_to_frames(ms);
        self.players[player].fade.start_in(frames);
    }

    /// Every player is idle or has finished its song and fade.
    pub fn has_ended(&self) -> bool {
        self.players.iter().all(Player::is_finished)
    }

    /// Change the sound mode. Master volume and the fixed sample rate apply
    /// from the next block; a forced reverb level also retunes the running
    /// songs.
    pub fn set_sound_mode(&mut self, mode: SoundMode) {
        self.sound_mode = mode;
        if let Some(level) = mode.reverb_override() {
            let intensity = intensity_from_byte(level);
            for track in self.players.iter_mut().flat_map(|p| p.tracks.iter_mut()) {
                track.reverb.set_intensity(intensity);
            }
        }
    }

    /// Scale the tempo of every player, from the next block on.
    pub fn set_speed_factor(&mut self, factor: f32) {
        self.config.speed_factor = factor;
    }

    pub fn set_track_muted(&mut self, player: usize, track: usize, muted: bool) {
        self.players[player].tracks[track].muted = muted;
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        let players = self
            .players
            .iter()
            .enumerate()
            .map(|(p, player)| {
                let mut tracks: Vec<TrackSnapshot> = player
                    .tracks
                    .iter()
                    .map(|t| TrackSnapshot {
                        pos: t.pos,
                        active_notes: 0,
                        program: t.program(),
                        volume: t.volume(),
                        pan: t.pan(),
                        pitch: t.pitch(),
                        mod_depth: t.mod_depth(),
                        lfo_value: t.lfo_value(),
                        call_depth: t.call_depth(),
                        running: t.is_running(),
                        muted: t.is_muted(),
                        loudness: t.meter().loudness(),
                    })
                    .collect();
                for channel in self.pools.iter() {
                    let owner = channel.owner();
                    let key = channel.note().midi_key;
                    if owner.player != p || key >= 128 || channel.is_released() || channel.state() == EnvState::Dead {
                        continue;
                    }
                    if let Some(track) = tracks.get_mut(owner.track) {
                        track.active_notes |= 1u128 << key;
                    }
                }
                PlayerSnapshot {
                    playing: player.playing,
                    song_ended: player.song_ended,
                    song_pos: player.song_pos,
                    bpm: player.bpm(),
                    loops: player.loops,
                    fade_gain: player.fade.gain(),
                    tracks,
                }
            })
            .collect();
        EngineSnapshot { players, master: self.mixer.loudness(), channels: self.pools.len() }
    }
}
