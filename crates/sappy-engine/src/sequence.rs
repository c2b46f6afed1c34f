//! Bytecode interpreter driving every track of a player.
//!
//! A player advances once per render block. Its tempo accumulator decides
//! how many sequencer ticks that block gets; each tick counts note gates
//! down, reads commands until a wait, steps the LFO and pushes changed
//! volume and pitch to the track's channels.

use core::fmt::Display;

use sappy_ir::{Gate, InstrumentBank, Note, Result, Rom, TrackRef};

use crate::channel::{Channel, ChannelPools};
use crate::config::EngineConfig;
use crate::player::{Player, DEFAULT_TEMPO};
use crate::track::{ModulationType, Track};

/// Tick lengths of the wait commands 0x80..=0xB0 and the note commands
/// 0xCF..=0xFF.
pub const CLOCK_TABLE: [u8; 49] = [
    0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24, 28, 30, 32, 36,
    40, 42, 44, 48, 52, 54, 56, 60, 64, 66, 68, 72, 76, 78, 80, 84, 88, 90, 92, 96,
];

/// Length of the fade started once every track has finished.
pub const FINISH_FADE_MS: u32 = 1000;

const WAIT_FIRST: u8 = 0x80;
const FINE: u8 = 0xB1;
const GOTO: u8 = 0xB2;
const PATT: u8 = 0xB3;
const PEND: u8 = 0xB4;
const REPT: u8 = 0xB5;
const MEMACC: u8 = 0xB9;
const PRIO: u8 = 0xBA;
const TEMPO: u8 = 0xBB;
const KEYSH: u8 = 0xBC;
const VOICE: u8 = 0xBD;
const VOL: u8 = 0xBE;
const PAN: u8 = 0xBF;
const BEND: u8 = 0xC0;
const BENDR: u8 = 0xC1;
const LFOS: u8 = 0xC2;
const LFODL: u8 = 0xC3;
const MOD: u8 = 0xC4;
const MODT: u8 = 0xC5;
const TUNE: u8 = 0xC8;
const PORT: u8 = 0xCC;
const XCMD: u8 = 0xCD;
const EOT: u8 = 0xCE;
const TIE: u8 = 0xCF;

const XWAVE: u8 = 0x01;
const XTYPE: u8 = 0x02;
const XATTA: u8 = 0x04;
const XDECA: u8 = 0x05;
const XSUST: u8 = 0x06;
const XRELA: u8 = 0x07;
const XIECV: u8 = 0x08;
const XIECL: u8 = 0x09;
const XLENG: u8 = 0x0A;
const XSWEE: u8 = 0x0B;
const XWAIT: u8 = 0x0C;
const XSOFF: u8 = 0x0D;

/// First command remembered for running status.
const RUNNING_STATUS_FIRST: u8 = VOICE;
/// Offset between a pan-like argument and its signed value.
const CENTER: i8 = 0x40;
/// Commands a track may execute in one tick before it is considered stuck
/// in a loop without waits.
const MAX_COMMANDS_PER_TICK: usize = 4096;

/// Size of the scratch memory addressed by `MEMACC`, shared by all players.
pub const MEMACC_MEMORY_SIZE: usize = 256;

/// Borrowed engine state the sequencer writes to.
pub(crate) struct Sequencer<'a> {
    pub rom: &'a Rom,
    pub pools: &'a mut ChannelPools,
    pub config: &'a EngineConfig,
    pub memory: &'a mut [u8; MEMACC_MEMORY_SIZE],
}

/// Run the tempo loop of one player for one render block.
///
/// The player's tempo, scaled by the speed factor, is added to its
/// accumulator first; a tick runs for every full frame's worth it holds.
pub(crate) fn advance_player(seq: &mut Sequencer<'_>, player: &mut Player, index: usize) {
    if !player.playing {
        return;
    }
    let tick_cost = DEFAULT_TEMPO as u32 * seq.config.interframes.max(1);
    let step = (player.tempo as f32 * seq.config.speed_factor.max(0.0)) as u32;
    player.tempo_acc = player.tempo_acc.saturating_add(step);
    while player.tempo_acc >= tick_cost {
        tick(seq, player, index);
        player.tempo_acc -= tick_cost;
    }
}

/// One sequencer tick for every running track of `player`.
///
/// A track whose commands cannot be read from the ROM is ended on its own;
/// the other tracks keep playing.
pub(crate) fn tick(seq: &mut Sequencer<'_>, player: &mut Player, index: usize) {
    for t in 0..player.tracks.len() {
        if !player.tracks[t].running {
            continue;
        }
        let owner = TrackRef::new(index, t);
        seq.pools.track_mut(owner).for_each(|c| {
            c.tick_note();
        });

        let mut executed = 0;
        while player.tracks[t].running && player.tracks[t].delay == 0 {
            if let Err(err) = execute_command(seq, player, owner) {
                end_track(seq.pools, &mut player.tracks[t], owner, err);
                break;
            }
            executed += 1;
            if executed == MAX_COMMANDS_PER_TICK {
                end_track(seq.pools, &mut player.tracks[t], owner, "no wait command in loop");
            }
        }

        let track = &mut player.tracks[t];
        if !track.running {
            continue;
        }
        track.delay -= 1;
        track.tick_lfo();
        push_volume_pitch(seq.pools, track, owner);
    }

    if !player.song_ended && player.all_tracks_stopped() {
        log::debug!("player {index}: every track finished");
        player.song_ended = true;
        player.fade.start_out(seq.config.ms_to_frames(FINISH_FADE_MS));
    }
}

/// Send changed volume and pitch to the channels of `track`.
fn push_volume_pitch(pools: &mut ChannelPools, track: &mut Track, owner: TrackRef) {
    if track.update_volume {
        let (left, right) = track.volume_pan();
        pools.track_mut(owner).for_each(|c| c.set_volume(left, right));
        track.update_volume = false;
    }
    if track.update_pitch {
        let pitch = track.pitch();
        pools.track_mut(owner).for_each(|c| c.set_pitch(pitch));
        track.update_pitch = false;
    }
}

fn read_arg(rom: &Rom, track: &mut Track) -> Result<u8> {
    let value = rom.read_u8(track.pos)?;
    track.pos += 1;
    Ok(value)
}

/// Read an optional note argument, present only if below 0x80.
fn read_optional(rom: &Rom, track: &mut Track) -> Result<Option<u8>> {
    let value = rom.read_u8(track.pos)?;
    if value < 0x80 {
        track.pos += 1;
        Ok(Some(value))
    } else {
        Ok(None)
    }
}

fn jump(rom: &Rom, track: &mut Track) -> Result<()> {
    track.pos = rom.read_agb_ptr(track.pos)?;
    Ok(())
}

/// Stop a track that hit something it cannot play.
fn end_track(pools: &mut ChannelPools, track: &mut Track, owner: TrackRef, reason: impl Display) {
    log::warn!("track {}.{} at {:#x}: {reason}", owner.player, owner.track, track.pos);
    finish_track(pools, track, owner);
}

/// Release every note of `track` and stop it, as `FINE` does.
fn finish_track(pools: &mut ChannelPools, track: &mut Track, owner: TrackRef) {
    pools.release_track(owner);
    track.stop();
}

fn signed_center(value: u8) -> i8 {
    (value as i8).wrapping_sub(CENTER)
}

/// Decode and execute the command at the track cursor.
fn execute_command(seq: &mut Sequencer<'_>, player: &mut Player, owner: TrackRef) -> Result<()> {
    let Player { tracks, bank, tempo, priority, song_ended, loops, fade, .. } = player;
    let rom = seq.rom;
    let track = &mut tracks[owner.track];

    let mut cmd = rom.read_u8(track.pos)?;
    if cmd < WAIT_FIRST {
        if track.last_cmd < RUNNING_STATUS_FIRST {
            end_track(seq.pools, track, owner, "running status without a previous command");
            return Ok(());
        }
        cmd = track.last_cmd;
    } else {
        track.pos += 1;
        if cmd >= RUNNING_STATUS_FIRST {
            track.last_cmd = cmd;
        }
    }
    log::trace!("track {}.{} cmd {cmd:#04x}", owner.player, owner.track);

    match cmd {
        WAIT_FIRST..=0xB0 => track.delay = CLOCK_TABLE[(cmd - WAIT_FIRST) as usize] as u16,
        FINE => {
            log::debug!("track {}.{} finished", owner.player, owner.track);
            finish_track(seq.pools, track, owner);
        }
        GOTO => {
            if owner.track == 0 {
                if let Some(max) = seq.config.max_loops {
                    if *loops >= max && !*song_ended {
                        log::debug!("player {}: loop limit {max} reached", owner.player);
                        *song_ended = true;
                        fade.start_out(seq.config.ms_to_frames(seq.config.fade_out_ms));
                    }
                }
                *loops += 1;
            }
            jump(rom, track)?;
        }
        PATT => {
            if track.return_stack.is_full() {
                end_track(seq.pools, track, owner, "pattern call stack overflow");
            } else {
                track.return_stack.push(track.pos + 4);
                jump(rom, track)?;
            }
        }
        PEND => {
            if let Some(pos) = track.return_stack.pop() {
                track.pos = pos;
            }
        }
        REPT => {
            let count = read_arg(rom, track)?;
            if count == 0 {
                log::debug!("track {}.{} finished on an empty repeat", owner.player, owner.track);
                finish_track(seq.pools, track, owner);
            } else {
                track.repeat_count += 1;
                if track.repeat_count < count {
                    jump(rom, track)?;
                } else {
                    track.repeat_count = 0;
                    track.pos += 4;
                }
            }
        }
        MEMACC => {
            let memory = &mut *seq.memory;
            let op = read_arg(rom, track)?;
            let addr = read_arg(rom, track)? as usize;
            let data = read_arg(rom, track)?;
            let indirect = memory[data as usize];
            let value = memory[addr];
            let branch = match op {
                0 => {
                    memory[addr] = data;
                    None
                }
                1 => {
                    memory[addr] = value.wrapping_add(data);
                    None
                }
                2 => {
                    memory[addr] = value.wrapping_sub(data);
                    None
                }
                3 => {
                    memory[addr] = indirect;
                    None
                }
                4 => {
                    memory[addr] = value.wrapping_add(indirect);
                    None
                }
                5 => {
                    memory[addr] = value.wrapping_sub(indirect);
                    None
                }
                6..=11 => Some(compare(op - 6, value, data)),
                12..=17 => Some(compare(op - 12, value, indirect)),
                _ => None,
            };
            match branch {
                Some(true) => jump(rom, track)?,
                Some(false) => track.pos += 4,
                None => {}
            }
        }
        PRIO => track.priority = read_arg(rom, track)?,
        TEMPO => *tempo = read_arg(rom, track)? as u16 * 2,
        KEYSH => track.key_shift = read_arg(rom, track)? as i8,
        VOICE => {
            track.program = read_arg(rom, track)?;
            track.adsr_override = Default::default();
        }
        VOL => {
            track.volume = read_arg(rom, track)?;
            track.update_volume = true;
        }
        PAN => {
            track.pan = signed_center(read_arg(rom, track)?);
            track.update_volume = true;
        }
        BEND => {
            track.bend = signed_center(read_arg(rom, track)?);
            track.update_pitch = true;
        }
        BENDR => {
            track.bend_range = read_arg(rom, track)?;
            track.update_pitch = true;
        }
        LFOS => {
            track.lfo_speed = read_arg(rom, track)?;
            if track.lfo_speed == 0 {
                track.reset_lfo_value();
            }
        }
        LFODL => {
            track.lfo_delay = read_arg(rom, track)?;
            track.lfo_delay_count = track.lfo_delay;
        }
        MOD => {
            track.mod_depth = read_arg(rom, track)?;
            if track.mod_depth == 0 {
                track.reset_lfo_value();
            }
        }
        MODT => {
            let mod_type = ModulationType::from_byte(read_arg(rom, track)?);
            if mod_type != track.mod_type {
                track.mod_type = mod_type;
                track.update_volume = true;
                track.update_pitch = true;
            }
        }
        TUNE => {
            track.tune = signed_center(read_arg(rom, track)?);
            track.update_pitch = true;
        }
        PORT => track.pos += 2,
        XCMD => extension_command(seq, track, owner)?,
        EOT => {
            let key = match read_optional(rom, track)? {
                Some(key) => {
                    track.last_key = key;
                    key
                }
                None => track.last_key,
            };
            seq.pools.release_newest(owner, key);
        }
        TIE..=0xFF => {
            track.last_gate = CLOCK_TABLE[(cmd - TIE) as usize];
            if let Some(key) = read_optional(rom, track)? {
                track.last_key = key;
                if let Some(velocity) = read_optional(rom, track)? {
                    track.last_velocity = velocity;
                    if let Some(extra) = read_optional(rom, track)? {
                        track.last_gate += extra;
                    }
                }
            }
            let gate = if cmd == TIE { Gate::Tie } else { Gate::from_ticks(track.last_gate) };
            let bank = bank.as_ref().map(|b| b as &dyn InstrumentBank);
            dispatch_note(seq, bank, *priority, track, owner, gate);
        }
        _ => end_track(seq.pools, track, owner, "unknown command"),
    }
    Ok(())
}

/// `MEMACC` comparisons in opcode order.
fn compare(kind: u8, lhs: u8, rhs: u8) -> bool {
    match kind {
        0 => lhs == rhs,
        1 => lhs != rhs,
        2 => lhs > rhs,
        3 => lhs >= rhs,
        4 => lhs <= rhs,
        _ => lhs < rhs,
    }
}

/// `XCMD` sub-commands. The envelope overrides, pseudo-echo and long wait
/// take effect; the other known ones are skipped with their arguments.
fn extension_command(seq: &mut Sequencer<'_>, track: &mut Track, owner: TrackRef) -> Result<()> {
    let rom = seq.rom;
    let sub = read_arg(rom, track)?;
    match sub {
        XWAVE | XSOFF => track.pos += 4,
        XTYPE | XLENG | XSWEE => track.pos += 1,
        XATTA => track.adsr_override.attack = Some(read_arg(rom, track)?),
        XDECA => track.adsr_override.decay = Some(read_arg(rom, track)?),
        XSUST => track.adsr_override.sustain = Some(read_arg(rom, track)?),
        XRELA => track.adsr_override.release = Some(read_arg(rom, track)?),
        XIECV => track.echo_volume = read_arg(rom, track)?,
        XIECL => track.echo_length = read_arg(rom, track)?,
        XWAIT => {
            track.delay = rom.read_u16(track.pos)?;
            track.pos += 2;
        }
        _ => end_track(seq.pools, track, owner, format_args!("unknown extension command {sub:#04x}")),
    }
    Ok(())
}

/// Start a note on `track` with the instrument selected by its program.
///
/// Notes with an undefined program or an instrument that cannot be read
/// are dropped, as are PSG notes losing against the channel already
/// playing.
pub(crate) fn dispatch_note(
    seq: &mut Sequencer<'_>,
    bank: Option<&dyn InstrumentBank>,
    player_priority: u8,
    track: &mut Track,
    owner: TrackRef,
    gate: Gate,
) {
    if track.program > 127 {
        return;
    }
    let Some(bank) = bank else {
        return;
    };
    let mut instrument = match bank.instrument(track.program, track.last_key) {
        Ok(instrument) => instrument,
        Err(err) => {
            log::warn!(
                "track {}.{}: dropping key {} on program {}: {err}",
                owner.player,
                owner.track,
                track.last_key,
                track.program
            );
            return;
        }
    };
    instrument.adsr = track.adsr_override.apply(instrument.adsr);

    track.note_on_lfo();
    track.update_volume = true;
    track.update_pitch = true;

    let note = Note {
        midi_key: track.last_key,
        play_key: instrument.key,
        velocity: track.last_velocity,
        priority: player_priority.saturating_add(track.priority),
        gate,
        owner,
        pan_bias: instrument.pan_bias,
        echo_volume: track.echo_volume,
        echo_length: track.echo_length,
    };
    seq.pools.spawn(seq.rom, note, &instrument, track.volume_pan(), track.pitch());
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::boxed::Box;
    use alloc::sync::Arc;
    use alloc::vec;
    use alloc::vec::Vec;

    use sappy_ir::{pos_to_pointer, PlayerInfo, SongHeader};

    use crate::loudness::LoudnessMeter;
    use crate::resampler::KernelTables;
    use crate::reverb::PassthroughReverb;

    const BANK: usize = 0x100;
    const WAVE: usize = 0x180;
    const TRACK: usize = 0x200;
    const SQUARE2: u8 = 0x02;

    /// ROM with a one-program square-2 bank and `code` at `TRACK`.
    fn rom_with(code: &[u8]) -> Rom {
        let mut bytes = vec![0u8; 0x400];
        // Square 2, key 60, duty 50 %, sustain 15.
        bytes[BANK] = SQUARE2;
        bytes[BANK + 1] = 60;
        bytes[BANK + 4..BANK + 8].copy_from_slice(&2u32.to_le_bytes());
        bytes[BANK + 8..BANK + 12].copy_from_slice(&[0, 0, 15, 0]);
        bytes[WAVE..WAVE + 16].fill(0x0F);
        bytes[TRACK..TRACK + code.len()].copy_from_slice(code);
        Rom::new(bytes)
    }

    fn pointer(pos: usize) -> [u8; 4] {
        pos_to_pointer(pos).to_le_bytes()
    }

    struct Fixture {
        rom: Rom,
        pools: ChannelPools,
        config: EngineConfig,
        player: Player,
        memory: [u8; MEMACC_MEMORY_SIZE],
    }

    impl Fixture {
        fn new(code: &[u8]) -> Self {
            let rom = rom_with(code);
            let config = EngineConfig { max_loops: Some(1), fade_out_ms: 500, ..EngineConfig::default() };
            let pools = ChannelPools::new(&config, Arc::new(KernelTables::new()));
            let mut player = Player::new(PlayerInfo::default());
            let header =
                SongHeader { pos: 0, blocks: 0, priority: 0, reverb: 0, voice_group: BANK, tracks: vec![TRACK] };
            player.load(&rom, &header, |pos| {
                Track::new(pos, Box::new(PassthroughReverb::new(0.0)), 8, LoudnessMeter::new(48000, 20.0))
            });
            Self { rom, pools, config, player, memory: [0; MEMACC_MEMORY_SIZE] }
        }

        fn tick(&mut self) {
            let Self { rom, pools, config, player, memory } = self;
            tick(&mut Sequencer { rom, pools, config, memory }, player, 0);
        }

        fn advance(&mut self) {
            let Self { rom, pools, config, player, memory } = self;
            advance_player(&mut Sequencer { rom, pools, config, memory }, player, 0);
        }

        fn track(&self) -> &Track {
            &self.player.tracks[0]
        }

        fn held(&self) -> Vec<u8> {
            self.pools.iter().filter(|c| !c.is_released()).map(|c| c.note().midi_key).collect()
        }
    }

    #[test]
    fn clock_table_covers_waits_and_notes() {
        assert_eq!(CLOCK_TABLE.len(), (0xB0 - 0x80) + 1);
        assert_eq!(CLOCK_TABLE[0xD0 - 0xCF], 1);
        assert_eq!(CLOCK_TABLE[0xFF - 0xCF], 96);
    }

    #[test_log::test]
    fn note_then_fine_releases_channel() {
        let mut f = Fixture::new(&[VOICE, 0, VOL, 100, 0xD3, 60, 100, FINE]);
        f.tick();
        assert_eq!(f.pools.spawned(), 1);
        assert!(!f.track().is_running());
        assert!(f.held().is_empty());
        assert!(f.player.song_ended());
    }

    #[test]
    fn gate_expires_after_note_length() {
        // N04 C4, then W24, FINE.
        let mut f = Fixture::new(&[VOICE, 0, 0xD3, 60, 100, 0x98, FINE]);
        f.tick();
        for _ in 0..4 {
            assert_eq!(f.held(), vec![60]);
            f.tick();
        }
        assert!(f.held().is_empty());
    }

    #[test]
    fn running_status_repeats_note() {
        // TIE C4 v100, W1, (TIE) E4, W1, EOT C4, EOT E4, W1, FINE
        let code = [VOICE, 0, TIE, 60, 100, 0x81, 64, 0x81, EOT, 60, EOT, 64, 0x81, FINE];
        let mut f = Fixture::new(&code);
        let mut config = f.config.clone();
        config.psg_polyphony = crate::config::PsgPolyphony::Poly;
        f.pools = ChannelPools::new(&config, Arc::new(KernelTables::new()));
        f.tick();
        assert_eq!(f.held(), vec![60]);
        f.tick();
        let mut held = f.held();
        held.sort_unstable();
        assert_eq!(held, vec![60, 64]);
        f.tick();
        assert!(f.held().is_empty());
        assert_eq!(f.pools.spawned(), 2);
    }

    #[test]
    fn running_status_without_command_ends_track() {
        let mut f = Fixture::new(&[0x10]);
        f.tick();
        assert!(!f.track().is_running());
    }

    #[test]
    fn unused_opcode_ends_track() {
        let mut f = Fixture::new(&[0xB6]);
        f.tick();
        assert!(!f.track().is_running());
    }

    #[test]
    fn pattern_call_returns() {
        // PATT -> sub, W2, FINE ; sub: VOL 50, PEND
        let sub = TRACK + 0x20;
        let mut code = vec![PATT];
        code.extend_from_slice(&pointer(sub));
        code.extend_from_slice(&[0x82, FINE]);
        code.resize(0x20, 0);
        code.extend_from_slice(&[VOL, 50, PEND]);
        let mut f = Fixture::new(&code);
        f.tick();
        assert_eq!(f.track().volume(), 50);
        assert_eq!(f.track().call_depth(), 0);
        assert_eq!(f.track().pos, TRACK + 6);
    }

    #[test]
    fn nested_calls_beyond_depth_end_track() {
        // A pattern that calls itself.
        let mut code = vec![PATT];
        code.extend_from_slice(&pointer(TRACK));
        let mut f = Fixture::new(&code);
        f.tick();
        assert!(!f.track().is_running());
        assert_eq!(f.track().call_depth(), 3);
    }

    #[test]
    fn repeat_jumps_count_minus_one_times() {
        // loop: mem[0] += 1, REPT 3 loop, FINE
        let mut code = vec![MEMACC, 1, 0, 1, REPT, 3];
        code.extend_from_slice(&pointer(TRACK));
        code.push(FINE);
        let mut f = Fixture::new(&code);
        f.tick();
        assert_eq!(f.memory[0], 3);
        assert!(!f.track().is_running());
    }

    #[test]
    fn repeat_count_zero_ends_track() {
        // TIE C4, W1, REPT 0 back to the start, VOL 50
        let mut code = vec![VOICE, 0, TIE, 60, 100, 0x81, REPT, 0];
        code.extend_from_slice(&pointer(TRACK));
        code.extend_from_slice(&[VOL, 50, 0x81, FINE]);
        let mut f = Fixture::new(&code);
        f.tick();
        assert_eq!(f.held(), vec![60]);
        f.tick();
        assert!(!f.track().is_running());
        assert!(f.held().is_empty());
        assert_eq!(f.pools.spawned(), 1);
        assert_ne!(f.track().volume(), 50);
    }

    #[test]
    fn memacc_compare_branches() {
        // mem[4] = 7; if mem[4] == 7 goto skip; VOL 1; skip: VOL 2; FINE
        let skip = TRACK + 0x10;
        let mut code = vec![MEMACC, 0, 4, 7, MEMACC, 6, 4, 7];
        code.extend_from_slice(&pointer(skip));
        code.extend_from_slice(&[VOL, 1, FINE]);
        code.resize(0x10, 0);
        code.extend_from_slice(&[VOL, 2, FINE]);
        let mut f = Fixture::new(&code);
        f.tick();
        assert_eq!(f.track().volume(), 2);

        // The false branch falls through past the pointer.
        let mut code = vec![MEMACC, 7, 4, 0];
        code.extend_from_slice(&pointer(skip));
        code.extend_from_slice(&[VOL, 1, FINE]);
        code.resize(0x10, 0);
        code.extend_from_slice(&[VOL, 2, FINE]);
        let mut f = Fixture::new(&code);
        f.tick();
        assert_eq!(f.track().volume(), 1);
    }

    #[test]
    fn goto_counts_loops_and_starts_fade() {
        // W1, GOTO start
        let mut code = vec![0x81, GOTO];
        code.extend_from_slice(&pointer(TRACK));
        let mut f = Fixture::new(&code);
        f.tick();
        assert_eq!(f.player.loops(), 0);
        f.tick();
        assert_eq!(f.player.loops(), 1);
        assert!(!f.player.song_ended());
        f.tick();
        assert_eq!(f.player.loops(), 2);
        assert!(f.player.song_ended());
        assert!(f.player.fade().is_fading());
        assert!(f.track().is_running());
    }

    #[test]
    fn default_tempo_ticks_every_fourth_block() {
        // W1, GOTO start: every tick after the first counts a loop.
        let mut code = vec![0x81, GOTO];
        code.extend_from_slice(&pointer(TRACK));
        let mut f = Fixture::new(&code);
        for _ in 0..16 {
            f.advance();
        }
        assert_eq!(f.player.loops(), 3);
    }

    #[test]
    fn faster_tempo_ticks_more_often() {
        // TEMPO 150 (300 internal), then W1, GOTO back to the wait. The
        // first tick lands on block 3, every second block after it.
        let mut code = vec![TEMPO, 150, 0x81, GOTO];
        code.extend_from_slice(&pointer(TRACK + 2));
        let mut f = Fixture::new(&code);
        for _ in 0..16 {
            f.advance();
        }
        assert_eq!(f.player.loops(), 6);
    }

    #[test]
    fn loop_without_wait_ends_track() {
        let mut code = vec![GOTO];
        code.extend_from_slice(&pointer(TRACK));
        let mut f = Fixture::new(&code);
        f.tick();
        assert!(!f.track().is_running());
    }

    #[test]
    fn tempo_command_doubles_argument() {
        let mut f = Fixture::new(&[TEMPO, 120, FINE]);
        f.tick();
        assert_eq!(f.player.bpm(), 120);
    }

    #[test]
    fn extension_commands_override_envelope() {
        let mut f = Fixture::new(&[XCMD, 0x04, 5, XCMD, 0x07, 3, XCMD, 0x08, 40, XCMD, 0x0C, 0x10, 0x00, FINE]);
        f.tick();
        let track = f.track();
        assert_eq!(track.adsr_override.attack, Some(5));
        assert_eq!(track.adsr_override.release, Some(3));
        assert_eq!(track.echo_volume, 40);
        assert_eq!(track.delay, 15);
        assert!(track.is_running());
    }

    #[test]
    fn extension_arguments_are_skipped_whole() {
        // XWAVE and XSOFF carry a pointer, XTYPE one byte.
        let mut code = vec![VOICE, 0, XCMD, 0x01];
        code.extend_from_slice(&pointer(WAVE));
        code.extend_from_slice(&[XCMD, 0x02, 1, XCMD, 0x0D]);
        code.extend_from_slice(&pointer(WAVE));
        code.extend_from_slice(&[VOL, 50, FINE]);
        let mut f = Fixture::new(&code);
        f.tick();
        assert_eq!(f.track().volume(), 50);
        assert_eq!(f.pools.spawned(), 0);
        assert!(!f.track().is_running());
        assert_eq!(f.track().pos, TRACK + code.len());
    }

    #[test]
    fn unknown_extension_command_ends_track() {
        for sub in [0x00, 0x03, 0x0E, 0x20] {
            let mut f = Fixture::new(&[VOICE, 0, XCMD, sub, 0, VOL, 50, 0xD3, 60, 100, 0x81, FINE]);
            f.tick();
            assert!(!f.track().is_running(), "sub-command {sub:#04x}");
            assert_eq!(f.pools.spawned(), 0);
            assert_ne!(f.track().volume(), 50);
        }
    }

    #[test]
    fn voice_clears_envelope_overrides() {
        let mut f = Fixture::new(&[XCMD, 0x06, 5, VOICE, 0, FINE]);
        f.tick();
        assert_eq!(f.track().adsr_override, Default::default());
    }

    #[test]
    fn undefined_program_skips_note() {
        let mut f = Fixture::new(&[0xD3, 60, 100, FINE]);
        f.tick();
        assert_eq!(f.pools.spawned(), 0);
    }

    #[test]
    fn unreadable_instrument_drops_note() {
        // Program 20 lies in zeroed memory: a PCM entry with a null sample
        // pointer.
        let mut f = Fixture::new(&[VOICE, 20, 0xD3, 60, 100, FINE]);
        f.tick();
        assert_eq!(f.pools.spawned(), 0);
    }

    #[test]
    fn jump_outside_rom_ends_track() {
        let mut f = Fixture::new(&[VOICE, 0, TIE, 60, 100, 0x81, GOTO, 0xF0, 0xFF, 0xFF, 0x08]);
        f.tick();
        assert_eq!(f.held(), vec![60]);
        f.tick();
        assert!(!f.track().is_running());
        assert!(f.held().is_empty());
        assert!(f.player.song_ended());
        // Later ticks leave the stopped track alone.
        f.tick();
        assert_eq!(f.track().pos, TRACK + 7);
    }

    #[test]
    fn default_tempo_first_ticks_on_fourth_block() {
        let mut f = Fixture::new(&[VOL, 50, 0x81, FINE]);
        for _ in 0..3 {
            f.advance();
            assert_eq!(f.track().pos, TRACK);
        }
        f.advance();
        assert_eq!(f.track().volume(), 50);
        assert_eq!(f.player.tempo_acc, 0);
    }

    #[test]
    fn half_speed_ticks_every_eighth_block() {
        let mut f = Fixture::new(&[VOL, 50, 0x81, FINE]);
        f.config.speed_factor = 0.5;
        for _ in 0..7 {
            f.advance();
        }
        assert_eq!(f.track().pos, TRACK);
        f.advance();
        assert_eq!(f.track().volume(), 50);
    }

    #[test]
    fn pan_and_bend_are_centered() {
        let mut f = Fixture::new(&[PAN, 0x50, BEND, 0x30, TUNE, 0x41, FINE]);
        f.tick();
        assert_eq!(f.track().pan(), 16);
        assert_eq!(f.track().bend, -16);
        assert_eq!(f.track().tune, 1);
    }
}
