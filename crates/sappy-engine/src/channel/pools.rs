//! ChannelPools: typed channel storage and the PSG allocation policy.

use alloc::sync::Arc;

use sappy_ir::{Instrument, InstrumentKind, Note, Rom, TrackRef, VoiceType};
use slotmap::SlotMap;

use super::{
    Channel, NoiseChannel, NoiseGenerator, PcmChannel, PsgChannel, SquareChannel, SquareGenerator, Sweep,
    WaveChannel, WaveGenerator,
};
use crate::config::{EngineConfig, PsgPolyphony};
use crate::envelope::EnvState;
use crate::resampler::{create_resampler, KernelTables};

slotmap::new_key_type! {
    /// Key of a channel inside its pool.
    pub struct ChannelKey;
}

/// Every live channel, one pool per voice type.
pub struct ChannelPools {
    pcm: SlotMap<ChannelKey, PcmChannel>,
    square1: SlotMap<ChannelKey, SquareChannel>,
    square2: SlotMap<ChannelKey, SquareChannel>,
    wave: SlotMap<ChannelKey, WaveChannel>,
    noise: SlotMap<ChannelKey, NoiseChannel>,
    tables: Arc<KernelTables>,
    config: EngineConfig,
    next_serial: u64,
}

/// Whether an existing PSG channel outranks a new note.
fn outranks(existing: &dyn Channel, note: &Note) -> bool {
    let old = existing.note();
    !existing.is_released()
        && (old.priority > note.priority || (old.priority == note.priority && old.owner < note.owner))
}

/// Apply the polyphony policy to `pool` for a new note. Returns `false` if
/// the note must be dropped.
fn admit<C: Channel>(pool: &mut SlotMap<ChannelKey, C>, note: &Note, policy: PsgPolyphony) -> bool {
    if policy == PsgPolyphony::Poly {
        return true;
    }
    let live = || pool.values().filter(|c| c.state() != EnvState::Dead);
    if live().any(|c| outranks(c, note)) {
        return false;
    }
    for channel in pool.values_mut().filter(|c| c.state() != EnvState::Dead) {
        match policy {
            PsgPolyphony::MonoStrict => channel.kill(),
            PsgPolyphony::MonoSmooth => channel.fast_release(),
            PsgPolyphony::Poly => {}
        }
    }
    true
}

impl ChannelPools {
    pub fn new(config: &EngineConfig, tables: Arc<KernelTables>) -> Self {
        Self {
            pcm: SlotMap::with_key(),
            square1: SlotMap::with_key(),
            square2: SlotMap::with_key(),
            wave: SlotMap::with_key(),
            noise: SlotMap::with_key(),
            tables,
            config: config.clone(),
            next_serial: 0,
        }
    }

    /// Create a channel for `note`. Returns `None` when a PSG note loses
    /// against the channel already playing.
    pub fn spawn(
        &mut self,
        rom: &Rom,
        note: Note,
        instrument: &Instrument,
        volume: (u8, u8),
        pitch: i16,
    ) -> Option<(VoiceType, ChannelKey)> {
        let interframes = self.config.interframes.max(1);
        let sustain_bug = self.config.psg_sustain_bug;
        let policy = self.config.psg_polyphony;
        let serial = self.next_serial;
        let psg_resampler = || create_resampler(self.config.psg_resampler, &self.tables);
        let adsr = instrument.adsr;

        let key = match instrument.kind {
            InstrumentKind::Pcm { sample, fixed_rate } => {
                let kind = if fixed_rate { self.config.pcm_fixed_resampler } else { self.config.pcm_resampler };
                let resampler = create_resampler(kind, &self.tables);
                let channel = PcmChannel::new(
                    note,
                    serial,
                    rom.clone(),
                    sample,
                    fixed_rate,
                    adsr,
                    resampler,
                    interframes,
                    volume,
                    pitch,
                );
                self.pcm.insert(channel)
            }
            InstrumentKind::Square1 { duty, sweep } => {
                if !admit(&mut self.square1, &note, policy) {
                    return None;
                }
                let gen = SquareGenerator::new(VoiceType::Square1, duty, Sweep::from_register(sweep));
                let channel =
                    PsgChannel::new(note, serial, adsr, gen, psg_resampler(), interframes, sustain_bug, volume, pitch);
                self.square1.insert(channel)
            }
            InstrumentKind::Square2 { duty } => {
                if !admit(&mut self.square2, &note, policy) {
                    return None;
                }
                let gen = SquareGenerator::new(VoiceType::Square2, duty, None);
                let channel =
                    PsgChannel::new(note, serial, adsr, gen, psg_resampler(), interframes, sustain_bug, volume, pitch);
                self.square2.insert(channel)
            }
            InstrumentKind::Wave { wave } => {
                if !admit(&mut self.wave, &note, policy) {
                    return None;
                }
                let gen = WaveGenerator::new(&wave);
                let channel =
                    PsgChannel::new(note, serial, adsr, gen, psg_resampler(), interframes, sustain_bug, volume, pitch);
                self.wave.insert(channel)
            }
            InstrumentKind::Noise { pattern } => {
                if !admit(&mut self.noise, &note, policy) {
                    return None;
                }
                let gen = NoiseGenerator::new(pattern);
                let channel =
                    PsgChannel::new(note, serial, adsr, gen, psg_resampler(), interframes, sustain_bug, volume, pitch);
                self.noise.insert(channel)
            }
        };
        self.next_serial += 1;
        let voice_type = instrument.kind.voice_type();
        log::debug!("spawned {voice_type:?} channel {serial} for key {} on {:?}", note.midi_key, note.owner);
        Some((voice_type, key))
    }

    /// Look up a channel by pool and key.
    pub fn get(&self, voice_type: VoiceType, key: ChannelKey) -> Option<&dyn Channel> {
        match voice_type {
            VoiceType::Pcm => self.pcm.get(key).map(|c| c as &dyn Channel),
            VoiceType::Square1 => self.square1.get(key).map(|c| c as &dyn Channel),
            VoiceType::Square2 => self.square2.get(key).map(|c| c as &dyn Channel),
            VoiceType::Wave => self.wave.get(key).map(|c| c as &dyn Channel),
            VoiceType::Noise => self.noise.get(key).map(|c| c as &dyn Channel),
        }
    }

    /// Every channel, live or not yet pruned.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Channel> + '_ {
        self.pcm
            .values()
            .map(|c| c as &dyn Channel)
            .chain(self.square1.values().map(|c| c as &dyn Channel))
            .chain(self.square2.values().map(|c| c as &dyn Channel))
            .chain(self.wave.values().map(|c| c as &dyn Channel))
            .chain(self.noise.values().map(|c| c as &dyn Channel))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut dyn Channel> + '_ {
        self.pcm
            .values_mut()
            .map(|c| c as &mut dyn Channel)
            .chain(self.square1.values_mut().map(|c| c as &mut dyn Channel))
            .chain(self.square2.values_mut().map(|c| c as &mut dyn Channel))
            .chain(self.wave.values_mut().map(|c| c as &mut dyn Channel))
            .chain(self.noise.values_mut().map(|c| c as &mut dyn Channel))
    }

    /// Channels that go through the track's reverb.
    pub(crate) fn pcm_mut(&mut self) -> impl Iterator<Item = &mut PcmChannel> + '_ {
        self.pcm.values_mut()
    }

    /// Channels mixed after reverb.
    pub(crate) fn psg_mut(&mut self) -> impl Iterator<Item = &mut dyn Channel> + '_ {
        self.square1
            .values_mut()
            .map(|c| c as &mut dyn Channel)
            .chain(self.square2.values_mut().map(|c| c as &mut dyn Channel))
            .chain(self.wave.values_mut().map(|c| c as &mut dyn Channel))
            .chain(self.noise.values_mut().map(|c| c as &mut dyn Channel))
    }

    /// Channels owned by `owner`.
    pub fn track_mut(&mut self, owner: TrackRef) -> impl Iterator<Item = &mut dyn Channel> + '_ {
        self.iter_mut().filter(move |c| c.owner() == owner)
    }

    /// Note-off for every channel of a track.
    pub fn release_track(&mut self, owner: TrackRef) {
        self.track_mut(owner).for_each(|c| c.release());
    }

    /// Note-off for the newest held channel of `owner` playing `key`.
    pub fn release_newest(&mut self, owner: TrackRef, key: u8) -> bool {
        let newest = self
            .track_mut(owner)
            .filter(|c| !c.is_released() && c.note().midi_key == key)
            .max_by_key(|c| c.serial());
        match newest {
            Some(channel) => {
                channel.release();
                true
            }
            None => false,
        }
    }

    /// Silence every channel of `player` immediately.
    pub fn kill_player(&mut self, player: usize) {
        self.iter_mut().filter(|c| c.owner().player == player).for_each(|c| c.kill());
    }

    pub fn kill_all(&mut self) {
        self.iter_mut().for_each(|c| c.kill());
    }

    /// Drop dead channels and channels whose owner no longer exists.
    pub fn prune(&mut self, mut owner_exists: impl FnMut(TrackRef) -> bool) {
        let mut keep = |c: &dyn Channel| c.state() != EnvState::Dead && owner_exists(c.owner());
        self.pcm.retain(|_, c| keep(c));
        self.square1.retain(|_, c| keep(c));
        self.square2.retain(|_, c| keep(c));
        self.wave.retain(|_, c| keep(c));
        self.noise.retain(|_, c| keep(c));
    }

    pub fn len(&self) -> usize {
        self.pcm.len() + self.square1.len() + self.square2.len() + self.wave.len() + self.noise.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Channels not yet dead.
    pub fn live_count(&self) -> usize {
        self.iter().filter(|c| c.state() != EnvState::Dead).count()
    }

    /// Total number of channels ever spawned.
    pub fn spawned(&self) -> u64 {
        self.next_serial
    }

    /// Drop everything, keeping the serial counter.
    pub fn clear(&mut self) {
        self.pcm.clear();
        self.square1.clear();
        self.square2.clear();
        self.wave.clear();
        self.noise.clear();
    }
}
