//! Per-block rendering of every channel into track and master buffers.

use sappy_ir::AudioBuffer;

use crate::channel::{Channel, ChannelPools, MixContext};
use crate::loudness::{Loudness, LoudnessMeter, DEFAULT_LOWPASS_HZ};
use crate::player::Player;
use crate::track::Track;

pub struct Mixer {
    master: AudioBuffer,
    meter: LoudnessMeter,
    frames: usize,
}

fn track_mut(players: &mut [Player], player: usize, track: usize) -> Option<&mut Track> {
    players.get_mut(player).and_then(|p| p.tracks.get_mut(track))
}

/// Snap every sample to `2^(bits - 1)` levels per unit.
fn quantize(buffer: &mut AudioBuffer, bits: u8) {
    let levels = (1u32 << bits.clamp(1, 24).saturating_sub(1)) as f32;
    let (left, right) = buffer.split_mut();
    for s in left.iter_mut().chain(right.iter_mut()) {
        *s = libm::roundf(*s * levels) / levels;
    }
}

impl Mixer {
    pub fn new(frames: usize, sample_rate: u32) -> Self {
        Self { master: AudioBuffer::new(frames), meter: LoudnessMeter::new(sample_rate, DEFAULT_LOWPASS_HZ), frames }
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn master(&self) -> &AudioBuffer {
        &self.master
    }

    pub fn loudness(&self) -> Loudness {
        self.meter.loudness()
    }

    /// Render one block. Fades must already be advanced for this block.
    ///
    /// PCM channels go through their track's reverb, PSG channels are added
    /// after it. `dac_bits` enables output quantization.
    pub(crate) fn render(
        &mut self,
        players: &mut [Player],
        pools: &mut ChannelPools,
        ctx: &MixContext,
        dac_bits: Option<u8>,
    ) {
        let frames = self.frames;
        self.master.resize(frames);
        self.master.silence();
        for track in players.iter_mut().flat_map(|p| p.tracks.iter_mut()) {
            track.buffer.resize(frames);
            track.buffer.silence();
        }

        for channel in pools.pcm_mut() {
            let owner = channel.owner();
            match track_mut(players, owner.player, owner.track) {
                Some(track) => channel.process(&mut track.buffer, ctx),
                None => channel.kill(),
            }
        }

        for track in players.iter_mut().flat_map(|p| p.tracks.iter_mut()) {
            track.reverb.process(&mut track.buffer);
        }

        for channel in pools.psg_mut() {
            let owner = channel.owner();
            match track_mut(players, owner.player, owner.track) {
                Some(track) => channel.process(&mut track.buffer, ctx),
                None => channel.kill(),
            }
        }

        pools.prune(|owner| {
            players.get(owner.player).is_some_and(|p| owner.track < p.tracks.len())
        });

        for player in players.iter_mut() {
            let (from, to) = (player.fade.prev_gain(), player.fade.gain());
            for track in player.tracks.iter_mut() {
                if !track.muted {
                    self.master.mix_from_ramped(&track.buffer, from, to);
                }
                track.meter.update(&track.buffer);
            }
        }

        if let Some(bits) = dac_bits {
            quantize(&mut self.master, bits);
        }
        self.meter.update(&self.master);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::boxed::Box;
    use alloc::sync::Arc;
    use alloc::vec;
    use alloc::vec::Vec;

    use sappy_ir::{
        Adsr, DutyCycle, Gate, Instrument, InstrumentKind, Note, PlayerInfo, Rom, SongHeader, TrackRef,
    };

    use crate::channel::tests::context;
    use crate::config::EngineConfig;
    use crate::resampler::KernelTables;
    use crate::reverb::PassthroughReverb;

    const FRAMES: usize = 200;

    fn players(tracks: usize) -> Vec<Player> {
        let rom = Rom::new(vec![0u8; 16]);
        let header = SongHeader {
            pos: 0,
            blocks: 0,
            priority: 0,
            reverb: 0,
            voice_group: 0,
            tracks: vec![0; tracks],
        };
        let mut player = Player::new(PlayerInfo::default());
        player.load(&rom, &header, |pos| {
            Track::new(pos, Box::new(PassthroughReverb::new(0.0)), FRAMES, LoudnessMeter::new(48000, 20.0))
        });
        vec![player]
    }

    fn square_on(pools: &mut ChannelPools, track: usize) {
        let instrument = Instrument {
            kind: InstrumentKind::Square2 { duty: DutyCycle::from_bits(2) },
            adsr: Adsr::new(0, 0, 15, 0),
            key: 69,
            pan_bias: 0,
        };
        let note = Note {
            midi_key: 69,
            play_key: 69,
            velocity: 127,
            priority: 0,
            gate: Gate::Tie,
            owner: TrackRef::new(0, track),
            pan_bias: 0,
            echo_volume: 0,
            echo_length: 0,
        };
        let rom = Rom::new(vec![0u8; 16]);
        pools.spawn(&rom, note, &instrument, (127, 127), 0);
    }

    fn setup(policy: crate::config::PsgPolyphony) -> ChannelPools {
        let config = EngineConfig { psg_polyphony: policy, ..EngineConfig::default() };
        ChannelPools::new(&config, Arc::new(KernelTables::new()))
    }

    fn energy(buf: &AudioBuffer) -> f32 {
        buf.left().iter().chain(buf.right()).map(|s| s * s).sum()
    }

    #[test]
    fn renders_channel_into_track_and_master() {
        let mut players = players(1);
        let mut pools = setup(crate::config::PsgPolyphony::Poly);
        square_on(&mut pools, 0);
        let mut mixer = Mixer::new(FRAMES, 48000);
        for _ in 0..4 {
            mixer.render(&mut players, &mut pools, &context(), None);
        }
        assert!(energy(players[0].tracks[0].buffer()) > 0.0);
        assert!(energy(mixer.master()) > 0.0);
        assert!(mixer.loudness().rms_left > 0.0);
        assert!(players[0].tracks[0].meter().loudness().peak_right > 0.0);
    }

    #[test]
    fn muted_track_is_left_out_of_master() {
        let mut players = players(1);
        players[0].tracks[0].muted = true;
        let mut pools = setup(crate::config::PsgPolyphony::Poly);
        square_on(&mut pools, 0);
        let mut mixer = Mixer::new(FRAMES, 48000);
        for _ in 0..4 {
            mixer.render(&mut players, &mut pools, &context(), None);
        }
        assert!(energy(players[0].tracks[0].buffer()) > 0.0);
        assert_eq!(energy(mixer.master()), 0.0);
    }

    #[test]
    fn orphaned_channels_are_dropped() {
        let mut players = players(1);
        let mut pools = setup(crate::config::PsgPolyphony::Poly);
        square_on(&mut pools, 5);
        let mut mixer = Mixer::new(FRAMES, 48000);
        mixer.render(&mut players, &mut pools, &context(), None);
        assert!(pools.is_empty());
    }

    #[test]
    fn faded_player_is_silent() {
        let mut players = players(1);
        players[0].fade.start_out(0);
        players[0].fade.update();
        players[0].fade.update();
        let mut pools = setup(crate::config::PsgPolyphony::Poly);
        square_on(&mut pools, 0);
        let mut mixer = Mixer::new(FRAMES, 48000);
        mixer.render(&mut players, &mut pools, &context(), None);
        assert_eq!(energy(mixer.master()), 0.0);
    }

    #[test]
    fn dac_quantization_snaps_levels() {
        let mut buf = AudioBuffer::new(4);
        {
            let (l, r) = buf.split_mut();
            l.copy_from_slice(&[0.1, 0.26, -0.74, 0.0]);
            r.copy_from_slice(&[0.5, 0.2, 0.3, 0.9]);
        }
        quantize(&mut buf, 3);
        assert_eq!(buf.left(), &[0.0, 0.25, -0.75, 0.0]);
        assert_eq!(buf.right(), &[0.5, 0.25, 0.25, 1.0]);
    }
}
