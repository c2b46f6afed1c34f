//! Engine configuration.

/// Interpolation kernel used by a channel's resampler.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum ResamplerKind {
    Nearest,
    Linear,
    #[default]
    Sinc,
    Blep,
    Blamp,
}

/// Reverb network applied to every track of a song.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum ReverbKind {
    #[default]
    Normal,
    Gs1,
    Gs2,
    /// The GS2 network with the coefficients of the Mario Golf and Mario
    /// Tennis drivers.
    Mgat,
    Spu,
    None,
}

/// How PSG notes compete for their hardware channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum PsgPolyphony {
    /// One channel per type; a winning note kills the old one.
    #[default]
    MonoStrict,
    /// One channel per type; the old note is faded out over one sub-frame.
    MonoSmooth,
    /// No restriction.
    Poly,
}

/// Tunables of a [`PlaybackEngine`](crate::PlaybackEngine).
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineConfig {
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Render blocks per 60 Hz hardware frame.
    pub interframes: u32,
    /// Loops of track 0 before the song fades out. `None` loops forever.
    pub max_loops: Option<u32>,
    /// Length of the fade started when the loop limit is reached.
    pub fade_out_ms: u32,
    pub pcm_resampler: ResamplerKind,
    pub pcm_fixed_resampler: ResamplerKind,
    pub psg_resampler: ResamplerKind,
    pub reverb_kind: ReverbKind,
    pub psg_polyphony: PsgPolyphony,
    /// Reproduce the hardware's slow sustain-volume refresh on PSG voices.
    pub psg_sustain_bug: bool,
    /// Quantize the master output to the sound mode's DAC resolution.
    pub dac_emulation: bool,
    /// Multiplier on the tempo of every player.
    pub speed_factor: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            interframes: 4,
            max_loops: Some(1),
            fade_out_ms: 10000,
            pcm_resampler: ResamplerKind::Sinc,
            pcm_fixed_resampler: ResamplerKind::Blamp,
            psg_resampler: ResamplerKind::Blep,
            reverb_kind: ReverbKind::Normal,
            psg_polyphony: PsgPolyphony::MonoStrict,
            psg_sustain_bug: false,
            dac_emulation: false,
            speed_factor: 1.0,
        }
    }
}

impl EngineConfig {
    /// Sequencer steps per second.
    pub fn frames_per_second(&self) -> u32 {
        60 * self.interframes.max(1)
    }

    /// Frames rendered by one call to `advance_one_frame`.
    pub fn samples_per_buffer(&self) -> usize {
        (self.sample_rate / self.frames_per_second()) as usize
    }

    /// Render blocks spanning `ms` milliseconds.
    pub fn ms_to_frames(&self, ms: u32) -> u32 {
        (ms as u64 * self.frames_per_second() as u64 / 1000) as u32
    }
}
