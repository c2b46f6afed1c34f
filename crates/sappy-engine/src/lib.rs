//! Playback engine for the sappy sound driver.
//!
//! Interprets the driver's track bytecode, synthesizes direct-sound and PSG
//! voices, applies per-track reverb and mixes everything into one stereo
//! block per call to [`PlaybackEngine::advance_one_frame`].

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod channel;
mod config;
mod engine;
pub mod envelope;
mod fade;
mod frame;
pub mod frequency;
mod loudness;
mod mixer;
mod player;
pub mod resampler;
pub mod reverb;
pub mod sequence;
mod snapshot;
mod track;

pub use channel::{Channel, ChannelKey, ChannelPools, MixContext};
pub use config::{EngineConfig, PsgPolyphony, ResamplerKind, ReverbKind};
pub use engine::PlaybackEngine;
pub use envelope::{EnvState, VolumeFade};
pub use fade::{FadeController, FadeDirection};
pub use frame::Frame;
pub use loudness::{Loudness, LoudnessMeter};
pub use mixer::Mixer;
pub use player::Player;
pub use snapshot::{EngineSnapshot, PlayerSnapshot, TrackSnapshot};
pub use track::{ModulationType, Track};
