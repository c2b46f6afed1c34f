//! Data model for the sappy sound driver engine.
//!
//! This crate describes what the engine reads out of a cartridge image:
//! the bounds-checked ROM view, song and player tables, voice groups and
//! samples, the driver sound-mode register, and the value types (notes,
//! envelopes) the sequencer hands to the synthesizer.
//!
//! Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod audio_buffer;
mod error;
mod instrument;
mod note;
pub mod rom;
mod sample;
pub mod song;
mod sound_mode;

pub use audio_buffer::{AudioBuffer, STEREO};
pub use error::{Error, Result};
pub use instrument::{
    DutyCycle, Instrument, InstrumentBank, InstrumentKind, NoisePattern, VoiceGroup, VoiceType,
    PROGRAM_UNDEFINED, VOICE_ENTRY_SIZE,
};
pub use note::{Adsr, Gate, Note, TrackRef};
pub use rom::{pos_to_pointer, Rom};
pub use sample::{
    decode_dpcm_block, PulseSweep, SampleFormat, SampleInfo, SynthWaveform, DPCM_BLOCK_SAMPLES, DPCM_BLOCK_SIZE,
    SAMPLE_HEADER_SIZE,
};
pub use song::{PlayerInfo, PlayerTableInfo, SongEntry, SongHeader, SongTableInfo};
pub use sound_mode::{SoundMode, FIXED_RATE_TABLE, REVERB_OVERRIDE};
