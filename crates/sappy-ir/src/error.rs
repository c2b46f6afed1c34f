//! Data-integrity errors raised while reading driver structures from a ROM.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("read of {len} byte(s) at {pos:#X} is outside the {size:#X}-byte ROM")]
    OutOfBounds { pos: usize, len: usize, size: usize },
    #[error("pointer {0:#010X} does not point into the ROM")]
    InvalidPointer(u32),
    #[error("malformed instrument at {pos:#X}: {reason}")]
    MalformedInstrument { pos: usize, reason: &'static str },
    #[error("song {index} is outside the {count}-entry song table")]
    InvalidSongIndex { index: usize, count: usize },
}

pub type Result<T> = core::result::Result<T, Error>;
