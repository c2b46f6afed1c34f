//! Audio output for the sappy engine.
//!
//! The engine thread pushes rendered blocks into a [`RingBuffer`]; the
//! device callback of [`CpalOutput`] pulls from it.

mod cpal_backend;
mod ring_buffer;
mod traits;

pub use cpal_backend::CpalOutput;
pub use ring_buffer::{RingBuffer, DEFAULT_MARGIN};
pub use traits::{AudioError, AudioOutput};
