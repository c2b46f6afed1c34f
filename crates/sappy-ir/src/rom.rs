//! Read-only, bounds-checked view of a cartridge image.
//!
//! All multi-byte values are little endian. Pointers stored in the image are
//! bus addresses in the cartridge window (`0x0800_0000` plus offset, or the
//! `0x0A00_0000` wait-state mirror) and are translated to file offsets here.

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use crate::error::{Error, Result};

/// Bus address of the first ROM byte.
pub const AGB_ROM_BASE: u32 = 0x0800_0000;

/// Wait-state mirror of the ROM window.
pub const AGB_ROM_MIRROR: u32 = 0x0A00_0000;

/// Largest addressable cartridge image (32 MiB).
pub const AGB_ROM_MAX_SIZE: usize = 0x0200_0000;

/// Shared handle to the cartridge bytes. Cloning is cheap.
#[derive(Clone)]
pub struct Rom {
    data: Arc<[u8]>,
}

impl Rom {
    pub fn new(data: impl Into<Arc<[u8]>>) -> Self {
        Self { data: data.into() }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrow `len` bytes starting at `pos`.
    pub fn slice(&self, pos: usize, len: usize) -> Result<&[u8]> {
        pos.checked_add(len)
            .and_then(|end| self.data.get(pos..end))
            .ok_or(Error::OutOfBounds { pos, len, size: self.data.len() })
    }

    pub fn read_u8(&self, pos: usize) -> Result<u8> {
        self.slice(pos, 1).map(|b| b[0])
    }

    pub fn read_i8(&self, pos: usize) -> Result<i8> {
        self.read_u8(pos).map(|b| b as i8)
    }

    pub fn read_u16(&self, pos: usize) -> Result<u16> {
        let b = self.slice(pos, 2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read_u32(&self, pos: usize) -> Result<u32> {
        let b = self.slice(pos, 4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Whether `ptr` is a bus address that lands inside this image.
    pub fn valid_pointer(&self, ptr: u32) -> bool {
        self.pointer_to_pos(ptr).is_ok()
    }

    /// Translate a bus address into a file offset.
    pub fn pointer_to_pos(&self, ptr: u32) -> Result<usize> {
        let offset = match ptr {
            p if (AGB_ROM_BASE..AGB_ROM_MIRROR).contains(&p) => p - AGB_ROM_BASE,
            p if p >= AGB_ROM_MIRROR && p - AGB_ROM_MIRROR < AGB_ROM_MAX_SIZE as u32 => p - AGB_ROM_MIRROR,
            _ => return Err(Error::InvalidPointer(ptr)),
        } as usize;
        if offset < self.data.len() {
            Ok(offset)
        } else {
            Err(Error::InvalidPointer(ptr))
        }
    }

    /// Read a 32-bit bus address at `pos` and translate it into a file offset.
    pub fn read_agb_ptr(&self, pos: usize) -> Result<usize> {
        self.read_u32(pos).and_then(|ptr| self.pointer_to_pos(ptr))
    }

    /// Whether the word at `pos` is a pointer into this image.
    pub fn valid_pointer_at(&self, pos: usize) -> bool {
        self.read_u32(pos).is_ok_and(|ptr| self.valid_pointer(ptr))
    }
}

impl From<Vec<u8>> for Rom {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl fmt::Debug for Rom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rom").field("len", &self.data.len()).finish()
    }
}

/// Convert a file offset into the bus address the driver would store.
pub fn pos_to_pointer(pos: usize) -> u32 {
    AGB_ROM_BASE + pos as u32
}
