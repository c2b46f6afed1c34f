//! Driver sound-mode register.
//!
//! Packed layout of the 32-bit mode word:
//!
//! | bits | field |
//! |------|-------|
//! | 0-6 | reverb intensity |
//! | 7 | reverb override (force the intensity on every song) |
//! | 12-15 | master volume |
//! | 16-19 | fixed sample-rate index (1-12) |
//! | 20-23 | DAC resolution code (8 = 9 bit ... 11 = 6 bit) |

/// Sample rates selectable by the fixed-rate index, 1-based.
pub const FIXED_RATE_TABLE: [u32; 12] =
    [5734, 7884, 10512, 13379, 15768, 18157, 21024, 26758, 31536, 36314, 40137, 42048];

/// Samples the driver mixes per video frame for each rate index, 1-based.
const SAMPLES_PER_VBLANK: [u32; 12] = [96, 132, 176, 224, 264, 304, 352, 448, 528, 608, 672, 704];

/// Size of the driver's PCM DMA ring in samples.
const PCM_DMA_BUFFER_SIZE: u32 = 1584;

pub const REVERB_OVERRIDE: u8 = 0x80;
const DEFAULT_FREQ_INDEX: u8 = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SoundMode {
    /// Master volume 0-15 (applies to direct sound only).
    pub volume: u8,
    /// Reverb intensity 0-127 plus the [`REVERB_OVERRIDE`] flag.
    pub reverb: u8,
    /// Fixed sample-rate index 1-12.
    pub freq_index: u8,
    /// DAC resolution in bits, 6-9.
    pub dac_bits: u8,
}

impl Default for SoundMode {
    fn default() -> Self {
        Self { volume: 15, reverb: 0, freq_index: DEFAULT_FREQ_INDEX, dac_bits: 9 }
    }
}

impl SoundMode {
    /// Decode the packed mode word a game passes to the driver.
    pub fn from_register(value: u32) -> Self {
        let dac_code = ((value >> 20) & 0xF) as u8;
        Self {
            volume: ((value >> 12) & 0xF) as u8,
            reverb: (value & 0xFF) as u8,
            freq_index: ((value >> 16) & 0xF) as u8,
            dac_bits: if (8..=11).contains(&dac_code) { 17 - dac_code } else { 9 },
        }
    }

    fn rate_index(&self) -> usize {
        let index = if (1..=12).contains(&self.freq_index) { self.freq_index } else { DEFAULT_FREQ_INDEX };
        index as usize - 1
    }

    /// Playback rate for fixed-rate samples.
    pub fn fixed_rate_hz(&self) -> u32 {
        FIXED_RATE_TABLE[self.rate_index()]
    }

    /// Number of frame-sized buffers in the driver's PCM DMA ring. Reverb
    /// delay lines are sized from this.
    pub fn dma_buffer_count(&self) -> u32 {
        PCM_DMA_BUFFER_SIZE / SAMPLES_PER_VBLANK[self.rate_index()]
    }

    /// Intensity forced on every song, if the override flag is set.
    pub fn reverb_override(&self) -> Option<u8> {
        (self.reverb & REVERB_OVERRIDE != 0).then_some(self.reverb & 0x7F)
    }

    /// Direct-sound gain implied by the master volume.
    pub fn master_gain(&self) -> f32 {
        ((self.volume & 0xF) as f32 + 1.0) / 16.0
    }
}
