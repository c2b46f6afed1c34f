//! Instrument definitions and the voice-group lookup.
//!
//! A voice group is an array of 12-byte entries indexed by program number:
//!
//! | offset | field |
//! |--------|-------|
//! | 0 | type |
//! | 1 | base key (drum kits play every key at this pitch) |
//! | 2 | PSG length (unused by the driver's software mixer) |
//! | 3 | pan (`0x80` flag, drum kits only) or square 1 sweep |
//! | 4 | sample pointer, duty cycle, wave pointer, noise mode, or sub-group pointer |
//! | 8 | attack, decay, sustain, release (key-split table pointer for type `0x40`) |

use crate::error::{Error, Result};
use crate::note::Adsr;
use crate::rom::Rom;
use crate::sample::SampleInfo;

/// Size of one voice-group entry.
pub const VOICE_ENTRY_SIZE: usize = 12;

/// Program value meaning "no program selected yet".
pub const PROGRAM_UNDEFINED: u8 = 0xFF;

const TYPE_KEY_SPLIT: u8 = 0x40;
const TYPE_DRUM_KIT: u8 = 0x80;
const TYPE_FIXED_RATE: u8 = 0x08;
const PAN_ENABLE: u8 = 0x80;
const PAN_CENTER: i16 = 0xC0;

/// Square wave duty cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DutyCycle {
    Eighth,
    Quarter,
    #[default]
    Half,
    ThreeQuarters,
}

impl DutyCycle {
    pub fn from_bits(bits: u32) -> Self {
        match bits & 3 {
            0 => DutyCycle::Eighth,
            1 => DutyCycle::Quarter,
            2 => DutyCycle::Half,
            _ => DutyCycle::ThreeQuarters,
        }
    }

    /// Number of high steps out of eight.
    pub fn high_steps(self) -> usize {
        match self {
            DutyCycle::Eighth => 1,
            DutyCycle::Quarter => 2,
            DutyCycle::Half => 4,
            DutyCycle::ThreeQuarters => 6,
        }
    }
}

/// Noise LFSR width.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NoisePattern {
    /// 15-bit LFSR, white noise.
    #[default]
    Fine,
    /// 7-bit LFSR, metallic periodic noise.
    Rough,
}

/// Sound-generation variant plus its parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InstrumentKind {
    Pcm { sample: SampleInfo, fixed_rate: bool },
    Square1 { duty: DutyCycle, sweep: u8 },
    Square2 { duty: DutyCycle },
    /// 32 four-bit steps packed high nibble first.
    Wave { wave: [u8; 16] },
    Noise { pattern: NoisePattern },
}

/// Discriminant of [`InstrumentKind`], one per channel pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VoiceType {
    Pcm,
    Square1,
    Square2,
    Wave,
    Noise,
}

impl InstrumentKind {
    pub fn voice_type(&self) -> VoiceType {
        match self {
            InstrumentKind::Pcm { .. } => VoiceType::Pcm,
            InstrumentKind::Square1 { .. } => VoiceType::Square1,
            InstrumentKind::Square2 { .. } => VoiceType::Square2,
            InstrumentKind::Wave { .. } => VoiceType::Wave,
            InstrumentKind::Noise { .. } => VoiceType::Noise,
        }
    }
}

/// A fully resolved instrument for one (program, key) pair.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Instrument {
    pub kind: InstrumentKind,
    pub adsr: Adsr,
    /// Key the voice should be pitched at.
    pub key: u8,
    pub pan_bias: i8,
}

/// Lookup of instruments by program number and key.
pub trait InstrumentBank {
    fn instrument(&self, program: u8, key: u8) -> Result<Instrument>;
}

/// Voice group stored in the ROM.
#[derive(Clone, Debug)]
pub struct VoiceGroup {
    rom: Rom,
    pos: usize,
}

impl VoiceGroup {
    pub fn new(rom: Rom, pos: usize) -> Self {
        Self { rom, pos }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    fn read_entry(&self, pos: usize, key: u8, drum: bool) -> Result<Instrument> {
        let rom = &self.rom;
        let ty = rom.read_u8(pos)?;
        if ty & (TYPE_KEY_SPLIT | TYPE_DRUM_KIT) != 0 {
            return Err(Error::MalformedInstrument { pos, reason: "nested key split or drum kit" });
        }

        let base_key = rom.read_u8(pos + 1)?;
        let pan_sweep = rom.read_u8(pos + 3)?;
        let env = rom.slice(pos + 8, 4)?;
        let adsr = Adsr::new(env[0], env[1], env[2], env[3]);

        let (kind, adsr) = match ty & 0x07 {
            0 => {
                let sample = SampleInfo::read(rom, rom.read_agb_ptr(pos + 4)?)?;
                (InstrumentKind::Pcm { sample, fixed_rate: ty & TYPE_FIXED_RATE != 0 }, adsr)
            }
            1 => {
                let duty = DutyCycle::from_bits(rom.read_u32(pos + 4)?);
                (InstrumentKind::Square1 { duty, sweep: pan_sweep }, adsr.masked_for_psg())
            }
            2 => {
                let duty = DutyCycle::from_bits(rom.read_u32(pos + 4)?);
                (InstrumentKind::Square2 { duty }, adsr.masked_for_psg())
            }
            3 => {
                let mut wave = [0u8; 16];
                wave.copy_from_slice(rom.slice(rom.read_agb_ptr(pos + 4)?, 16)?);
                (InstrumentKind::Wave { wave }, adsr.masked_for_psg())
            }
            4 => {
                let pattern =
                    if rom.read_u32(pos + 4)? & 1 != 0 { NoisePattern::Rough } else { NoisePattern::Fine };
                (InstrumentKind::Noise { pattern }, adsr.masked_for_psg())
            }
            _ => return Err(Error::MalformedInstrument { pos, reason: "unknown voice type" }),
        };

        let pan_bias = if drum && pan_sweep & PAN_ENABLE != 0 {
            ((pan_sweep as i16 - PAN_CENTER) * 2).clamp(-128, 127) as i8
        } else {
            0
        };

        Ok(Instrument { kind, adsr, key: if drum { base_key } else { key }, pan_bias })
    }
}

impl InstrumentBank for VoiceGroup {
    fn instrument(&self, program: u8, key: u8) -> Result<Instrument> {
        let pos = self.pos + program as usize * VOICE_ENTRY_SIZE;
        match self.rom.read_u8(pos)? {
            TYPE_KEY_SPLIT => {
                let sub_group = self.rom.read_agb_ptr(pos + 4)?;
                let split_table = self.rom.read_agb_ptr(pos + 8)?;
                let index = self.rom.read_u8(split_table + key as usize)?;
                log::trace!("program {program} key {key}: key split entry {index}");
                self.read_entry(sub_group + index as usize * VOICE_ENTRY_SIZE, key, false)
            }
            TYPE_DRUM_KIT => {
                let sub_group = self.rom.read_agb_ptr(pos + 4)?;
                self.read_entry(sub_group + key as usize * VOICE_ENTRY_SIZE, key, true)
            }
            _ => self.read_entry(pos, key, false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rom::pos_to_pointer;
    use alloc::vec;
    use alloc::vec::Vec;

    fn entry(ty: u8, key: u8, pan: u8, word: u32, adsr: [u8; 4]) -> [u8; 12] {
        let mut e = [0u8; 12];
        e[0] = ty;
        e[1] = key;
        e[3] = pan;
        e[4..8].copy_from_slice(&word.to_le_bytes());
        e[8..12].copy_from_slice(&adsr);
        e
    }

    fn put(rom: &mut Vec<u8>, pos: usize, bytes: &[u8]) {
        rom[pos..pos + bytes.len()].copy_from_slice(bytes);
    }

    #[test]
    fn square_entry_masks_adsr() {
        let mut rom = vec![0u8; 0x100];
        put(&mut rom, 0, &entry(0x02, 60, 0, 2, [0xFF, 0xFF, 0xFF, 0xFF]));
        let bank = VoiceGroup::new(Rom::new(rom), 0);
        let inst = bank.instrument(0, 72).unwrap();
        assert_eq!(inst.kind, InstrumentKind::Square2 { duty: DutyCycle::Half });
        assert_eq!(inst.adsr, Adsr::new(7, 7, 15, 7));
        assert_eq!(inst.key, 72);
    }

    #[test]
    fn pcm_entry_reads_sample_header() {
        let mut rom = vec![0u8; 0x100];
        put(&mut rom, 0, &entry(0x08, 60, 0, pos_to_pointer(0x40), [0xFF, 0, 0xFF, 0]));
        put(&mut rom, 0x40, &[0, 0, 0, 0x40]);
        put(&mut rom, 0x44, &(8000u32 * 1024).to_le_bytes());
        put(&mut rom, 0x4C, &4u32.to_le_bytes());
        let bank = VoiceGroup::new(Rom::new(rom), 0);
        let inst = bank.instrument(0, 60).unwrap();
        match inst.kind {
            InstrumentKind::Pcm { sample, fixed_rate } => {
                assert!(fixed_rate);
                assert_eq!(sample.data_pos, 0x50);
                assert_eq!(sample.length, 4);
            }
            other => panic!("unexpected kind {other:?}"),
        }
        assert_eq!(inst.adsr, Adsr::new(0xFF, 0, 0xFF, 0));
    }

    #[test]
    fn drum_kit_uses_fixed_key_and_pan() {
        let mut rom = vec![0u8; 0x400];
        put(&mut rom, 0, &entry(0x80, 0, 0, pos_to_pointer(0x100), [0; 4]));
        // Sub-group entry for key 36: noise drum at key 50 panned right.
        put(&mut rom, 0x100 + 36 * 12, &entry(0x04, 50, 0xD0, 1, [0, 0, 15, 0]));
        let bank = VoiceGroup::new(Rom::new(rom), 0);
        let inst = bank.instrument(0, 36).unwrap();
        assert_eq!(inst.kind, InstrumentKind::Noise { pattern: NoisePattern::Rough });
        assert_eq!(inst.key, 50);
        assert_eq!(inst.pan_bias, 32);
    }

    #[test]
    fn key_split_selects_sub_entry() {
        let mut rom = vec![0u8; 0x400];
        put(&mut rom, 0, &entry(0x40, 0, 0, pos_to_pointer(0x100), [0; 4]));
        put(&mut rom, 8, &pos_to_pointer(0x200).to_le_bytes());
        rom[0x200 + 70] = 1;
        put(&mut rom, 0x100, &entry(0x01, 0, 0, 0, [0; 4]));
        put(&mut rom, 0x10C, &entry(0x02, 0, 0, 1, [0; 4]));
        let bank = VoiceGroup::new(Rom::new(rom), 0);
        assert_eq!(bank.instrument(0, 69).unwrap().kind.voice_type(), VoiceType::Square1);
        assert_eq!(
            bank.instrument(0, 70).unwrap().kind,
            InstrumentKind::Square2 { duty: DutyCycle::Quarter }
        );
    }

    #[test]
    fn nested_drum_kit_is_malformed() {
        let mut rom = vec![0u8; 0x400];
        put(&mut rom, 0, &entry(0x80, 0, 0, pos_to_pointer(0x100), [0; 4]));
        put(&mut rom, 0x100, &entry(0x80, 0, 0, pos_to_pointer(0x100), [0; 4]));
        let bank = VoiceGroup::new(Rom::new(rom), 0);
        assert!(matches!(bank.instrument(0, 0), Err(Error::MalformedInstrument { .. })));
    }

    #[test]
    fn unknown_type_is_malformed() {
        let mut rom = vec![0u8; 0x40];
        put(&mut rom, 0, &entry(0x05, 0, 0, 0, [0; 4]));
        let bank = VoiceGroup::new(Rom::new(rom), 0);
        assert!(matches!(bank.instrument(0, 0), Err(Error::MalformedInstrument { .. })));
    }
}
