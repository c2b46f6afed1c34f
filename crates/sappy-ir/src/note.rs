//! Note, envelope and back-reference value types.

/// Attack/decay/sustain/release parameters.
///
/// Direct-sound (PCM) voices use all eight bits of each field. PSG voices
/// only have 3 bits of attack, decay and release and 4 bits of sustain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Adsr {
    pub attack: u8,
    pub decay: u8,
    pub sustain: u8,
    pub release: u8,
}

impl Adsr {
    pub const fn new(attack: u8, decay: u8, sustain: u8, release: u8) -> Self {
        Self { attack, decay, sustain, release }
    }

    /// Clamp every field to the PSG envelope register widths.
    pub const fn masked_for_psg(self) -> Self {
        Self {
            attack: self.attack & 0x07,
            decay: self.decay & 0x07,
            sustain: self.sustain & 0x0F,
            release: self.release & 0x07,
        }
    }
}

/// Remaining length of a note.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Gate {
    /// Held until an explicit note-off.
    Tie,
    /// Released after this many sequencer ticks.
    Ticks(u8),
}

impl Gate {
    /// Zero ticks means the note is held.
    pub const fn from_ticks(ticks: u8) -> Self {
        if ticks == 0 {
            Gate::Tie
        } else {
            Gate::Ticks(ticks)
        }
    }
}

/// Index pair identifying a track inside the engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TrackRef {
    pub player: usize,
    pub track: usize,
}

impl TrackRef {
    pub const fn new(player: usize, track: usize) -> Self {
        Self { player, track }
    }
}

/// A dispatched note. Created by the sequencer and copied into the channel
/// that plays it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Note {
    /// Key as written in the sequence (used for note-off matching).
    pub midi_key: u8,
    /// Key the voice is pitched at (differs from `midi_key` for drum kits).
    pub play_key: u8,
    pub velocity: u8,
    /// Player priority plus track priority, saturated.
    pub priority: u8,
    pub gate: Gate,
    pub owner: TrackRef,
    /// Pan offset applied on top of the track pan (drum kits).
    pub pan_bias: i8,
    pub echo_volume: u8,
    pub echo_length: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn psg_mask_limits_register_widths() {
        let adsr = Adsr::new(0xFF, 0x19, 0xF3, 0x0A).masked_for_psg();
        assert_eq!(adsr, Adsr::new(7, 1, 3, 2));
    }

    #[test]
    fn psg_mask_is_idempotent() {
        for v in 0..=255u8 {
            let once = Adsr::new(v, v, v, v).masked_for_psg();
            assert_eq!(once, once.masked_for_psg());
            assert!(once.attack <= 7 && once.decay <= 7 && once.release <= 7);
            assert!(once.sustain <= 15);
        }
    }

    #[test]
    fn zero_gate_is_tie() {
        assert_eq!(Gate::from_ticks(0), Gate::Tie);
        assert_eq!(Gate::from_ticks(4), Gate::Ticks(4));
    }

    #[test]
    fn track_refs_order_by_player_then_track() {
        assert!(TrackRef::new(0, 5) < TrackRef::new(1, 0));
        assert!(TrackRef::new(1, 1) < TrackRef::new(1, 2));
    }
}
