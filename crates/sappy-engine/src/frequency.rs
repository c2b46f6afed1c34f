//! Key and pitch to playback-rate conversion.
//!
//! Pitch offsets are in 1/256 semitone units as produced by the sequencer,
//! so `pitch / 3072` is the offset in octaves.

/// Key that plays a PCM sample at its native rate.
const PCM_BASE_KEY: f32 = 60.0;

/// Square and wave channels are tuned from A4.
const PSG_BASE_KEY: f32 = 69.0;
const A4_HZ: f32 = 440.0;

/// Square channel period register: `f = 131072 / (2048 - x)`.
pub const SQUARE_CLOCK: f32 = 131072.0;
/// Wave channel period register: `f = 65536 / (2048 - x)`.
pub const WAVE_CLOCK: f32 = 65536.0;
const PERIOD_MAX: u16 = 2047;

/// Steps of the square duty sequencer per cycle.
pub const SQUARE_STEPS: u32 = 8;
/// Samples of the wave RAM per cycle.
pub const WAVE_STEPS: u32 = 32;

const NOISE_MIN_HZ: f32 = 4.0;
const NOISE_MAX_HZ: f32 = 524288.0;

fn octaves(key: f32, base: f32, pitch: i16) -> f32 {
    (key - base) / 12.0 + pitch as f32 / 3072.0
}

/// Native rate of a PCM sample played at `key`.
pub fn pcm_frequency(mid_c_freq: f32, key: u8, pitch: i16) -> f32 {
    mid_c_freq * libm::exp2f(octaves(key as f32, PCM_BASE_KEY, pitch))
}

/// Cycle frequency of a tonal PSG channel before period quantization.
pub fn psg_frequency(key: u8, pitch: i16) -> f32 {
    A4_HZ * libm::exp2f(octaves(key as f32, PSG_BASE_KEY, pitch))
}

/// 11-bit period register closest to `freq` for a channel clocked at `clock`.
pub fn period_register(freq: f32, clock: f32) -> u16 {
    if freq <= 0.0 {
        return 0;
    }
    let x = libm::roundf(2048.0 - clock / freq);
    x.clamp(0.0, PERIOD_MAX as f32) as u16
}

/// Cycle frequency the hardware produces for period register `x`.
pub fn register_frequency(x: u16, clock: f32) -> f32 {
    clock / (2048 - x.min(PERIOD_MAX)) as f32
}

/// Noise LFSR clock rate for `key`, following the driver's noise key table.
pub fn noise_frequency(key: u8, pitch: i16) -> f32 {
    let fkey = key as f32 + pitch as f32 / 256.0;
    let freq = if fkey < 76.0 {
        4096.0 * libm::powf(8.0, (fkey - 60.0) / 12.0)
    } else if fkey < 78.0 {
        65536.0 * libm::exp2f((fkey - 76.0) / 2.0)
    } else if fkey < 80.0 {
        131072.0 * libm::exp2f(fkey - 78.0)
    } else {
        NOISE_MAX_HZ
    };
    freq.clamp(NOISE_MIN_HZ, NOISE_MAX_HZ)
}
