//! Lookup tables for the windowed-sinc kernel family.
//!
//! Every table covers `0..=WINDOW` in `LUT_SIZE` steps plus one guard entry
//! so linear interpolation never reads past the end.

use alloc::vec::Vec;
use core::f64::consts::PI;

/// Half-width of the sinc-family kernels in input samples.
pub const WINDOW: usize = 16;
/// Entries per table, excluding the guard entries.
pub const LUT_SIZE: usize = 256;
/// Integration sub-steps per table entry for the integrated tables.
const INTEGRAL_RESOLUTION: usize = 256;

const LUT_SCALE: f32 = LUT_SIZE as f32 / WINDOW as f32;

/// Normalized sinc, `sin(x) / x` with the removable singularity filled in.
fn sinc(x: f64) -> f64 {
    if libm::fabs(x) < 1.0e-9 {
        1.0
    } else {
        libm::sin(x) / x
    }
}

/// Precomputed kernel tables shared by every resampler of an engine.
#[derive(Clone, Debug)]
pub struct KernelTables {
    sinc: Vec<f32>,
    window: Vec<f32>,
    /// Running integral of the sinc, converging to 0.5.
    si: Vec<f32>,
    /// Integral of `si`, converging to `t / 2`.
    ti: Vec<f32>,
}

impl Default for KernelTables {
    fn default() -> Self {
        Self::new()
    }
}

impl KernelTables {
    pub fn new() -> Self {
        let step_per_index = WINDOW as f64 / LUT_SIZE as f64;
        let integration_inc = step_per_index / INTEGRAL_RESOLUTION as f64;

        let mut sinc_lut = Vec::with_capacity(LUT_SIZE + 2);
        let mut window = Vec::with_capacity(LUT_SIZE + 2);
        let mut si = Vec::with_capacity(LUT_SIZE + 2);
        let mut ti = Vec::with_capacity(LUT_SIZE + 2);

        let mut acc = 0.0f64;
        let mut x = 0.0f64;
        let mut prev = 1.0f64;
        for i in 0..=LUT_SIZE {
            let t = i as f64 * step_per_index;
            // Raised cosine blending the integrals into their asymptotes.
            let converge = 0.5 - 0.5 * libm::cos(i as f64 * PI / LUT_SIZE as f64);

            sinc_lut.push(sinc(PI * t) as f32);
            window.push((1.0 - converge) as f32);
            si.push((acc * (1.0 - converge) + 0.5 * converge) as f32);
            let ramp = t * acc + libm::cos(PI * t) / (PI * PI);
            ti.push((ramp + converge * (t * 0.5 - ramp)) as f32);

            for _ in 0..INTEGRAL_RESOLUTION {
                x += integration_inc;
                let value = sinc(PI * x);
                acc += (value + prev) * integration_inc * 0.5;
                prev = value;
            }
        }
        sinc_lut.push(0.0);
        window.push(0.0);
        si.push(0.5);
        ti.push(((LUT_SIZE + 1) as f64 * step_per_index * 0.5) as f32);

        Self { sinc: sinc_lut, window, si, ti }
    }

    fn lookup(table: &[f32], t: f32) -> f32 {
        let t = libm::fabsf(t).min(WINDOW as f32) * LUT_SCALE;
        let left = t as usize;
        let frac = t - left as f32;
        table[left] + frac * (table[left + 1] - table[left])
    }

    /// `sinc(pi * t)` for `|t| <= WINDOW`.
    pub fn sinc(&self, t: f32) -> f32 {
        Self::lookup(&self.sinc, t)
    }

    /// Hann window spanning `-WINDOW..=WINDOW`.
    pub fn window(&self, t: f32) -> f32 {
        Self::lookup(&self.window, t)
    }

    /// Sine integral of the normalized sinc, odd and saturating at ±0.5.
    pub fn si(&self, t: f32) -> f32 {
        libm::copysignf(Self::lookup(&self.si, t), t)
    }

    /// Integral of [`si`](Self::si), even and asymptotic to `|t| / 2`.
    pub fn ti(&self, t: f32) -> f32 {
        let t = libm::fabsf(t);
        if t > WINDOW as f32 {
            t * 0.5
        } else {
            Self::lookup(&self.ti, t)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_have_guard_entries() {
        let tables = KernelTables::new();
        assert_eq!(tables.sinc.len(), LUT_SIZE + 2);
        assert_eq!(tables.ti.len(), LUT_SIZE + 2);
    }

    #[test]
    fn sinc_has_zeros_at_integers() {
        let tables = KernelTables::new();
        assert!((tables.sinc(0.0) - 1.0).abs() < 1e-6);
        for n in 1..WINDOW {
            assert!(tables.sinc(n as f32).abs() < 1e-3, "sinc({n})");
        }
    }

    #[test]
    fn window_falls_from_one_to_zero() {
        let tables = KernelTables::new();
        assert!((tables.window(0.0) - 1.0).abs() < 1e-6);
        assert!((tables.window(8.0) - 0.5).abs() < 1e-3);
        assert!(tables.window(WINDOW as f32).abs() < 1e-6);
    }

    #[test]
    fn si_is_odd_and_saturates() {
        let tables = KernelTables::new();
        assert_eq!(tables.si(0.0), 0.0);
        assert!((tables.si(3.3) + tables.si(-3.3)).abs() < 1e-6);
        assert!((tables.si(100.0) - 0.5).abs() < 1e-6);
        assert!((tables.si(-100.0) + 0.5).abs() < 1e-6);
    }

    #[test]
    fn ti_is_even_and_grows_linearly() {
        let tables = KernelTables::new();
        assert!((tables.ti(2.5) - tables.ti(-2.5)).abs() < 1e-6);
        assert_eq!(tables.ti(40.0), 20.0);
        assert!((tables.ti(WINDOW as f32) - 8.0).abs() < 1e-3);
    }
}
