//! Audio frame type.

use core::ops::{Add, AddAssign, Mul};

/// A stereo audio frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Frame {
    pub left: f32,
    pub right: f32,
}

impl Frame {
    /// Create a silent frame.
    pub const fn silence() -> Self {
        Self { left: 0.0, right: 0.0 }
    }

    pub const fn new(left: f32, right: f32) -> Self {
        Self { left, right }
    }

    /// Create a mono frame (same value for both channels).
    pub const fn mono(value: f32) -> Self {
        Self { left: value, right: value }
    }

    /// Sum of both sides.
    pub fn sum(self) -> f32 {
        self.left + self.right
    }

    /// Swap left and right.
    pub fn swapped(self) -> Self {
        Self { left: self.right, right: self.left }
    }
}

impl Add for Frame {
    type Output = Frame;

    fn add(self, other: Frame) -> Frame {
        Frame::new(self.left + other.left, self.right + other.right)
    }
}

impl AddAssign for Frame {
    fn add_assign(&mut self, other: Frame) {
        self.left += other.left;
        self.right += other.right;
    }
}

impl Mul<f32> for Frame {
    type Output = Frame;

    fn mul(self, gain: f32) -> Frame {
        Frame::new(self.left * gain, self.right * gain)
    }
}
