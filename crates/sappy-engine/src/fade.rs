//! Player fade-in and fade-out.

/// Exponent shaping the linear fade position into a gain.
const FADE_CURVE: f32 = 10.0 / 6.0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FadeDirection {
    #[default]
    None,
    In,
    Out,
}

/// Linear fade position counted down in render blocks.
///
/// [`update`](Self::update) is called once per block before mixing. The
/// mixer ramps from [`prev_gain`](Self::prev_gain) to [`gain`](Self::gain)
/// across the block.
#[derive(Clone, Debug)]
pub struct FadeController {
    direction: FadeDirection,
    pos: f32,
    step: f32,
    frames_left: u32,
    prev_gain: f32,
    gain: f32,
}

impl Default for FadeController {
    fn default() -> Self {
        Self::new()
    }
}

impl FadeController {
    pub fn new() -> Self {
        Self { direction: FadeDirection::None, pos: 1.0, step: 0.0, frames_left: 0, prev_gain: 1.0, gain: 1.0 }
    }

    /// Drop any fade and return to unity gain.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Start fading to silence over `frames` render blocks.
    pub fn start_out(&mut self, frames: u32) {
        self.start(FadeDirection::Out, 1.0, frames);
    }

    /// Start fading from silence over `frames` render blocks.
    pub fn start_in(&mut self, frames: u32) {
        self.start(FadeDirection::In, 0.0, frames);
    }

    fn start(&mut self, direction: FadeDirection, from: f32, frames: u32) {
        let target = if direction == FadeDirection::Out { 0.0 } else { 1.0 };
        self.direction = direction;
        self.pos = from;
        self.frames_left = frames;
        self.step = if frames == 0 { target - from } else { (target - from) / frames as f32 };
        self.gain = shape(from);
        log::debug!("fade {direction:?} over {frames} frames");
    }

    /// Advance one render block.
    pub fn update(&mut self) {
        self.prev_gain = self.gain;
        if self.direction == FadeDirection::None {
            return;
        }
        if self.frames_left == 0 {
            // Zero-length fades jump straight to their target.
            self.pos = if self.direction == FadeDirection::Out { 0.0 } else { 1.0 };
        } else {
            self.pos += self.step;
            self.frames_left -= 1;
            if self.frames_left == 0 {
                self.pos = if self.direction == FadeDirection::Out { 0.0 } else { 1.0 };
            }
        }
        self.gain = shape(self.pos);
        if self.direction == FadeDirection::In && self.frames_left == 0 {
            self.direction = FadeDirection::None;
        }
    }

    pub fn direction(&self) -> FadeDirection {
        self.direction
    }

    pub fn is_fading(&self) -> bool {
        self.frames_left > 0
    }

    /// A fade-out has reached silence.
    pub fn is_faded_out(&self) -> bool {
        self.direction == FadeDirection::Out && self.frames_left == 0 && self.pos <= 0.0
    }

    /// No fade step remains.
    pub fn is_done(&self) -> bool {
        self.frames_left == 0 && (self.direction != FadeDirection::Out || self.pos <= 0.0)
    }

    pub fn prev_gain(&self) -> f32 {
        self.prev_gain
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }
}

fn shape(pos: f32) -> f32 {
    if pos <= 0.0 {
        0.0
    } else {
        libm::powf(pos, FADE_CURVE)
    }
}
