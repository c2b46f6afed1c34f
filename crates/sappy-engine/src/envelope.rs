//! Channel envelope state machines.
//!
//! Envelopes are stepped once per render block. The driver's own envelope
//! logic runs at the hardware frame rate, i.e. once every `interframes`
//! steps; in between, the level is interpolated so each block renders a
//! smooth ramp instead of a step.

use sappy_ir::Adsr;

/// Envelope progress of a channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EnvState {
    Init,
    Attack,
    Decay,
    Sustain,
    Release,
    PseudoEcho,
    Die,
    Dead,
}

/// Linear gain ramp across one render block.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VolumeFade {
    pub from_left: f32,
    pub from_right: f32,
    pub to_left: f32,
    pub to_right: f32,
}

impl VolumeFade {
    pub fn from(&self) -> [f32; 2] {
        [self.from_left, self.from_right]
    }

    pub fn to(&self) -> [f32; 2] {
        [self.to_left, self.to_right]
    }

    pub fn is_silent(&self) -> bool {
        self.from_left == 0.0 && self.from_right == 0.0 && self.to_left == 0.0 && self.to_right == 0.0
    }

    /// Apply `f` to all four gains.
    pub fn map(self, mut f: impl FnMut(f32) -> f32) -> Self {
        Self {
            from_left: f(self.from_left),
            from_right: f(self.from_right),
            to_left: f(self.to_left),
            to_right: f(self.to_right),
        }
    }
}

/// Sub-frame interpolation of a level that changes once per hardware frame.
#[derive(Clone, Copy, Debug)]
pub struct LevelRamp {
    /// Level at the previous hardware frame.
    prev: f32,
    /// Level at the current hardware frame.
    cur: f32,
    sub_frame: u32,
    interframes: u32,
    from: f32,
    to: f32,
}

impl LevelRamp {
    pub fn new(interframes: u32) -> Self {
        Self { prev: 0.0, cur: 0.0, sub_frame: 0, interframes: interframes.max(1), from: 0.0, to: 0.0 }
    }

    /// Restart at sub-frame 0 ramping from `prev` to `cur`.
    pub fn start(&mut self, prev: f32, cur: f32) {
        self.prev = prev;
        self.cur = cur;
        self.sub_frame = 0;
    }

    pub fn set(&mut self, level: f32) {
        self.cur = level;
    }

    /// Move to the next sub-frame. Returns `true` on a hardware frame
    /// boundary, after latching the current level as the previous one.
    pub fn advance(&mut self) -> bool {
        self.sub_frame += 1;
        if self.sub_frame >= self.interframes {
            self.sub_frame = 0;
            self.prev = self.cur;
            true
        } else {
            false
        }
    }

    /// Compute this sub-frame's ramp. Stairstep holds the previous level and
    /// only moves during the final sub-frame.
    pub fn interpolate(&mut self, stairstep: bool) {
        let n = self.interframes as f32;
        let s = self.sub_frame as f32;
        if stairstep {
            let last = self.sub_frame + 1 == self.interframes;
            self.from = self.prev;
            self.to = if last { self.cur } else { self.prev };
        } else {
            let delta = (self.cur - self.prev) / n;
            self.from = self.prev + delta * s;
            self.to = self.prev + delta * (s + 1.0);
        }
    }

    /// Ramp from wherever the last sub-frame ended down to silence.
    pub fn fade_out(&mut self) {
        self.from = self.to;
        self.to = 0.0;
        self.prev = 0.0;
        self.cur = 0.0;
    }

    pub fn silence(&mut self) {
        *self = Self::new(self.interframes);
    }

    pub fn from(&self) -> f32 {
        self.from
    }

    pub fn to(&self) -> f32 {
        self.to
    }

    /// Position inside the hardware frame, and the sub-frames per frame.
    pub fn sub_frame(&self) -> (u32, u32) {
        (self.sub_frame, self.interframes)
    }
}

/// Direct-sound envelope with 8-bit levels.
#[derive(Clone, Debug)]
pub struct PcmEnvelope {
    adsr: Adsr,
    state: EnvState,
    level: u8,
    echo_volume: u8,
    echo_length: u8,
    released: bool,
    die_rendered: bool,
    ramp: LevelRamp,
}

impl PcmEnvelope {
    pub fn new(adsr: Adsr, echo_volume: u8, echo_length: u8, interframes: u32) -> Self {
        Self {
            adsr,
            state: EnvState::Init,
            level: 0,
            echo_volume,
            echo_length,
            released: false,
            die_rendered: false,
            ramp: LevelRamp::new(interframes),
        }
    }

    pub fn state(&self) -> EnvState {
        self.state
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Level ramp of the current block, in 0-255 units.
    pub fn ramp(&self) -> (f32, f32) {
        (self.ramp.from(), self.ramp.to())
    }

    pub fn sub_frame(&self) -> (u32, u32) {
        self.ramp.sub_frame()
    }

    /// Advance by one render block.
    pub fn step(&mut self) {
        match self.state {
            EnvState::Dead => return,
            EnvState::Die if self.die_rendered => {
                self.state = EnvState::Dead;
                self.ramp.silence();
                return;
            }
            EnvState::Init if self.released => {
                self.state = EnvState::Dead;
                return;
            }
            EnvState::Init => self.init(),
            _ => {
                if self.ramp.advance() {
                    self.hardware_frame();
                }
            }
        }
        if self.state == EnvState::Die {
            self.ramp.fade_out();
            self.die_rendered = true;
        } else {
            self.ramp.interpolate(false);
        }
    }

    fn init(&mut self) {
        if self.adsr.attack > 0 {
            self.state = EnvState::Attack;
            self.level = 0;
            self.attack();
            self.ramp.start(0.0, self.level as f32);
        } else {
            self.level = 0xFF;
            self.enter_decay();
            self.ramp.start(self.level as f32, self.level as f32);
        }
    }

    fn hardware_frame(&mut self) {
        match self.state {
            EnvState::PseudoEcho => {
                self.echo_length = self.echo_length.saturating_sub(1);
                if self.echo_length == 0 {
                    self.die();
                }
            }
            EnvState::Release => {
                self.level = ((self.level as u16 * self.adsr.release as u16) >> 8) as u8;
                if self.level <= self.echo_volume {
                    self.tail();
                }
            }
            EnvState::Decay => {
                self.level = ((self.level as u16 * self.adsr.decay as u16) >> 8) as u8;
                if self.level <= self.adsr.sustain {
                    self.level = self.adsr.sustain;
                    self.enter_sustain();
                }
            }
            EnvState::Attack => self.attack(),
            _ => {}
        }
        self.ramp.set(self.level as f32);
    }

    fn attack(&mut self) {
        let level = self.level as u16 + self.adsr.attack as u16;
        if level >= 0xFF {
            self.level = 0xFF;
            self.enter_decay();
        } else {
            self.level = level as u8;
        }
    }

    fn enter_decay(&mut self) {
        if self.adsr.decay == 0 || self.adsr.sustain == 0xFF {
            self.level = self.adsr.sustain;
            self.enter_sustain();
        } else {
            self.state = EnvState::Decay;
        }
    }

    fn enter_sustain(&mut self) {
        if self.level == 0 {
            self.tail();
        } else {
            self.state = EnvState::Sustain;
        }
    }

    /// End of the audible envelope: pseudo-echo if configured, else die.
    fn tail(&mut self) {
        if self.echo_volume == 0 || self.echo_length == 0 {
            self.die();
        } else {
            self.state = EnvState::PseudoEcho;
            self.level = self.echo_volume;
        }
    }

    fn die(&mut self) {
        self.state = EnvState::Die;
        self.level = 0;
    }

    /// Note-off.
    pub fn release(&mut self) {
        self.released = true;
        if matches!(self.state, EnvState::Attack | EnvState::Decay | EnvState::Sustain) {
            if self.adsr.release == 0 {
                self.die();
            } else {
                self.state = EnvState::Release;
            }
        }
    }

    /// Fade out within one sub-frame.
    pub fn fast_release(&mut self) {
        self.released = true;
        match self.state {
            EnvState::Init => self.state = EnvState::Dead,
            EnvState::Die | EnvState::Dead => {}
            _ => self.die(),
        }
    }

    pub fn kill(&mut self) {
        self.released = true;
        self.state = EnvState::Dead;
    }
}

/// Hard pan of a PSG channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PsgPan {
    Left,
    #[default]
    Center,
    Right,
}

/// Reload value of the sustain counter when emulating the driver's
/// infrequent sustain refresh.
const SUSTAIN_BUG_PERIOD: u8 = 7;

/// PSG envelope with 4-bit levels and per-stage frame counters.
#[derive(Clone, Debug)]
pub struct PsgEnvelope {
    adsr: Adsr,
    state: EnvState,
    level: u8,
    counter: u8,
    peak: u8,
    sustain_goal: u8,
    echo_volume: u8,
    echo_length: u8,
    released: bool,
    die_rendered: bool,
    sustain_bug: bool,
    pending_volume: bool,
    vol_left: u8,
    vol_right: u8,
    pan: PsgPan,
    pan_prev: PsgPan,
    stairstep: bool,
    ramp: LevelRamp,
    fade: VolumeFade,
}

impl PsgEnvelope {
    pub fn new(
        adsr: Adsr,
        echo_volume: u8,
        echo_length: u8,
        interframes: u32,
        sustain_bug: bool,
        stairstep: bool,
    ) -> Self {
        Self {
            adsr: adsr.masked_for_psg(),
            state: EnvState::Init,
            level: 0,
            counter: 0,
            peak: 0,
            sustain_goal: 0,
            echo_volume,
            echo_length,
            released: false,
            die_rendered: false,
            sustain_bug,
            pending_volume: false,
            vol_left: 0,
            vol_right: 0,
            pan: PsgPan::Center,
            pan_prev: PsgPan::Center,
            stairstep,
            ramp: LevelRamp::new(interframes),
            fade: VolumeFade::default(),
        }
    }

    pub fn state(&self) -> EnvState {
        self.state
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Gains of the current block, 1/32 per level step.
    pub fn fade(&self) -> VolumeFade {
        self.fade
    }

    /// Channel volumes after velocity and pan. Applied on the next envelope
    /// volume refresh.
    pub fn set_volume(&mut self, left: u8, right: u8) {
        self.vol_left = left;
        self.vol_right = right;
        self.pending_volume = true;
    }

    fn apply_volume(&mut self) {
        let (l, r) = (self.vol_left, self.vol_right);
        self.pan = if r / 2 >= l {
            PsgPan::Right
        } else if l / 2 >= r {
            PsgPan::Left
        } else {
            PsgPan::Center
        };
        if self.sustain_bug && self.pending_volume && self.state == EnvState::Sustain {
            self.level = self.sustain_goal;
        }
        self.pending_volume = false;
        self.peak = ((l as u16 + r as u16) >> 4).min(15) as u8;
        self.sustain_goal = ((self.peak as u16 * self.adsr.sustain as u16 + 15) >> 4).min(15) as u8;
    }

    pub fn step(&mut self) {
        match self.state {
            EnvState::Dead => return,
            EnvState::Die if self.die_rendered => {
                self.state = EnvState::Dead;
                self.ramp.silence();
                self.fade = VolumeFade::default();
                return;
            }
            EnvState::Init if self.released => {
                self.state = EnvState::Dead;
                return;
            }
            EnvState::Init => self.init(),
            _ => {
                if self.ramp.advance() {
                    self.hardware_frame();
                }
            }
        }
        if self.state == EnvState::Die {
            self.ramp.fade_out();
            self.die_rendered = true;
        } else {
            self.ramp.interpolate(self.stairstep);
        }
        self.update_fade();
    }

    fn update_fade(&mut self) {
        let from = self.ramp.from() / 32.0;
        let to = self.ramp.to() / 32.0;
        self.fade = VolumeFade {
            from_left: if self.pan_prev == PsgPan::Right { 0.0 } else { from },
            from_right: if self.pan_prev == PsgPan::Left { 0.0 } else { from },
            to_left: if self.pan == PsgPan::Right { 0.0 } else { to },
            to_right: if self.pan == PsgPan::Left { 0.0 } else { to },
        };
        self.pan_prev = self.pan;
    }

    fn init(&mut self) {
        self.apply_volume();
        self.pan_prev = self.pan;
        self.level = 0;
        if self.adsr.attack > 0 {
            self.state = EnvState::Attack;
            self.counter = self.adsr.attack;
        } else {
            self.decay_start();
        }
        self.ramp.start(self.level as f32, self.level as f32);
    }

    fn hardware_frame(&mut self) {
        self.counter = self.counter.saturating_sub(1);
        if self.state == EnvState::PseudoEcho {
            self.counter = 1;
            self.echo_length = self.echo_length.saturating_sub(1);
            if self.echo_length == 0 {
                self.state = EnvState::Die;
            }
        } else if self.released && self.state < EnvState::Release {
            self.state = EnvState::Release;
            self.counter = self.adsr.release;
            if self.level == 0 || self.counter == 0 {
                self.echo_start();
            }
        } else if self.counter == 0 {
            self.apply_volume();
            match self.state {
                EnvState::Release => {
                    self.level = self.level.saturating_sub(1);
                    if self.level == 0 {
                        self.echo_start();
                    } else {
                        self.counter = self.adsr.release;
                    }
                }
                EnvState::Sustain => self.sustain_state(),
                EnvState::Decay => {
                    self.level = self.level.saturating_sub(1);
                    if self.level <= self.sustain_goal {
                        self.sustain_start();
                    } else {
                        self.counter = self.adsr.decay;
                    }
                }
                EnvState::Attack => {
                    self.level += 1;
                    if self.level >= self.peak {
                        self.decay_start();
                    } else {
                        self.counter = self.adsr.attack;
                    }
                }
                _ => {}
            }
        }
        let level = if self.state == EnvState::Die { 0 } else { self.level };
        self.ramp.set(level as f32);
    }

    fn decay_start(&mut self) {
        self.state = EnvState::Decay;
        self.counter = self.adsr.decay;
        if self.peak == 0 || self.counter == 0 || self.peak == self.sustain_goal {
            self.sustain_start();
        } else {
            self.level = self.peak;
        }
    }

    fn sustain_start(&mut self) {
        if self.adsr.sustain == 0 {
            self.state = EnvState::Release;
            self.echo_start();
        } else {
            self.state = EnvState::Sustain;
            self.level = self.sustain_goal;
            self.sustain_state();
        }
    }

    fn sustain_state(&mut self) {
        if self.sustain_bug {
            self.counter = SUSTAIN_BUG_PERIOD;
        } else {
            self.counter = 1;
            self.level = self.sustain_goal;
        }
    }

    fn echo_start(&mut self) {
        self.counter = 1;
        self.level = ((self.peak as u16 * self.echo_volume as u16 + 0xFF) >> 8) as u8;
        if self.level != 0 && self.echo_length != 0 {
            self.state = EnvState::PseudoEcho;
        } else {
            self.state = EnvState::Die;
        }
    }

    /// Note-off; takes effect on the next hardware frame.
    pub fn release(&mut self) {
        self.released = true;
    }

    pub fn fast_release(&mut self) {
        self.released = true;
        match self.state {
            EnvState::Init => self.state = EnvState::Dead,
            EnvState::Die | EnvState::Dead => {}
            _ => self.state = EnvState::Die,
        }
    }

    pub fn kill(&mut self) {
        self.released = true;
        self.state = EnvState::Dead;
    }
}
