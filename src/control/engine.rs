use std::fmt;

use super::bands::{BandEffect, BandTable, Classification};

/// Ramp sizes and limits, all in control units per cycle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tuning {
    pub max: u16,
    pub throttle_step: u16,
    pub brake_step: u16,
    /// Decay applied to throttle and brake in coast and silence.
    pub release_step: u16,
    pub steer_step: u16,
    /// Step multiplier while the wheel is on the wrong side of center.
    pub steer_cross_multiplier: f32,
}

impl Tuning {
    pub fn center(&self) -> u16 {
        self.max / 2
    }
}

impl Default for Tuning {
    fn default() -> Self {
        // ~43 cycles/s at 44.1 kHz with 1024-sample blocks
        Self {
            max: 0x8000,
            throttle_step: 768,
            brake_step: 1024,
            release_step: 768,
            steer_step: 768,
            steer_cross_multiplier: 2.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Speed {
    Brake,
    Accelerate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Steer {
    Left,
    Right,
}

/// What the engine hands to the output sinks after each cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ControlState {
    pub throttle: u16,
    pub brake: u16,
    pub steer: u16,
    pub upshift: bool,
    pub downshift: bool,
    /// Raised only on the cycle the matching shift level went high.
    pub upshift_edge: bool,
    pub downshift_edge: bool,
    pub lights: bool,
    /// This cycle's classification, `None` when silent or in a dead zone.
    pub speed: Option<Speed>,
    pub steering: Option<Steer>,
    pub active: bool,
}

impl ControlState {
    pub fn at_rest(tuning: &Tuning) -> Self {
        Self {
            steer: tuning.center(),
            ..Self::default()
        }
    }
}

impl fmt::Display for ControlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let gear = match (self.downshift, self.upshift) {
            (true, _) => "-",
            (_, true) => "+",
            _ => " ",
        };
        write!(
            f,
            "thr {:5} brk {:5} steer {:5} gear {} lights {}",
            self.throttle,
            self.brake,
            self.steer,
            gear,
            if self.lights { "on" } else { "off" }
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Input {
    /// Noise gate closed.
    Silent,
    Active(f32),
}

pub struct ControlEngine {
    tuning: Tuning,
    bands: BandTable,
    state: ControlState,
}

impl ControlEngine {
    pub fn new(tuning: Tuning, bands: BandTable) -> Self {
        Self {
            state: ControlState::at_rest(&tuning),
            tuning,
            bands,
        }
    }

    pub fn state(&self) -> &ControlState {
        &self.state
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    /// Advance one analysis cycle.
    pub fn step(&mut self, input: Input) -> &ControlState {
        match input {
            Input::Silent => self.release(),
            Input::Active(freq) => {
                let classification = self.bands.classify(freq);
                self.drive(classification);
            }
        }
        &self.state
    }

    fn release(&mut self) {
        let t = self.tuning;
        let s = &mut self.state;
        s.throttle = s.throttle.saturating_sub(t.release_step);
        s.brake = s.brake.saturating_sub(t.release_step);
        s.steer = approach(s.steer, t.center(), t.steer_step);
        s.upshift = false;
        s.downshift = false;
        s.upshift_edge = false;
        s.downshift_edge = false;
        s.lights = false;
        s.speed = None;
        s.steering = None;
        s.active = false;
    }

    fn drive(&mut self, c: Classification) {
        let t = self.tuning;
        let s = &mut self.state;
        s.active = true;

        s.speed = match c.speed {
            Some(BandEffect::Brake) => {
                s.throttle = 0;
                s.brake = s.brake.saturating_add(t.brake_step).min(t.max);
                Some(Speed::Brake)
            }
            Some(BandEffect::Accelerate) => {
                s.brake = 0;
                s.throttle = s.throttle.saturating_add(t.throttle_step).min(t.max);
                Some(Speed::Accelerate)
            }
            _ => {
                s.throttle = s.throttle.saturating_sub(t.release_step);
                s.brake = s.brake.saturating_sub(t.release_step);
                None
            }
        };

        let (down, up) = match c.shift {
            Some(BandEffect::Downshift) => (true, false),
            Some(BandEffect::Upshift) => (false, true),
            _ => (false, false),
        };
        s.downshift_edge = down && !s.downshift;
        s.upshift_edge = up && !s.upshift;
        s.downshift = down;
        s.upshift = up;

        s.steering = match c.steer {
            Some(BandEffect::SteerLeft) => Some(Steer::Left),
            Some(BandEffect::SteerRight) => Some(Steer::Right),
            _ => None,
        };
        s.steer = steer_toward(s.steer, s.steering, &t);

        s.lights = !s.lights;
    }
}

/// Move `from` toward `to` by at most `step`, never past it.
fn approach(from: u16, to: u16, step: u16) -> u16 {
    if from < to {
        from.saturating_add(step).min(to)
    } else {
        from.saturating_sub(step).max(to)
    }
}

fn steer_toward(pos: u16, dir: Option<Steer>, t: &Tuning) -> u16 {
    let center = t.center();
    let cross_step = (t.steer_step as f32 * t.steer_cross_multiplier)
        .round()
        .clamp(0.0, u16::MAX as f32) as u16;
    match dir {
        None => approach(pos, center, t.steer_step),
        Some(Steer::Left) => {
            let step = if pos > center { cross_step } else { t.steer_step };
            approach(pos, 0, step)
        }
        Some(Steer::Right) => {
            let step = if pos < center { cross_step } else { t.steer_step };
            approach(pos, t.max, step)
        }
    }
}
