use clap::ValueEnum;
use serde::Deserialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BandEffect {
    Brake,
    Accelerate,
    Downshift,
    Upshift,
    SteerLeft,
    SteerRight,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Channel {
    Speed,
    Shift,
    Steer,
}

impl BandEffect {
    pub fn channel(self) -> Channel {
        match self {
            BandEffect::Brake | BandEffect::Accelerate => Channel::Speed,
            BandEffect::Downshift | BandEffect::Upshift => Channel::Shift,
            BandEffect::SteerLeft | BandEffect::SteerRight => Channel::Steer,
        }
    }
}

/// One `[low_hz, high_hz)` range and what it asks for.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct BandRule {
    #[serde(default)]
    pub low_hz: f32,
    #[serde(default = "unbounded")]
    pub high_hz: f32,
    pub effect: BandEffect,
}

fn unbounded() -> f32 {
    f32::INFINITY
}

impl BandRule {
    pub const fn new(low_hz: f32, high_hz: f32, effect: BandEffect) -> Self {
        Self { low_hz, high_hz, effect }
    }

    pub fn contains(&self, freq: f32) -> bool {
        self.low_hz <= freq && freq < self.high_hz
    }
}

/// Per-channel outcome of classifying one frequency. `None` means no rule in
/// that channel matched.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Classification {
    pub speed: Option<BandEffect>,
    pub shift: Option<BandEffect>,
    pub steer: Option<BandEffect>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BandTable {
    rules: Vec<BandRule>,
}

impl BandTable {
    pub fn new(rules: Vec<BandRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[BandRule] {
        &self.rules
    }

    /// Rules are scanned in order; the first match in each channel wins.
    pub fn classify(&self, freq: f32) -> Classification {
        let mut out = Classification::default();
        for rule in self.rules.iter().filter(|r| r.contains(freq)) {
            let slot = match rule.effect.channel() {
                Channel::Speed => &mut out.speed,
                Channel::Shift => &mut out.shift,
                Channel::Steer => &mut out.steer,
            };
            if slot.is_none() {
                *slot = Some(rule.effect);
            }
        }
        out
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    /// Thresholds tuned for keystroke output
    Keys,
    /// Thresholds tuned for analog device output
    Device,
}

impl Preset {
    pub fn name(self) -> &'static str {
        match self {
            Preset::Keys => "keys",
            Preset::Device => "device",
        }
    }

    pub fn table(self) -> BandTable {
        let rules = match self {
            Preset::Keys => KEYS_RULES,
            Preset::Device => DEVICE_RULES,
        };
        BandTable::new(rules.to_vec())
    }
}

use BandEffect::*;

const INF: f32 = f32::INFINITY;

const KEYS_RULES: &[BandRule] = &[
    BandRule::new(0.0, 270.0, Brake),
    BandRule::new(270.0, INF, Accelerate),
    BandRule::new(0.0, 230.0, Downshift),
    BandRule::new(310.0, INF, Upshift),
    BandRule::new(0.0, 205.0, SteerLeft),
    BandRule::new(230.0, 242.0, SteerLeft),
    BandRule::new(270.0, 282.0, SteerLeft),
    BandRule::new(312.0, 325.0, SteerLeft),
    BandRule::new(215.0, 230.0, SteerRight),
    BandRule::new(260.0, 270.0, SteerRight),
    BandRule::new(300.0, 312.0, SteerRight),
    BandRule::new(345.0, INF, SteerRight),
];

// Keys bands shifted so A3 brakes and steers left, with a coast gap at 265..275 Hz.
const DEVICE_RULES: &[BandRule] = &[
    BandRule::new(0.0, 265.0, Brake),
    BandRule::new(275.0, INF, Accelerate),
    BandRule::new(0.0, 225.0, Downshift),
    BandRule::new(315.0, INF, Upshift),
    BandRule::new(0.0, 200.0, SteerLeft),
    BandRule::new(212.0, 232.0, SteerLeft),
    BandRule::new(275.0, 287.0, SteerLeft),
    BandRule::new(315.0, 328.0, SteerLeft),
    BandRule::new(232.0, 244.0, SteerRight),
    BandRule::new(255.0, 265.0, SteerRight),
    BandRule::new(300.0, 315.0, SteerRight),
    BandRule::new(345.0, INF, SteerRight),
];
