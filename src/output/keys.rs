use std::io::Write;

use serde::Deserialize;

use super::ControlSink;
use crate::control::engine::{ControlState, Speed, Steer};
use crate::error::{Result, TuneError};

/// Letters sent for each command, plus the bundle terminator.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Keymap {
    #[serde(default = "default_brake")]
    pub brake: String,
    #[serde(default = "default_accelerate")]
    pub accelerate: String,
    #[serde(default = "default_left")]
    pub left: String,
    #[serde(default = "default_right")]
    pub right: String,
    #[serde(default = "default_upshift")]
    pub upshift: String,
    #[serde(default = "default_downshift")]
    pub downshift: String,
    #[serde(default = "default_terminator")]
    pub terminator: String,
}

impl Default for Keymap {
    fn default() -> Self {
        Self {
            brake: default_brake(),
            accelerate: default_accelerate(),
            left: default_left(),
            right: default_right(),
            upshift: default_upshift(),
            downshift: default_downshift(),
            terminator: default_terminator(),
        }
    }
}

fn default_brake() -> String { "b".into() }
fn default_accelerate() -> String { "a".into() }
fn default_left() -> String { "l".into() }
fn default_right() -> String { "r".into() }
fn default_upshift() -> String { "u".into() }
fn default_downshift() -> String { "d".into() }
fn default_terminator() -> String { "\n".into() }

impl Keymap {
    /// Command bundle for one cycle, without terminator. Shift keys appear
    /// only on the cycle their level rose.
    pub fn commands(&self, state: &ControlState) -> String {
        let mut out = String::new();
        match state.speed {
            Some(Speed::Brake) => out.push_str(&self.brake),
            Some(Speed::Accelerate) => out.push_str(&self.accelerate),
            None => {}
        }
        if state.downshift_edge {
            out.push_str(&self.downshift);
        }
        if state.upshift_edge {
            out.push_str(&self.upshift);
        }
        match state.steering {
            Some(Steer::Left) => out.push_str(&self.left),
            Some(Steer::Right) => out.push_str(&self.right),
            None => {}
        }
        out
    }
}

/// Writes key-press strings, one bundle per cycle whose command set changed.
pub struct KeystrokeSink<W: Write> {
    out: W,
    keymap: Keymap,
}

impl<W: Write> KeystrokeSink<W> {
    pub fn new(out: W, keymap: Keymap) -> Self {
        Self { out, keymap }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ControlSink for KeystrokeSink<W> {
    fn emit(&mut self, state: &ControlState, previous: &ControlState) -> Result<()> {
        let commands = self.keymap.commands(state);
        if commands.is_empty() || commands == self.keymap.commands(previous) {
            return Ok(());
        }
        log::debug!("keys: {:?}", commands);
        self.out
            .write_all(commands.as_bytes())
            .and_then(|_| self.out.write_all(self.keymap.terminator.as_bytes()))
            .and_then(|_| self.out.flush())
            .map_err(|e| TuneError::device("keystroke output", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::bands::{BandEffect, BandRule, BandTable, Preset};
    use crate::control::engine::{ControlEngine, Input, Tuning};

    fn run(freqs: &[Option<f32>]) -> String {
        run_with(Preset::Keys.table(), freqs)
    }

    fn run_with(bands: BandTable, freqs: &[Option<f32>]) -> String {
        let mut engine = ControlEngine::new(Tuning::default(), bands);
        let mut sink = KeystrokeSink::new(Vec::new(), Keymap::default());
        for f in freqs {
            let previous = *engine.state();
            let input = f.map_or(Input::Silent, Input::Active);
            let state = *engine.step(input);
            sink.emit(&state, &previous).unwrap();
        }
        String::from_utf8(sink.into_inner()).unwrap()
    }

    #[test]
    fn held_note_stops_repeating() {
        // 180 Hz: brake, downshift, left
        let out = run(&[Some(180.0), Some(180.0), Some(180.0)]);
        assert_eq!(out, "bdl\nbl\n");
    }

    #[test]
    fn upshift_only_on_the_rising_edge() {
        let out = run(&[Some(290.0), Some(330.0), Some(330.0), Some(290.0), Some(330.0)]);
        assert_eq!(out, "a\nau\na\nau\n");
    }

    #[test]
    fn silence_sends_nothing_and_rearms() {
        let out = run(&[Some(290.0), None, None, Some(290.0)]);
        assert_eq!(out, "a\na\n");
    }

    #[test]
    fn steering_changes_are_sent() {
        // 220 Hz steers right, 235 Hz steers left, both while braking
        let out = run(&[Some(220.0), Some(235.0)]);
        assert_eq!(out, "bdr\nbl\n");
    }

    #[test]
    fn shift_is_sent_whatever_the_speed_band() {
        let bands = BandTable::new(vec![
            BandRule::new(0.0, 300.0, BandEffect::Brake),
            BandRule::new(300.0, f32::INFINITY, BandEffect::Accelerate),
            BandRule::new(250.0, f32::INFINITY, BandEffect::Upshift),
            BandRule::new(0.0, 200.0, BandEffect::Downshift),
        ]);
        // 260 Hz brakes while upshifting; 350 Hz accelerates with no edge
        let out = run_with(bands, &[Some(260.0), Some(350.0)]);
        assert_eq!(out, "bu\na\n");

        let keymap = Keymap::default();
        let state = ControlState {
            downshift_edge: true,
            ..ControlState::default()
        };
        assert_eq!(keymap.commands(&state), "d");
    }

    #[test]
    fn custom_keymap_and_terminator() {
        let keymap = Keymap {
            accelerate: "w".into(),
            terminator: "{ENTER}".into(),
            ..Keymap::default()
        };
        let state = ControlState {
            speed: Some(Speed::Accelerate),
            steering: Some(Steer::Right),
            ..ControlState::default()
        };
        let mut sink = KeystrokeSink::new(Vec::new(), keymap);
        sink.emit(&state, &ControlState::default()).unwrap();
        assert_eq!(sink.into_inner(), b"wr{ENTER}");
    }
}
