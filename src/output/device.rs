use std::io::Write;

use serde::Serialize;

use super::ControlSink;
use crate::control::engine::ControlState;
use crate::error::{Result, TuneError};

pub const AXIS_MAX: u16 = 0xFFFF;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    Throttle,
    Brake,
    Steer,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Button {
    Upshift,
    Downshift,
    Lights,
}

/// A simulated controller that accepts raw axis and button writes.
pub trait VirtualDevice {
    fn set_axis(&mut self, axis: Axis, value: u16) -> std::io::Result<()>;
    fn set_button(&mut self, button: Button, pressed: bool) -> std::io::Result<()>;

    /// Called once after all writes of a cycle.
    fn sync(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum DeviceEvent {
    Axis { axis: Axis, value: u16 },
    Button { button: Button, pressed: bool },
}

/// Device that serializes every write as one JSON object per line, for a
/// platform bridge to replay onto a real virtual joystick.
pub struct JsonLines<W: Write> {
    out: W,
}

impl<W: Write> JsonLines<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_event(&mut self, event: &DeviceEvent) -> std::io::Result<()> {
        serde_json::to_writer(&mut self.out, event)?;
        self.out.write_all(b"\n")
    }
}

impl<W: Write> VirtualDevice for JsonLines<W> {
    fn set_axis(&mut self, axis: Axis, value: u16) -> std::io::Result<()> {
        self.write_event(&DeviceEvent::Axis { axis, value })
    }

    fn set_button(&mut self, button: Button, pressed: bool) -> std::io::Result<()> {
        self.write_event(&DeviceEvent::Button { button, pressed })
    }

    fn sync(&mut self) -> std::io::Result<()> {
        self.out.flush()
    }
}

/// Writes all axes and buttons every cycle, gated or not.
pub struct DeviceSink<D: VirtualDevice> {
    device: D,
    max: u16,
}

impl<D: VirtualDevice> DeviceSink<D> {
    /// `max` is the engine's control range, mapped onto `[0, AXIS_MAX]`.
    pub fn new(device: D, max: u16) -> Self {
        Self { device, max: max.max(1) }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> D {
        self.device
    }

    fn scale(&self, value: u16) -> u16 {
        let scaled = u32::from(value.min(self.max)) * u32::from(AXIS_MAX) / u32::from(self.max);
        scaled as u16
    }

    fn write(&mut self, state: &ControlState) -> std::io::Result<()> {
        let axes = [
            (Axis::Throttle, self.scale(state.throttle)),
            (Axis::Brake, self.scale(state.brake)),
            (Axis::Steer, self.scale(state.steer)),
        ];
        for (axis, value) in axes {
            self.device.set_axis(axis, value)?;
        }
        self.device.set_button(Button::Upshift, state.upshift)?;
        self.device.set_button(Button::Downshift, state.downshift)?;
        self.device.set_button(Button::Lights, state.lights)?;
        self.device.sync()
    }
}

impl<D: VirtualDevice> ControlSink for DeviceSink<D> {
    fn emit(&mut self, state: &ControlState, _previous: &ControlState) -> Result<()> {
        self.write(state)
            .map_err(|e| TuneError::device("virtual device", e))
    }
}
