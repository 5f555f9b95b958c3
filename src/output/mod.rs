pub mod device;
pub mod keys;

use crate::control::engine::ControlState;
use crate::error::Result;

/// Destination for the control state after every completed cycle.
pub trait ControlSink {
    fn emit(&mut self, state: &ControlState, previous: &ControlState) -> Result<()>;
}
