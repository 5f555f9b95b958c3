use thiserror::Error;

#[derive(Debug, Error)]
pub enum TuneError {
    /// An audio block did not have the configured frame size.
    #[error("invalid audio block: expected {expected} samples, got {actual}")]
    InvalidInput { expected: usize, actual: usize },

    /// Frequency outside the domain of the semitone mapping (f <= 0 or not finite).
    #[error("frequency {0} Hz has no note number")]
    Domain(f32),

    #[error("{device} unavailable")]
    DeviceUnavailable {
        device: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl TuneError {
    pub fn device(device: &'static str, source: std::io::Error) -> Self {
        Self::DeviceUnavailable { device, source }
    }
}

pub type Result<T> = std::result::Result<T, TuneError>;
