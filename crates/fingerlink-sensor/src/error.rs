//! Error types for sensor bring-up.
//!
//! Regular sensor operations report a [`SensorOutcome`](crate::SensorOutcome)
//! instead of failing. These errors cover the channel itself.

/// Result type alias for sensor channel operations.
pub type Result<T> = std::result::Result<T, SensorError>;

/// Errors that can occur while opening the sensor channel.
#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    /// The channel could not be opened or the module rejected the settings.
    #[error("Initialization failed: {message}")]
    InitializationFailed { message: String },
}

impl SensorError {
    /// Create a new initialization failed error.
    pub fn initialization_failed(message: impl Into<String>) -> Self {
        Self::InitializationFailed {
            message: message.into(),
        }
    }
}
