use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Protocol errors
    #[error("Invalid message format: {message}")]
    InvalidMessageFormat { message: String },

    #[error("Line exceeds limit of {max} bytes")]
    LineTooLong { max: usize },

    #[error("Invalid UTF-8 on the wire")]
    InvalidUtf8,

    #[error("Missing required field: {0}")]
    MissingField(String),

    // Enrollment data errors
    #[error("Invalid finger id: {0}")]
    InvalidFingerId(String),

    #[error("Finger id {id} outside store capacity 1-{capacity}")]
    FingerIdOutOfRange { id: u16, capacity: u16 },

    // State machine errors
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
