//! Sensor result codes.
//!
//! Every sensor operation answers with one confirmation code. The set of
//! codes the client cares about is closed; anything else the module reports
//! is preserved in [`SensorOutcome::Unknown`] so callers still handle it
//! exhaustively.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Confirmation codes as reported by the sensor module.
pub mod codes {
    pub const OK: u8 = 0x00;
    pub const PACKET_RECEIVE_ERR: u8 = 0x01;
    pub const NO_FINGER: u8 = 0x02;
    pub const IMAGE_FAIL: u8 = 0x03;
    pub const IMAGE_MESS: u8 = 0x06;
    pub const FEATURE_FAIL: u8 = 0x07;
    pub const NOT_FOUND: u8 = 0x09;
    pub const ENROLL_MISMATCH: u8 = 0x0A;
    pub const BAD_LOCATION: u8 = 0x0B;
    pub const INVALID_IMAGE: u8 = 0x15;
    pub const FLASH_ERR: u8 = 0x18;
}

/// Result of a single sensor operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorOutcome {
    /// Operation succeeded.
    Ok,
    /// No finger on the glass.
    NoFinger,
    /// Packet could not be received from the module.
    CommunicationError,
    /// Image acquisition failed.
    ImagingError,
    /// Image too noisy to extract features.
    ImageTooMessy,
    /// Not enough features in the image.
    FeatureExtractionFailed,
    /// Image buffer holds no valid image.
    InvalidImage,
    /// The two samples do not belong to the same finger.
    EnrollMismatch,
    /// Store location out of range.
    BadLocation,
    /// Writing the store failed.
    FlashError,
    /// No stored template matches.
    NotFound,
    /// Any other code.
    Unknown(u8),
}

impl SensorOutcome {
    /// Map a raw confirmation code.
    pub fn from_code(code: u8) -> Self {
        match code {
            codes::OK => Self::Ok,
            codes::PACKET_RECEIVE_ERR => Self::CommunicationError,
            codes::NO_FINGER => Self::NoFinger,
            codes::IMAGE_FAIL => Self::ImagingError,
            codes::IMAGE_MESS => Self::ImageTooMessy,
            codes::FEATURE_FAIL => Self::FeatureExtractionFailed,
            codes::NOT_FOUND => Self::NotFound,
            codes::ENROLL_MISMATCH => Self::EnrollMismatch,
            codes::BAD_LOCATION => Self::BadLocation,
            codes::INVALID_IMAGE => Self::InvalidImage,
            codes::FLASH_ERR => Self::FlashError,
            other => Self::Unknown(other),
        }
    }

    /// Raw confirmation code.
    pub fn code(&self) -> u8 {
        match self {
            Self::Ok => codes::OK,
            Self::CommunicationError => codes::PACKET_RECEIVE_ERR,
            Self::NoFinger => codes::NO_FINGER,
            Self::ImagingError => codes::IMAGE_FAIL,
            Self::ImageTooMessy => codes::IMAGE_MESS,
            Self::FeatureExtractionFailed => codes::FEATURE_FAIL,
            Self::NotFound => codes::NOT_FOUND,
            Self::EnrollMismatch => codes::ENROLL_MISMATCH,
            Self::BadLocation => codes::BAD_LOCATION,
            Self::InvalidImage => codes::INVALID_IMAGE,
            Self::FlashError => codes::FLASH_ERR,
            Self::Unknown(code) => *code,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Convert to a `Result`, keeping the outcome as the error.
    pub fn into_result(self) -> Result<(), SensorOutcome> {
        if self.is_ok() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for SensorOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::NoFinger => write!(f, "No finger detected"),
            Self::CommunicationError => write!(f, "Communication error"),
            Self::ImagingError => write!(f, "Imaging error"),
            Self::ImageTooMessy => write!(f, "Image too messy"),
            Self::FeatureExtractionFailed | Self::InvalidImage => {
                write!(f, "Could not find fingerprint features")
            }
            Self::EnrollMismatch => write!(f, "Fingerprints did not match"),
            Self::BadLocation => write!(f, "Could not store in that location"),
            Self::FlashError => write!(f, "Error writing to flash"),
            Self::NotFound => write!(f, "Did not find a match"),
            Self::Unknown(code) => write!(f, "Unknown error (0x{code:02X})"),
        }
    }
}
