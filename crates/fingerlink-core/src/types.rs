use crate::{
    Result,
    constants::{METADATA_FIELDS, MIN_FINGER_ID},
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Template id in the sensor store (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FingerId(u16);

impl FingerId {
    /// Create a finger id with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidFingerId` if the id is zero.
    pub fn new(id: u16) -> Result<Self> {
        if id < MIN_FINGER_ID {
            return Err(Error::InvalidFingerId(format!(
                "Finger id must be at least {MIN_FINGER_ID}, got {id}"
            )));
        }
        Ok(FingerId(id))
    }

    /// Create a finger id that must also fit a store of `capacity` slots.
    ///
    /// # Errors
    /// Returns `Error::InvalidFingerId` for zero and
    /// `Error::FingerIdOutOfRange` for ids above `capacity`.
    pub fn within_capacity(id: u16, capacity: u16) -> Result<Self> {
        let id = Self::new(id)?;
        if id.0 > capacity {
            return Err(Error::FingerIdOutOfRange { id: id.0, capacity });
        }
        Ok(id)
    }

    /// Parse an id line from the server.
    ///
    /// Surrounding whitespace is ignored; anything else that is not a
    /// decimal `u16` is rejected.
    ///
    /// # Errors
    /// Returns an error if the text is not a number or the id is out of range.
    pub fn parse_with_capacity(text: &str, capacity: u16) -> Result<Self> {
        let id: u16 = text
            .trim()
            .parse()
            .map_err(|_| Error::InvalidFingerId(format!("Not a number: {text:?}")))?;
        Self::within_capacity(id, capacity)
    }

    /// Get the raw id.
    #[must_use]
    pub fn as_u16(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for FingerId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One of the two transient capture buffers in the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Slot {
    One,
    Two,
}

impl Slot {
    /// Buffer number as the sensor numbers it.
    #[must_use]
    pub fn number(&self) -> u8 {
        match self {
            Slot::One => 1,
            Slot::Two => 2,
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Handle to a feature template held in a sensor buffer.
///
/// Valid only until the next capture overwrites the buffer; it is never
/// persisted directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureTemplate {
    slot: Slot,
}

impl FeatureTemplate {
    pub fn new(slot: Slot) -> Self {
        Self { slot }
    }

    pub fn slot(&self) -> Slot {
        self.slot
    }
}

/// Sensor-reported match strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Confidence(pub u16);

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stored template that matched the scanned finger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerMatch {
    pub id: FingerId,
    pub confidence: Confidence,
}

impl FingerMatch {
    pub fn new(id: FingerId, confidence: u16) -> Self {
        Self {
            id,
            confidence: Confidence(confidence),
        }
    }
}

/// Outcome of one identification cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentificationResult {
    Match(FingerMatch),
    NoMatch,
}

impl IdentificationResult {
    pub fn matched(&self) -> Option<&FingerMatch> {
        match self {
            Self::Match(m) => Some(m),
            Self::NoMatch => None,
        }
    }
}

/// Personal data that accompanies an enrollment, in wire order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Metadata {
    pub first_name: String,
    pub middle_name: String,
    pub last_name: String,
    pub age: String,
    pub gender: String,
    pub phone_number: String,
    pub address: String,
}

impl Metadata {
    /// Build metadata from exactly seven fields in wire order.
    ///
    /// # Errors
    /// Returns `Error::MissingField` if fewer fields are supplied and
    /// `Error::InvalidMessageFormat` if more are.
    pub fn from_fields<I>(fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut it = fields.into_iter();
        let mut next = |name: &str| it.next().ok_or_else(|| Error::MissingField(name.to_string()));

        let metadata = Metadata {
            first_name: next("first_name")?,
            middle_name: next("middle_name")?,
            last_name: next("last_name")?,
            age: next("age")?,
            gender: next("gender")?,
            phone_number: next("phone_number")?,
            address: next("address")?,
        };

        if it.next().is_some() {
            return Err(Error::InvalidMessageFormat {
                message: format!("Expected {METADATA_FIELDS} metadata fields"),
            });
        }
        Ok(metadata)
    }

    /// Fields in wire order.
    pub fn fields(&self) -> [&str; METADATA_FIELDS] {
        [
            &self.first_name,
            &self.middle_name,
            &self.last_name,
            &self.age,
            &self.gender,
            &self.phone_number,
            &self.address,
        ]
    }
}

/// An enrollment request: where to store the template and whose it is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentRecord {
    pub id: FingerId,
    pub metadata: Metadata,
}

impl EnrollmentRecord {
    pub fn new(id: FingerId, metadata: Metadata) -> Self {
        Self { id, metadata }
    }
}
