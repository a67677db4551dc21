//! Mock sensor implementation for testing and development.
//!
//! This module provides a simulated fingerprint module that can be
//! controlled programmatically without requiring physical hardware.

pub mod sensor;

pub use sensor::{MOCK_MATCH_CONFIDENCE, MockSensor, MockSensorHandle, SensorCall, SensorOp};
