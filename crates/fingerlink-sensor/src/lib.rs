//! Fingerprint sensor abstraction for the fingerlink client.
//!
//! This crate defines the capability the client consumes from the
//! fingerprint module: image capture, template conversion, model creation,
//! persistent storage and search. Each operation answers with a
//! [`SensorOutcome`], a closed enum over the module's confirmation codes.
//!
//! # Layout
//!
//! - [`outcome`]: the [`SensorOutcome`] vocabulary and raw code mapping
//! - [`traits`]: the [`SensorDevice`] trait
//! - [`error`]: [`SensorError`] for channel bring-up failures
//! - [`mock`]: a scripted [`MockSensor`](mock::MockSensor) for tests and
//!   the desktop emulator
//!
//! # Example
//!
//! ```no_run
//! use fingerlink_sensor::SensorDevice;
//! use fingerlink_core::constants::SENSOR_BAUD_RATE;
//!
//! async fn bring_up<S: SensorDevice>(sensor: &mut S) -> fingerlink_sensor::Result<()> {
//!     sensor.begin_channel(SENSOR_BAUD_RATE).await?;
//!     while !sensor.verify_presence().await {}
//!     Ok(())
//! }
//! ```
//!
//! The serial packet protocol of a physical module is not part of this
//! crate; a driver only has to implement [`SensorDevice`].

pub mod error;
pub mod mock;
pub mod outcome;
pub mod traits;

pub use error::{Result, SensorError};
pub use outcome::SensorOutcome;
pub use traits::SensorDevice;
