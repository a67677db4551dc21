//! Device logic of the fingerlink client.
//!
//! This crate contains the biometric state machines and the control loop
//! that connects them to the server:
//!
//! - [`CaptureController`]: sensor polls into one feature template
//! - [`EnrollmentMachine`]: two captures, comparison, storage
//! - [`identify`]: one capture resolved against the store
//! - [`DeviceContext`]: owns sensor, connection, status sink and hooks;
//!   its `tick` is the command dispatcher
//! - [`LcdDisplay`]: 2x16 status sink
//!
//! # Example
//!
//! ```no_run
//! use fingerlink_device::{DeviceConfig, DeviceContext, LcdDisplay, RunExit};
//! use fingerlink_network::{ConnectionConfig, ConnectionManager};
//! use fingerlink_sensor::mock::MockSensor;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (sensor, _handle) = MockSensor::new();
//! let connection = ConnectionManager::new(ConnectionConfig::default());
//!
//! let mut device = DeviceContext::new(DeviceConfig::default(), sensor, connection)
//!     .with_status(LcdDisplay::new());
//! device.start().await?;
//!
//! if device.run().await? == RunExit::Reboot {
//!     println!("restart requested");
//! }
//! # Ok(())
//! # }
//! ```

pub mod capture;
pub mod context;
mod dispatcher;
pub mod display;
pub mod enrollment;
pub mod identification;
pub mod lifecycle;
pub mod poll;
pub mod status;

pub use capture::{CaptureController, CaptureError};
pub use context::{DeviceConfig, DeviceContext, DeviceError, RunExit, ScanMode, Tick};
pub use display::LcdDisplay;
pub use enrollment::{EnrollError, EnrollState, EnrollTiming, EnrollmentMachine};
pub use identification::identify;
pub use lifecycle::{ButtonInput, LifecycleHooks, NoButton, NoopHooks};
pub use poll::Step;
pub use status::{RecordingSink, StatusSink};
