//! Sensor device trait definition.
//!
//! [`SensorDevice`] is the contract between the capture/enrollment/
//! identification state machines and a fingerprint module. Packet framing,
//! checksums and the serial transport stay behind it.
//!
//! All methods use native `async fn` (Edition 2024 RPITIT), so the trait
//! is used through generics rather than trait objects.

#![allow(async_fn_in_trait)]

use crate::error::Result;
use crate::outcome::SensorOutcome;
use fingerlink_core::{FingerId, FingerMatch, Slot};

/// Fingerprint sensor abstraction.
///
/// The module owns two transient template buffers ([`Slot`]) and a
/// persistent template store addressed by [`FingerId`]. Image acquisition
/// writes a scratch image; conversion turns it into a template in a slot.
///
/// The sensor is a single-owner serial resource: every method takes
/// `&mut self`, so two operations can never overlap.
///
/// # Examples
///
/// ```no_run
/// use fingerlink_sensor::{SensorDevice, SensorOutcome};
/// use fingerlink_core::Slot;
///
/// async fn sample<S: SensorDevice>(sensor: &mut S) -> Result<(), SensorOutcome> {
///     while sensor.acquire_image().await == SensorOutcome::NoFinger {}
///     sensor.image_to_template(Slot::One).await.into_result()
/// }
/// ```
pub trait SensorDevice: Send {
    /// Open the serial channel at `baud_rate`.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel cannot be opened.
    async fn begin_channel(&mut self, baud_rate: u32) -> Result<()>;

    /// Handshake with the module; `true` when it answers.
    async fn verify_presence(&mut self) -> bool;

    /// Delete every stored template.
    async fn clear_store(&mut self) -> SensorOutcome;

    /// Take an image of whatever is on the glass.
    ///
    /// Returns [`SensorOutcome::NoFinger`] when the glass is empty.
    async fn acquire_image(&mut self) -> SensorOutcome;

    /// Convert the last image into a feature template in `slot`.
    async fn image_to_template(&mut self, slot: Slot) -> SensorOutcome;

    /// Combine both slots into one model.
    ///
    /// Fails with [`SensorOutcome::EnrollMismatch`] when the slots hold
    /// different fingers.
    async fn create_model(&mut self) -> SensorOutcome;

    /// Persist the combined model under `id`.
    async fn store_model(&mut self, id: FingerId) -> SensorOutcome;

    /// Search the store for the template in slot 1.
    ///
    /// Returns the matched id and confidence, or the outcome code
    /// ([`SensorOutcome::NotFound`] when nothing matches).
    async fn search(&mut self) -> std::result::Result<FingerMatch, SensorOutcome>;
}
