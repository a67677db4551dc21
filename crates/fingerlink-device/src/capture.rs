//! Capture controller: turns sensor polls into one feature template.
//!
//! A capture waits for a finger on the glass, then converts the image into
//! a template in the requested [`Slot`]:
//!
//! ```text
//! acquire_image ──NoFinger / transient error──> wait poll_interval, poll again
//!       │
//!       Ok
//!       v
//! image_to_template(slot) ──Ok──> FeatureTemplate
//!       │
//!       └──any other outcome──> terminal, the caller restarts the capture
//! ```
//!
//! Acquisition never gives up on its own: a live finger is required and
//! the device has nothing else to do. The wait ends only when a finger is
//! captured or the [`CancellationToken`] fires.

use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use fingerlink_core::{FeatureTemplate, Slot, constants::CAPTURE_POLL_INTERVAL_MS};
use fingerlink_sensor::{SensorDevice, SensorOutcome};

use crate::poll::{Cancelled, Step, pause};
use crate::status::{StatusSink, StatusText, sensor_failure, texts};

/// Why a capture ended without a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CaptureError {
    /// Image conversion failed; retrying the same image will not help.
    #[error("Capture failed: {0}")]
    Sensor(SensorOutcome),

    /// The wait for a finger was cancelled.
    #[error("Capture cancelled")]
    Cancelled,
}

impl From<Cancelled> for CaptureError {
    fn from(_: Cancelled) -> Self {
        Self::Cancelled
    }
}

/// Drives image acquisition and conversion for one slot at a time.
#[derive(Debug, Clone)]
pub struct CaptureController {
    poll_interval: Duration,

    /// Shown on every poll that finds the glass empty.
    waiting_banner: Option<StatusText>,
}

impl CaptureController {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            waiting_banner: None,
        }
    }

    /// Show `banner` each time a poll finds no finger.
    pub fn with_waiting_banner(mut self, banner: StatusText) -> Self {
        self.waiting_banner = Some(banner);
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Poll the sensor once.
    ///
    /// Returns [`Step::Pending`] while there is no usable image,
    /// [`Step::Ready`] with a template tagged `slot` once conversion
    /// succeeds, and [`Step::Failed`] when conversion fails.
    pub async fn poll<S: SensorDevice>(
        &self,
        sensor: &mut S,
        slot: Slot,
        status: &mut dyn StatusSink,
    ) -> Step<FeatureTemplate, SensorOutcome> {
        match sensor.acquire_image().await {
            SensorOutcome::Ok => {
                debug!(%slot, "Image taken");
                status.show(texts::IMAGE_TAKEN);
            }
            SensorOutcome::NoFinger => {
                trace!("No finger on the glass");
                if let Some(banner) = self.waiting_banner {
                    status.show(banner);
                }
                return Step::Pending;
            }
            outcome => {
                // The serial link recovers by itself; keep polling.
                warn!(%outcome, "Image acquisition failed, retrying");
                status.show(sensor_failure(outcome));
                return Step::Pending;
            }
        }

        status.show(texts::PROCESSING_IMAGE);
        match sensor.image_to_template(slot).await {
            SensorOutcome::Ok => {
                debug!(%slot, "Image converted");
                Step::Ready(FeatureTemplate::new(slot))
            }
            outcome => {
                warn!(%slot, %outcome, "Image conversion failed");
                status.show(sensor_failure(outcome));
                Step::Failed(outcome)
            }
        }
    }

    /// Poll until a template for `slot` is produced.
    ///
    /// The first poll happens immediately; later polls are spaced by the
    /// poll interval.
    ///
    /// # Errors
    ///
    /// - [`CaptureError::Sensor`]: the image could not be converted
    /// - [`CaptureError::Cancelled`]: `cancel` fired while waiting
    pub async fn capture<S: SensorDevice>(
        &self,
        sensor: &mut S,
        slot: Slot,
        status: &mut dyn StatusSink,
        cancel: &CancellationToken,
    ) -> Result<FeatureTemplate, CaptureError> {
        let mut polls = 0u64;
        loop {
            if cancel.is_cancelled() {
                return Err(CaptureError::Cancelled);
            }
            polls += 1;

            match self.poll(sensor, slot, status).await.into_result() {
                Some(Ok(template)) => {
                    debug!(%slot, polls, "Capture complete");
                    return Ok(template);
                }
                Some(Err(outcome)) => return Err(CaptureError::Sensor(outcome)),
                None => pause(self.poll_interval, cancel).await?,
            }
        }
    }
}

impl Default for CaptureController {
    fn default() -> Self {
        Self::new(Duration::from_millis(CAPTURE_POLL_INTERVAL_MS))
    }
}
