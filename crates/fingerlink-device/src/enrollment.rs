//! Enrollment state machine.
//!
//! Enrolling a finger takes two independent captures of the same finger,
//! which the sensor cross-validates and stores under the requested id.
//!
//! # States
//!
//! - `AwaitFirstCapture`: capture into slot 1
//! - `AwaitFingerRemoval`: wait until the glass is empty, so the second
//!   capture cannot reuse the first image
//! - `AwaitSecondCapture`: capture into slot 2
//! - `Comparing`: the sensor combines both slots into one model
//! - `Storing`: the model is written to the store under the id
//! - `Done` / `Failed`: terminal
//!
//! # Valid Transitions
//!
//! - AwaitFirstCapture → AwaitFingerRemoval → AwaitSecondCapture → Comparing
//!   → Storing → Done
//! - any non-terminal state → Failed
//!
//! A failure before `Storing` leaves the store untouched. A failed store
//! may leave the sensor's slot in an undefined state.
//!
//! # Examples
//!
//! ```
//! use fingerlink_device::{EnrollState, EnrollmentMachine};
//! use fingerlink_device::status::NullSink;
//! use fingerlink_core::FingerId;
//! use fingerlink_sensor::mock::MockSensor;
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main(flavor = "current_thread", start_paused = true)]
//! # async fn main() {
//! let (mut sensor, handle) = MockSensor::new();
//! let id = FingerId::new(7).unwrap();
//!
//! // Put the finger down, lift it once it has been captured, put it back.
//! handle.place_finger(42);
//! let lifter = handle.clone();
//! tokio::spawn(async move {
//!     tokio::time::sleep(std::time::Duration::from_millis(1000)).await;
//!     lifter.lift_finger();
//!     tokio::time::sleep(std::time::Duration::from_millis(2000)).await;
//!     lifter.place_finger(42);
//! });
//!
//! let mut machine = EnrollmentMachine::new(id);
//! machine.run(&mut sensor, &mut NullSink, &CancellationToken::new()).await.unwrap();
//!
//! assert_eq!(machine.state(), EnrollState::Done);
//! assert_eq!(handle.stored_print(id), Some(42));
//! # }
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use fingerlink_core::{
    Error, FingerId, Slot,
    constants::{FINGER_REMOVAL_POLL_MS, FINGER_REMOVAL_SETTLE_MS},
};
use fingerlink_sensor::{SensorDevice, SensorOutcome};

use crate::capture::{CaptureController, CaptureError};
use crate::poll::pause;
use crate::status::{StatusSink, sensor_failure, texts};

/// Transitions kept per machine; a successful run takes five.
const MAX_HISTORY_SIZE: usize = 16;

/// Phase of one enrollment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollState {
    AwaitFirstCapture,
    AwaitFingerRemoval,
    AwaitSecondCapture,
    Comparing,
    Storing,
    Done,
    Failed,
}

impl fmt::Display for EnrollState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EnrollState::AwaitFirstCapture => "AwaitFirstCapture",
            EnrollState::AwaitFingerRemoval => "AwaitFingerRemoval",
            EnrollState::AwaitSecondCapture => "AwaitSecondCapture",
            EnrollState::Comparing => "Comparing",
            EnrollState::Storing => "Storing",
            EnrollState::Done => "Done",
            EnrollState::Failed => "Failed",
        };
        write!(f, "{name}")
    }
}

impl EnrollState {
    /// Check if a transition to `target` is allowed from this state.
    ///
    /// # Examples
    ///
    /// ```
    /// use fingerlink_device::EnrollState;
    ///
    /// assert!(EnrollState::Comparing.can_transition_to(&EnrollState::Storing));
    /// assert!(EnrollState::Comparing.can_transition_to(&EnrollState::Failed));
    /// assert!(!EnrollState::Failed.can_transition_to(&EnrollState::Storing));
    /// ```
    pub fn can_transition_to(&self, target: &EnrollState) -> bool {
        use EnrollState::*;

        match (self, target) {
            (Done | Failed, _) => false,
            (_, Failed) => true,
            _ => matches!(
                (self, target),
                (AwaitFirstCapture, AwaitFingerRemoval)
                    | (AwaitFingerRemoval, AwaitSecondCapture)
                    | (AwaitSecondCapture, Comparing)
                    | (Comparing, Storing)
                    | (Storing, Done)
            ),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, EnrollState::Done | EnrollState::Failed)
    }
}

/// A recorded state change.
#[derive(Debug, Clone)]
pub struct StateTransition {
    pub from: EnrollState,
    pub to: EnrollState,
    pub timestamp: Instant,
}

/// Why an enrollment attempt ended without a stored template.
#[derive(Debug, Error)]
pub enum EnrollError {
    /// The sensor reported a terminal outcome during `stage`.
    #[error("Enrollment failed while {stage}: {outcome}")]
    Sensor {
        stage: EnrollState,
        outcome: SensorOutcome,
    },

    /// Waiting for the finger was cancelled.
    #[error("Enrollment cancelled")]
    Cancelled,

    #[error(transparent)]
    Transition(#[from] Error),
}

/// Timing of the finger waits.
#[derive(Debug, Clone)]
pub struct EnrollTiming {
    /// Delay between capture polls.
    pub capture_poll_interval: Duration,

    /// Pause after "Remove Finger" before checking the glass.
    pub removal_settle: Duration,

    /// Delay between removal checks.
    pub removal_poll_interval: Duration,
}

impl Default for EnrollTiming {
    fn default() -> Self {
        Self {
            capture_poll_interval: CaptureController::default().poll_interval(),
            removal_settle: Duration::from_millis(FINGER_REMOVAL_SETTLE_MS),
            removal_poll_interval: Duration::from_millis(FINGER_REMOVAL_POLL_MS),
        }
    }
}

/// Enrollment of one finger under one id.
///
/// A machine runs once. [`run`](Self::run) on a finished machine starts
/// over from `AwaitFirstCapture`.
pub struct EnrollmentMachine {
    id: FingerId,
    state: EnrollState,
    history: VecDeque<StateTransition>,
    capture: CaptureController,
    timing: EnrollTiming,
}

impl EnrollmentMachine {
    /// Create a machine for `id` with default timing.
    pub fn new(id: FingerId) -> Self {
        Self::with_timing(id, EnrollTiming::default())
    }

    pub fn with_timing(id: FingerId, timing: EnrollTiming) -> Self {
        let capture = CaptureController::new(timing.capture_poll_interval)
            .with_waiting_banner(texts::ENROLL_BANNER);

        Self {
            id,
            state: EnrollState::AwaitFirstCapture,
            history: VecDeque::with_capacity(MAX_HISTORY_SIZE),
            capture,
            timing,
        }
    }

    pub fn id(&self) -> FingerId {
        self.id
    }

    pub fn state(&self) -> EnrollState {
        self.state
    }

    /// Recent transitions, oldest first.
    pub fn history(&self) -> &VecDeque<StateTransition> {
        &self.history
    }

    /// Move to `to` if the transition is allowed.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidStateTransition` for a transition the state
    /// machine does not allow; the state is left unchanged.
    pub fn transition_to(&mut self, to: EnrollState) -> Result<StateTransition, Error> {
        if !self.state.can_transition_to(&to) {
            return Err(Error::InvalidStateTransition {
                from: self.state.to_string(),
                to: to.to_string(),
            });
        }

        let transition = StateTransition {
            from: self.state,
            to,
            timestamp: Instant::now(),
        };
        debug!(id = %self.id, from = %transition.from, to = %to, "Enrollment transition");

        self.state = to;
        self.history.push_back(transition.clone());
        if self.history.len() > MAX_HISTORY_SIZE {
            self.history.pop_front();
        }
        Ok(transition)
    }

    /// Go back to `AwaitFirstCapture` regardless of the current state.
    pub fn reset(&mut self) {
        self.state = EnrollState::AwaitFirstCapture;
        self.history.clear();
    }

    /// Run the whole enrollment.
    ///
    /// Every transition is reported to `status`.
    ///
    /// # Errors
    ///
    /// - [`EnrollError::Sensor`]: a terminal sensor outcome; the machine is `Failed`
    /// - [`EnrollError::Cancelled`]: `cancel` fired while waiting for the finger
    pub async fn run<S: SensorDevice>(
        &mut self,
        sensor: &mut S,
        status: &mut dyn StatusSink,
        cancel: &CancellationToken,
    ) -> Result<(), EnrollError> {
        if self.state != EnrollState::AwaitFirstCapture {
            self.reset();
        }
        info!(id = %self.id, "Waiting for valid finger to enroll");

        self.capture_into(sensor, Slot::One, status, cancel).await?;

        self.transition_to(EnrollState::AwaitFingerRemoval)?;
        status.show(texts::REMOVE_FINGER);
        self.await_removal(sensor, cancel).await?;

        self.transition_to(EnrollState::AwaitSecondCapture)?;
        status.show(texts::PLACE_SAME_FINGER);
        self.capture_into(sensor, Slot::Two, status, cancel).await?;

        self.transition_to(EnrollState::Comparing)?;
        if let Err(outcome) = sensor.create_model().await.into_result() {
            return self.fail(outcome, status);
        }
        info!(id = %self.id, "Prints matched");
        status.show(texts::PRINTS_MATCHED);

        self.transition_to(EnrollState::Storing)?;
        if let Err(outcome) = sensor.store_model(self.id).await.into_result() {
            return self.fail(outcome, status);
        }
        info!(id = %self.id, "Stored to internal database");
        status.show(texts::SENDING_DATA);

        self.transition_to(EnrollState::Done)?;
        Ok(())
    }

    async fn capture_into<S: SensorDevice>(
        &mut self,
        sensor: &mut S,
        slot: Slot,
        status: &mut dyn StatusSink,
        cancel: &CancellationToken,
    ) -> Result<(), EnrollError> {
        match self.capture.capture(sensor, slot, status, cancel).await {
            Ok(_template) => Ok(()),
            Err(CaptureError::Sensor(outcome)) => {
                // The capture controller already reported the outcome.
                let stage = self.state;
                warn!(id = %self.id, %stage, %outcome, "Enrollment capture failed");
                self.transition_to(EnrollState::Failed)?;
                Err(EnrollError::Sensor { stage, outcome })
            }
            Err(CaptureError::Cancelled) => Err(EnrollError::Cancelled),
        }
    }

    /// Wait until acquisition reports an empty glass.
    async fn await_removal<S: SensorDevice>(
        &self,
        sensor: &mut S,
        cancel: &CancellationToken,
    ) -> Result<(), EnrollError> {
        pause(self.timing.removal_settle, cancel)
            .await
            .map_err(|_| EnrollError::Cancelled)?;

        while sensor.acquire_image().await != SensorOutcome::NoFinger {
            pause(self.timing.removal_poll_interval, cancel)
                .await
                .map_err(|_| EnrollError::Cancelled)?;
        }
        debug!(id = %self.id, "Finger removed");
        Ok(())
    }

    fn fail(
        &mut self,
        outcome: SensorOutcome,
        status: &mut dyn StatusSink,
    ) -> Result<(), EnrollError> {
        let stage = self.state;
        warn!(id = %self.id, %stage, %outcome, "Enrollment failed");
        status.show(sensor_failure(outcome));
        self.transition_to(EnrollState::Failed)?;
        Err(EnrollError::Sensor { stage, outcome })
    }
}
