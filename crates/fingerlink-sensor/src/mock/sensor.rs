//! Mock fingerprint sensor for testing and development.
//!
//! The mock behaves like a small module: a finger can be placed on and
//! lifted from the glass, images are converted into slot buffers, models
//! are compared and stored. On top of that, outcomes can be scripted per
//! operation to drive the state machines through error paths.

use crate::{Result, SensorDevice, SensorError, SensorOutcome};
use fingerlink_core::{FingerId, FingerMatch, Slot, constants::DEFAULT_STORE_CAPACITY};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::trace;

/// Confidence the mock reports for every match.
pub const MOCK_MATCH_CONFIDENCE: u16 = 100;

/// Operations whose outcome can be scripted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorOp {
    ClearStore,
    AcquireImage,
    ImageToTemplate,
    CreateModel,
    StoreModel,
}

/// A call the mock received, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorCall {
    BeginChannel(u32),
    VerifyPresence,
    ClearStore,
    AcquireImage,
    ImageToTemplate(Slot),
    CreateModel,
    StoreModel(FingerId),
    Search,
}

#[derive(Debug, Default)]
struct MockState {
    /// Print on the glass, if any. Prints are plain numbers.
    finger: Option<u32>,
    image: Option<u32>,
    buffers: [Option<u32>; 2],
    model: Option<u32>,
    store: BTreeMap<u16, u32>,
    capacity: u16,
    scripted: HashMap<SensorOp, VecDeque<SensorOutcome>>,
    scripted_search: VecDeque<std::result::Result<FingerMatch, SensorOutcome>>,
    absent_checks: u32,
    /// Reason the next `begin_channel` fails with.
    channel_failure: Option<String>,
    calls: Vec<SensorCall>,
}

impl MockState {
    fn scripted(&mut self, op: SensorOp) -> Option<SensorOutcome> {
        self.scripted.get_mut(&op).and_then(VecDeque::pop_front)
    }

    fn buffer_index(slot: Slot) -> usize {
        usize::from(slot.number() - 1)
    }
}

fn lock(state: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Mock fingerprint sensor.
///
/// # Examples
///
/// ```
/// use fingerlink_sensor::mock::MockSensor;
/// use fingerlink_sensor::{SensorDevice, SensorOutcome};
/// use fingerlink_core::Slot;
///
/// #[tokio::main]
/// async fn main() {
///     let (mut sensor, handle) = MockSensor::new();
///
///     assert_eq!(sensor.acquire_image().await, SensorOutcome::NoFinger);
///
///     handle.place_finger(7);
///     assert_eq!(sensor.acquire_image().await, SensorOutcome::Ok);
///     assert_eq!(sensor.image_to_template(Slot::One).await, SensorOutcome::Ok);
/// }
/// ```
#[derive(Debug)]
pub struct MockSensor {
    state: Arc<Mutex<MockState>>,
}

impl MockSensor {
    /// Create a mock sensor with the default store capacity.
    ///
    /// Returns the sensor and a handle that controls it.
    pub fn new() -> (Self, MockSensorHandle) {
        Self::with_capacity(DEFAULT_STORE_CAPACITY)
    }

    /// Create a mock sensor whose store holds `capacity` templates.
    pub fn with_capacity(capacity: u16) -> (Self, MockSensorHandle) {
        let state = Arc::new(Mutex::new(MockState {
            capacity,
            ..MockState::default()
        }));

        let sensor = Self {
            state: Arc::clone(&state),
        };
        (sensor, MockSensorHandle { state })
    }

    fn record(&self, call: SensorCall) -> MutexGuard<'_, MockState> {
        trace!(?call, "mock sensor call");
        let mut state = lock(&self.state);
        state.calls.push(call);
        state
    }
}

impl Default for MockSensor {
    fn default() -> Self {
        Self::new().0
    }
}

impl SensorDevice for MockSensor {
    async fn begin_channel(&mut self, baud_rate: u32) -> Result<()> {
        let mut state = self.record(SensorCall::BeginChannel(baud_rate));
        match state.channel_failure.take() {
            Some(message) => Err(SensorError::initialization_failed(message)),
            None => Ok(()),
        }
    }

    async fn verify_presence(&mut self) -> bool {
        let mut state = self.record(SensorCall::VerifyPresence);
        if state.absent_checks > 0 {
            state.absent_checks -= 1;
            return false;
        }
        true
    }

    async fn clear_store(&mut self) -> SensorOutcome {
        let mut state = self.record(SensorCall::ClearStore);
        let outcome = state.scripted(SensorOp::ClearStore).unwrap_or(SensorOutcome::Ok);
        if outcome.is_ok() {
            state.store.clear();
        }
        outcome
    }

    async fn acquire_image(&mut self) -> SensorOutcome {
        let mut state = self.record(SensorCall::AcquireImage);
        let outcome = match state.scripted(SensorOp::AcquireImage) {
            Some(outcome) => outcome,
            None if state.finger.is_some() => SensorOutcome::Ok,
            None => SensorOutcome::NoFinger,
        };
        if outcome.is_ok() {
            state.image = Some(state.finger.unwrap_or_default());
        }
        outcome
    }

    async fn image_to_template(&mut self, slot: Slot) -> SensorOutcome {
        let mut state = self.record(SensorCall::ImageToTemplate(slot));
        let outcome = match state.scripted(SensorOp::ImageToTemplate) {
            Some(outcome) => outcome,
            None if state.image.is_some() => SensorOutcome::Ok,
            None => SensorOutcome::InvalidImage,
        };
        if outcome.is_ok() {
            let image = state.image.unwrap_or_default();
            state.buffers[MockState::buffer_index(slot)] = Some(image);
        }
        outcome
    }

    async fn create_model(&mut self) -> SensorOutcome {
        let mut state = self.record(SensorCall::CreateModel);
        let outcome = match state.scripted(SensorOp::CreateModel) {
            Some(outcome) => outcome,
            None => match state.buffers {
                [Some(a), Some(b)] if a == b => SensorOutcome::Ok,
                _ => SensorOutcome::EnrollMismatch,
            },
        };
        if outcome.is_ok() {
            state.model = Some(state.buffers[0].unwrap_or_default());
        }
        outcome
    }

    async fn store_model(&mut self, id: FingerId) -> SensorOutcome {
        let mut state = self.record(SensorCall::StoreModel(id));
        let outcome = match state.scripted(SensorOp::StoreModel) {
            Some(outcome) => outcome,
            None if id.as_u16() > state.capacity => SensorOutcome::BadLocation,
            None => SensorOutcome::Ok,
        };
        if outcome.is_ok() {
            let model = state.model.unwrap_or_default();
            state.store.insert(id.as_u16(), model);
        }
        outcome
    }

    async fn search(&mut self) -> std::result::Result<FingerMatch, SensorOutcome> {
        let mut state = self.record(SensorCall::Search);
        if let Some(result) = state.scripted_search.pop_front() {
            return result;
        }

        let Some(sample) = state.buffers[0] else {
            return Err(SensorOutcome::InvalidImage);
        };
        state
            .store
            .iter()
            .find(|(_, print)| **print == sample)
            .and_then(|(id, _)| FingerId::new(*id).ok())
            .map(|id| FingerMatch::new(id, MOCK_MATCH_CONFIDENCE))
            .ok_or(SensorOutcome::NotFound)
    }
}

/// Handle for controlling a [`MockSensor`].
///
/// Clones share the same sensor.
#[derive(Debug, Clone)]
pub struct MockSensorHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockSensorHandle {
    /// Put a finger with the given print on the glass.
    pub fn place_finger(&self, print: u32) {
        lock(&self.state).finger = Some(print);
    }

    /// Lift the finger off the glass.
    pub fn lift_finger(&self) {
        lock(&self.state).finger = None;
    }

    /// Whether a finger is on the glass.
    pub fn finger_present(&self) -> bool {
        lock(&self.state).finger.is_some()
    }

    /// Queue an outcome for the next call of `op`.
    ///
    /// Scripted outcomes take precedence over the simulated behavior.
    pub fn push_outcome(&self, op: SensorOp, outcome: SensorOutcome) {
        lock(&self.state)
            .scripted
            .entry(op)
            .or_default()
            .push_back(outcome);
    }

    /// Queue several outcomes for `op`, in order.
    pub fn push_outcomes(&self, op: SensorOp, outcomes: impl IntoIterator<Item = SensorOutcome>) {
        let mut state = lock(&self.state);
        let queue = state.scripted.entry(op).or_default();
        queue.extend(outcomes);
    }

    /// Queue the result of the next search.
    pub fn push_search(&self, result: std::result::Result<FingerMatch, SensorOutcome>) {
        lock(&self.state).scripted_search.push_back(result);
    }

    /// Report the module as absent for the next `count` presence checks.
    pub fn set_absent_checks(&self, count: u32) {
        lock(&self.state).absent_checks = count;
    }

    /// Make the next `begin_channel` fail with `message`.
    pub fn fail_channel(&self, message: impl Into<String>) {
        lock(&self.state).channel_failure = Some(message.into());
    }

    /// Put a template into the store directly.
    pub fn store_print(&self, id: FingerId, print: u32) {
        lock(&self.state).store.insert(id.as_u16(), print);
    }

    /// Print stored under `id`.
    pub fn stored_print(&self, id: FingerId) -> Option<u32> {
        lock(&self.state).store.get(&id.as_u16()).copied()
    }

    /// Number of stored templates.
    pub fn stored_count(&self) -> usize {
        lock(&self.state).store.len()
    }

    /// All calls received so far.
    pub fn calls(&self) -> Vec<SensorCall> {
        lock(&self.state).calls.clone()
    }

    /// Number of calls matching `call`.
    pub fn call_count(&self, call: SensorCall) -> usize {
        lock(&self.state).calls.iter().filter(|c| **c == call).count()
    }

    /// Forget the call log.
    pub fn clear_calls(&self) {
        lock(&self.state).calls.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u16) -> FingerId {
        FingerId::new(n).unwrap()
    }

    #[tokio::test]
    async fn test_no_finger_by_default() {
        let (mut sensor, handle) = MockSensor::new();
        assert_eq!(sensor.acquire_image().await, SensorOutcome::NoFinger);
        assert!(!handle.finger_present());
    }

    #[tokio::test]
    async fn test_scripted_channel_failure_is_one_shot() {
        let (mut sensor, handle) = MockSensor::new();
        handle.fail_channel("no response at 57600 baud");

        let err = sensor.begin_channel(57_600).await.unwrap_err();
        assert!(matches!(err, SensorError::InitializationFailed { .. }));
        assert!(sensor.begin_channel(57_600).await.is_ok());
    }

    #[tokio::test]
    async fn test_convert_without_image_is_invalid() {
        let (mut sensor, _handle) = MockSensor::new();
        assert_eq!(
            sensor.image_to_template(Slot::One).await,
            SensorOutcome::InvalidImage
        );
    }

    #[tokio::test]
    async fn test_enroll_then_search_finds_print() {
        let (mut sensor, handle) = MockSensor::new();

        handle.place_finger(11);
        assert!(sensor.acquire_image().await.is_ok());
        assert!(sensor.image_to_template(Slot::One).await.is_ok());
        assert!(sensor.acquire_image().await.is_ok());
        assert!(sensor.image_to_template(Slot::Two).await.is_ok());
        assert!(sensor.create_model().await.is_ok());
        assert!(sensor.store_model(id(3)).await.is_ok());
        assert_eq!(handle.stored_print(id(3)), Some(11));

        assert!(sensor.acquire_image().await.is_ok());
        assert!(sensor.image_to_template(Slot::One).await.is_ok());
        let found = sensor.search().await.unwrap();
        assert_eq!(found.id, id(3));
        assert_eq!(found.confidence.0, MOCK_MATCH_CONFIDENCE);
    }

    #[tokio::test]
    async fn test_different_fingers_mismatch() {
        let (mut sensor, handle) = MockSensor::new();

        handle.place_finger(1);
        sensor.acquire_image().await;
        sensor.image_to_template(Slot::One).await;
        handle.place_finger(2);
        sensor.acquire_image().await;
        sensor.image_to_template(Slot::Two).await;

        assert_eq!(sensor.create_model().await, SensorOutcome::EnrollMismatch);
    }

    #[tokio::test]
    async fn test_unknown_print_not_found() {
        let (mut sensor, handle) = MockSensor::new();
        handle.store_print(id(1), 5);
        handle.place_finger(6);
        sensor.acquire_image().await;
        sensor.image_to_template(Slot::One).await;
        assert_eq!(sensor.search().await, Err(SensorOutcome::NotFound));
    }

    #[tokio::test]
    async fn test_store_beyond_capacity_is_bad_location() {
        let (mut sensor, _handle) = MockSensor::with_capacity(10);
        assert_eq!(sensor.store_model(id(11)).await, SensorOutcome::BadLocation);
    }

    #[tokio::test]
    async fn test_scripted_outcomes_take_precedence() {
        let (mut sensor, handle) = MockSensor::new();
        handle.place_finger(1);
        handle.push_outcomes(
            SensorOp::AcquireImage,
            [SensorOutcome::ImagingError, SensorOutcome::CommunicationError],
        );

        assert_eq!(sensor.acquire_image().await, SensorOutcome::ImagingError);
        assert_eq!(sensor.acquire_image().await, SensorOutcome::CommunicationError);
        assert_eq!(sensor.acquire_image().await, SensorOutcome::Ok);
        assert_eq!(handle.call_count(SensorCall::AcquireImage), 3);
    }

    #[tokio::test]
    async fn test_scripted_search() {
        let (mut sensor, handle) = MockSensor::new();
        handle.push_search(Ok(FingerMatch::new(id(42), 120)));
        let found = sensor.search().await.unwrap();
        assert_eq!(found.id.as_u16(), 42);
        assert_eq!(found.confidence.0, 120);
    }

    #[tokio::test]
    async fn test_presence_check_and_clear_store() {
        let (mut sensor, handle) = MockSensor::new();
        handle.set_absent_checks(2);
        handle.store_print(id(1), 1);

        assert!(!sensor.verify_presence().await);
        assert!(!sensor.verify_presence().await);
        assert!(sensor.verify_presence().await);

        assert!(sensor.clear_store().await.is_ok());
        assert_eq!(handle.stored_count(), 0);
    }

    #[tokio::test]
    async fn test_call_log() {
        let (mut sensor, handle) = MockSensor::new();
        sensor.begin_channel(57_600).await.unwrap();
        sensor.acquire_image().await;

        assert_eq!(
            handle.calls(),
            vec![SensorCall::BeginChannel(57_600), SensorCall::AcquireImage]
        );
        handle.clear_calls();
        assert!(handle.calls().is_empty());
    }
}
