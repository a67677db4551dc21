//! Identification: one capture, resolved against the whole store.
//!
//! Unlike enrollment, identification never waits for a finger. It runs
//! once per control loop tick: an empty glass ends the cycle immediately
//! with [`IdentificationResult::NoMatch`], and any sensor failure ends the
//! cycle with that outcome. The next tick simply tries again.

use tracing::{debug, info, trace, warn};

use fingerlink_core::{IdentificationResult, Slot};
use fingerlink_sensor::{SensorDevice, SensorOutcome};

use crate::status::{StatusSink, sensor_failure, texts};

/// Run one identification cycle.
///
/// # Errors
///
/// Returns the sensor outcome that ended the cycle when acquisition,
/// conversion or search fail with anything but "no finger" / "not found".
///
/// # Examples
///
/// ```
/// use fingerlink_device::identify;
/// use fingerlink_device::status::NullSink;
/// use fingerlink_core::{FingerId, IdentificationResult};
/// use fingerlink_sensor::mock::MockSensor;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let (mut sensor, handle) = MockSensor::new();
/// handle.store_print(FingerId::new(42).unwrap(), 1234);
///
/// // Empty glass: no match, no waiting.
/// assert_eq!(identify(&mut sensor, &mut NullSink).await, Ok(IdentificationResult::NoMatch));
///
/// handle.place_finger(1234);
/// let result = identify(&mut sensor, &mut NullSink).await.unwrap();
/// assert_eq!(result.matched().map(|m| m.id.as_u16()), Some(42));
/// # }
/// ```
pub async fn identify<S: SensorDevice>(
    sensor: &mut S,
    status: &mut dyn StatusSink,
) -> Result<IdentificationResult, SensorOutcome> {
    match sensor.acquire_image().await {
        SensorOutcome::Ok => {
            debug!("Image taken");
            status.show(texts::IMAGE_TAKEN);
        }
        SensorOutcome::NoFinger => {
            trace!("No finger detected");
            return Ok(IdentificationResult::NoMatch);
        }
        outcome => return Err(abort("acquire", outcome, status)),
    }

    status.show(texts::PROCESSING_IMAGE);
    match sensor.image_to_template(Slot::One).await {
        SensorOutcome::Ok => debug!("Image converted"),
        outcome => return Err(abort("convert", outcome, status)),
    }

    match sensor.search().await {
        Ok(found) => {
            info!(id = %found.id, confidence = %found.confidence, "Found a print match");
            status.show(texts::PRINT_FOUND);
            Ok(IdentificationResult::Match(found))
        }
        Err(SensorOutcome::NotFound) => {
            debug!("Did not find a match");
            status.show(texts::NO_MATCH);
            Ok(IdentificationResult::NoMatch)
        }
        Err(outcome) => Err(abort("search", outcome, status)),
    }
}

fn abort(step: &str, outcome: SensorOutcome, status: &mut dyn StatusSink) -> SensorOutcome {
    warn!(step, %outcome, "Identification cycle failed");
    status.show(sensor_failure(outcome));
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::RecordingSink;
    use fingerlink_core::{FingerId, FingerMatch};
    use fingerlink_sensor::mock::{MockSensor, SensorCall, SensorOp};
    use rstest::rstest;

    #[tokio::test]
    async fn test_no_finger_returns_immediately() {
        let (mut sensor, handle) = MockSensor::new();
        let status = RecordingSink::new();

        let result = identify(&mut sensor, &mut status.clone()).await;

        assert_eq!(result, Ok(IdentificationResult::NoMatch));
        assert_eq!(handle.calls(), vec![SensorCall::AcquireImage]);
        assert!(status.messages().is_empty());
    }

    #[tokio::test]
    async fn test_match_reports_id_and_confidence() {
        let (mut sensor, handle) = MockSensor::new();
        let status = RecordingSink::new();
        let id = FingerId::new(42).unwrap();
        handle.place_finger(3);
        handle.push_search(Ok(FingerMatch::new(id, 120)));

        let result = identify(&mut sensor, &mut status.clone()).await.unwrap();

        assert_eq!(result, IdentificationResult::Match(FingerMatch::new(id, 120)));
        assert_eq!(status.count(texts::PRINT_FOUND), 1);
    }

    #[tokio::test]
    async fn test_not_found_is_no_match() {
        let (mut sensor, handle) = MockSensor::new();
        let status = RecordingSink::new();
        handle.place_finger(3);

        let result = identify(&mut sensor, &mut status.clone()).await;

        assert_eq!(result, Ok(IdentificationResult::NoMatch));
        assert_eq!(handle.call_count(SensorCall::Search), 1);
        assert_eq!(status.count(texts::NO_MATCH), 1);
    }

    #[rstest]
    #[case(SensorOp::AcquireImage, SensorOutcome::CommunicationError)]
    #[case(SensorOp::AcquireImage, SensorOutcome::ImagingError)]
    #[case(SensorOp::ImageToTemplate, SensorOutcome::ImageTooMessy)]
    #[case(SensorOp::ImageToTemplate, SensorOutcome::FeatureExtractionFailed)]
    #[tokio::test]
    async fn test_sensor_errors_end_cycle(#[case] op: SensorOp, #[case] outcome: SensorOutcome) {
        let (mut sensor, handle) = MockSensor::new();
        handle.place_finger(3);
        handle.push_outcome(op, outcome);

        let result = identify(&mut sensor, &mut RecordingSink::new()).await;

        assert_eq!(result, Err(outcome));
        assert_eq!(handle.call_count(SensorCall::Search), 0);
    }

    #[tokio::test]
    async fn test_search_communication_error() {
        let (mut sensor, handle) = MockSensor::new();
        handle.place_finger(3);
        handle.push_search(Err(SensorOutcome::CommunicationError));

        let result = identify(&mut sensor, &mut RecordingSink::new()).await;
        assert_eq!(result, Err(SensorOutcome::CommunicationError));
    }
}
