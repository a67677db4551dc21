//! Status sink: the two-line progress messages shown to the user.
//!
//! The state machines report progress through [`StatusSink::notify`]. The
//! sink never influences control flow. [`LcdDisplay`](crate::LcdDisplay)
//! renders messages on a 16-column panel; [`RecordingSink`] keeps them for
//! inspection.

use std::sync::{Arc, Mutex, MutexGuard};

use fingerlink_sensor::SensorOutcome;

/// A two-line message: `(primary, secondary)`.
pub type StatusText = (&'static str, &'static str);

/// Receiver of user-facing progress messages.
pub trait StatusSink {
    /// Show a message. Fire-and-forget.
    fn notify(&mut self, primary: &str, secondary: &str);

    /// Show one of the predefined [`texts`].
    fn show(&mut self, text: StatusText) {
        self.notify(text.0, text.1);
    }
}

impl<T: StatusSink + ?Sized> StatusSink for Box<T> {
    fn notify(&mut self, primary: &str, secondary: &str) {
        (**self).notify(primary, secondary);
    }
}

/// Sink that drops every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl StatusSink for NullSink {
    fn notify(&mut self, _primary: &str, _secondary: &str) {}
}

/// Sink that records every message.
///
/// Clones share the same log, so a test can keep one clone while the
/// device owns another.
///
/// # Examples
///
/// ```
/// use fingerlink_device::status::{RecordingSink, StatusSink, texts};
///
/// let recorder = RecordingSink::new();
/// let mut sink = recorder.clone();
/// sink.show(texts::REMOVE_FINGER);
///
/// assert_eq!(recorder.messages().len(), 1);
/// assert!(recorder.contains(" Remove Finger  "));
/// ```
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    messages: Arc<Mutex<Vec<(String, String)>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn log(&self) -> MutexGuard<'_, Vec<(String, String)>> {
        self.messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// All messages so far, oldest first.
    pub fn messages(&self) -> Vec<(String, String)> {
        self.log().clone()
    }

    /// Latest message, if any.
    pub fn last(&self) -> Option<(String, String)> {
        self.log().last().cloned()
    }

    /// Whether any message has `text` on either line.
    pub fn contains(&self, text: &str) -> bool {
        self.log()
            .iter()
            .any(|(primary, secondary)| primary.contains(text) || secondary.contains(text))
    }

    /// Number of times `message` was shown.
    pub fn count(&self, message: StatusText) -> usize {
        self.log()
            .iter()
            .filter(|(primary, secondary)| primary == message.0 && secondary == message.1)
            .count()
    }

    pub fn clear(&self) {
        self.log().clear();
    }
}

impl StatusSink for RecordingSink {
    fn notify(&mut self, primary: &str, secondary: &str) {
        self.log().push((primary.to_string(), secondary.to_string()));
    }
}

/// Message for a sensor failure that ends an attempt.
pub fn sensor_failure(outcome: SensorOutcome) -> StatusText {
    match outcome {
        SensorOutcome::CommunicationError => texts::COMMUNICATION_ERROR,
        SensorOutcome::EnrollMismatch => texts::PRINTS_DID_NOT_MATCH,
        SensorOutcome::ImageTooMessy
        | SensorOutcome::FeatureExtractionFailed
        | SensorOutcome::InvalidImage
        | SensorOutcome::ImagingError => texts::BAD_IMAGE,
        SensorOutcome::BadLocation | SensorOutcome::FlashError => texts::STORE_FAILED,
        _ => texts::UNKNOWN_ERROR,
    }
}

/// Predefined messages, laid out for a 16-column panel.
pub mod texts {
    use super::StatusText;

    // Startup
    pub const CLIENT_START: StatusText = ("  Client Start  ", "");
    pub const CONN_WIFI: StatusText = ("  Client Start  ", "   conn WiFi   ");
    pub const CONN_WIFI_DONE: StatusText = ("  Client Start  ", "   conn WiFi.   ");
    pub const CONN_SERVER: StatusText = ("  Client Start  ", "  conn Server   ");
    pub const CONN_SERVER_DONE: StatusText = ("  Client Start  ", "  conn Server.   ");
    pub const DISCONNECTED: StatusText = ("  Disconnected  ", "  please reset  ");

    // Idle banners
    pub const SCAN_READY: StatusText = ("  Scan  Finger  ", "                ");
    pub const SCAN_BANNER: StatusText = ("Scan Your Finger", "                ");
    pub const ENROLL_BANNER: StatusText = (" Enroll  Finger ", "                ");

    // Capture
    pub const IMAGE_TAKEN: StatusText = ("  Image  Taken  ", " please wait... ");
    pub const PROCESSING_IMAGE: StatusText = ("   Processing   ", "    Image...    ");
    pub const BAD_IMAGE: StatusText = ("   Bad  Image   ", "   Try  Again   ");
    pub const COMMUNICATION_ERROR: StatusText = (" Communication  ", "     Error      ");
    pub const UNKNOWN_ERROR: StatusText = ("    Unknown     ", "     Error      ");

    // Enrollment
    pub const ENROLLMENT_MODE: StatusText = ("   Enrollment   ", "      Mode      ");
    pub const INVALID_ID: StatusText = ("   Invalid ID   ", "   Try  Again   ");
    pub const REMOVE_FINGER: StatusText = ("      ----      ", " Remove Finger  ");
    pub const PLACE_SAME_FINGER: StatusText = ("   Place Same   ", "  Finger again  ");
    pub const PRINTS_MATCHED: StatusText = ("  Fingerprints  ", "    Matched     ");
    pub const PRINTS_DID_NOT_MATCH: StatusText = ("  Fingerprints  ", " Did Not Match  ");
    pub const SENDING_DATA: StatusText = ("  Sending Data  ", "  to Database   ");
    pub const STORE_FAILED: StatusText = ("  Store Failed  ", "   Try  Again   ");
    pub const WAITING_FEEDBACK: StatusText = (" Waiting for  ", "  Feedback...   ");
    pub const ENROLL_SUCCESS: StatusText = ("   Enrollment   ", "    Success!    ");
    pub const ENROLL_FAIL: StatusText = ("  Enroll Fail!  ", "   Try  Again   ");

    // Identification
    pub const PRINT_FOUND: StatusText = ("  Fingerprint   ", "    is found    ");
    pub const NO_MATCH: StatusText = ("  Did not Find  ", "     Match      ");
    pub const LOGGING_ATTENDANCE: StatusText = ("    Logging     ", "   Attendance   ");
    pub const LOGGED: StatusText = ("  Successfully  ", "  Logged to DB  ");
    pub const LOGGING_FAILED: StatusText = (" Failed logging ", "   Attendance   ");
    pub const CLEAR: StatusText = ("                ", "                ");

    /// First line of the welcome message; the second is the attendee name.
    pub const WELCOME: &str = "Welcome:        ";
}
