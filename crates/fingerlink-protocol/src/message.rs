//! Messages sent by the client.
//!
//! A message may span several lines; [`Outbound::lines`] yields them in
//! wire order and the codec writes them in one go, so lines of two
//! messages never interleave.

use fingerlink_core::{
    EnrollmentRecord, FingerId,
    constants::{MSG_DISCONNECT, MSG_ENROLL_FINGER, MSG_GREETING, MSG_SCAN_FINGER},
};

/// A message from the client to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Informational greeting after connecting.
    Greeting,

    /// Enrollment accepted, capture starts.
    EnrollFinger,

    /// Enrollment finished: the metadata lines followed by the id.
    EnrollmentEcho(EnrollmentRecord),

    /// A finger was identified: `scanFinger` followed by the id.
    ScanFinger(FingerId),

    /// Session is about to close.
    Disconnect,
}

impl Outbound {
    /// Lines of this message in wire order, without terminators.
    ///
    /// # Examples
    ///
    /// ```
    /// use fingerlink_core::FingerId;
    /// use fingerlink_protocol::Outbound;
    ///
    /// let id = FingerId::new(42).unwrap();
    /// assert_eq!(Outbound::ScanFinger(id).lines(), vec!["scanFinger", "42"]);
    /// ```
    pub fn lines(&self) -> Vec<String> {
        match self {
            Self::Greeting => vec![MSG_GREETING.to_string()],
            Self::EnrollFinger => vec![MSG_ENROLL_FINGER.to_string()],
            Self::EnrollmentEcho(record) => record
                .metadata
                .fields()
                .into_iter()
                .map(str::to_string)
                .chain(std::iter::once(record.id.to_string()))
                .collect(),
            Self::ScanFinger(id) => vec![MSG_SCAN_FINGER.to_string(), id.to_string()],
            Self::Disconnect => vec![MSG_DISCONNECT.to_string()],
        }
    }

    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::EnrollFinger => "enroll_finger",
            Self::EnrollmentEcho(_) => "enrollment_echo",
            Self::ScanFinger(_) => "scan_finger",
            Self::Disconnect => "disconnect",
        }
    }
}
