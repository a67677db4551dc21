//! Server feedback after an enrollment echo or a scan report.
//!
//! There are no structured error codes: the literal line `OK` is success,
//! anything else is failure. A reply that never arrives (timeout, closed
//! stream) is failure too.

use fingerlink_core::constants::FEEDBACK_OK;

/// Server verdict on the last report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Feedback {
    /// The server answered `OK`.
    Accepted,

    /// The server answered with any other line.
    Rejected(String),

    /// No line arrived.
    NoReply,
}

impl Feedback {
    /// Classify a received line.
    ///
    /// # Examples
    ///
    /// ```
    /// use fingerlink_protocol::Feedback;
    ///
    /// assert!(Feedback::from_line("OK").is_accepted());
    /// assert!(!Feedback::from_line("ok").is_accepted());
    /// ```
    pub fn from_line(line: &str) -> Self {
        if line == FEEDBACK_OK {
            Self::Accepted
        } else {
            Self::Rejected(line.to_string())
        }
    }

    /// Classify the result of waiting for a line.
    pub fn from_reply(reply: Option<&str>) -> Self {
        reply.map_or(Self::NoReply, Self::from_line)
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}
