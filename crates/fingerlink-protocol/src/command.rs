//! Commands sent by the server.
//!
//! Command lines are matched exactly (case-sensitive, no trimming beyond
//! the line terminator). Every other line parses to
//! [`ServerCommand::Unrecognized`] so the dispatcher can log and drop it.

use std::fmt;

use fingerlink_core::constants::{CMD_DISCONNECT, CMD_ENROLL, CMD_REBOOT};

/// A command line received from the server.
///
/// # Examples
///
/// ```
/// use fingerlink_protocol::ServerCommand;
///
/// assert_eq!(ServerCommand::parse("enroll"), ServerCommand::Enroll);
/// assert_eq!(
///     ServerCommand::parse("Enroll"),
///     ServerCommand::Unrecognized("Enroll".to_string())
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerCommand {
    /// Close the session gracefully.
    Disconnect,

    /// Disconnect and restart the device.
    Reboot,

    /// Start an enrollment. The id and metadata lines follow.
    Enroll,

    /// Any other line.
    Unrecognized(String),
}

impl ServerCommand {
    /// Parse one line (without terminator).
    pub fn parse(line: &str) -> Self {
        match line {
            CMD_DISCONNECT => Self::Disconnect,
            CMD_REBOOT => Self::Reboot,
            CMD_ENROLL => Self::Enroll,
            other => Self::Unrecognized(other.to_string()),
        }
    }
}

impl fmt::Display for ServerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnect => write!(f, "{CMD_DISCONNECT}"),
            Self::Reboot => write!(f, "{CMD_REBOOT}"),
            Self::Enroll => write!(f, "{CMD_ENROLL}"),
            Self::Unrecognized(line) => write!(f, "unrecognized({line:?})"),
        }
    }
}
