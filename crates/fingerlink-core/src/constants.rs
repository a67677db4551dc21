//! Core constants for the fingerlink client.
//!
//! This module collects every compile-time value the client relies on:
//! wire keywords of the line protocol, default server endpoint, sensor
//! parameters and the timing of the polling loops.
//!
//! # Wire Format
//!
//! The server link is plain UTF-8 text, one message per line:
//!
//! ```text
//! server -> client   enroll\n
//!                    7\nJane\nQ\nDoe\n30\nF\n5551234\n1 Main St\n
//! client -> server   enrollFinger\n
//!                    Jane\nQ\nDoe\n30\nF\n5551234\n1 Main St\n7\n
//! server -> client   OK\n
//! ```
//!
//! # Usage
//!
//! ```
//! use fingerlink_core::constants::*;
//! use std::time::Duration;
//!
//! assert_eq!(CMD_ENROLL, "enroll");
//! let poll = Duration::from_millis(CAPTURE_POLL_INTERVAL_MS);
//! assert_eq!(poll.as_secs(), 2);
//! ```

// ============================================================================
// Protocol Keywords
// ============================================================================

/// Line terminator for every message in both directions.
pub const LINE_TERMINATOR: char = '\n';

/// Server command: close the session gracefully.
pub const CMD_DISCONNECT: &str = "disconnect";

/// Server command: disconnect and restart the device.
pub const CMD_REBOOT: &str = "reboot";

/// Server command: start an enrollment; followed by the metadata lines.
pub const CMD_ENROLL: &str = "enroll";

/// Client reply announcing that enrollment capture has started.
pub const MSG_ENROLL_FINGER: &str = "enrollFinger";

/// Client message announcing an identified finger; followed by the id line.
pub const MSG_SCAN_FINGER: &str = "scanFinger";

/// Client notice sent before closing the stream.
pub const MSG_DISCONNECT: &str = "disconnect";

/// Informational greeting sent once after connecting.
pub const MSG_GREETING: &str = "Client connected successfully. // Hello Server //";

/// The only feedback line that signals success.
pub const FEEDBACK_OK: &str = "OK";

/// Number of lines the server sends after `enroll`
/// (id followed by the seven metadata fields).
pub const ENROLL_REQUEST_LINES: usize = 8;

/// Number of metadata fields in an enrollment record.
pub const METADATA_FIELDS: usize = 7;

/// Maximum accepted line length in bytes.
///
/// Longer lines are rejected by the codec instead of being buffered
/// without bound.
pub const MAX_LINE_LENGTH: usize = 1024;

// ============================================================================
// Server Endpoint
// ============================================================================

/// Default server host.
pub const DEFAULT_SERVER_HOST: &str = "192.168.1.100";

/// Default server TCP port.
pub const DEFAULT_SERVER_PORT: u16 = 5050;

// ============================================================================
// Sensor Parameters
// ============================================================================

/// Baud rate of the sensor serial channel.
pub const SENSOR_BAUD_RATE: u32 = 57_600;

/// Lowest valid template id in the sensor store.
pub const MIN_FINGER_ID: u16 = 1;

/// Default number of template slots in the sensor store.
pub const DEFAULT_STORE_CAPACITY: u16 = 127;

// ============================================================================
// Timing (milliseconds)
// ============================================================================

/// Delay between image acquisition polls while waiting for a finger.
pub const CAPTURE_POLL_INTERVAL_MS: u64 = 2000;

/// Pause after asking the user to lift the finger, before polling for removal.
pub const FINGER_REMOVAL_SETTLE_MS: u64 = 2000;

/// Delay between removal polls.
pub const FINGER_REMOVAL_POLL_MS: u64 = 50;

/// Delay between sensor presence checks during bring-up.
pub const SENSOR_PRESENCE_RETRY_MS: u64 = 50;

/// Delay between server connection attempts.
pub const CONNECT_RETRY_INTERVAL_MS: u64 = 1000;

/// Timeout of a single connection attempt.
pub const CONNECT_TIMEOUT_MS: u64 = 3000;

/// Timeout for writes on the server stream.
pub const WRITE_TIMEOUT_MS: u64 = 3000;

/// Timeout for every awaited server line (metadata, feedback, display name).
pub const FEEDBACK_TIMEOUT_MS: u64 = 30_000;

/// Pause at the end of every control loop tick.
pub const TICK_INTERVAL_MS: u64 = 50;

/// How long an enrollment result stays on the display before the loop resumes.
pub const RESULT_HOLD_MS: u64 = 2000;

/// How long an attendance result stays on the display.
pub const SCAN_RESULT_HOLD_MS: u64 = 3000;
