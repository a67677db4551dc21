//! Polling primitive for the sensor wait loops.
//!
//! Waiting for a human finger can take forever. Instead of blocking, each
//! wait is split into single polls that report a [`Step`], and a driver
//! loop pauses between polls with [`pause`], which honours a
//! [`CancellationToken`]. Tests drive the same loops on Tokio's paused
//! clock, so no real delays are involved.
//!
//! # Examples
//!
//! ```
//! use fingerlink_device::poll::{Step, pause};
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main(flavor = "current_thread", start_paused = true)]
//! # async fn main() {
//! let cancel = CancellationToken::new();
//! let mut polls = 0;
//! let value = loop {
//!     polls += 1;
//!     let step: Step<u32, ()> = if polls < 3 { Step::Pending } else { Step::Ready(polls) };
//!     match step {
//!         Step::Pending => pause(Duration::from_secs(2), &cancel).await.unwrap(),
//!         Step::Ready(v) => break v,
//!         Step::Failed(()) => unreachable!(),
//!     }
//! };
//! assert_eq!(value, 3);
//! # }
//! ```

use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Result of one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step<T, E> {
    /// Nothing yet; poll again later.
    Pending,

    /// The wait is over.
    Ready(T),

    /// The wait ended in an error that retrying will not fix.
    Failed(E),
}

impl<T, E> Step<T, E> {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// `None` while pending.
    pub fn into_result(self) -> Option<Result<T, E>> {
        match self {
            Self::Pending => None,
            Self::Ready(value) => Some(Ok(value)),
            Self::Failed(error) => Some(Err(error)),
        }
    }
}

/// The wait was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Operation cancelled")]
pub struct Cancelled;

/// Sleep for `duration` unless `cancel` fires first.
///
/// # Errors
///
/// Returns [`Cancelled`] if the token is (or becomes) cancelled.
pub async fn pause(duration: Duration, cancel: &CancellationToken) -> Result<(), Cancelled> {
    if cancel.is_cancelled() {
        return Err(Cancelled);
    }
    tokio::select! {
        _ = cancel.cancelled() => Err(Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}
