//! Error types for the meshflood-core crate.

use core::fmt;

/// Failure returned synchronously by a send path. Never retried by the
/// flood router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    /// The outbound transmit queue has no free slot.
    QueueFull,
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendError::QueueFull => write!(f, "transmit queue full"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for SendError {}
