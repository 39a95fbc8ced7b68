//! Flood router error types.

use meshflood_core::SendError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("packet pool exhausted: {capacity} copies in use")]
    Exhausted { capacity: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FloodError {
    #[error("send failed: {0}")]
    Send(#[from] SendError),

    #[error("pool error: {0}")]
    Pool(#[from] PoolError),
}
