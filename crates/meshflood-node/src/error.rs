//! Error types for the node host.

use meshflood_core::NodeNum;
use meshflood_transport::FloodError;

/// Errors that can occur while configuring or running a node.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("flood router error: {0}")]
    Flood(#[from] FloodError),
    #[error("unknown node {0}")]
    UnknownNode(NodeNum),
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshflood_core::SendError;

    #[test]
    fn test_display() {
        let err = NodeError::Config("bad role".into());
        assert_eq!(err.to_string(), "configuration error: bad role");

        let err = NodeError::UnknownNode(NodeNum(0x1234));
        assert_eq!(err.to_string(), "unknown node !00001234");
    }

    #[test]
    fn test_from_flood_error() {
        let err: NodeError = FloodError::from(SendError::QueueFull).into();
        assert!(matches!(err, NodeError::Flood(FloodError::Send(SendError::QueueFull))));
    }
}
