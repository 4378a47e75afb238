use thiserror::Error;

use super::NodeId;

#[derive(Error, Debug)]
pub enum RaftError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown peer: {0}")]
    UnknownPeer(NodeId),

    #[error("Peer unreachable: {0}")]
    PeerUnreachable(NodeId),

    #[error("Transport already has a registered member set")]
    AlreadyRegistered,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for RaftError {
    fn from(err: serde_json::Error) -> Self {
        RaftError::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_error_kind() {
        let err = RaftError::PeerUnreachable(3);
        assert_eq!(format!("{err}"), "Peer unreachable: 3");

        let err = RaftError::InvalidConfig("heartbeat too slow".to_string());
        assert!(format!("{err}").contains("heartbeat too slow"));
    }

    #[test]
    fn from_serde_json_maps_to_serialization_error() {
        let bad = serde_json::from_str::<u64>("not a number").unwrap_err();
        let err: RaftError = bad.into();
        assert!(matches!(err, RaftError::SerializationError(_)));
    }
}
