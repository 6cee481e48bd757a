use transport::PeerId;

/// Errors reported by the local capture layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AudioError {
    #[error("Input device not found: {0}")]
    DeviceNotFound(String),
    #[error("Input device rejected the requested constraints: {0}")]
    ConstraintFailure(String),
    #[error("Microphone access denied")]
    PermissionDenied,
}

#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("JSON processing error: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error("Room session is no longer active")]
    SessionTerminated,
    #[error("Only the room host can remove participants")]
    NotRoomHost,
    #[error("Peer not found: {0}")]
    PeerNotFound(PeerId),

    #[error(transparent)]
    Audio(#[from] AudioError),
}
