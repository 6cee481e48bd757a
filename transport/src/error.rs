/// Errors originating from the point-to-point transport layer.
///
/// String payloads carry the underlying transport message. Callers should
/// treat them as diagnostic text, not match on their content.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Peer unavailable: {0}")]
    PeerUnavailable(String),
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),
    #[error("Endpoint destroyed")]
    EndpointDestroyed,
}
