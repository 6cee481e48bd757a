//! Link, call and endpoint traits plus the inbound event stream.
use std::fmt::Debug;

use crate::{AudioTrack, ConnectionId, LocalStream, PeerId, TransportError};

/// Bidirectional, ordered, reliable message channel to one remote peer.
///
/// Opening is asynchronous: `Transport::dial` returns immediately and the
/// endpoint later reports [`TransportEvent::LinkOpen`] or
/// [`TransportEvent::LinkError`].
pub trait Link: Send + Sync + Debug {
    /// Remote peer at the other end of this link.
    fn peer(&self) -> &PeerId;

    fn id(&self) -> ConnectionId;

    /// Queue a payload for delivery. Payloads are delivered in send order.
    fn send(&self, payload: &[u8]) -> Result<(), TransportError>;

    /// Block until every queued payload has been handed to the network.
    fn flush(&self) -> Result<(), TransportError> {
        Ok(())
    }

    /// Close the link. Idempotent; only the remote side is notified.
    fn close(&self);
}

/// Media (audio) transport to one remote peer.
pub trait Call: Send + Sync + Debug {
    fn peer(&self) -> &PeerId;

    fn id(&self) -> ConnectionId;

    /// Accept an inbound call, sending `stream` back to the caller.
    fn answer(&self, stream: &LocalStream) -> Result<(), TransportError>;

    /// Swap the outgoing audio track without renegotiating the call.
    fn replace_outgoing_track(&self, track: &AudioTrack) -> Result<(), TransportError>;

    /// Hang up. Idempotent; only the remote side is notified.
    fn close(&self);
}

/// Local endpoint of the point-to-point layer.
pub trait Transport: Send + Sync + 'static {
    /// Identifier assigned to this endpoint. Stable for its whole lifetime.
    fn local_id(&self) -> PeerId;

    /// Start opening a data link to `peer`.
    fn dial(&self, peer: &PeerId) -> Result<Box<dyn Link>, TransportError>;

    /// Start a media call to `peer`, sending `stream`.
    fn call(&self, peer: &PeerId, stream: &LocalStream) -> Result<Box<dyn Call>, TransportError>;

    /// Destroy the endpoint. Subsequent dials fail and no further inbound
    /// links or calls are delivered.
    fn shutdown(&self);
}

/// Everything an endpoint reports back to its owner.
///
/// Per-connection events carry the `ConnectionId` of the link or call they
/// belong to.
#[derive(Debug)]
pub enum TransportEvent {
    /// A remote peer dialed us.
    IncomingLink(Box<dyn Link>),
    /// A remote peer called us. The call is not answered yet.
    IncomingCall(Box<dyn Call>),
    LinkOpen {
        peer: PeerId,
        link: ConnectionId,
    },
    LinkData {
        peer: PeerId,
        link: ConnectionId,
        payload: Vec<u8>,
    },
    LinkClosed {
        peer: PeerId,
        link: ConnectionId,
    },
    LinkError {
        peer: PeerId,
        link: ConnectionId,
        reason: String,
    },
    /// The remote media stream of a call started flowing.
    CallStream {
        peer: PeerId,
        call: ConnectionId,
    },
    CallClosed {
        peer: PeerId,
        call: ConnectionId,
    },
    CallError {
        peer: PeerId,
        call: ConnectionId,
        reason: String,
    },
}

impl TransportEvent {
    /// The remote peer this event concerns.
    pub fn peer(&self) -> &PeerId {
        match self {
            TransportEvent::IncomingLink(link) => link.peer(),
            TransportEvent::IncomingCall(call) => call.peer(),
            TransportEvent::LinkOpen { peer, .. }
            | TransportEvent::LinkData { peer, .. }
            | TransportEvent::LinkClosed { peer, .. }
            | TransportEvent::LinkError { peer, .. }
            | TransportEvent::CallStream { peer, .. }
            | TransportEvent::CallClosed { peer, .. }
            | TransportEvent::CallError { peer, .. } => peer,
        }
    }
}
