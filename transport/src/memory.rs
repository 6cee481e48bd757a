//! In-process transport backed by channels.
//!
//! Endpoints register their event sender in a shared broker. Dialing pushes
//! the remote half of the link straight into the remote endpoint's event
//! queue, so per-link ordering is the ordering of a single unbounded channel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::debug;

use crate::{
    AudioTrack, Call, ConnectionId, Link, LocalStream, PeerId, Transport, TransportError,
    TransportEvent,
};

type EventSender = UnboundedSender<TransportEvent>;

/// Track one side of a call is sending, and who hears it.
#[derive(Debug, Clone)]
struct SentTrack {
    listener: PeerId,
    track: AudioTrack,
}

/// Shared broker routing links and calls between [`MemoryTransport`]s.
#[derive(Clone, Debug, Default)]
pub struct MemoryNetwork {
    endpoints: Arc<Mutex<HashMap<PeerId, EventSender>>>,
    tracks: Arc<Mutex<HashMap<(ConnectionId, PeerId), SentTrack>>>,
    next_id: Arc<AtomicU64>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an endpoint under `id` and return it with its event stream.
    pub fn join(&self, id: PeerId) -> (MemoryTransport, UnboundedReceiver<TransportEvent>) {
        let (events_tx, events_rx) = unbounded_channel();
        self.endpoints.lock().insert(id.clone(), events_tx.clone());
        let transport = MemoryTransport {
            id,
            network: self.clone(),
            events: events_tx,
            destroyed: AtomicBool::new(false),
        };
        (transport, events_rx)
    }

    /// Register an endpoint under a freshly generated identifier.
    pub fn join_random(&self) -> (MemoryTransport, UnboundedReceiver<TransportEvent>) {
        self.join(PeerId::random())
    }

    pub fn is_registered(&self, id: &PeerId) -> bool {
        self.endpoints.lock().contains_key(id)
    }

    /// Track `listener` currently receives from `speaker` over an open call.
    pub fn heard_track(&self, listener: &PeerId, speaker: &PeerId) -> Option<AudioTrack> {
        self.tracks
            .lock()
            .iter()
            .find(|((_, from), sent)| from == speaker && &sent.listener == listener)
            .map(|(_, sent)| sent.track.clone())
    }

    fn send_track(&self, call: ConnectionId, speaker: &PeerId, listener: &PeerId, track: &AudioTrack) {
        self.tracks.lock().insert(
            (call, speaker.clone()),
            SentTrack {
                listener: listener.clone(),
                track: track.clone(),
            },
        );
    }

    fn drop_tracks(&self, call: ConnectionId) {
        self.tracks.lock().retain(|(id, _), _| *id != call);
    }

    fn endpoint(&self, id: &PeerId) -> Option<EventSender> {
        self.endpoints.lock().get(id).cloned()
    }

    fn leave(&self, id: &PeerId, events: &EventSender) {
        let mut endpoints = self.endpoints.lock();
        if endpoints
            .get(id)
            .is_some_and(|registered| registered.same_channel(events))
        {
            endpoints.remove(id);
        }
    }

    fn next_connection_id(&self) -> ConnectionId {
        ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

/// One endpoint of a [`MemoryNetwork`].
#[derive(Debug)]
pub struct MemoryTransport {
    id: PeerId,
    network: MemoryNetwork,
    events: EventSender,
    destroyed: AtomicBool,
}

impl MemoryTransport {
    fn check_alive(&self) -> Result<(), TransportError> {
        if self.destroyed.load(Ordering::Acquire) {
            return Err(TransportError::EndpointDestroyed);
        }
        Ok(())
    }

    /// Remote endpoint sender, `None` when the peer is not reachable.
    fn reach(&self, peer: &PeerId) -> Option<EventSender> {
        self.network
            .endpoint(peer)
            .filter(|remote| !remote.is_closed())
    }
}

impl Transport for MemoryTransport {
    fn local_id(&self) -> PeerId {
        self.id.clone()
    }

    fn dial(&self, peer: &PeerId) -> Result<Box<dyn Link>, TransportError> {
        self.check_alive()?;
        let id = self.network.next_connection_id();
        let open = Arc::new(AtomicBool::new(false));

        let Some(remote) = self.reach(peer) else {
            debug!("[dial]: {peer} is not registered, reporting {id} as failed");
            let _ = self.events.send(TransportEvent::LinkError {
                peer: peer.clone(),
                link: id,
                reason: TransportError::PeerUnavailable(peer.to_string()).to_string(),
            });
            return Ok(Box::new(MemoryLink {
                peer: peer.clone(),
                local: self.id.clone(),
                id,
                remote: None,
                open,
            }));
        };

        open.store(true, Ordering::Release);
        let remote_half = MemoryLink {
            peer: self.id.clone(),
            local: peer.clone(),
            id,
            remote: Some(self.events.clone()),
            open: open.clone(),
        };
        let _ = remote.send(TransportEvent::IncomingLink(Box::new(remote_half)));
        let _ = remote.send(TransportEvent::LinkOpen {
            peer: self.id.clone(),
            link: id,
        });
        let _ = self.events.send(TransportEvent::LinkOpen {
            peer: peer.clone(),
            link: id,
        });

        Ok(Box::new(MemoryLink {
            peer: peer.clone(),
            local: self.id.clone(),
            id,
            remote: Some(remote),
            open,
        }))
    }

    fn call(&self, peer: &PeerId, stream: &LocalStream) -> Result<Box<dyn Call>, TransportError> {
        self.check_alive()?;
        let id = self.network.next_connection_id();

        let Some(remote) = self.reach(peer) else {
            let _ = self.events.send(TransportEvent::CallError {
                peer: peer.clone(),
                call: id,
                reason: TransportError::PeerUnavailable(peer.to_string()).to_string(),
            });
            return Ok(Box::new(MemoryCall::new(
                peer.clone(),
                self.id.clone(),
                id,
                None,
                self.events.clone(),
                Arc::new(AtomicBool::new(false)),
                self.network.clone(),
            )));
        };

        let open = Arc::new(AtomicBool::new(true));
        self.network.send_track(id, &self.id, peer, &stream.track);
        let remote_half = MemoryCall::new(
            self.id.clone(),
            peer.clone(),
            id,
            Some(self.events.clone()),
            remote.clone(),
            open.clone(),
            self.network.clone(),
        );
        let _ = remote.send(TransportEvent::IncomingCall(Box::new(remote_half)));

        Ok(Box::new(MemoryCall::new(
            peer.clone(),
            self.id.clone(),
            id,
            Some(remote),
            self.events.clone(),
            open,
            self.network.clone(),
        )))
    }

    fn shutdown(&self) {
        if !self.destroyed.swap(true, Ordering::AcqRel) {
            debug!("[shutdown]: endpoint {} leaves the network", self.id);
            self.network.leave(&self.id, &self.events);
        }
    }
}

/// One half of an in-memory link.
#[derive(Debug)]
pub struct MemoryLink {
    peer: PeerId,
    local: PeerId,
    id: ConnectionId,
    remote: Option<EventSender>,
    open: Arc<AtomicBool>,
}

impl Link for MemoryLink {
    fn peer(&self) -> &PeerId {
        &self.peer
    }

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn send(&self, payload: &[u8]) -> Result<(), TransportError> {
        let remote = match &self.remote {
            Some(remote) if self.open.load(Ordering::Acquire) => remote,
            _ => return Err(TransportError::ConnectionClosed(self.peer.to_string())),
        };
        remote
            .send(TransportEvent::LinkData {
                peer: self.local.clone(),
                link: self.id,
                payload: payload.to_vec(),
            })
            .map_err(|_| TransportError::ConnectionClosed(self.peer.to_string()))
    }

    fn close(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            if let Some(remote) = &self.remote {
                let _ = remote.send(TransportEvent::LinkClosed {
                    peer: self.local.clone(),
                    link: self.id,
                });
            }
        }
    }
}

/// One half of an in-memory call.
#[derive(Debug)]
pub struct MemoryCall {
    peer: PeerId,
    local: PeerId,
    id: ConnectionId,
    remote: Option<EventSender>,
    local_events: EventSender,
    open: Arc<AtomicBool>,
    network: MemoryNetwork,
}

impl MemoryCall {
    fn new(
        peer: PeerId,
        local: PeerId,
        id: ConnectionId,
        remote: Option<EventSender>,
        local_events: EventSender,
        open: Arc<AtomicBool>,
        network: MemoryNetwork,
    ) -> Self {
        Self {
            peer,
            local,
            id,
            remote,
            local_events,
            open,
            network,
        }
    }

    fn remote(&self) -> Result<&EventSender, TransportError> {
        match &self.remote {
            Some(remote) if self.open.load(Ordering::Acquire) => Ok(remote),
            _ => Err(TransportError::ConnectionClosed(self.peer.to_string())),
        }
    }
}

impl Call for MemoryCall {
    fn peer(&self) -> &PeerId {
        &self.peer
    }

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn answer(&self, stream: &LocalStream) -> Result<(), TransportError> {
        let remote = self.remote()?;
        self.network
            .send_track(self.id, &self.local, &self.peer, &stream.track);
        remote
            .send(TransportEvent::CallStream {
                peer: self.local.clone(),
                call: self.id,
            })
            .map_err(|_| TransportError::ConnectionClosed(self.peer.to_string()))?;
        let _ = self.local_events.send(TransportEvent::CallStream {
            peer: self.peer.clone(),
            call: self.id,
        });
        Ok(())
    }

    fn replace_outgoing_track(&self, track: &AudioTrack) -> Result<(), TransportError> {
        self.remote()?;
        self.network
            .send_track(self.id, &self.local, &self.peer, track);
        Ok(())
    }

    fn close(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            self.network.drop_tracks(self.id);
            if let Some(remote) = &self.remote {
                let _ = remote.send(TransportEvent::CallClosed {
                    peer: self.local.clone(),
                    call: self.id,
                });
            }
        }
    }
}
