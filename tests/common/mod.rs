//! Shared fixtures: a scripted transport recording everything the room puts
//! on the wire, and a handler recording every presentation event.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use transport::{
    AudioTrack, Call, ConnectionId, Link, LocalStream, PeerId, Transport, TransportError,
    TransportEvent,
};
use voice_mesh::audio::DeviceTableAudio;
use voice_mesh::events::{LinkStatus, RoomEventHandler};
use voice_mesh::{Envelope, Room, RoomConfig};

// ─────────────────────────── Mock Transport ───────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Wire {
    Dialed { to: PeerId, link: ConnectionId },
    Called { to: PeerId, call: ConnectionId },
    Sent { to: PeerId, link: ConnectionId, envelope: Envelope },
    Flushed { to: PeerId },
    LinkClosed { to: PeerId, link: ConnectionId },
    CallClosed { to: PeerId, call: ConnectionId },
    Answered { to: PeerId, call: ConnectionId },
    TrackReplaced { to: PeerId, device_id: String },
    Shutdown,
}

#[derive(Debug, Default)]
struct MockState {
    next_id: u64,
    wire: Vec<Wire>,
    unreachable: bool,
}

impl MockState {
    fn next_id(&mut self) -> ConnectionId {
        self.next_id += 1;
        ConnectionId(self.next_id)
    }
}

#[derive(Debug, Clone)]
pub struct MockTransport {
    id: PeerId,
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new(id: &str) -> Self {
        Self {
            id: PeerId::from(id),
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Make every following dial fail immediately.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().unwrap().unreachable = unreachable;
    }

    pub fn wire(&self) -> Vec<Wire> {
        self.state.lock().unwrap().wire.clone()
    }

    pub fn clear_wire(&self) {
        self.state.lock().unwrap().wire.clear();
    }

    /// Envelopes sent to `peer`, in send order.
    pub fn sent_to(&self, peer: &str) -> Vec<Envelope> {
        let peer = PeerId::from(peer);
        self.wire()
            .into_iter()
            .filter_map(|wire| match wire {
                Wire::Sent { to, envelope, .. } if to == peer => Some(envelope),
                _ => None,
            })
            .collect()
    }

    /// A link a remote peer just dialed towards us.
    pub fn inbound_link(&self, from: &str) -> Box<dyn Link> {
        let id = self.state.lock().unwrap().next_id();
        Box::new(MockLink {
            peer: PeerId::from(from),
            id,
            state: self.state.clone(),
        })
    }

    /// A call a remote peer just placed towards us.
    pub fn inbound_call(&self, from: &str) -> Box<dyn Call> {
        let id = self.state.lock().unwrap().next_id();
        Box::new(MockCall {
            peer: PeerId::from(from),
            id,
            state: self.state.clone(),
        })
    }

    fn record(&self, wire: Wire) {
        self.state.lock().unwrap().wire.push(wire);
    }
}

impl Transport for MockTransport {
    fn local_id(&self) -> PeerId {
        self.id.clone()
    }

    fn dial(&self, peer: &PeerId) -> Result<Box<dyn Link>, TransportError> {
        let mut state = self.state.lock().unwrap();
        if state.unreachable {
            return Err(TransportError::PeerUnavailable(peer.to_string()));
        }
        let id = state.next_id();
        state.wire.push(Wire::Dialed {
            to: peer.clone(),
            link: id,
        });
        Ok(Box::new(MockLink {
            peer: peer.clone(),
            id,
            state: self.state.clone(),
        }))
    }

    fn call(&self, peer: &PeerId, _stream: &LocalStream) -> Result<Box<dyn Call>, TransportError> {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        state.wire.push(Wire::Called {
            to: peer.clone(),
            call: id,
        });
        Ok(Box::new(MockCall {
            peer: peer.clone(),
            id,
            state: self.state.clone(),
        }))
    }

    fn shutdown(&self) {
        self.record(Wire::Shutdown);
    }
}

#[derive(Debug)]
struct MockLink {
    peer: PeerId,
    id: ConnectionId,
    state: Arc<Mutex<MockState>>,
}

impl Link for MockLink {
    fn peer(&self) -> &PeerId {
        &self.peer
    }

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn send(&self, payload: &[u8]) -> Result<(), TransportError> {
        let envelope = Envelope::decode(payload).expect("room sent an undecodable payload");
        self.state.lock().unwrap().wire.push(Wire::Sent {
            to: self.peer.clone(),
            link: self.id,
            envelope,
        });
        Ok(())
    }

    fn flush(&self) -> Result<(), TransportError> {
        self.state.lock().unwrap().wire.push(Wire::Flushed {
            to: self.peer.clone(),
        });
        Ok(())
    }

    fn close(&self) {
        self.state.lock().unwrap().wire.push(Wire::LinkClosed {
            to: self.peer.clone(),
            link: self.id,
        });
    }
}

#[derive(Debug)]
struct MockCall {
    peer: PeerId,
    id: ConnectionId,
    state: Arc<Mutex<MockState>>,
}

impl Call for MockCall {
    fn peer(&self) -> &PeerId {
        &self.peer
    }

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn answer(&self, _stream: &LocalStream) -> Result<(), TransportError> {
        self.state.lock().unwrap().wire.push(Wire::Answered {
            to: self.peer.clone(),
            call: self.id,
        });
        Ok(())
    }

    fn replace_outgoing_track(&self, track: &AudioTrack) -> Result<(), TransportError> {
        self.state.lock().unwrap().wire.push(Wire::TrackReplaced {
            to: self.peer.clone(),
            device_id: track.device_id.clone(),
        });
        Ok(())
    }

    fn close(&self) {
        self.state.lock().unwrap().wire.push(Wire::CallClosed {
            to: self.peer.clone(),
            call: self.id,
        });
    }
}

// ─────────────────────────── Mock Handler ───────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    PeerAppeared { peer: PeerId, is_host: bool },
    PeerRenamed { peer: PeerId, name: String },
    PeerDeviceUpdated { peer: PeerId, label: String },
    PeerRemoved { peer: PeerId },
    LinkStatusChanged { peer: PeerId, status: LinkStatus },
    PeerStreaming { peer: PeerId },
    PeerMuted { peer: PeerId, muted: bool },
    ChatReceived { text: String, author: String },
    SystemNotice { notice: String },
    LocalRemoved,
}

#[derive(Clone, Default)]
pub struct RecordingHandler {
    events: Arc<Mutex<Vec<Event>>>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    pub fn count(&self, predicate: impl Fn(&Event) -> bool) -> usize {
        self.events().iter().filter(|event| predicate(event)).count()
    }

    pub fn removed_count(&self, peer: &str) -> usize {
        let peer = PeerId::from(peer);
        self.count(|event| matches!(event, Event::PeerRemoved { peer: p } if *p == peer))
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl RoomEventHandler for RecordingHandler {
    async fn on_peer_appeared(&self, peer: &PeerId, is_host: bool) {
        self.push(Event::PeerAppeared {
            peer: peer.clone(),
            is_host,
        });
    }

    async fn on_peer_renamed(&self, peer: &PeerId, name: &str) {
        self.push(Event::PeerRenamed {
            peer: peer.clone(),
            name: name.to_string(),
        });
    }

    async fn on_peer_device_updated(&self, peer: &PeerId, label: &str) {
        self.push(Event::PeerDeviceUpdated {
            peer: peer.clone(),
            label: label.to_string(),
        });
    }

    async fn on_peer_removed(&self, peer: &PeerId) {
        self.push(Event::PeerRemoved { peer: peer.clone() });
    }

    async fn on_link_status_changed(&self, peer: &PeerId, status: LinkStatus) {
        self.push(Event::LinkStatusChanged {
            peer: peer.clone(),
            status,
        });
    }

    async fn on_peer_streaming(&self, peer: &PeerId) {
        self.push(Event::PeerStreaming { peer: peer.clone() });
    }

    async fn on_peer_muted(&self, peer: &PeerId, muted: bool) {
        self.push(Event::PeerMuted {
            peer: peer.clone(),
            muted,
        });
    }

    async fn on_chat_received(&self, text: &str, author: &str) {
        self.push(Event::ChatReceived {
            text: text.to_string(),
            author: author.to_string(),
        });
    }

    async fn on_system_notice(&self, notice: &str) {
        self.push(Event::SystemNotice {
            notice: notice.to_string(),
        });
    }

    async fn on_local_removed(&self) {
        self.push(Event::LocalRemoved);
    }
}

// ─────────────────────────── Helpers ───────────────────────────

pub type MockRoom = Room<MockTransport, DeviceTableAudio, RecordingHandler>;

pub struct Fixture {
    pub room: MockRoom,
    pub transport: MockTransport,
    pub handler: RecordingHandler,
    pub audio: Arc<DeviceTableAudio>,
}

/// Room for `me`, joined through `rendezvous` (host when `None`).
pub fn fixture(me: &str, rendezvous: Option<&str>) -> Fixture {
    let transport = MockTransport::new(me);
    let handler = RecordingHandler::new();
    let audio = Arc::new(DeviceTableAudio::new([
        ("mic-1", "Desk microphone"),
        ("mic-2", "Headset"),
    ]));
    let config = match rendezvous {
        Some(rendezvous) => RoomConfig::join(me, PeerId::from(rendezvous)),
        None => RoomConfig::host(me),
    };
    let room = Room::new(
        Arc::new(transport.clone()),
        audio.clone(),
        Arc::new(handler.clone()),
        config,
    )
    .expect("Failed to create room");
    Fixture {
        room,
        transport,
        handler,
        audio,
    }
}

pub fn link_id(room: &MockRoom, peer: &str) -> ConnectionId {
    room.registry()
        .get(&PeerId::from(peer))
        .and_then(|state| state.link_id())
        .expect("peer has no link")
}

pub fn call_id(room: &MockRoom, peer: &str) -> ConnectionId {
    room.registry()
        .get(&PeerId::from(peer))
        .and_then(|state| state.call_id())
        .expect("peer has no call")
}

/// Report the currently registered link to `peer` as open.
pub async fn open_link(room: &mut MockRoom, peer: &str) {
    let link = link_id(room, peer);
    room.handle_transport_event(TransportEvent::LinkOpen {
        peer: PeerId::from(peer),
        link,
    })
    .await;
}

/// Dial `peer` and report the link open.
pub async fn connect_open(room: &mut MockRoom, peer: &str) {
    room.connect(&PeerId::from(peer)).await;
    open_link(room, peer).await;
}

/// Accept an inbound link from `peer` and report it open.
pub async fn accept_open(fixture: &mut Fixture, peer: &str) {
    let link = fixture.transport.inbound_link(peer);
    fixture
        .room
        .handle_transport_event(TransportEvent::IncomingLink(link))
        .await;
    open_link(&mut fixture.room, peer).await;
}

/// Deliver `envelope` from `peer` on its registered link.
pub async fn deliver(room: &mut MockRoom, peer: &str, envelope: &Envelope) {
    let link = link_id(room, peer);
    deliver_raw(room, peer, link, envelope.encode().unwrap()).await;
}

pub async fn deliver_raw(room: &mut MockRoom, peer: &str, link: ConnectionId, payload: Vec<u8>) {
    room.handle_transport_event(TransportEvent::LinkData {
        peer: PeerId::from(peer),
        link,
        payload,
    })
    .await;
}

pub fn ids(ids: &[&str]) -> Vec<PeerId> {
    ids.iter().map(|id| PeerId::from(*id)).collect()
}
