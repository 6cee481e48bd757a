//! One local participant's session in a voice mesh room.
//!
//! A [`Room`] owns the [`LinkRegistry`] and runs every protocol component on
//! a single execution context: transport events, local commands and timers
//! are handled one at a time, so registry mutation never races.
//!
//! # Control Flow
//!
//! ```text
//! local command / inbound `peers`
//!   → connect(P)                    dial link + call, register Dialing entry
//!   → LinkOpen(P)                   phase Open, send peers → metadata → chat
//!   → LinkData(P)                   decode Envelope, route by variant
//!   → LinkClosed / LinkError / CallClosed / bye / kick
//!   → cleanup(P)                    the single teardown path
//! ```
//!
//! # Components
//!
//! - `lifecycle` - connect, inbound acceptance, open/close handling, cleanup
//! - `gossip` - roster exchange on link open
//! - `metadata` - display name, device label, outgoing track, mute state
//! - `moderation` - `bye` and `kick`
//! - `chat` - chat broadcast and delivery

mod chat;
mod gossip;
mod handle;
mod lifecycle;
mod metadata;
mod moderation;

use std::fmt::Display;
use std::sync::Arc;

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};
use transport::{ConnectionId, LocalStream, PeerId, Transport, TransportEvent};

use crate::audio::{device_label, AudioSource};
use crate::config::RoomConfig;
use crate::error::RoomError;
use crate::events::RoomEventHandler;
use crate::message::{Envelope, MessageType};
use crate::registry::{CallPhase, ConnectionPhase, LinkRegistry, LinkState};

pub use handle::{RoomCommand, RoomHandle};

/// Lifecycle of the local session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    /// Left voluntarily.
    Left,
    /// Kicked by the room host. Terminal.
    Removed,
}

impl Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self {
            SessionState::Active => "Active",
            SessionState::Left => "Left",
            SessionState::Removed => "Removed",
        };
        write!(f, "{state}")
    }
}

/// The local participant's own state.
#[derive(Debug, Clone)]
pub(crate) struct RoomSelf {
    my_id: PeerId,
    my_name: String,
    my_device_label: String,
    stream: LocalStream,
    local_muted: bool,
}

/// Read-only view of one registry entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerSummary {
    pub id: PeerId,
    pub display_name: String,
    pub device_label: String,
    pub connection_phase: ConnectionPhase,
    pub call_phase: CallPhase,
    pub is_room_host: bool,
    pub muted: bool,
}

impl From<&LinkState> for PeerSummary {
    fn from(state: &LinkState) -> Self {
        Self {
            id: state.id().clone(),
            display_name: state.display_name().to_string(),
            device_label: state.device_label().to_string(),
            connection_phase: state.connection_phase(),
            call_phase: state.call_phase(),
            is_room_host: state.is_room_host(),
            muted: state.is_muted(),
        }
    }
}

/// Read-only view of a whole session.
#[derive(Debug, Clone)]
pub struct RoomSnapshot {
    pub my_id: PeerId,
    pub my_name: String,
    pub my_device_label: String,
    pub is_host: bool,
    pub local_muted: bool,
    pub session: SessionState,
    pub peers: Vec<PeerSummary>,
}

impl RoomSnapshot {
    pub fn peer(&self, id: &PeerId) -> Option<&PeerSummary> {
        self.peers.iter().find(|peer| &peer.id == id)
    }

    /// Ids of every peer whose data link is open.
    pub fn open_peers(&self) -> Vec<PeerId> {
        self.peers
            .iter()
            .filter(|peer| peer.connection_phase == ConnectionPhase::Open)
            .map(|peer| peer.id.clone())
            .collect()
    }
}

/// Deferred work scheduled by the room itself.
#[derive(Debug)]
pub(crate) enum TimerEvent {
    /// Force the local cleanup of a kicked peer, if it still holds `link`.
    KickGraceElapsed {
        peer: PeerId,
        link: Option<ConnectionId>,
    },
}

/// A participant's session in the mesh.
///
/// * `T` - point-to-point transport
/// * `A` - local capture layer
/// * `H` - presentation-facing event sink
pub struct Room<T: Transport, A: AudioSource, H: RoomEventHandler> {
    transport: Arc<T>,
    audio: Arc<A>,
    handler: Arc<H>,
    registry: LinkRegistry,
    me: RoomSelf,
    config: RoomConfig,
    session: SessionState,
    timers_tx: UnboundedSender<TimerEvent>,
    timers_rx: Option<UnboundedReceiver<TimerEvent>>,
}

impl<T: Transport, A: AudioSource, H: RoomEventHandler> Room<T, A, H> {
    /// Create a session on top of an already registered transport endpoint.
    ///
    /// Fails if the capture layer cannot provide a local stream.
    pub fn new(
        transport: Arc<T>,
        audio: Arc<A>,
        handler: Arc<H>,
        config: RoomConfig,
    ) -> Result<Self, RoomError> {
        let stream = audio.local_stream()?;
        let me = RoomSelf {
            my_id: transport.local_id(),
            my_name: config.display_name.clone(),
            my_device_label: device_label(&stream),
            stream,
            local_muted: false,
        };
        info!(
            "[new]: Room session for {} ({}) as {}",
            me.my_id,
            me.my_name,
            if config.is_host() { "host" } else { "guest" }
        );
        let (timers_tx, timers_rx) = unbounded_channel();
        Ok(Self {
            transport,
            audio,
            handler,
            registry: LinkRegistry::new(),
            me,
            config,
            session: SessionState::Active,
            timers_tx,
            timers_rx: Some(timers_rx),
        })
    }

    pub fn my_id(&self) -> &PeerId {
        &self.me.my_id
    }

    pub fn my_name(&self) -> &str {
        &self.me.my_name
    }

    pub fn my_device_label(&self) -> &str {
        &self.me.my_device_label
    }

    pub fn registry(&self) -> &LinkRegistry {
        &self.registry
    }

    pub fn session(&self) -> SessionState {
        self.session
    }

    pub fn is_active(&self) -> bool {
        self.session == SessionState::Active
    }

    /// The local node is host when it did not join through anyone.
    pub fn is_host(&self) -> bool {
        self.config.is_host()
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            my_id: self.me.my_id.clone(),
            my_name: self.me.my_name.clone(),
            my_device_label: self.me.my_device_label.clone(),
            is_host: self.is_host(),
            local_muted: self.me.local_muted,
            session: self.session,
            peers: self.registry.iter().map(PeerSummary::from).collect(),
        }
    }

    fn ensure_active(&self) -> Result<(), RoomError> {
        if !self.is_active() {
            return Err(RoomError::SessionTerminated);
        }
        Ok(())
    }

    fn is_rendezvous(&self, peer: &PeerId) -> bool {
        self.config.rendezvous.as_ref() == Some(peer)
    }

    /// Connect to the peer this session joined through, if any.
    pub async fn join_rendezvous(&mut self) {
        if let Some(rendezvous) = self.config.rendezvous.clone() {
            self.connect(&rendezvous).await;
        }
    }

    // ─────────────────────────── Event Routing ───────────────────────────

    /// Route one transport event to the component owning it.
    pub async fn handle_transport_event(&mut self, event: TransportEvent) {
        if !self.is_active() {
            debug!(
                "[handle_transport_event]: Session {}, dropping event from {}",
                self.session,
                event.peer()
            );
            match event {
                TransportEvent::IncomingLink(link) => link.close(),
                TransportEvent::IncomingCall(call) => call.close(),
                _ => {}
            }
            return;
        }

        match event {
            TransportEvent::IncomingLink(link) => self.accept_inbound(link).await,
            TransportEvent::IncomingCall(call) => self.accept_inbound_call(call).await,
            TransportEvent::LinkOpen { peer, link } => self.on_link_open(&peer, link).await,
            TransportEvent::LinkData {
                peer,
                link,
                payload,
            } => {
                if self.registry.owns_link(&peer, link) {
                    self.handle_payload(&peer, &payload).await;
                } else {
                    debug!("[handle_transport_event]: Stale data from {peer} on {link}");
                }
            }
            TransportEvent::LinkClosed { peer, link } => self.on_link_closed(&peer, link).await,
            TransportEvent::LinkError { peer, link, reason } => {
                self.on_link_error(&peer, link, &reason).await
            }
            TransportEvent::CallStream { peer, call } => self.on_call_stream(&peer, call).await,
            TransportEvent::CallClosed { peer, call } => self.on_call_closed(&peer, call).await,
            TransportEvent::CallError { peer, call, reason } => {
                self.on_call_error(&peer, call, &reason).await
            }
        }
    }

    /// Decode one payload and dispatch it. Undecodable payloads are dropped.
    async fn handle_payload(&mut self, from: &PeerId, payload: &[u8]) {
        let envelope = match Envelope::decode(payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!("[handle_payload]: Ignoring payload from {from}: {e}");
                return;
            }
        };
        debug!(
            "[handle_payload]: {} from {from}",
            envelope.message_type()
        );

        match envelope {
            Envelope::Peers { peers } => self.handle_peers(from, peers).await,
            Envelope::Metadata { name, device } => self.handle_metadata(from, &name, &device).await,
            Envelope::Chat { text, author } => self.handle_chat(&text, &author).await,
            Envelope::Bye => self.handle_bye(from).await,
            Envelope::Kick => self.handle_kick(from).await,
        }
    }

    pub(crate) async fn handle_timer(&mut self, timer: TimerEvent) {
        if !self.is_active() {
            return;
        }
        match timer {
            TimerEvent::KickGraceElapsed { peer, link } => {
                self.on_kick_grace_elapsed(&peer, link).await
            }
        }
    }

    // ─────────────────────────── Sending ───────────────────────────

    /// Send `envelope` to `peer` if its link is open.
    pub(crate) fn send_to(&self, peer: &PeerId, envelope: &Envelope) -> bool {
        let Some(link) = self
            .registry
            .get(peer)
            .filter(|state| state.is_open())
            .and_then(|state| state.link())
        else {
            debug!(
                "[send_to]: No open link to {peer}, dropping {}",
                envelope.message_type()
            );
            return false;
        };

        let payload = match envelope.encode() {
            Ok(payload) => payload,
            Err(e) => {
                warn!("[send_to]: Failed to encode {}: {e}", envelope.message_type());
                return false;
            }
        };
        match link.send(&payload) {
            Ok(()) => true,
            Err(e) => {
                warn!("[send_to]: Failed to send {} to {peer}: {e}", envelope.message_type());
                false
            }
        }
    }

    /// Send `envelope` on every open link. Returns how many links accepted it.
    pub(crate) fn broadcast(&self, envelope: &Envelope) -> usize {
        let payload = match envelope.encode() {
            Ok(payload) => payload,
            Err(e) => {
                warn!("[broadcast]: Failed to encode {}: {e}", envelope.message_type());
                return 0;
            }
        };

        let mut delivered = 0;
        for (peer, link) in self.registry.open_links() {
            match link.send(&payload) {
                Ok(()) => delivered += 1,
                Err(e) => warn!(
                    "[broadcast]: Failed to send {} to {peer}: {e}",
                    envelope.message_type()
                ),
            }
        }
        delivered
    }
}

impl<T, A, H> Room<T, A, H>
where
    T: Transport,
    A: AudioSource,
    H: RoomEventHandler + 'static,
{
    /// Run the session on the current task until it leaves or is removed.
    ///
    /// Returns the final snapshot of the session.
    pub async fn run(
        mut self,
        mut events: UnboundedReceiver<TransportEvent>,
        mut commands: UnboundedReceiver<RoomCommand>,
    ) -> RoomSnapshot {
        let Some(mut timers) = self.timers_rx.take() else {
            warn!("[run]: Room was already started");
            return self.snapshot();
        };

        self.join_rendezvous().await;

        while self.is_active() {
            tokio::select! {
                Some(event) = events.recv() => self.handle_transport_event(event).await,
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => {
                        info!("[run]: Every handle of {} dropped, leaving", self.me.my_id);
                        if let Err(e) = self.leave().await {
                            warn!("[run]: Failed to leave: {e}");
                        }
                    }
                },
                Some(timer) = timers.recv() => self.handle_timer(timer).await,
            }
        }

        info!("[run]: Session of {} ended: {}", self.me.my_id, self.session);
        self.snapshot()
    }

    /// Spawn the session on the tokio runtime.
    ///
    /// Returns a handle for local commands and the task resolving to the
    /// final snapshot.
    pub fn spawn(
        self,
        events: UnboundedReceiver<TransportEvent>,
    ) -> (RoomHandle, tokio::task::JoinHandle<RoomSnapshot>) {
        let (commands_tx, commands_rx) = unbounded_channel();
        let handle = RoomHandle::new(self.me.my_id.clone(), commands_tx);
        let task = tokio::spawn(self.run(events, commands_rx));
        (handle, task)
    }
}
