//! Connection lifecycle: dial, inbound acceptance, open/close events and
//! the single cleanup path.
use tracing::{debug, info, warn};
use transport::{Call, ConnectionId, Link, PeerId, Transport};

use crate::audio::AudioSource;
use crate::events::{LinkStatus, RoomEventHandler};
use crate::registry::{CallPhase, ConnectionPhase, LinkState, Origin};
use crate::room::{Room, SessionState};

impl<T: Transport, A: AudioSource, H: RoomEventHandler> Room<T, A, H> {
    /// Dial `peer` and open a call to it.
    ///
    /// No-op when `peer` is the local id, is already registered, or the
    /// session is over.
    pub async fn connect(&mut self, peer: &PeerId) {
        if !self.is_active() || peer == self.my_id() || self.registry.contains(peer) {
            debug!("[connect]: Skipping {peer}");
            return;
        }

        info!("[connect]: Connecting to {peer}");
        self.handler
            .on_system_notice(&format!("Connecting to {peer}..."))
            .await;

        let link = match self.transport.dial(peer) {
            Ok(link) => link,
            Err(e) => {
                warn!("[connect]: Failed to dial {peer}: {e}");
                self.handler
                    .on_system_notice(&format!("Could not reach {peer}: {e}"))
                    .await;
                return;
            }
        };

        let mut state = LinkState::new(peer.clone(), self.is_rendezvous(peer));
        state.set_link(link, Origin::Local);
        match self.transport.call(peer, &self.me.stream) {
            Ok(call) => {
                state.set_call(call, Origin::Local);
            }
            Err(e) => {
                warn!("[connect]: Failed to call {peer}: {e}");
                self.handler
                    .on_system_notice(&format!("Audio call to {peer} failed: {e}"))
                    .await;
            }
        }
        self.register(state).await;
    }

    async fn register(&mut self, state: LinkState) {
        let peer = state.id().clone();
        let is_host = state.is_room_host();
        if self.registry.insert(state) {
            self.handler.on_peer_appeared(&peer, is_host).await;
        }
    }

    /// When both sides dialed each other, keep the link dialed by the
    /// smaller id. An existing link we did not dial always gives way.
    fn keeps_existing(&self, peer: &PeerId, existing: Origin) -> bool {
        existing == Origin::Local && self.my_id() < peer
    }

    /// Register a data link opened by a remote peer.
    pub async fn accept_inbound(&mut self, link: Box<dyn Link>) {
        let peer = link.peer().clone();
        if peer == *self.my_id() {
            link.close();
            return;
        }

        let keep_existing = self
            .registry
            .get(&peer)
            .filter(|state| state.link().is_some())
            .map(|state| self.keeps_existing(&peer, state.link_origin()));

        if keep_existing == Some(true) {
            debug!("[accept_inbound]: Keeping own link to {peer}, closing {}", link.id());
            link.close();
            return;
        }

        if let Some(state) = self.registry.get_mut(&peer) {
            debug!("[accept_inbound]: Adopting {} from {peer}", link.id());
            let was_open = state.is_open();
            if let Some(replaced) = state.set_link(link, Origin::Remote) {
                replaced.close();
            }
            // The adopted link reports Open again on its own.
            if was_open {
                self.handler
                    .on_link_status_changed(&peer, LinkStatus::Closed)
                    .await;
            }
            return;
        }

        info!("[accept_inbound]: Inbound link from {peer}");
        let mut state = LinkState::new(peer.clone(), self.is_rendezvous(&peer));
        state.set_link(link, Origin::Remote);
        self.register(state).await;
    }

    /// Register and answer a media call opened by a remote peer.
    pub async fn accept_inbound_call(&mut self, call: Box<dyn Call>) {
        let peer = call.peer().clone();
        if peer == *self.my_id() {
            call.close();
            return;
        }

        let keep_existing = self
            .registry
            .get(&peer)
            .filter(|state| state.call().is_some())
            .map(|state| self.keeps_existing(&peer, state.call_origin()));

        if keep_existing == Some(true) {
            debug!("[accept_inbound_call]: Keeping own call to {peer}, closing {}", call.id());
            call.close();
            return;
        }

        if let Some(state) = self.registry.get_mut(&peer) {
            if let Some(replaced) = state.set_call(call, Origin::Remote) {
                replaced.close();
            }
        } else {
            info!("[accept_inbound_call]: Inbound call from {peer}");
            let mut state = LinkState::new(peer.clone(), self.is_rendezvous(&peer));
            state.set_call(call, Origin::Remote);
            self.register(state).await;
        }

        let answered = self
            .registry
            .get(&peer)
            .and_then(|state| state.call())
            .map(|call| call.answer(&self.me.stream));
        if let Some(Err(e)) = answered {
            warn!("[accept_inbound_call]: Failed to answer {peer}: {e}");
            self.handler
                .on_system_notice(&format!("Could not answer the call from {peer}: {e}"))
                .await;
        }
    }

    pub(crate) async fn on_link_open(&mut self, peer: &PeerId, link: ConnectionId) {
        let Some(state) = self
            .registry
            .get_mut(peer)
            .filter(|state| state.link_id() == Some(link))
        else {
            debug!("[on_link_open]: Stale open for {peer} on {link}");
            return;
        };
        state.connection_phase = ConnectionPhase::Open;
        info!("[on_link_open]: Link to {peer} is open");
        self.handler
            .on_link_status_changed(peer, LinkStatus::Open)
            .await;

        // Handshake order matters: roster, then metadata, then the greeting.
        self.share_roster(peer);
        self.send_metadata(peer);
        self.announce_join(peer);
    }

    pub(crate) async fn on_link_closed(&mut self, peer: &PeerId, link: ConnectionId) {
        if !self.registry.owns_link(peer, link) {
            debug!("[on_link_closed]: Stale close for {peer} on {link}");
            return;
        }
        info!("[on_link_closed]: Link to {peer} closed");
        self.cleanup(peer).await;
    }

    pub(crate) async fn on_link_error(&mut self, peer: &PeerId, link: ConnectionId, reason: &str) {
        if !self.registry.owns_link(peer, link) {
            debug!("[on_link_error]: Stale error for {peer} on {link}: {reason}");
            return;
        }
        warn!("[on_link_error]: Link to {peer} failed: {reason}");
        self.handler
            .on_system_notice(&format!("Connection to {peer} failed: {reason}"))
            .await;
        self.cleanup(peer).await;
    }

    pub(crate) async fn on_call_stream(&mut self, peer: &PeerId, call: ConnectionId) {
        let Some(state) = self
            .registry
            .get_mut(peer)
            .filter(|state| state.call_id() == Some(call))
        else {
            debug!("[on_call_stream]: Stale stream for {peer} on {call}");
            return;
        };
        state.call_phase = CallPhase::Streaming;
        self.handler.on_peer_streaming(peer).await;
    }

    pub(crate) async fn on_call_closed(&mut self, peer: &PeerId, call: ConnectionId) {
        if !self.registry.owns_call(peer, call) {
            debug!("[on_call_closed]: Stale close for {peer} on {call}");
            return;
        }
        info!("[on_call_closed]: Call with {peer} ended");
        self.cleanup(peer).await;
    }

    pub(crate) async fn on_call_error(&mut self, peer: &PeerId, call: ConnectionId, reason: &str) {
        if !self.registry.owns_call(peer, call) {
            return;
        }
        warn!("[on_call_error]: Call with {peer} failed: {reason}");
        self.handler
            .on_system_notice(&format!("Audio call with {peer} failed: {reason}"))
            .await;
    }

    /// Remove `peer` from the registry, closing its link and call.
    ///
    /// Returns `false` (and does nothing) if `peer` is not registered.
    pub async fn cleanup(&mut self, peer: &PeerId) -> bool {
        let Some(mut state) = self.registry.remove(peer) else {
            return false;
        };
        state.release();
        info!("[cleanup]: Removed {peer}");
        self.handler
            .on_link_status_changed(peer, LinkStatus::Closed)
            .await;
        self.handler.on_peer_removed(peer).await;
        true
    }

    /// Clean up every peer, destroy the endpoint and end the session.
    pub(crate) async fn teardown(&mut self, session: SessionState) {
        for peer in self.registry.ids() {
            self.cleanup(&peer).await;
        }
        self.transport.shutdown();
        self.session = session;
        info!("[teardown]: Session of {} is {session}", self.my_id());
    }
}
