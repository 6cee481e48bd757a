//! Voluntary leave (`bye`) and forced removal (`kick`).
use tracing::{debug, info, warn};
use transport::{ConnectionId, PeerId, Transport};

use crate::audio::AudioSource;
use crate::error::RoomError;
use crate::events::RoomEventHandler;
use crate::message::Envelope;
use crate::room::{Room, SessionState, TimerEvent};

impl<T: Transport, A: AudioSource, H: RoomEventHandler> Room<T, A, H> {
    fn peer_name(&self, peer: &PeerId) -> String {
        self.registry
            .get(peer)
            .map(|state| state.display_name().to_string())
            .unwrap_or_else(|| peer.to_string())
    }

    /// Send `bye` on every open link and wait until it left the local queues.
    fn say_goodbye(&self) {
        let delivered = self.broadcast(&Envelope::Bye);
        for (peer, link) in self.registry.open_links() {
            if let Err(e) = link.flush() {
                warn!("[say_goodbye]: Failed to flush link to {peer}: {e}");
            }
        }
        debug!("[say_goodbye]: bye sent to {delivered} peers");
    }

    /// Leave the room: say goodbye, then tear the whole session down.
    pub async fn leave(&mut self) -> Result<(), RoomError> {
        self.ensure_active()?;
        info!("[leave]: {} leaves the room", self.my_id());
        self.say_goodbye();
        self.teardown(SessionState::Left).await;
        Ok(())
    }

    /// Remove `peer` from the room. Only the room host may kick.
    ///
    /// The local cleanup of `peer` happens after the configured grace delay,
    /// or right away if its link is not open.
    pub async fn kick(&mut self, peer: &PeerId) -> Result<(), RoomError> {
        self.ensure_active()?;
        if !self.is_host() {
            return Err(RoomError::NotRoomHost);
        }
        let state = self
            .registry
            .get(peer)
            .ok_or_else(|| RoomError::PeerNotFound(peer.clone()))?;

        if !state.is_open() {
            info!("[kick]: Link to {peer} is not open, removing right away");
            self.cleanup(peer).await;
            return Ok(());
        }

        let link = state.link_id();
        self.send_to(peer, &Envelope::Kick);
        info!("[kick]: Kicked {peer}");
        self.handler
            .on_system_notice(&format!("{} was removed from the room", self.peer_name(peer)))
            .await;
        self.schedule_kick_cleanup(peer.clone(), link);
        Ok(())
    }

    fn schedule_kick_cleanup(&self, peer: PeerId, link: Option<ConnectionId>) {
        let timers = self.timers_tx.clone();
        let grace = self.config.kick_grace;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            // The room may be gone already.
            let _ = timers.send(TimerEvent::KickGraceElapsed { peer, link });
        });
    }

    pub(crate) async fn on_kick_grace_elapsed(&mut self, peer: &PeerId, link: Option<ConnectionId>) {
        let still_registered = self
            .registry
            .get(peer)
            .is_some_and(|state| state.link_id() == link);
        if still_registered {
            debug!("[on_kick_grace_elapsed]: Forcing cleanup of {peer}");
            self.cleanup(peer).await;
        }
    }

    pub(crate) async fn handle_bye(&mut self, from: &PeerId) {
        let name = self.peer_name(from);
        if self.cleanup(from).await {
            info!("[handle_bye]: {from} left");
            self.handler
                .on_system_notice(&format!("{name} left the room"))
                .await;
        }
    }

    /// Kicks arrive only over the registered link of `from`. Only the host
    /// issues them, so the sender is not checked again here.
    pub(crate) async fn handle_kick(&mut self, from: &PeerId) {
        warn!("[handle_kick]: Removed from the room by {from}");
        self.say_goodbye();
        self.teardown(SessionState::Removed).await;
        self.handler.on_local_removed().await;
    }
}
