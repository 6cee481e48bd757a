//! Roster gossip: every newly opened link learns the ids the local node
//! already knows, so a late joiner reaches the whole mesh through one member.
use tracing::{debug, info};
use transport::{PeerId, Transport};

use crate::audio::AudioSource;
use crate::events::RoomEventHandler;
use crate::message::Envelope;
use crate::room::Room;

impl<T: Transport, A: AudioSource, H: RoomEventHandler> Room<T, A, H> {
    /// Send `to` every registered id except its own. Nothing is sent when
    /// there is nobody else to share.
    pub(crate) fn share_roster(&self, to: &PeerId) {
        let peers: Vec<PeerId> = self
            .registry
            .ids()
            .into_iter()
            .filter(|id| id != to && id != self.my_id())
            .collect();
        if peers.is_empty() {
            debug!("[share_roster]: Nothing to share with {to}");
            return;
        }

        debug!("[share_roster]: Sharing {} peers with {to}", peers.len());
        self.send_to(to, &Envelope::Peers { peers });
    }

    pub(crate) async fn handle_peers(&mut self, from: &PeerId, peers: Vec<PeerId>) {
        let unknown: Vec<PeerId> = peers
            .into_iter()
            .filter(|id| id != self.my_id() && !self.registry.contains(id))
            .collect();
        if unknown.is_empty() {
            return;
        }

        info!("[handle_peers]: {from} introduced {} new peers", unknown.len());
        for peer in unknown {
            // Duplicates in one roster are absorbed by connect.
            self.connect(&peer).await;
        }
    }
}
