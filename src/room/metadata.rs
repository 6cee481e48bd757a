//! Display name, input device and mute state.
//!
//! The local name and device label go to every link when it opens and again
//! to every open link on each local change. A device change also swaps the
//! outgoing track of every registered call, whatever state its link is in.
use tracing::{debug, info, warn};
use transport::{PeerId, Transport};

use crate::audio::{device_label, AudioSource};
use crate::error::RoomError;
use crate::events::RoomEventHandler;
use crate::message::Envelope;
use crate::room::Room;

impl<T: Transport, A: AudioSource, H: RoomEventHandler> Room<T, A, H> {
    fn metadata_envelope(&self) -> Envelope {
        Envelope::metadata(&self.me.my_name, &self.me.my_device_label)
    }

    pub(crate) fn send_metadata(&self, to: &PeerId) {
        self.send_to(to, &self.metadata_envelope());
    }

    fn broadcast_metadata(&self) -> usize {
        self.broadcast(&self.metadata_envelope())
    }

    /// Change the local display name and tell every open link.
    pub async fn set_display_name(&mut self, name: &str) -> Result<(), RoomError> {
        self.ensure_active()?;
        let name = name.trim();
        if name.is_empty() || name == self.me.my_name {
            return Ok(());
        }

        self.me.my_name = name.to_string();
        let delivered = self.broadcast_metadata();
        info!("[set_display_name]: Now called {name}, told {delivered} peers");
        Ok(())
    }

    /// Switch the capture device.
    ///
    /// Audio layer failures are returned as is and leave links and calls
    /// untouched.
    pub async fn set_input_device(&mut self, device_id: &str) -> Result<(), RoomError> {
        self.ensure_active()?;
        let stream = self.audio.switch_input(device_id)?;

        self.me.my_device_label = device_label(&stream);
        self.me.stream = stream;
        info!(
            "[set_input_device]: Capturing from {}",
            self.me.my_device_label
        );

        self.broadcast_metadata();
        for (peer, call) in self.registry.calls() {
            if let Err(e) = call.replace_outgoing_track(&self.me.stream.track) {
                warn!("[set_input_device]: Failed to replace track for {peer}: {e}");
            }
        }
        Ok(())
    }

    pub(crate) async fn handle_metadata(&mut self, from: &PeerId, name: &str, device: &str) {
        let Some(state) = self.registry.get_mut(from) else {
            return;
        };

        let renamed = !name.is_empty() && state.display_name != name;
        if renamed {
            state.display_name = name.to_string();
        }
        let device_changed = !device.is_empty() && state.device_label != device;
        if device_changed {
            state.device_label = device.to_string();
        }
        debug!("[handle_metadata]: {from} is {name:?} on {device:?}");

        if renamed {
            self.handler.on_peer_renamed(from, name).await;
        }
        if device_changed {
            self.handler.on_peer_device_updated(from, device).await;
        }
    }

    /// Silence or restore playback of one peer.
    pub async fn set_peer_muted(&mut self, peer: &PeerId, muted: bool) -> Result<(), RoomError> {
        self.ensure_active()?;
        let state = self
            .registry
            .get_mut(peer)
            .ok_or_else(|| RoomError::PeerNotFound(peer.clone()))?;
        state.muted = muted;
        self.audio.set_peer_muted(peer, muted);
        self.handler.on_peer_muted(peer, muted).await;
        Ok(())
    }

    /// Silence or restore the local microphone.
    pub async fn set_local_muted(&mut self, muted: bool) -> Result<(), RoomError> {
        self.ensure_active()?;
        self.me.local_muted = muted;
        self.audio.set_local_muted(muted);
        info!("[set_local_muted]: muted={muted}");
        Ok(())
    }
}
