//! Room session configuration.
use std::time::Duration;

use rand::Rng;
use transport::PeerId;

/// Delay between sending `kick` and forcing the local cleanup of the target.
pub const DEFAULT_KICK_GRACE: Duration = Duration::from_millis(500);

/// Chat line sent to every newly opened link.
pub const DEFAULT_JOIN_ANNOUNCEMENT: &str = "joined the room";

#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// Display name broadcast to every peer.
    pub display_name: String,
    /// Peer the local node joins through. `None` makes the local node the room host.
    pub rendezvous: Option<PeerId>,
    /// Grace period before a kicked peer is cleaned up locally.
    pub kick_grace: Duration,
    /// Chat line sent after the handshake of every new link, if any.
    pub join_announcement: Option<String>,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            display_name: guest_name(),
            rendezvous: None,
            kick_grace: DEFAULT_KICK_GRACE,
            join_announcement: Some(DEFAULT_JOIN_ANNOUNCEMENT.to_string()),
        }
    }
}

impl RoomConfig {
    /// Config for hosting a new room.
    pub fn host(display_name: &str) -> Self {
        Self {
            display_name: display_name.to_string(),
            ..Default::default()
        }
    }

    /// Config for joining the room hosted by `rendezvous`.
    pub fn join(display_name: &str, rendezvous: PeerId) -> Self {
        Self {
            display_name: display_name.to_string(),
            rendezvous: Some(rendezvous),
            ..Default::default()
        }
    }

    pub fn is_host(&self) -> bool {
        self.rendezvous.is_none()
    }
}

/// Random "Guest NNNN" name for participants that did not pick one.
pub fn guest_name() -> String {
    format!("Guest {}", rand::thread_rng().gen_range(0..10000))
}
