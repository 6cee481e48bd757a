//! Presentation-facing event handler.

use std::fmt::Display;

use async_trait::async_trait;
use tracing::{info, warn};
use transport::PeerId;

/// Link status as shown to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Open,
    Closed,
}

impl Display for LinkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = match self {
            LinkStatus::Open => "Open",
            LinkStatus::Closed => "Closed",
        };
        write!(f, "{status}")
    }
}

/// Trait for handling output events of a room session.
///
/// The room never renders anything itself. Every change a user could see is
/// reported through this trait, in the order it happened on the room's
/// execution context.
#[async_trait]
pub trait RoomEventHandler: Send + Sync {
    /// A remote peer got a link state entry (dialing or accepted).
    async fn on_peer_appeared(&self, peer: &PeerId, is_host: bool);

    async fn on_peer_renamed(&self, peer: &PeerId, name: &str);

    async fn on_peer_device_updated(&self, peer: &PeerId, label: &str);

    /// The peer's link state entry was removed. Detach everything shown for it.
    async fn on_peer_removed(&self, peer: &PeerId);

    async fn on_link_status_changed(&self, peer: &PeerId, status: LinkStatus);

    /// Remote audio from `peer` started flowing.
    async fn on_peer_streaming(&self, peer: &PeerId);

    async fn on_peer_muted(&self, peer: &PeerId, muted: bool);

    async fn on_chat_received(&self, text: &str, author: &str);

    /// Non-fatal condition worth showing to the user (failed dial, call error...).
    async fn on_system_notice(&self, notice: &str);

    /// The local participant was kicked. The session is over.
    async fn on_local_removed(&self);
}

/// Handler rendering every event as a log line, tagged with the local id.
#[derive(Debug, Clone)]
pub struct TracingEventHandler {
    label: String,
}

impl TracingEventHandler {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

#[async_trait]
impl RoomEventHandler for TracingEventHandler {
    async fn on_peer_appeared(&self, peer: &PeerId, is_host: bool) {
        let role = if is_host { " (host)" } else { "" };
        info!("[{}]: peer {peer}{role} appeared", self.label);
    }

    async fn on_peer_renamed(&self, peer: &PeerId, name: &str) {
        info!("[{}]: peer {peer} is now called {name}", self.label);
    }

    async fn on_peer_device_updated(&self, peer: &PeerId, label: &str) {
        info!("[{}]: peer {peer} speaks through {label}", self.label);
    }

    async fn on_peer_removed(&self, peer: &PeerId) {
        info!("[{}]: peer {peer} removed", self.label);
    }

    async fn on_link_status_changed(&self, peer: &PeerId, status: LinkStatus) {
        info!("[{}]: link to {peer} is {status}", self.label);
    }

    async fn on_peer_streaming(&self, peer: &PeerId) {
        info!("[{}]: receiving audio from {peer}", self.label);
    }

    async fn on_peer_muted(&self, peer: &PeerId, muted: bool) {
        info!("[{}]: peer {peer} muted={muted}", self.label);
    }

    async fn on_chat_received(&self, text: &str, author: &str) {
        info!("[{}]: <{author}> {text}", self.label);
    }

    async fn on_system_notice(&self, notice: &str) {
        info!("[{}]: notice: {notice}", self.label);
    }

    async fn on_local_removed(&self) {
        warn!("[{}]: removed from the room by the host", self.label);
    }
}
