//! Chat relay over the data links.
use tracing::{debug, info};
use transport::{PeerId, Transport};

use crate::audio::AudioSource;
use crate::error::RoomError;
use crate::events::RoomEventHandler;
use crate::message::Envelope;
use crate::room::Room;

impl<T: Transport, A: AudioSource, H: RoomEventHandler> Room<T, A, H> {
    /// Broadcast `text` to every open link, authored by the local display name.
    ///
    /// Blank messages are not sent. Returns how many links accepted the message.
    pub async fn send_chat(&mut self, text: &str) -> Result<usize, RoomError> {
        self.ensure_active()?;
        let text = text.trim();
        if text.is_empty() {
            return Ok(0);
        }

        let delivered = self.broadcast(&Envelope::chat(text, &self.me.my_name));
        info!("[send_chat]: Chat delivered to {delivered} peers");
        Ok(delivered)
    }

    /// Greet a newly opened link with the configured announcement.
    pub(crate) fn announce_join(&self, to: &PeerId) {
        let Some(announcement) = self.config.join_announcement.as_deref() else {
            return;
        };
        debug!("[announce_join]: Greeting {to}");
        self.send_to(to, &Envelope::chat(announcement, &self.me.my_name));
    }

    pub(crate) async fn handle_chat(&mut self, text: &str, author: &str) {
        self.handler.on_chat_received(text, author).await;
    }
}
