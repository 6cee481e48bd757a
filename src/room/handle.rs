//! Channel API feeding local user actions into a running room.
use tokio::sync::{mpsc::UnboundedSender, oneshot};
use tracing::debug;
use transport::{PeerId, Transport};

use crate::audio::AudioSource;
use crate::error::RoomError;
use crate::events::RoomEventHandler;
use crate::room::{Room, RoomSnapshot};

type Reply<T> = oneshot::Sender<Result<T, RoomError>>;

/// Local user action, answered once the room has handled it.
#[derive(Debug)]
pub enum RoomCommand {
    Connect { peer: PeerId, reply: Reply<()> },
    SetDisplayName { name: String, reply: Reply<()> },
    SetInputDevice { device_id: String, reply: Reply<()> },
    SendChat { text: String, reply: Reply<usize> },
    Kick { peer: PeerId, reply: Reply<()> },
    SetPeerMuted { peer: PeerId, muted: bool, reply: Reply<()> },
    SetLocalMuted { muted: bool, reply: Reply<()> },
    Leave { reply: Reply<()> },
    Snapshot { reply: oneshot::Sender<RoomSnapshot> },
}

/// Cloneable handle to a room running on its own task.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    my_id: PeerId,
    commands: UnboundedSender<RoomCommand>,
}

impl RoomHandle {
    pub(crate) fn new(my_id: PeerId, commands: UnboundedSender<RoomCommand>) -> Self {
        Self { my_id, commands }
    }

    pub fn my_id(&self) -> &PeerId {
        &self.my_id
    }

    async fn request<R>(
        &self,
        build: impl FnOnce(Reply<R>) -> RoomCommand,
    ) -> Result<R, RoomError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .map_err(|_| RoomError::SessionTerminated)?;
        response.await.map_err(|_| RoomError::SessionTerminated)?
    }

    pub async fn connect(&self, peer: &PeerId) -> Result<(), RoomError> {
        let peer = peer.clone();
        self.request(|reply| RoomCommand::Connect { peer, reply })
            .await
    }

    pub async fn set_display_name(&self, name: &str) -> Result<(), RoomError> {
        let name = name.to_string();
        self.request(|reply| RoomCommand::SetDisplayName { name, reply })
            .await
    }

    pub async fn set_input_device(&self, device_id: &str) -> Result<(), RoomError> {
        let device_id = device_id.to_string();
        self.request(|reply| RoomCommand::SetInputDevice { device_id, reply })
            .await
    }

    pub async fn send_chat(&self, text: &str) -> Result<usize, RoomError> {
        let text = text.to_string();
        self.request(|reply| RoomCommand::SendChat { text, reply })
            .await
    }

    pub async fn kick(&self, peer: &PeerId) -> Result<(), RoomError> {
        let peer = peer.clone();
        self.request(|reply| RoomCommand::Kick { peer, reply }).await
    }

    pub async fn set_peer_muted(&self, peer: &PeerId, muted: bool) -> Result<(), RoomError> {
        let peer = peer.clone();
        self.request(|reply| RoomCommand::SetPeerMuted { peer, muted, reply })
            .await
    }

    pub async fn set_local_muted(&self, muted: bool) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::SetLocalMuted { muted, reply })
            .await
    }

    pub async fn leave(&self) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Leave { reply }).await
    }

    /// Current view of the session. Fails once the session has ended.
    pub async fn snapshot(&self) -> Result<RoomSnapshot, RoomError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(RoomCommand::Snapshot { reply })
            .map_err(|_| RoomError::SessionTerminated)?;
        response.await.map_err(|_| RoomError::SessionTerminated)
    }
}

impl<T: Transport, A: AudioSource, H: RoomEventHandler> Room<T, A, H> {
    pub(crate) async fn handle_command(&mut self, command: RoomCommand) {
        debug!("[handle_command]: {command:?}");
        // A dropped reply receiver only means the caller stopped waiting.
        match command {
            RoomCommand::Connect { peer, reply } => {
                let result = self.ensure_active();
                if result.is_ok() {
                    self.connect(&peer).await;
                }
                let _ = reply.send(result);
            }
            RoomCommand::SetDisplayName { name, reply } => {
                let _ = reply.send(self.set_display_name(&name).await);
            }
            RoomCommand::SetInputDevice { device_id, reply } => {
                let _ = reply.send(self.set_input_device(&device_id).await);
            }
            RoomCommand::SendChat { text, reply } => {
                let _ = reply.send(self.send_chat(&text).await);
            }
            RoomCommand::Kick { peer, reply } => {
                let _ = reply.send(self.kick(&peer).await);
            }
            RoomCommand::SetPeerMuted { peer, muted, reply } => {
                let _ = reply.send(self.set_peer_muted(&peer, muted).await);
            }
            RoomCommand::SetLocalMuted { muted, reply } => {
                let _ = reply.send(self.set_local_muted(muted).await);
            }
            RoomCommand::Leave { reply } => {
                let _ = reply.send(self.leave().await);
            }
            RoomCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
        }
    }
}
