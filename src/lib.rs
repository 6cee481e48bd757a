//! Membership and signaling core of a peer-to-peer voice chat mesh.
//!
//! Every participant holds a direct data link and media call to every other
//! participant. Membership spreads by gossip over those links; no central
//! directory exists beyond the rendezvous peer a newcomer joins through.
pub mod audio;
pub mod config;
pub mod error;
pub mod events;
pub mod message;
pub mod registry;
pub mod room;

pub use config::RoomConfig;
pub use error::{AudioError, MessageError, RoomError};
pub use events::{LinkStatus, RoomEventHandler};
pub use message::Envelope;
pub use room::{Room, RoomHandle, RoomSnapshot, SessionState};
