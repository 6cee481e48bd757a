//! Control and chat messages exchanged over every data link.
//!
//! Each payload on the wire is one JSON object tagged by its `type` field:
//!  - [`Envelope::Peers`] roster gossip, sent once when a link opens
//!         - `{"type":"peers","peers":["<id>", ...]}`
//!  - [`Envelope::Metadata`] display name and input device label
//!         - `{"type":"metadata","name":"...","device":"..."}`
//!  - [`Envelope::Chat`] plain chat text
//!         - `{"type":"chat","text":"...","author":"..."}`
//!  - [`Envelope::Bye`] voluntary leave, or a kicked peer saying goodbye
//!  - [`Envelope::Kick`] forced removal, host to target only
//!
//! Payloads that fail to decode (malformed JSON, unknown `type`) are dropped
//! by the receiver.

use serde::{Deserialize, Serialize};
use transport::PeerId;

use crate::error::MessageError;

// Message type constants for consistency in logs
pub mod message_types {
    pub const PEERS: &str = "peers";
    pub const METADATA: &str = "metadata";
    pub const CHAT: &str = "chat";
    pub const BYE: &str = "bye";
    pub const KICK: &str = "kick";
}

/// Trait for getting message type as a string constant
pub trait MessageType {
    fn message_type(&self) -> &'static str;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Envelope {
    Peers {
        peers: Vec<PeerId>,
    },
    Metadata {
        #[serde(default)]
        name: String,
        #[serde(default)]
        device: String,
    },
    Chat {
        text: String,
        author: String,
    },
    Bye,
    Kick,
}

impl MessageType for Envelope {
    fn message_type(&self) -> &'static str {
        use message_types::*;
        match self {
            Envelope::Peers { .. } => PEERS,
            Envelope::Metadata { .. } => METADATA,
            Envelope::Chat { .. } => CHAT,
            Envelope::Bye => BYE,
            Envelope::Kick => KICK,
        }
    }
}

impl Envelope {
    pub fn metadata(name: &str, device: &str) -> Self {
        Envelope::Metadata {
            name: name.to_string(),
            device: device.to_string(),
        }
    }

    pub fn chat(text: &str, author: &str) -> Self {
        Envelope::Chat {
            text: text.to_string(),
            author: author.to_string(),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, MessageError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(payload: &[u8]) -> Result<Self, MessageError> {
        Ok(serde_json::from_slice(payload)?)
    }
}
