//! Point-to-point transport seam for the voice mesh.
//!
//! The mesh core never touches NAT traversal, session negotiation or media
//! encryption. It consumes the [`Transport`], [`Link`] and [`Call`] traits
//! defined here and reacts to the [`TransportEvent`] stream each endpoint
//! hands out when it is created.
//!
//! [`MemoryNetwork`] is an in-process implementation that routes links and
//! calls between endpoints living in the same process.

mod error;
mod link;
mod media;
mod memory;
mod types;

pub use error::TransportError;
pub use link::{Call, Link, Transport, TransportEvent};
pub use media::{AudioTrack, LocalStream};
pub use memory::{MemoryNetwork, MemoryTransport};
pub use types::{ConnectionId, PeerId};
