//! Per-peer link state for one room session.
//!
//! [`LinkRegistry`] is the only place remote peer state lives. Entries are
//! inserted and removed exclusively by the connection lifecycle
//! (`connect`, inbound acceptance, `cleanup`); every other component only
//! reads entries or updates the metadata fields of an existing one.
//!
//! # Invariants
//!
//! - At most one [`LinkState`] per [`PeerId`].
//! - A removed entry is gone, not tombstoned: a later `connect` to the same
//!   id creates a fresh entry.
//! - A [`LinkState`] whose phase is `Closed` no longer holds its link or
//!   call handle.

use std::collections::BTreeMap;
use std::fmt::Display;

use transport::{Call, ConnectionId, Link, PeerId};

/// Placeholder shown until the first metadata message arrives.
pub const DEFAULT_PEER_NAME: &str = "Participant";
/// Placeholder device label until the first metadata message arrives.
pub const DEFAULT_DEVICE_LABEL: &str = crate::audio::UNKNOWN_DEVICE_LABEL;

/// Data link phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    Dialing,
    Open,
    Closed,
}

/// Media call phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPhase {
    Dialing,
    Streaming,
    Closed,
}

impl Display for ConnectionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let phase = match self {
            ConnectionPhase::Dialing => "Dialing",
            ConnectionPhase::Open => "Open",
            ConnectionPhase::Closed => "Closed",
        };
        write!(f, "{phase}")
    }
}

impl Display for CallPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let phase = match self {
            CallPhase::Dialing => "Dialing",
            CallPhase::Streaming => "Streaming",
            CallPhase::Closed => "Closed",
        };
        write!(f, "{phase}")
    }
}

/// Which side dialed a link or call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Local,
    Remote,
}

/// Everything known about one remote peer.
#[derive(Debug)]
pub struct LinkState {
    id: PeerId,
    link: Option<Box<dyn Link>>,
    link_origin: Origin,
    call: Option<Box<dyn Call>>,
    call_origin: Origin,
    pub(crate) connection_phase: ConnectionPhase,
    pub(crate) call_phase: CallPhase,
    pub(crate) display_name: String,
    pub(crate) device_label: String,
    is_room_host: bool,
    pub(crate) muted: bool,
}

impl LinkState {
    /// Create a dialing entry. `is_room_host` is fixed for the entry's lifetime.
    pub fn new(id: PeerId, is_room_host: bool) -> Self {
        Self {
            id,
            link: None,
            link_origin: Origin::Local,
            call: None,
            call_origin: Origin::Local,
            connection_phase: ConnectionPhase::Dialing,
            call_phase: CallPhase::Dialing,
            display_name: DEFAULT_PEER_NAME.to_string(),
            device_label: DEFAULT_DEVICE_LABEL.to_string(),
            is_room_host,
            muted: false,
        }
    }

    pub fn id(&self) -> &PeerId {
        &self.id
    }

    pub fn link(&self) -> Option<&dyn Link> {
        self.link.as_deref()
    }

    pub fn call(&self) -> Option<&dyn Call> {
        self.call.as_deref()
    }

    pub fn link_id(&self) -> Option<ConnectionId> {
        self.link.as_ref().map(|link| link.id())
    }

    pub fn call_id(&self) -> Option<ConnectionId> {
        self.call.as_ref().map(|call| call.id())
    }

    pub fn link_origin(&self) -> Origin {
        self.link_origin
    }

    pub fn call_origin(&self) -> Origin {
        self.call_origin
    }

    pub fn connection_phase(&self) -> ConnectionPhase {
        self.connection_phase
    }

    pub fn call_phase(&self) -> CallPhase {
        self.call_phase
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn device_label(&self) -> &str {
        &self.device_label
    }

    pub fn is_room_host(&self) -> bool {
        self.is_room_host
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn is_open(&self) -> bool {
        self.connection_phase == ConnectionPhase::Open && self.link.is_some()
    }

    /// Install a data link, returning the one it replaces.
    pub(crate) fn set_link(
        &mut self,
        link: Box<dyn Link>,
        origin: Origin,
    ) -> Option<Box<dyn Link>> {
        self.connection_phase = ConnectionPhase::Dialing;
        self.link_origin = origin;
        self.link.replace(link)
    }

    /// Install a call, returning the one it replaces.
    pub(crate) fn set_call(
        &mut self,
        call: Box<dyn Call>,
        origin: Origin,
    ) -> Option<Box<dyn Call>> {
        self.call_phase = CallPhase::Dialing;
        self.call_origin = origin;
        self.call.replace(call)
    }

    /// Release both handles, closing them. Afterwards the entry is `Closed`.
    pub(crate) fn release(&mut self) {
        if let Some(call) = self.call.take() {
            call.close();
        }
        if let Some(link) = self.link.take() {
            link.close();
        }
        self.connection_phase = ConnectionPhase::Closed;
        self.call_phase = CallPhase::Closed;
    }
}

/// Registry of every known remote peer, keyed by [`PeerId`].
#[derive(Debug, Default)]
pub struct LinkRegistry {
    entries: BTreeMap<PeerId, LinkState>,
}

impl LinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &PeerId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn get(&self, id: &PeerId) -> Option<&LinkState> {
        self.entries.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &PeerId) -> Option<&mut LinkState> {
        self.entries.get_mut(id)
    }

    /// Insert a new entry. Refused (returns `false`) if the id is already present.
    pub(crate) fn insert(&mut self, state: LinkState) -> bool {
        if self.entries.contains_key(state.id()) {
            return false;
        }
        self.entries.insert(state.id().clone(), state);
        true
    }

    /// Remove and return the entry for `id`.
    pub(crate) fn remove(&mut self, id: &PeerId) -> Option<LinkState> {
        self.entries.remove(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> Vec<PeerId> {
        self.entries.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LinkState> {
        self.entries.values()
    }

    /// Every entry whose data link is open.
    pub fn open_links(&self) -> impl Iterator<Item = (&PeerId, &dyn Link)> {
        self.entries
            .values()
            .filter(|state| state.is_open())
            .filter_map(|state| state.link().map(|link| (state.id(), link)))
    }

    /// Every registered call, regardless of its link's state.
    pub fn calls(&self) -> impl Iterator<Item = (&PeerId, &dyn Call)> {
        self.entries
            .values()
            .filter_map(|state| state.call().map(|call| (state.id(), call)))
    }

    /// `true` if `link` is the data link currently registered for `peer`.
    pub fn owns_link(&self, peer: &PeerId, link: ConnectionId) -> bool {
        self.get(peer)
            .is_some_and(|state| state.link_id() == Some(link))
    }

    /// `true` if `call` is the call currently registered for `peer`.
    pub fn owns_call(&self, peer: &PeerId, call: ConnectionId) -> bool {
        self.get(peer)
            .is_some_and(|state| state.call_id() == Some(call))
    }
}
