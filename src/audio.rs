//! Seam to the local capture layer.
//!
//! The mesh only needs the current outgoing stream, a way to switch the
//! input device, and per-peer / local mute switches.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use tracing::info;
use transport::{LocalStream, PeerId};

use crate::error::AudioError;

/// Label used when the capture layer reports an empty track label.
pub const UNKNOWN_DEVICE_LABEL: &str = "Unknown microphone";

pub trait AudioSource: Send + Sync + 'static {
    /// The stream currently captured from the selected input device.
    fn local_stream(&self) -> Result<LocalStream, AudioError>;

    /// Switch capture to `device_id` and return the new stream.
    fn switch_input(&self, device_id: &str) -> Result<LocalStream, AudioError>;

    /// Silence (or restore) playback of one remote peer.
    fn set_peer_muted(&self, peer: &PeerId, muted: bool);

    /// Silence (or restore) the local microphone.
    fn set_local_muted(&self, muted: bool);
}

/// Device label to show for `stream`, falling back to a placeholder.
pub fn device_label(stream: &LocalStream) -> String {
    if stream.track.label.trim().is_empty() {
        UNKNOWN_DEVICE_LABEL.to_string()
    } else {
        stream.track.label.clone()
    }
}

/// Audio source backed by a fixed table of input devices.
///
/// Used by the simulation binary and tests, where no capture hardware exists.
#[derive(Debug)]
pub struct DeviceTableAudio {
    devices: BTreeMap<String, String>,
    state: Mutex<DeviceTableState>,
}

#[derive(Debug, Default)]
struct DeviceTableState {
    selected: String,
    local_muted: bool,
    muted_peers: Vec<PeerId>,
}

impl DeviceTableAudio {
    /// Build from `(device_id, label)` pairs; the first device is selected.
    pub fn new<I, S>(devices: I) -> Self
    where
        I: IntoIterator<Item = (S, S)>,
        S: Into<String>,
    {
        let devices: Vec<(String, String)> = devices
            .into_iter()
            .map(|(id, label)| (id.into(), label.into()))
            .collect();
        let selected = devices
            .first()
            .map(|(id, _)| id.clone())
            .unwrap_or_default();
        Self {
            devices: devices.into_iter().collect(),
            state: Mutex::new(DeviceTableState {
                selected,
                ..Default::default()
            }),
        }
    }

    pub fn selected_device(&self) -> String {
        self.state.lock().selected.clone()
    }

    pub fn is_local_muted(&self) -> bool {
        self.state.lock().local_muted
    }

    pub fn is_peer_muted(&self, peer: &PeerId) -> bool {
        self.state.lock().muted_peers.contains(peer)
    }

    fn stream_for(&self, device_id: &str) -> Result<LocalStream, AudioError> {
        let label = self
            .devices
            .get(device_id)
            .ok_or_else(|| AudioError::DeviceNotFound(device_id.to_string()))?;
        Ok(LocalStream::new(device_id, label))
    }
}

impl Default for DeviceTableAudio {
    fn default() -> Self {
        Self::new([("default", "Default microphone")])
    }
}

impl AudioSource for DeviceTableAudio {
    fn local_stream(&self) -> Result<LocalStream, AudioError> {
        let selected = self.selected_device();
        self.stream_for(&selected)
    }

    fn switch_input(&self, device_id: &str) -> Result<LocalStream, AudioError> {
        let stream = self.stream_for(device_id)?;
        self.state.lock().selected = device_id.to_string();
        info!("[switch_input]: Capturing from {device_id}");
        Ok(stream)
    }

    fn set_peer_muted(&self, peer: &PeerId, muted: bool) {
        let mut state = self.state.lock();
        state.muted_peers.retain(|p| p != peer);
        if muted {
            state.muted_peers.push(peer.clone());
        }
    }

    fn set_local_muted(&self, muted: bool) {
        self.state.lock().local_muted = muted;
    }
}
