/// Outgoing audio track as exposed by the capture layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioTrack {
    /// Capture device the track is bound to.
    pub device_id: String,
    /// Human readable device label, may be empty.
    pub label: String,
}

/// The local capture stream handed to every call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalStream {
    pub track: AudioTrack,
}

impl LocalStream {
    pub fn new(device_id: &str, label: &str) -> Self {
        Self {
            track: AudioTrack {
                device_id: device_id.to_string(),
                label: label.to_string(),
            },
        }
    }
}
