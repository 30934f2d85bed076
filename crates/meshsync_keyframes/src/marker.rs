// SPDX-License-Identifier: MIT OR Apache-2.0
//! Opaque host handles and the frame marker proxy.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a timeline clip owned by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClipId(pub Uuid);

impl ClipId {
    /// Create a new random clip ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClipId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for a track owned by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackId(pub Uuid);

impl TrackId {
    /// Create a new random track ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TrackId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for a marker instance on a host track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarkerId(pub Uuid);

impl MarkerId {
    /// Create a new random marker ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MarkerId {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to the visual marker mirroring one enabled playable frame.
///
/// Remembers the track the marker was created on so a clip that moved to a
/// different track can be detected and the marker recreated there. Not
/// `Clone`: each frame exclusively owns at most one marker.
#[derive(Debug, PartialEq, Eq)]
pub struct FrameMarker {
    /// Host marker handle
    pub id: MarkerId,
    /// Track the marker lives on
    pub track: TrackId,
}

impl FrameMarker {
    pub(crate) fn new(id: MarkerId, track: TrackId) -> Self {
        Self { id, track }
    }
}
