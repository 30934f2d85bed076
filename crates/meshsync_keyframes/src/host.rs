// SPDX-License-Identifier: MIT OR Apache-2.0
//! Capabilities the key frame core consumes from its host timeline.
//!
//! The core never stores references into the host. It keeps opaque
//! [`ClipId`]/[`TrackId`]/[`MarkerId`] handles and resolves them through a
//! [`TimelineHost`] on every call.

use crate::marker::{ClipId, MarkerId, TrackId};
use serde::{Deserialize, Serialize};

/// Timing of a clip as seen by the host at the time of a call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClipGeometry {
    /// Clip start in global timeline time
    pub start: f64,
    /// Clip duration in global timeline time
    pub duration: f64,
    /// Playback speed multiplier
    pub time_scale: f64,
    /// Offset into the source at the clip start
    pub clip_in: f64,
    /// Fixed sampling rate of the owning timeline
    pub frame_rate: f64,
}

impl ClipGeometry {
    /// Create a clip geometry with no time scaling and no clip-in offset
    pub fn new(start: f64, duration: f64, frame_rate: f64) -> Self {
        Self {
            start,
            duration,
            time_scale: 1.0,
            clip_in: 0.0,
            frame_rate,
        }
    }

    /// Set the time scale
    pub fn with_time_scale(mut self, time_scale: f64) -> Self {
        self.time_scale = time_scale;
        self
    }

    /// Set the clip-in offset
    pub fn with_clip_in(mut self, clip_in: f64) -> Self {
        self.clip_in = clip_in;
        self
    }
}

/// Refresh requests the core issues to the host after structural changes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HostNotification {
    /// Existing content changed (mode, play frame)
    ContentsModified,
    /// Markers were created or removed
    ContentsAddedOrRemoved,
    /// The host should record an undo step before the change lands
    RecordUndo(String),
}

/// The host timeline the key frame core runs inside.
///
/// Implementations must tolerate deletion of markers that no longer exist.
pub trait TimelineHost {
    /// Current geometry of a clip, `None` if the clip is gone
    fn clip_geometry(&self, clip: ClipId) -> Option<ClipGeometry>;

    /// Track the clip currently sits on. `None` while the clip is being
    /// dragged between tracks.
    fn parent_track(&self, clip: ClipId) -> Option<TrackId>;

    /// Create a marker on a track at a global time
    fn create_marker(&mut self, track: TrackId, time: f64) -> MarkerId;

    /// Delete a marker from a track
    fn delete_marker(&mut self, track: TrackId, marker: MarkerId);

    /// All markers on a track, in creation order
    fn markers(&self, track: TrackId) -> Vec<MarkerId>;

    /// Current global time of a marker, `None` if it does not exist
    fn marker_time(&self, marker: MarkerId) -> Option<f64>;

    /// Move a marker to a global time
    fn set_marker_time(&mut self, marker: MarkerId, time: f64);
}
