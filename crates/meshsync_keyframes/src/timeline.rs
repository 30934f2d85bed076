// SPDX-License-Identifier: MIT OR Apache-2.0
//! In-memory timeline implementing [`TimelineHost`].
//!
//! Models just enough of a host timeline to drive the key frame core:
//! tracks holding markers, and clips with a geometry and an optional parent
//! track. Used by tests and by the replay tool.

use crate::host::{ClipGeometry, TimelineHost};
use crate::marker::{ClipId, MarkerId, TrackId};
use indexmap::IndexMap;

/// A track and its markers
#[derive(Debug, Clone, Default)]
struct TimelineTrack {
    name: String,
    /// Marker -> global time, in creation order
    markers: IndexMap<MarkerId, f64>,
}

/// A clip placed on (or detached from) a track
#[derive(Debug, Clone)]
struct TimelineClip {
    geometry: ClipGeometry,
    track: Option<TrackId>,
}

/// Host timeline kept entirely in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryTimeline {
    tracks: IndexMap<TrackId, TimelineTrack>,
    clips: IndexMap<ClipId, TimelineClip>,
}

impl InMemoryTimeline {
    /// Create an empty timeline
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a track
    pub fn add_track(&mut self, name: impl Into<String>) -> TrackId {
        let id = TrackId::new();
        self.tracks.insert(
            id,
            TimelineTrack {
                name: name.into(),
                markers: IndexMap::new(),
            },
        );
        id
    }

    /// Track name
    pub fn track_name(&self, track: TrackId) -> Option<&str> {
        self.tracks.get(&track).map(|t| t.name.as_str())
    }

    /// Add a clip to a track
    pub fn add_clip(&mut self, track: TrackId, geometry: ClipGeometry) -> ClipId {
        let id = ClipId::new();
        self.clips.insert(
            id,
            TimelineClip {
                geometry,
                track: Some(track),
            },
        );
        id
    }

    /// Replace a clip's geometry
    pub fn set_clip_geometry(&mut self, clip: ClipId, geometry: ClipGeometry) -> bool {
        match self.clips.get_mut(&clip) {
            Some(entry) => {
                entry.geometry = geometry;
                true
            }
            None => false,
        }
    }

    /// Move a clip onto another track
    pub fn move_clip_to_track(&mut self, clip: ClipId, track: TrackId) -> bool {
        if !self.tracks.contains_key(&track) {
            return false;
        }
        match self.clips.get_mut(&clip) {
            Some(entry) => {
                entry.track = Some(track);
                true
            }
            None => false,
        }
    }

    /// Take a clip off its track, as while it is dragged between tracks
    pub fn detach_clip(&mut self, clip: ClipId) -> bool {
        match self.clips.get_mut(&clip) {
            Some(entry) => {
                entry.track = None;
                true
            }
            None => false,
        }
    }

    /// Move a marker the way a user drag would
    pub fn drag_marker(&mut self, marker: MarkerId, time: f64) -> bool {
        for track in self.tracks.values_mut() {
            if let Some(t) = track.markers.get_mut(&marker) {
                *t = time;
                return true;
            }
        }
        false
    }

    /// Delete a marker the way a user would from the host UI
    pub fn remove_marker(&mut self, marker: MarkerId) -> bool {
        self.tracks
            .values_mut()
            .any(|track| track.markers.shift_remove(&marker).is_some())
    }

    /// Track a marker lives on
    pub fn marker_track(&self, marker: MarkerId) -> Option<TrackId> {
        self.tracks
            .iter()
            .find(|(_, track)| track.markers.contains_key(&marker))
            .map(|(id, _)| *id)
    }

    /// Number of markers on a track
    pub fn marker_count(&self, track: TrackId) -> usize {
        self.tracks.get(&track).map_or(0, |t| t.markers.len())
    }

    /// Number of markers on all tracks
    pub fn total_marker_count(&self) -> usize {
        self.tracks.values().map(|t| t.markers.len()).sum()
    }

    /// Sorted global times of all markers on a track
    pub fn marker_times(&self, track: TrackId) -> Vec<f64> {
        let mut times: Vec<f64> = self
            .tracks
            .get(&track)
            .map(|t| t.markers.values().copied().collect())
            .unwrap_or_default();
        times.sort_by(f64::total_cmp);
        times
    }
}

impl TimelineHost for InMemoryTimeline {
    fn clip_geometry(&self, clip: ClipId) -> Option<ClipGeometry> {
        self.clips.get(&clip).map(|c| c.geometry)
    }

    fn parent_track(&self, clip: ClipId) -> Option<TrackId> {
        self.clips.get(&clip).and_then(|c| c.track)
    }

    fn create_marker(&mut self, track: TrackId, time: f64) -> MarkerId {
        let id = MarkerId::new();
        match self.tracks.get_mut(&track) {
            Some(entry) => {
                entry.markers.insert(id, time);
            }
            None => tracing::warn!("Marker requested on unknown track {:?}", track),
        }
        id
    }

    fn delete_marker(&mut self, track: TrackId, marker: MarkerId) {
        if let Some(entry) = self.tracks.get_mut(&track) {
            entry.markers.shift_remove(&marker);
        }
    }

    fn markers(&self, track: TrackId) -> Vec<MarkerId> {
        self.tracks
            .get(&track)
            .map(|t| t.markers.keys().copied().collect())
            .unwrap_or_default()
    }

    fn marker_time(&self, marker: MarkerId) -> Option<f64> {
        self.tracks
            .values()
            .find_map(|track| track.markers.get(&marker).copied())
    }

    fn set_marker_time(&mut self, marker: MarkerId, time: f64) {
        self.drag_marker(marker, time);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_lifecycle() {
        let mut timeline = InMemoryTimeline::new();
        let track = timeline.add_track("Scene Cache");

        let a = timeline.create_marker(track, 1.0);
        let b = timeline.create_marker(track, 0.5);
        assert_eq!(timeline.markers(track), vec![a, b]);
        assert_eq!(timeline.marker_times(track), vec![0.5, 1.0]);

        assert!(timeline.drag_marker(a, 2.0));
        assert_eq!(timeline.marker_time(a), Some(2.0));
        assert_eq!(timeline.marker_track(a), Some(track));

        timeline.delete_marker(track, a);
        assert_eq!(timeline.marker_time(a), None);
        assert_eq!(timeline.marker_count(track), 1);

        // Deleting twice is harmless
        timeline.delete_marker(track, a);
        assert!(timeline.remove_marker(b));
        assert_eq!(timeline.total_marker_count(), 0);
    }

    #[test]
    fn test_clip_parent_track() {
        let mut timeline = InMemoryTimeline::new();
        let first = timeline.add_track("A");
        let second = timeline.add_track("B");
        let clip = timeline.add_clip(first, ClipGeometry::new(0.0, 1.0, 30.0));

        assert_eq!(timeline.parent_track(clip), Some(first));
        assert!(timeline.detach_clip(clip));
        assert_eq!(timeline.parent_track(clip), None);
        assert!(timeline.move_clip_to_track(clip, second));
        assert_eq!(timeline.parent_track(clip), Some(second));
        assert!(!timeline.move_clip_to_track(clip, TrackId::new()));
        assert_eq!(timeline.track_name(second), Some("B"));
    }
}
