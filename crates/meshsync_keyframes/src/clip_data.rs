// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-clip playable frame array and its frame markers.
//!
//! [`PlayableFrameClipData`] owns the frame array, which is the only source of
//! truth. Markers are proxies created on the host track so the user can see
//! and drag key frames. Whenever the clip changes, the array is either
//! resized and re-anchored (geometry changed) or reconciled with the markers
//! the user dragged (geometry unchanged).
//!
//! All operations take the host for the duration of the call only. A clip
//! without a parent track is "not ready" and most operations become no-ops
//! until it lands on a track again.

use crate::host::{ClipGeometry, HostNotification, TimelineHost};
use crate::keyframe::{
    find_enabled_after, find_enabled_before, interpolate_play_frame, sample_play_frame, KeyFrameMode,
    PlayableFrame,
};
use crate::marker::{ClipId, FrameMarker, MarkerId, TrackId};
use crate::reconcile::MovePlan;
use crate::settings::FrameSyncSettings;
use crate::timing::{approximately, frame_index_for_local_time, KeyFrameTiming, SceneCacheTiming, TimeMapping};
use crate::visibility::{self, MarkerVisibility};
use std::marker::PhantomData;
use std::ops::Range;

/// Clip data for timeline key frame controller clips
pub type KeyFrameControllerClipData = PlayableFrameClipData<KeyFrameTiming>;

/// Clip data for scene cache clips
pub type SceneCacheClipData = PlayableFrameClipData<SceneCacheTiming>;

/// Host state resolved once per marker refresh pass
#[derive(Debug, Clone, Copy)]
struct MarkerContext {
    geometry: Option<ClipGeometry>,
    track: Option<TrackId>,
    visible: bool,
}

/// Playable frames of one clip, kept in sync with their markers
#[derive(Debug)]
pub struct PlayableFrameClipData<M: TimeMapping> {
    pub(crate) clip: ClipId,
    pub(crate) frames: Vec<PlayableFrame>,
    pub(crate) visibility: MarkerVisibility,
    /// Geometry seen by the last full refresh
    pub(crate) last_refresh: Option<ClipGeometry>,
    need_to_refresh_timeline_editor: bool,
    notifications: Vec<HostNotification>,
    _timing: PhantomData<M>,
}

impl<M: TimeMapping> PlayableFrameClipData<M> {
    /// Create empty clip data for a clip
    pub fn new(clip: ClipId) -> Self {
        Self::with_settings(clip, &FrameSyncSettings::default())
    }

    /// Create empty clip data with custom settings
    pub fn with_settings(clip: ClipId, settings: &FrameSyncSettings) -> Self {
        Self {
            clip,
            frames: Vec::new(),
            visibility: MarkerVisibility::new(settings),
            last_refresh: None,
            need_to_refresh_timeline_editor: false,
            notifications: Vec::new(),
            _timing: PhantomData,
        }
    }

    /// Deep copy for a duplicated clip. Markers are not shared.
    pub fn duplicate(&self, clip: ClipId) -> Self {
        Self {
            clip,
            frames: self.frames.iter().map(PlayableFrame::duplicate).collect(),
            visibility: self.visibility.clone(),
            last_refresh: None,
            need_to_refresh_timeline_editor: false,
            notifications: Vec::new(),
            _timing: PhantomData,
        }
    }

    /// Release every marker. Call when the clip is deleted.
    pub fn destroy(&mut self, host: &mut dyn TimelineHost) {
        let mut released = 0;
        for frame in &mut self.frames {
            if release_marker(frame, host) {
                released += 1;
            }
        }
        if released > 0 {
            tracing::debug!("Released {} markers of destroyed clip {:?}", released, self.clip);
            self.notify(HostNotification::ContentsAddedOrRemoved);
        }
    }

    /// Clip this data belongs to
    pub fn clip_id(&self) -> ClipId {
        self.clip
    }

    /// Get playable frame count
    pub fn num_playable_frames(&self) -> usize {
        self.frames.len()
    }

    /// Get a playable frame. `None` past the end, which callers hit when a
    /// marker callback races a shrink.
    pub fn playable_frame(&self, index: usize) -> Option<&PlayableFrame> {
        self.frames.get(index)
    }

    /// Get all playable frames
    pub fn playable_frames(&self) -> &[PlayableFrame] {
        &self.frames
    }

    /// Index of the frame owning a marker
    pub fn frame_index_for_marker(&self, marker: MarkerId) -> Option<usize> {
        self.frames.iter().position(|f| f.marker_id() == Some(marker))
    }

    /// Whether the user asked for markers
    pub fn are_frame_markers_requested(&self) -> bool {
        self.visibility.is_requested()
    }

    /// Whether markers currently exist on the track
    pub fn are_frame_markers_visible(&self) -> bool {
        self.visibility.is_visible()
    }

    /// Visibility policy state
    pub fn marker_visibility(&self) -> &MarkerVisibility {
        &self.visibility
    }

    /// Whether the host still has to be told about moved key frames
    pub fn needs_timeline_refresh(&self) -> bool {
        self.need_to_refresh_timeline_editor
    }

    /// Drain queued host notifications
    pub fn take_notifications(&mut self) -> Vec<HostNotification> {
        std::mem::take(&mut self.notifications)
    }

    /// Show or hide markers. `force_show` ignores the density heuristic.
    pub fn request_frame_markers(&mut self, host: &mut dyn TimelineHost, show: bool, force_show: bool) {
        if show == self.visibility.is_requested() {
            return;
        }

        self.notify(HostNotification::RecordUndo("Show/Hide Frame Markers".to_string()));
        self.visibility.set_requested(show, force_show);
        if self.visibility.update() {
            self.refresh_playable_frames(host);
        }
    }

    /// Report how wide the timeline currently draws the clip
    pub fn update_timeline_width_per_frame(
        &mut self,
        host: &mut dyn TimelineHost,
        visible_rect_width: f64,
        visible_time: f64,
        fps: f64,
        time_scale: f64,
    ) {
        let width = visibility::width_per_frame(visible_rect_width, visible_time, fps, time_scale);
        self.set_timeline_width_per_frame(host, width);
    }

    /// Set the width of one frame in pixels
    pub fn set_timeline_width_per_frame(&mut self, host: &mut dyn TimelineHost, width_per_frame: f64) {
        self.visibility.set_width_per_frame(width_per_frame);
        if self.visibility.update() {
            tracing::debug!(
                "Frame markers of {:?} are now {}",
                self.clip,
                if self.visibility.is_visible() { "visible" } else { "hidden" }
            );
            self.refresh_playable_frames(host);
        }
    }

    /// Drop all frames and rebuild a fresh grid for the clip
    pub fn reset_playable_frames(&mut self, host: &mut dyn TimelineHost) {
        for frame in &mut self.frames {
            release_marker(frame, host);
        }
        self.frames.clear();

        let Some(geometry) = host.clip_geometry(self.clip) else {
            tracing::debug!("Clip {:?} is gone, playable frames cleared", self.clip);
            return;
        };
        self.update_playable_frames_size(host, &geometry, M::ideal_frame_count(&geometry));
        self.refresh_markers(host, 0..self.frames.len(), true);
    }

    /// Make every frame a continuous key playing its own index
    pub fn init_playable_frames(&mut self, host: &mut dyn TimelineHost) {
        let Some(geometry) = self.ready_geometry(host) else {
            tracing::debug!("Clip {:?} not ready, init deferred", self.clip);
            return;
        };

        self.update_playable_frames_size(host, &geometry, M::ideal_frame_count(&geometry));
        let time_per_frame = M::time_per_frame(&geometry, self.frames.len());
        let mut modes_changed = false;
        for (i, frame) in self.frames.iter_mut().enumerate() {
            frame.set_enabled(true);
            frame.set_index_and_local_time(i, i as f64 * time_per_frame);
            frame.set_play_frame(i as i32);
            modes_changed |= frame.set_mode(KeyFrameMode::Continuous);
        }
        if modes_changed {
            self.notify(HostNotification::ContentsModified);
        }
        self.refresh_markers(host, 0..self.frames.len(), true);
    }

    /// Resize to the ideal count and enable every `span`-th frame
    pub fn regenerate_key_frames(&mut self, host: &mut dyn TimelineHost, span: usize, mode: KeyFrameMode) {
        self.regenerate_key_frames_in_range(host, 0, usize::MAX, span, mode);
    }

    /// Like [`Self::regenerate_key_frames`] but only touches `[start, end)`.
    ///
    /// The span is counted from index 0, not from `start`. A span of 0 is
    /// treated as 1.
    pub fn regenerate_key_frames_in_range(
        &mut self,
        host: &mut dyn TimelineHost,
        start: usize,
        end: usize,
        span: usize,
        mode: KeyFrameMode,
    ) {
        let Some(geometry) = host.clip_geometry(self.clip) else {
            tracing::debug!("Clip {:?} is gone, key frames not regenerated", self.clip);
            return;
        };

        self.update_playable_frames_size(host, &geometry, M::ideal_frame_count(&geometry));

        let span = span.max(1);
        let end = end.min(self.frames.len());
        if start >= end {
            return;
        }

        let time_per_frame = M::time_per_frame(&geometry, self.frames.len());
        let mut modes_changed = false;
        for i in start..end {
            let frame = &mut self.frames[i];
            frame.set_index_and_local_time(i, i as f64 * time_per_frame);
            frame.set_play_frame(i as i32);
            frame.set_enabled(i % span == 0);
            modes_changed |= frame.set_mode(mode);
        }
        tracing::debug!(
            "Regenerated key frames {}..{} of {:?} every {} frames ({})",
            start,
            end,
            self.clip,
            span,
            mode.name()
        );

        if modes_changed {
            self.notify(HostNotification::ContentsModified);
        }
        self.refresh_markers(host, start..end, true);
    }

    /// Turn the frame under `global_time` into a key.
    ///
    /// The new key's play frame continues what the previous key would show
    /// there: the held value after a hold key, otherwise the linear
    /// interpolation between the surrounding keys.
    pub fn add_key_frame(&mut self, host: &mut dyn TimelineHost, global_time: f64) {
        let Some(geometry) = self.ready_geometry(host) else {
            return;
        };

        let local_time = M::global_to_local(global_time, &geometry);
        let Some(index) = frame_index_for_local_time(local_time, self.frames.len(), M::ideal_duration(&geometry))
        else {
            return;
        };
        if self.frames[index].is_enabled() {
            return;
        }

        {
            let frame = &mut self.frames[index];
            frame.set_enabled(true);
            frame.set_user_note("");
            frame.set_mode(KeyFrameMode::Continuous);
        }

        let prev = find_enabled_before(&self.frames, index).unwrap_or(0);
        let play_frame = match self.frames[prev].mode() {
            KeyFrameMode::Hold => self.frames[prev].play_frame(),
            KeyFrameMode::Continuous => {
                let next = find_enabled_after(&self.frames, index).unwrap_or(index);
                interpolate_play_frame(&self.frames[prev], &self.frames[next], self.frames[index].local_time())
            }
        };
        self.frames[index].set_play_frame(play_frame);
        tracing::trace!("Added key frame {} playing {} on {:?}", index, play_frame, self.clip);

        if self.visibility.is_visible() {
            self.refresh_markers(host, index..index + 1, true);
        }
    }

    /// Flush a pending timeline refresh. Call once per graph (re)start.
    pub fn on_graph_start(&mut self, host: &mut dyn TimelineHost) {
        if !self.need_to_refresh_timeline_editor {
            return;
        }

        self.refresh_markers(host, 0..self.frames.len(), false);
        self.notify(HostNotification::ContentsAddedOrRemoved);
        self.need_to_refresh_timeline_editor = false;
    }

    /// React to a change of the clip or of its markers.
    ///
    /// A geometry change resizes and re-anchors the whole grid. Otherwise
    /// every dragged marker is snapped to the nearest grid slot and its key
    /// payload moves there. Vacated slots that received nothing are
    /// disabled.
    pub fn on_clip_changed(&mut self, host: &mut dyn TimelineHost) {
        let Some(geometry) = self.ready_geometry(host) else {
            tracing::debug!("Clip {:?} not ready, change ignored", self.clip);
            return;
        };

        if self.needs_refresh_playable_frames(&geometry) {
            self.refresh_playable_frames(host);
            return;
        }

        if !self.visibility.is_visible() {
            return;
        }

        for frame in &mut self.frames {
            save_state_from_marker::<M>(frame, host, &geometry);
        }

        let plan = MovePlan::from_frames(&self.frames, M::ideal_duration(&geometry));
        let time_per_frame = M::time_per_frame(&geometry, self.frames.len());
        for (i, frame) in self.frames.iter_mut().enumerate() {
            frame.set_index_and_local_time(i, i as f64 * time_per_frame);
        }
        plan.apply(&mut self.frames);

        if !plan.is_empty() {
            tracing::debug!(
                "Moved {} key frames of {:?}, disabled {}",
                plan.moved.len(),
                self.clip,
                plan.disable.len()
            );
            self.need_to_refresh_timeline_editor = true;
        }

        // Snap markers right away so a second change does not move them again
        self.refresh_markers(host, 0..self.frames.len(), false);
    }

    /// Recreate or realign every marker, e.g. after restoring a snapshot
    pub fn refresh_all_markers(&mut self, host: &mut dyn TimelineHost) {
        self.refresh_markers(host, 0..self.frames.len(), true);
    }

    /// Set the interpolation mode of a frame
    pub fn set_key_frame_mode(&mut self, index: usize, mode: KeyFrameMode) -> bool {
        let Some(frame) = self.frames.get_mut(index) else {
            return false;
        };
        if frame.set_mode(mode) {
            self.notify(HostNotification::ContentsModified);
        }
        true
    }

    /// Switch a frame between continuous and hold
    pub fn toggle_key_frame_mode(&mut self, index: usize) -> bool {
        let Some(mode) = self.frames.get(index).map(PlayableFrame::mode) else {
            return false;
        };
        self.set_key_frame_mode(index, mode.toggled())
    }

    /// Set which source frame a frame plays
    pub fn set_play_frame(&mut self, index: usize, play_frame: i32) -> bool {
        let Some(frame) = self.frames.get_mut(index) else {
            return false;
        };
        if frame.play_frame() != play_frame {
            frame.set_play_frame(play_frame);
            self.notify(HostNotification::ContentsModified);
        }
        true
    }

    /// Annotate a frame
    pub fn set_user_note(&mut self, index: usize, note: impl Into<String>) -> bool {
        match self.frames.get_mut(index) {
            Some(frame) => {
                frame.set_user_note(note);
                true
            }
            None => false,
        }
    }

    /// Make a frame a key or a passthrough, updating its marker
    pub fn set_key_frame_enabled(&mut self, host: &mut dyn TimelineHost, index: usize, enabled: bool) -> bool {
        let Some(frame) = self.frames.get_mut(index) else {
            return false;
        };
        frame.set_enabled(enabled);
        self.refresh_markers(host, index..index + 1, true);
        true
    }

    /// Source frame playing at a clip-local time
    pub fn play_frame_at(&self, local_time: f64) -> Option<i32> {
        sample_play_frame(&self.frames, local_time)
    }

    /// Source frame playing at a global timeline time
    pub fn play_frame_at_global(&self, host: &dyn TimelineHost, global_time: f64) -> Option<i32> {
        let geometry = host.clip_geometry(self.clip)?;
        self.play_frame_at(M::global_to_local(global_time, &geometry))
    }

    /// Resize to the ideal count and realign every marker. Surviving frames
    /// keep their mode, play frame and enabled flag.
    fn refresh_playable_frames(&mut self, host: &mut dyn TimelineHost) {
        let Some(geometry) = self.ready_geometry(host) else {
            return;
        };

        self.last_refresh = Some(geometry);
        let ideal = M::ideal_frame_count(&geometry);
        if ideal != self.frames.len() {
            self.update_playable_frames_size(host, &geometry, ideal);
        } else {
            let time_per_frame = M::time_per_frame(&geometry, ideal);
            for (i, frame) in self.frames.iter_mut().enumerate() {
                frame.set_index_and_local_time(i, i as f64 * time_per_frame);
            }
        }
        self.refresh_markers(host, 0..self.frames.len(), true);
    }

    fn needs_refresh_playable_frames(&self, geometry: &ClipGeometry) -> bool {
        let Some(last) = self.last_refresh else {
            return true;
        };

        !approximately(last.start, geometry.start)
            || !approximately(last.duration, geometry.duration)
            || !approximately(last.time_scale, geometry.time_scale)
            || !approximately(last.clip_in, geometry.clip_in)
            || M::ideal_frame_count(geometry) != self.frames.len()
    }

    /// Grow or shrink to `size` frames and re-anchor all of them on the grid
    fn update_playable_frames_size(&mut self, host: &mut dyn TimelineHost, geometry: &ClipGeometry, size: usize) {
        let time_per_frame = M::time_per_frame(geometry, size);
        let previous = self.frames.len();

        if previous < size {
            self.frames.extend((previous..size).map(|i| PlayableFrame::new(i, time_per_frame)));
        } else if previous > size {
            for frame in &mut self.frames[size..] {
                release_marker(frame, host);
                debug_assert!(!frame.has_marker(), "frame {} destroyed with a live marker", frame.index());
            }
            self.frames.truncate(size);
        }

        for (i, frame) in self.frames.iter_mut().enumerate() {
            frame.set_index_and_local_time(i, i as f64 * time_per_frame);
        }

        if previous != size {
            tracing::debug!("Resized playable frames of {:?}: {} -> {}", self.clip, previous, size);
        }
    }

    /// Bring the markers of a range in line with their frames
    fn refresh_markers(&mut self, host: &mut dyn TimelineHost, range: Range<usize>, notify: bool) {
        let context = MarkerContext {
            geometry: host.clip_geometry(self.clip),
            track: host.parent_track(self.clip),
            visible: self.visibility.is_visible(),
        };

        let end = range.end.min(self.frames.len());
        let start = range.start.min(end);
        let mut changes = 0;
        for frame in &mut self.frames[start..end] {
            changes += refresh_marker::<M>(frame, host, &context);
        }

        if changes > 0 {
            tracing::trace!("{} marker changes on {:?}", changes, self.clip);
            if notify {
                self.notify(HostNotification::ContentsAddedOrRemoved);
            }
        }
    }

    /// Geometry of the clip if it currently sits on a track
    fn ready_geometry(&self, host: &dyn TimelineHost) -> Option<ClipGeometry> {
        host.parent_track(self.clip)?;
        host.clip_geometry(self.clip)
    }

    fn notify(&mut self, notification: HostNotification) {
        if self.notifications.last() != Some(&notification) {
            self.notifications.push(notification);
        }
    }
}

/// Delete the frame's marker, if any. Returns true if one was deleted.
fn release_marker(frame: &mut PlayableFrame, host: &mut dyn TimelineHost) -> bool {
    match frame.detach_marker() {
        Some(marker) => {
            host.delete_marker(marker.track, marker.id);
            true
        }
        None => false,
    }
}

/// Pull a dragged marker's time back into the frame. A frame whose marker
/// is missing stops being a key.
fn save_state_from_marker<M: TimeMapping>(frame: &mut PlayableFrame, host: &dyn TimelineHost, geometry: &ClipGeometry) {
    let marker_time = match frame.marker() {
        Some(marker) => host.marker_time(marker.id),
        None => {
            frame.set_enabled(false);
            return;
        }
    };

    match marker_time {
        Some(time) => frame.set_local_time(M::global_to_local(time, geometry)),
        None => {
            // Deleted on the host side
            frame.detach_marker();
            frame.set_enabled(false);
        }
    }
}

/// Create, delete or move one frame's marker. Returns the number of markers
/// created or deleted.
fn refresh_marker<M: TimeMapping>(frame: &mut PlayableFrame, host: &mut dyn TimelineHost, context: &MarkerContext) -> usize {
    let mut changes = 0;

    // The clip moved to another track
    if frame.marker().is_some_and(|m| Some(m.track) != context.track) && release_marker(frame, host) {
        changes += 1;
    }

    let wanted = frame.is_enabled() && context.visible;
    if !wanted {
        if release_marker(frame, host) {
            changes += 1;
        }
    } else if !frame.has_marker() {
        if let (Some(track), Some(geometry)) = (context.track, context.geometry) {
            let time = M::local_to_global(frame.local_time(), &geometry);
            let id = host.create_marker(track, time);
            frame.attach_marker(FrameMarker::new(id, track));
            changes += 1;
        }
    }

    if let (Some(marker), Some(geometry)) = (frame.marker(), context.geometry) {
        host.set_marker_time(marker.id, M::local_to_global(frame.local_time(), &geometry));
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::InMemoryTimeline;
    use proptest::prelude::*;

    const FPS: f64 = 10.0;

    fn scene_cache_setup(duration: f64) -> (InMemoryTimeline, TrackId, SceneCacheClipData) {
        let mut timeline = InMemoryTimeline::new();
        let track = timeline.add_track("Scene Cache");
        let clip = timeline.add_clip(track, ClipGeometry::new(2.0, duration, FPS));
        let mut data = SceneCacheClipData::new(clip);
        data.on_clip_changed(&mut timeline);
        (timeline, track, data)
    }

    fn disable_all(data: &mut SceneCacheClipData, timeline: &mut InMemoryTimeline) {
        for i in 0..data.num_playable_frames() {
            data.set_key_frame_enabled(timeline, i, false);
        }
    }

    fn enable_key(
        data: &mut SceneCacheClipData,
        timeline: &mut InMemoryTimeline,
        index: usize,
        play_frame: i32,
        mode: KeyFrameMode,
    ) {
        data.set_key_frame_enabled(timeline, index, true);
        data.set_play_frame(index, play_frame);
        data.set_key_frame_mode(index, mode);
    }

    fn marker_of(data: &SceneCacheClipData, index: usize) -> MarkerId {
        data.playable_frame(index).and_then(PlayableFrame::marker_id).unwrap()
    }

    #[test]
    fn test_first_clip_change_builds_grid_with_markers() {
        let (timeline, track, data) = scene_cache_setup(1.0);

        assert_eq!(data.num_playable_frames(), 10);
        assert_eq!(timeline.marker_count(track), 10);
        for (i, frame) in data.playable_frames().iter().enumerate() {
            assert_eq!(frame.index(), i);
            assert_eq!(frame.play_frame(), i as i32);
            assert!(frame.is_enabled());
        }
        // Scene cache markers sit at start + local time
        assert!((timeline.marker_times(track)[3] - 2.3).abs() < 1e-9);
    }

    #[test]
    fn test_playable_frame_out_of_range() {
        let (_, _, data) = scene_cache_setup(1.0);
        assert!(data.playable_frame(9).is_some());
        assert!(data.playable_frame(10).is_none());
    }

    #[test]
    fn test_geometry_change_resizes_and_keeps_modes() {
        let (mut timeline, track, mut data) = scene_cache_setup(1.0);
        data.set_key_frame_mode(3, KeyFrameMode::Hold);
        data.set_key_frame_mode(8, KeyFrameMode::Hold);

        timeline.set_clip_geometry(data.clip_id(), ClipGeometry::new(2.0, 0.5, FPS));
        data.on_clip_changed(&mut timeline);

        assert_eq!(data.num_playable_frames(), 5);
        assert_eq!(data.playable_frame(3).unwrap().mode(), KeyFrameMode::Hold);
        assert_eq!(timeline.marker_count(track), 5);

        timeline.set_clip_geometry(data.clip_id(), ClipGeometry::new(2.0, 1.5, FPS));
        data.on_clip_changed(&mut timeline);

        assert_eq!(data.num_playable_frames(), 15);
        assert_eq!(data.playable_frame(3).unwrap().mode(), KeyFrameMode::Hold);
        assert_eq!(data.playable_frame(8).unwrap().mode(), KeyFrameMode::Continuous);
        for (i, frame) in data.playable_frames().iter().enumerate() {
            assert_eq!(frame.local_time(), i as f64 * (1.5 / 15.0));
        }
    }

    #[test]
    fn test_moving_clip_moves_markers() {
        let (mut timeline, track, mut data) = scene_cache_setup(1.0);
        timeline.set_clip_geometry(data.clip_id(), ClipGeometry::new(5.0, 1.0, FPS));
        data.on_clip_changed(&mut timeline);

        let times = timeline.marker_times(track);
        assert_eq!(times.len(), 10);
        assert!((times[0] - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_clip_moved_to_other_track_recreates_markers() {
        let (mut timeline, first, mut data) = scene_cache_setup(1.0);
        let second = timeline.add_track("Other");

        timeline.detach_clip(data.clip_id());
        data.on_clip_changed(&mut timeline);
        assert_eq!(timeline.marker_count(first), 10);

        timeline.move_clip_to_track(data.clip_id(), second);
        data.refresh_all_markers(&mut timeline);
        assert_eq!(timeline.marker_count(first), 0);
        assert_eq!(timeline.marker_count(second), 10);
        assert_eq!(timeline.marker_track(marker_of(&data, 0)), Some(second));
    }

    #[test]
    fn test_dragged_marker_moves_key_payload() {
        let (mut timeline, track, mut data) = scene_cache_setup(1.0);
        disable_all(&mut data, &mut timeline);
        enable_key(&mut data, &mut timeline, 2, 42, KeyFrameMode::Hold);
        assert_eq!(timeline.marker_count(track), 1);

        // Drag to just past slot 6
        timeline.drag_marker(marker_of(&data, 2), 2.0 + 0.62);
        data.on_clip_changed(&mut timeline);

        let moved = data.playable_frame(6).unwrap();
        assert!(moved.is_enabled());
        assert_eq!(moved.play_frame(), 42);
        assert_eq!(moved.mode(), KeyFrameMode::Hold);
        assert!(!data.playable_frame(2).unwrap().is_enabled());
        assert!((data.playable_frame(2).unwrap().local_time() - 0.2).abs() < 1e-12);

        // Marker snapped onto the grid
        assert_eq!(timeline.marker_count(track), 1);
        assert!((timeline.marker_times(track)[0] - 2.6).abs() < 1e-9);

        assert!(data.needs_timeline_refresh());
        data.on_graph_start(&mut timeline);
        assert!(!data.needs_timeline_refresh());
        assert!(data
            .take_notifications()
            .contains(&HostNotification::ContentsAddedOrRemoved));

        // A second change with nothing dragged keeps everything in place
        data.on_clip_changed(&mut timeline);
        assert!(data.playable_frame(6).unwrap().is_enabled());
        assert!(!data.needs_timeline_refresh());
    }

    #[test]
    fn test_colliding_drags_last_write_wins() {
        let (mut timeline, _, mut data) = scene_cache_setup(1.0);
        data.set_play_frame(3, 300);
        data.set_play_frame(5, 500);

        timeline.drag_marker(marker_of(&data, 3), 2.0 + 0.41);
        timeline.drag_marker(marker_of(&data, 5), 2.0 + 0.39);
        data.on_clip_changed(&mut timeline);

        let target = data.playable_frame(4).unwrap();
        assert!(target.is_enabled());
        assert_eq!(target.play_frame(), 500);
        assert!(!data.playable_frame(3).unwrap().is_enabled());
        assert!(!data.playable_frame(5).unwrap().is_enabled());
        assert!(data.playable_frame(6).unwrap().is_enabled());
    }

    #[test]
    fn test_marker_deleted_on_host_disables_key() {
        let (mut timeline, _, mut data) = scene_cache_setup(1.0);
        timeline.remove_marker(marker_of(&data, 7));
        data.on_clip_changed(&mut timeline);

        assert!(!data.playable_frame(7).unwrap().is_enabled());
        assert!(data.playable_frame(7).unwrap().marker_id().is_none());
        assert!(!data.needs_timeline_refresh());
    }

    #[test]
    fn test_not_ready_clip_is_ignored() {
        let mut timeline = InMemoryTimeline::new();
        let track = timeline.add_track("Scene Cache");
        let clip = timeline.add_clip(track, ClipGeometry::new(0.0, 1.0, FPS));
        timeline.detach_clip(clip);

        let mut data = SceneCacheClipData::new(clip);
        data.on_clip_changed(&mut timeline);
        data.init_playable_frames(&mut timeline);
        data.add_key_frame(&mut timeline, 0.5);
        assert_eq!(data.num_playable_frames(), 0);
        assert_eq!(timeline.total_marker_count(), 0);
    }

    #[test]
    fn test_regenerate_key_frames() {
        let (mut timeline, track, mut data) = scene_cache_setup(1.0);
        data.regenerate_key_frames(&mut timeline, 3, KeyFrameMode::Hold);

        let enabled: Vec<usize> = data
            .playable_frames()
            .iter()
            .filter(|f| f.is_enabled())
            .map(PlayableFrame::index)
            .collect();
        assert_eq!(enabled, vec![0, 3, 6, 9]);
        assert!(data.playable_frames().iter().all(|f| f.mode() == KeyFrameMode::Hold));
        assert_eq!(timeline.marker_count(track), 4);
        assert!(data.take_notifications().contains(&HostNotification::ContentsModified));
    }

    #[test]
    fn test_regenerate_key_frames_in_range() {
        let (mut timeline, _, mut data) = scene_cache_setup(1.0);
        data.set_play_frame(1, 77);
        data.regenerate_key_frames_in_range(&mut timeline, 4, 8, 4, KeyFrameMode::Hold);

        let frames = data.playable_frames();
        assert!(frames[1].is_enabled());
        assert_eq!(frames[1].play_frame(), 77);
        assert_eq!(frames[1].mode(), KeyFrameMode::Continuous);
        assert!(frames[4].is_enabled());
        assert!(!frames[5].is_enabled());
        assert!(!frames[7].is_enabled());
        assert_eq!(frames[6].mode(), KeyFrameMode::Hold);
        assert!(frames[8].is_enabled());
    }

    #[test]
    fn test_regenerate_with_zero_span() {
        let (mut timeline, _, mut data) = scene_cache_setup(1.0);
        data.regenerate_key_frames(&mut timeline, 0, KeyFrameMode::Continuous);
        assert!(data.playable_frames().iter().all(PlayableFrame::is_enabled));
    }

    #[test]
    fn test_add_key_frame_interpolates() {
        let (mut timeline, track, mut data) = scene_cache_setup(1.0);
        disable_all(&mut data, &mut timeline);
        enable_key(&mut data, &mut timeline, 2, 10, KeyFrameMode::Continuous);
        enable_key(&mut data, &mut timeline, 8, 40, KeyFrameMode::Continuous);

        data.add_key_frame(&mut timeline, 2.5);

        let added = data.playable_frame(5).unwrap();
        assert!(added.is_enabled());
        assert_eq!(added.play_frame(), 25);
        assert_eq!(added.mode(), KeyFrameMode::Continuous);
        assert_eq!(timeline.marker_count(track), 3);
    }

    #[test]
    fn test_add_key_frame_after_hold_carries_value() {
        let (mut timeline, _, mut data) = scene_cache_setup(1.0);
        disable_all(&mut data, &mut timeline);
        enable_key(&mut data, &mut timeline, 2, 7, KeyFrameMode::Hold);
        enable_key(&mut data, &mut timeline, 8, 40, KeyFrameMode::Continuous);

        data.add_key_frame(&mut timeline, 2.5);
        assert_eq!(data.playable_frame(5).unwrap().play_frame(), 7);
    }

    #[test]
    fn test_add_key_frame_on_existing_key_is_noop() {
        let (mut timeline, _, mut data) = scene_cache_setup(1.0);
        data.set_play_frame(5, 99);
        data.set_user_note(5, "keep");
        data.add_key_frame(&mut timeline, 2.5);

        assert_eq!(data.playable_frame(5).unwrap().play_frame(), 99);
        assert_eq!(data.playable_frame(5).unwrap().user_note(), "keep");
    }

    #[test]
    fn test_add_key_frame_without_previous_key_uses_first_frame() {
        let (mut timeline, _, mut data) = scene_cache_setup(1.0);
        disable_all(&mut data, &mut timeline);
        enable_key(&mut data, &mut timeline, 6, 60, KeyFrameMode::Continuous);
        data.set_play_frame(0, 0);

        data.add_key_frame(&mut timeline, 2.3);
        assert_eq!(data.playable_frame(3).unwrap().play_frame(), 30);
    }

    #[test]
    fn test_hidden_markers_skip_reconciliation() {
        let (mut timeline, track, mut data) = scene_cache_setup(1.0);
        data.take_notifications();
        data.request_frame_markers(&mut timeline, false, false);
        assert!(!data.are_frame_markers_visible());
        assert_eq!(timeline.marker_count(track), 0);
        assert!(matches!(
            data.take_notifications().first(),
            Some(HostNotification::RecordUndo(_))
        ));

        data.on_clip_changed(&mut timeline);
        assert!(data.playable_frames().iter().all(PlayableFrame::is_enabled));

        data.request_frame_markers(&mut timeline, true, false);
        assert_eq!(timeline.marker_count(track), 10);
    }

    #[test]
    fn test_visibility_threshold_boundary() {
        for force_show in [false, true] {
            let (mut timeline, track, mut data) = scene_cache_setup(1.0);
            data.request_frame_markers(&mut timeline, false, false);
            data.request_frame_markers(&mut timeline, true, force_show);

            data.set_timeline_width_per_frame(&mut timeline, 10.0);
            assert_eq!(data.are_frame_markers_visible(), force_show);
            assert_eq!(timeline.marker_count(track) == 10, force_show);

            data.set_timeline_width_per_frame(&mut timeline, 10.0001);
            assert!(data.are_frame_markers_visible());
            assert_eq!(timeline.marker_count(track), 10);
        }
    }

    #[test]
    fn test_update_timeline_width_per_frame() {
        let (mut timeline, track, mut data) = scene_cache_setup(1.0);
        // 100 frames over 500 pixels
        data.update_timeline_width_per_frame(&mut timeline, 500.0, 10.0, FPS, 1.0);
        assert!(!data.are_frame_markers_visible());
        assert_eq!(timeline.marker_count(track), 0);

        data.update_timeline_width_per_frame(&mut timeline, 5000.0, 10.0, FPS, 1.0);
        assert!(data.are_frame_markers_visible());
        assert_eq!(timeline.marker_count(track), 10);
    }

    #[test]
    fn test_duplicate_is_independent() {
        let (mut timeline, track, mut data) = scene_cache_setup(1.0);
        data.set_key_frame_mode(4, KeyFrameMode::Hold);

        let copy_clip = timeline.add_clip(track, ClipGeometry::new(9.0, 1.0, FPS));
        let mut copy = data.duplicate(copy_clip);
        assert!(copy.playable_frames().iter().all(|f| !f.has_marker()));

        timeline.set_clip_geometry(data.clip_id(), ClipGeometry::new(2.0, 0.3, FPS));
        data.on_clip_changed(&mut timeline);
        assert_eq!(data.num_playable_frames(), 3);
        assert_eq!(copy.num_playable_frames(), 10);
        assert_eq!(copy.playable_frame(4).unwrap().mode(), KeyFrameMode::Hold);

        copy.set_play_frame(0, 1234);
        assert_eq!(data.playable_frame(0).unwrap().play_frame(), 0);
    }

    #[test]
    fn test_destroy_releases_markers() {
        let (mut timeline, track, mut data) = scene_cache_setup(1.0);
        data.destroy(&mut timeline);
        assert_eq!(timeline.marker_count(track), 0);
        assert!(data.playable_frames().iter().all(|f| !f.has_marker()));
    }

    #[test]
    fn test_reset_playable_frames() {
        let (mut timeline, track, mut data) = scene_cache_setup(1.0);
        data.regenerate_key_frames(&mut timeline, 5, KeyFrameMode::Hold);
        data.reset_playable_frames(&mut timeline);

        assert_eq!(data.num_playable_frames(), 10);
        assert!(data
            .playable_frames()
            .iter()
            .all(|f| f.is_enabled() && f.mode() == KeyFrameMode::Continuous));
        assert_eq!(timeline.marker_count(track), 10);
    }

    #[test]
    fn test_init_playable_frames() {
        let (mut timeline, _, mut data) = scene_cache_setup(1.0);
        data.regenerate_key_frames(&mut timeline, 2, KeyFrameMode::Hold);
        data.set_play_frame(4, 99);
        data.init_playable_frames(&mut timeline);

        for (i, frame) in data.playable_frames().iter().enumerate() {
            assert!(frame.is_enabled());
            assert_eq!(frame.play_frame(), i as i32);
            assert_eq!(frame.mode(), KeyFrameMode::Continuous);
        }
    }

    #[test]
    fn test_toggle_mode_and_marker_lookup() {
        let (_, _, mut data) = scene_cache_setup(1.0);
        assert!(data.toggle_key_frame_mode(1));
        assert_eq!(data.playable_frame(1).unwrap().mode(), KeyFrameMode::Hold);
        assert!(!data.toggle_key_frame_mode(42));

        let marker = marker_of(&data, 6);
        assert_eq!(data.frame_index_for_marker(marker), Some(6));
        assert_eq!(data.frame_index_for_marker(MarkerId::new()), None);
    }

    #[test]
    fn test_play_frame_at_global() {
        let (mut timeline, _, mut data) = scene_cache_setup(1.0);
        disable_all(&mut data, &mut timeline);
        enable_key(&mut data, &mut timeline, 0, 0, KeyFrameMode::Continuous);
        enable_key(&mut data, &mut timeline, 9, 90, KeyFrameMode::Continuous);

        assert_eq!(data.play_frame_at_global(&timeline, 2.45), Some(45));
        assert_eq!(data.play_frame_at(0.0), Some(0));
    }

    #[test]
    fn test_keyframe_family_honours_clip_in_and_scale() {
        let mut timeline = InMemoryTimeline::new();
        let track = timeline.add_track("Key Frames");
        let geometry = ClipGeometry::new(1.0, 1.0, FPS).with_clip_in(0.5).with_time_scale(2.0);
        let clip = timeline.add_clip(track, geometry);

        let mut data = KeyFrameControllerClipData::new(clip);
        data.on_clip_changed(&mut timeline);
        assert_eq!(data.num_playable_frames(), 15);

        // local 1.0 -> 1.0 + (1.0 - 0.5) / 2.0
        let marker = data.playable_frame(10).and_then(PlayableFrame::marker_id).unwrap();
        assert!((timeline.marker_time(marker).unwrap() - 1.25).abs() < 1e-9);

        // Drag frame 10 to local 1.2 (global 1.35)
        timeline.drag_marker(marker, 1.35);
        data.on_clip_changed(&mut timeline);
        assert!(data.playable_frame(12).unwrap().is_enabled());
        assert_eq!(data.playable_frame(12).unwrap().play_frame(), 10);
        assert!(!data.playable_frame(10).unwrap().is_enabled());

        let changed = geometry.with_time_scale(1.0);
        timeline.set_clip_geometry(clip, changed);
        data.on_clip_changed(&mut timeline);
        assert_eq!(data.last_refresh, Some(changed));
    }

    proptest! {
        #[test]
        fn prop_resize_is_idempotent(first in 0usize..200, second in 0usize..200) {
            let mut timeline = InMemoryTimeline::new();
            let track = timeline.add_track("Scene Cache");
            let geometry = ClipGeometry::new(0.0, 3.0, FPS);
            let clip = timeline.add_clip(track, geometry);
            let mut data = SceneCacheClipData::new(clip);

            data.update_playable_frames_size(&mut timeline, &geometry, first);
            data.update_playable_frames_size(&mut timeline, &geometry, second);
            let once: Vec<(usize, f64)> = data.frames.iter().map(|f| (f.index(), f.local_time())).collect();
            data.update_playable_frames_size(&mut timeline, &geometry, second);
            let twice: Vec<(usize, f64)> = data.frames.iter().map(|f| (f.index(), f.local_time())).collect();

            prop_assert_eq!(data.num_playable_frames(), second);
            prop_assert_eq!(&once, &twice);
            for (i, frame) in data.frames.iter().enumerate() {
                prop_assert_eq!(frame.index(), i);
            }
        }

        #[test]
        fn prop_resize_keeps_hold_modes(old_size in 1usize..60, new_size in 1usize..60, hold in 0usize..60) {
            let mut timeline = InMemoryTimeline::new();
            let track = timeline.add_track("Scene Cache");
            let geometry = ClipGeometry::new(0.0, 3.0, FPS);
            let clip = timeline.add_clip(track, geometry);
            let mut data = SceneCacheClipData::new(clip);

            data.update_playable_frames_size(&mut timeline, &geometry, old_size);
            let hold = hold % old_size;
            data.set_key_frame_mode(hold, KeyFrameMode::Hold);
            data.update_playable_frames_size(&mut timeline, &geometry, new_size);

            if hold < new_size {
                prop_assert_eq!(data.frames[hold].mode(), KeyFrameMode::Hold);
            }
        }

        #[test]
        fn prop_full_refresh_anchors_on_grid(duration in 0.1f64..20.0, start in 0.0f64..100.0) {
            let mut timeline = InMemoryTimeline::new();
            let track = timeline.add_track("Scene Cache");
            let clip = timeline.add_clip(track, ClipGeometry::new(-1.0, 1.0, FPS));
            let mut data = SceneCacheClipData::new(clip);
            data.on_clip_changed(&mut timeline);

            timeline.set_clip_geometry(clip, ClipGeometry::new(start, duration, FPS));
            data.on_clip_changed(&mut timeline);

            let count = data.num_playable_frames();
            prop_assert_eq!(count, SceneCacheTiming::ideal_frame_count(&ClipGeometry::new(start, duration, FPS)));
            for (i, frame) in data.playable_frames().iter().enumerate() {
                prop_assert_eq!(frame.local_time(), i as f64 * (duration / count as f64));
            }
            prop_assert_eq!(timeline.marker_count(track), count);
        }
    }
}
