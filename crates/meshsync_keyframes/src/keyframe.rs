// SPDX-License-Identifier: MIT OR Apache-2.0
//! Playable frame definitions and play-frame interpolation.

use crate::marker::{FrameMarker, MarkerId};
use serde::{Deserialize, Serialize};

/// Interpolation policy from one key frame to the next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum KeyFrameMode {
    /// Play frames interpolate linearly towards the next key
    #[default]
    Continuous,
    /// The play frame stays constant until the next key
    Hold,
}

impl KeyFrameMode {
    /// Get the display name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Continuous => "Continuous",
            Self::Hold => "Hold",
        }
    }

    /// The other mode
    pub fn toggled(&self) -> Self {
        match self {
            Self::Continuous => Self::Hold,
            Self::Hold => Self::Continuous,
        }
    }
}

/// Payload carried by a key frame when its marker is dragged to another slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyFrameInfo {
    /// Whether the destination becomes a key
    pub enabled: bool,
    /// Interpolation mode carried over
    pub mode: KeyFrameMode,
    /// Play frame carried over
    pub play_frame: i32,
}

/// One logical sample point in a clip's fixed frame grid.
///
/// The marker handle is session-local: it is never serialized and never
/// copied by [`PlayableFrame::duplicate`].
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayableFrame {
    #[serde(skip)]
    index: usize,
    local_time: f64,
    play_frame: i32,
    enabled: bool,
    mode: KeyFrameMode,
    user_note: String,
    #[serde(skip)]
    marker: Option<FrameMarker>,
}

impl PlayableFrame {
    /// Create a grid-aligned frame playing its own index
    pub fn new(index: usize, time_per_frame: f64) -> Self {
        Self {
            index,
            local_time: index as f64 * time_per_frame,
            play_frame: index as i32,
            enabled: true,
            mode: KeyFrameMode::Continuous,
            user_note: String::new(),
            marker: None,
        }
    }

    /// Copy the frame state without its marker
    pub fn duplicate(&self) -> Self {
        Self {
            index: self.index,
            local_time: self.local_time,
            play_frame: self.play_frame,
            enabled: self.enabled,
            mode: self.mode,
            user_note: self.user_note.clone(),
            marker: None,
        }
    }

    /// Position within the owning clip's frame array
    pub fn index(&self) -> usize {
        self.index
    }

    /// Offset from the clip start in clip-local time
    pub fn local_time(&self) -> f64 {
        self.local_time
    }

    /// Source frame displayed while this frame is active
    pub fn play_frame(&self) -> i32 {
        self.play_frame
    }

    /// Whether this frame is a key
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Interpolation mode towards the next key
    pub fn mode(&self) -> KeyFrameMode {
        self.mode
    }

    /// Free-text annotation
    pub fn user_note(&self) -> &str {
        &self.user_note
    }

    /// Marker currently mirroring this frame, if any
    pub fn marker_id(&self) -> Option<MarkerId> {
        self.marker.as_ref().map(|m| m.id)
    }

    /// Whether a marker is attached
    pub fn has_marker(&self) -> bool {
        self.marker.is_some()
    }

    pub(crate) fn set_index_and_local_time(&mut self, index: usize, local_time: f64) {
        self.index = index;
        self.local_time = local_time;
    }

    pub(crate) fn set_local_time(&mut self, local_time: f64) {
        self.local_time = local_time;
    }

    pub(crate) fn set_play_frame(&mut self, play_frame: i32) {
        self.play_frame = play_frame;
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Returns true if the mode changed
    pub(crate) fn set_mode(&mut self, mode: KeyFrameMode) -> bool {
        if self.mode == mode {
            return false;
        }
        self.mode = mode;
        true
    }

    pub(crate) fn set_user_note(&mut self, note: impl Into<String>) {
        self.user_note = note.into();
    }

    pub(crate) fn marker(&self) -> Option<&FrameMarker> {
        self.marker.as_ref()
    }

    pub(crate) fn attach_marker(&mut self, marker: FrameMarker) {
        debug_assert!(self.marker.is_none(), "frame {} already owns a marker", self.index);
        self.marker = Some(marker);
    }

    pub(crate) fn detach_marker(&mut self) -> Option<FrameMarker> {
        self.marker.take()
    }

    /// Payload moved along when this frame's marker is dragged
    pub(crate) fn key_frame_info(&self) -> KeyFrameInfo {
        KeyFrameInfo {
            enabled: true,
            mode: self.mode,
            play_frame: self.play_frame,
        }
    }

    pub(crate) fn apply_key_frame_info(&mut self, info: KeyFrameInfo) {
        self.play_frame = info.play_frame;
        self.enabled = info.enabled;
        self.mode = info.mode;
    }
}

/// Nearest enabled frame strictly before `index`
pub fn find_enabled_before(frames: &[PlayableFrame], index: usize) -> Option<usize> {
    let end = index.min(frames.len());
    (0..end).rev().find(|&i| frames[i].enabled)
}

/// Nearest enabled frame strictly after `index`
pub fn find_enabled_after(frames: &[PlayableFrame], index: usize) -> Option<usize> {
    (index.saturating_add(1)..frames.len()).find(|&i| frames[i].enabled)
}

/// Linear play-frame interpolation between two frames by local time.
///
/// Clamped to the segment, rounded to the nearest frame.
pub fn interpolate_play_frame(prev: &PlayableFrame, next: &PlayableFrame, local_time: f64) -> i32 {
    let span = next.local_time - prev.local_time;
    if span.abs() < 1e-12 {
        return prev.play_frame;
    }

    let t = ((local_time - prev.local_time) / span).clamp(0.0, 1.0);
    let a = f64::from(prev.play_frame);
    let b = f64::from(next.play_frame);
    (a + (b - a) * t).round() as i32
}

/// Evaluate which source frame plays at a clip-local time
pub fn sample_play_frame(frames: &[PlayableFrame], local_time: f64) -> Option<i32> {
    let mut prev: Option<&PlayableFrame> = None;
    let mut next: Option<&PlayableFrame> = None;
    for frame in frames.iter().filter(|f| f.enabled) {
        if frame.local_time <= local_time {
            prev = Some(frame);
        } else {
            next = Some(frame);
            break;
        }
    }

    match (prev, next) {
        (None, None) => None,
        (None, Some(key)) => Some(key.play_frame),
        (Some(key), None) => Some(key.play_frame),
        (Some(a), Some(b)) => match a.mode {
            KeyFrameMode::Hold => Some(a.play_frame),
            KeyFrameMode::Continuous => Some(interpolate_play_frame(a, b, local_time)),
        },
    }
}
